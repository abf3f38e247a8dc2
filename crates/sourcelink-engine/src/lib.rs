//! Companion-Link Protocol Engine
//!
//! This crate turns the raw byte stream of the companion serial link into
//! dispatched setting/command exchanges. It owns:
//!
//! - the non-blocking [`ByteTransport`] boundary (plus an in-memory
//!   [`LoopbackTransport`] for tests and host-side tooling),
//! - the immutable setting/command [`HandlerRegistry`] supplied by the
//!   application at startup,
//! - the packet reception state machine, driven one state-advance per
//!   [`ProtocolEngine::poll_once`] call,
//! - message dispatch, response and exception generation,
//! - outbound requests and the correlated blocking wait.
//!
//! The engine is single-threaded and cooperative: "blocking" on a response
//! means calling [`ProtocolEngine::wait_for_response`] in a loop, which
//! drives the same reception machine as the top-level poll. Timeout policy
//! belongs entirely to that loop's owner.

mod correlation;
mod engine;
mod error;
mod registry;
mod transport;

pub use correlation::*;
pub use engine::*;
pub use error::*;
pub use registry::*;
pub use transport::*;
