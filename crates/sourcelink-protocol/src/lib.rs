//! Source Instrument Companion-Link Protocol
//!
//! This crate provides the wire-level types for communicating with the
//! instrument's companion board over the serial link. Every exchange is a
//! JSON-encoded envelope wrapped in a framed packet:
//!
//! - **Envelope**: `{"type": <0-4>, "name": "<string>", "data": <any>, "id": <u32>}`
//!   where `data` and `id` may be omitted. The presence of `id` tells the
//!   receiver that a reply is expected.
//! - **Packet**: a start-of-text marker, a 2-byte big-endian length covering
//!   only the serialized envelope, the envelope bytes, and an end-of-text
//!   marker.
//!
//! # Example
//!
//! ```rust,ignore
//! use sourcelink_protocol::{decode_envelope, encode_envelope, wrap_packet, Message};
//!
//! // Build and frame an outgoing message
//! let body = encode_envelope(&message)?;
//! let packet = wrap_packet(&body)?;
//!
//! // Parse a received envelope body
//! let message = decode_envelope(&received_body)?;
//! ```

mod constants;
mod envelope;
mod error;
mod frame;
mod message;

pub use constants::*;
pub use envelope::*;
pub use error::*;
pub use frame::*;
pub use message::*;
