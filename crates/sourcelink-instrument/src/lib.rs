//! Source Instrument Application Layer
//!
//! Everything the protocol engine calls back into: the working settings of
//! the voltage/current source, its calibration data, command execution, and
//! the two static handler tables that wire the instrument to the engine.
//!
//! The handler modules are the only place the instrument touches JSON; the
//! settings and calibration models themselves know nothing about the wire.

mod calibration;
mod handlers;
mod instrument;
mod settings;

pub use calibration::*;
pub use handlers::*;
pub use instrument::*;
pub use settings::*;
