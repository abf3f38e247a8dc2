//! Engine error types.

use thiserror::Error;

use sourcelink_protocol::ProtocolError;

/// Errors surfaced by the outbound half of the engine.
///
/// The reception path never surfaces errors; framing and envelope faults are
/// recovered locally and at most logged.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Encoding or framing the outgoing message failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The name is not present in the relevant handler table.
    #[error("no handler entry for '{name}'")]
    UnknownName {
        /// The name that failed to resolve.
        name: String,
    },

    /// The entry exists but has no outgoing-data generator. Registering one
    /// is a startup-time obligation for any name the application transmits.
    #[error("no outgoing data generator registered for '{name}'")]
    MissingGenerator {
        /// The name whose entry lacks a generator.
        name: String,
    },

    /// A correlated request is already outstanding. The engine tracks
    /// exactly one in-flight request; resolve or abandon it first.
    #[error("a correlated request is already awaiting its response")]
    RequestPending,

    /// The transport accepted fewer bytes than the packet required.
    #[error("transport accepted {committed} of {wanted} packet bytes")]
    TransportOverflow {
        /// Packet length.
        wanted: usize,
        /// Bytes the transport committed.
        committed: usize,
    },
}
