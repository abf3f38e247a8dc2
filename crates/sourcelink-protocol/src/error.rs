//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when encoding or decoding companion-link traffic.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Envelope JSON failed to parse or is missing a required field.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),

    /// The envelope carried a numeric type code outside the defined range.
    #[error("unknown message type code: {0}")]
    UnknownTypeCode(u8),

    /// Serialized envelope exceeds the message buffer capacity.
    #[error("message too long: maximum {max} bytes, got {actual}")]
    MessageTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual serialized length.
        actual: usize,
    },

    /// Packet is too short to contain the framing fields.
    #[error("packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Packet did not begin with the start-of-packet marker.
    #[error("bad start marker: 0x{0:02X}")]
    BadStartMarker(u8),

    /// Packet did not end with the end-of-packet marker.
    #[error("bad end marker: 0x{0:02X}")]
    BadEndMarker(u8),

    /// The length field disagrees with the bytes physically present.
    #[error("length mismatch: declared {declared} bytes, found {actual}")]
    LengthMismatch {
        /// Length declared in the packet header.
        declared: usize,
        /// Body bytes actually present before the end marker.
        actual: usize,
    },
}
