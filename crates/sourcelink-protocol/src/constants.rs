//! Protocol constants
//!
//! These constants define the packet framing markers, message type codes,
//! and sizing limits used on the companion serial link.

// ============================================================================
// Packet Framing
// ============================================================================

/// Marks the first byte of every packet.
pub const START_OF_PACKET: u8 = 0x02;
/// Marks the last byte of every packet.
pub const END_OF_PACKET: u8 = 0x03;
/// Framing bytes surrounding the envelope: start marker, 2-byte length, end marker.
pub const PACKET_OVERHEAD: usize = 4;

// ============================================================================
// Message Type Codes
// ============================================================================

/// A named instrument parameter being set or announced.
pub const TYPE_CODE_SETTING: u8 = 0;
/// Reply to a setting message that carried an id.
pub const TYPE_CODE_SETTING_RESPONSE: u8 = 1;
/// A named one-shot action request.
pub const TYPE_CODE_COMMAND: u8 = 2;
/// Reply to a command message that carried an id.
pub const TYPE_CODE_COMMAND_RESPONSE: u8 = 3;
/// Reply sent when the receiver could not process a message that carried an id.
pub const TYPE_CODE_EXCEPTION_RESPONSE: u8 = 4;

// ============================================================================
// Sizes
// ============================================================================

/// Maximum serialized envelope length, in bytes.
///
/// Messages longer than this are rejected at encode time and inbound packets
/// declaring a longer body are dropped before any body byte is read.
pub const MAX_MESSAGE_SIZE: usize = 512;
