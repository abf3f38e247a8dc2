//! The decoded unit of protocol meaning.

use serde_json::Value;

use crate::constants::*;
use crate::error::ProtocolError;

/// The five message kinds the envelope `type` field can carry.
///
/// An unrecognized numeric code on the wire is a parse failure, never a
/// sixth kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A named instrument parameter being set or announced.
    Setting,
    /// Reply to a setting that carried an id.
    SettingResponse,
    /// A named one-shot action request.
    Command,
    /// Reply to a command that carried an id.
    CommandResponse,
    /// Reply sent when the receiver could not process a message with an id.
    ExceptionResponse,
}

impl MessageKind {
    /// The numeric code used in the envelope `type` field.
    pub fn code(&self) -> u8 {
        match self {
            MessageKind::Setting => TYPE_CODE_SETTING,
            MessageKind::SettingResponse => TYPE_CODE_SETTING_RESPONSE,
            MessageKind::Command => TYPE_CODE_COMMAND,
            MessageKind::CommandResponse => TYPE_CODE_COMMAND_RESPONSE,
            MessageKind::ExceptionResponse => TYPE_CODE_EXCEPTION_RESPONSE,
        }
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, ProtocolError> {
        match code {
            TYPE_CODE_SETTING => Ok(MessageKind::Setting),
            TYPE_CODE_SETTING_RESPONSE => Ok(MessageKind::SettingResponse),
            TYPE_CODE_COMMAND => Ok(MessageKind::Command),
            TYPE_CODE_COMMAND_RESPONSE => Ok(MessageKind::CommandResponse),
            TYPE_CODE_EXCEPTION_RESPONSE => Ok(MessageKind::ExceptionResponse),
            other => Err(ProtocolError::UnknownTypeCode(other)),
        }
    }
}

/// A decoded companion-link message.
///
/// Constructed either by decoding an inbound envelope or by the engine when
/// it builds an outbound request/response; either way it lives for one
/// dispatch or transmit cycle and is then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Which of the five exchanges this message participates in.
    pub kind: MessageKind,
    /// Setting or command name. Setting and command names are independent
    /// namespaces.
    pub name: String,
    /// Opaque structured payload whose shape is defined per-name by the
    /// application. Never inspected by the engine.
    pub data: Option<Value>,
    /// Correlation id. Present means "sender expects a reply"; zero is a
    /// valid id.
    pub id: Option<u32>,
}

impl Message {
    /// Build a message with no payload and no id.
    pub fn new(kind: MessageKind, name: impl Into<String>) -> Self {
        Message {
            kind,
            name: name.into(),
            data: None,
            id: None,
        }
    }

    /// Attach a data payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach a correlation id.
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_round_trip() {
        for kind in [
            MessageKind::Setting,
            MessageKind::SettingResponse,
            MessageKind::Command,
            MessageKind::CommandResponse,
            MessageKind::ExceptionResponse,
        ] {
            assert_eq!(MessageKind::try_from(kind.code()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_code_is_rejected() {
        assert!(matches!(
            MessageKind::try_from(5),
            Err(ProtocolError::UnknownTypeCode(5))
        ));
        assert!(MessageKind::try_from(0xFF).is_err());
    }
}
