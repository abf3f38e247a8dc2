//! JSON envelope encoding/decoding.
//!
//! The envelope is a JSON object with fields serialized in the order
//! `type`, `name`, `data`, `id`. `data` and `id` are omitted entirely when
//! absent; an absent `id` is the "no response expected" signal and is never
//! an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::MAX_MESSAGE_SIZE;
use crate::error::ProtocolError;
use crate::message::{Message, MessageKind};

/// Wire layout for serialization. Field order here fixes the field order in
/// the emitted JSON.
#[derive(Serialize)]
struct EnvelopeOut<'a> {
    #[serde(rename = "type")]
    type_code: u8,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u32>,
}

/// Wire layout for deserialization. `type` and `name` are required; the
/// rest default to absent.
#[derive(Deserialize)]
struct EnvelopeIn {
    #[serde(rename = "type")]
    type_code: u8,
    name: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    id: Option<u32>,
}

/// Parse a serialized envelope body into a [`Message`].
///
/// Fails if the JSON is invalid, `type` or `name` is missing, or the type
/// code is outside the defined range.
pub fn decode_envelope(body: &[u8]) -> Result<Message, ProtocolError> {
    let raw: EnvelopeIn = serde_json::from_slice(body)?;
    Ok(Message {
        kind: MessageKind::try_from(raw.type_code)?,
        name: raw.name,
        data: raw.data,
        id: raw.id,
    })
}

/// Serialize a [`Message`] into a compact JSON envelope body.
///
/// Rejects (never truncates) messages whose serialized form exceeds
/// [`MAX_MESSAGE_SIZE`].
pub fn encode_envelope(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    let out = EnvelopeOut {
        type_code: message.kind.code(),
        name: &message.name,
        data: message.data.as_ref(),
        id: message.id,
    };
    let body = serde_json::to_vec(&out)?;
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLong {
            max: MAX_MESSAGE_SIZE,
            actual: body.len(),
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trip_preserves_every_field() {
        let message = Message::new(MessageKind::Setting, "Frequency")
            .with_data(json!({"Amplitude": 1.25, "Offset": 0.0}))
            .with_id(7);

        let body = encode_envelope(&message).unwrap();
        let decoded = decode_envelope(&body).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn round_trip_without_data_or_id() {
        let message = Message::new(MessageKind::Command, "Heartbeat");
        let body = encode_envelope(&message).unwrap();
        let decoded = decode_envelope(&body).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn field_order_is_type_name_data_id() {
        let message = Message::new(MessageKind::Setting, "Mode")
            .with_data(json!(1))
            .with_id(3);
        let body = encode_envelope(&message).unwrap();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            r#"{"type":0,"name":"Mode","data":1,"id":3}"#
        );
    }

    #[test]
    fn absent_fields_are_omitted_entirely() {
        let message = Message::new(MessageKind::Setting, "Mode");
        let body = encode_envelope(&message).unwrap();
        assert_eq!(std::str::from_utf8(&body).unwrap(), r#"{"type":0,"name":"Mode"}"#);
    }

    #[test]
    fn zero_is_a_valid_id() {
        let body = br#"{"type":1,"name":"Mode","id":0}"#;
        let decoded = decode_envelope(body).unwrap();
        assert_eq!(decoded.id, Some(0));
    }

    #[test]
    fn missing_type_is_malformed() {
        let body = br#"{"name":"Mode","id":1}"#;
        assert!(matches!(
            decode_envelope(body),
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn missing_name_is_malformed() {
        let body = br#"{"type":0,"id":1}"#;
        assert!(matches!(
            decode_envelope(body),
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn out_of_range_type_code_is_rejected() {
        let body = br#"{"type":5,"name":"Mode"}"#;
        assert!(matches!(
            decode_envelope(body),
            Err(ProtocolError::UnknownTypeCode(5))
        ));
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            decode_envelope(b"{\"type\":0,"),
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn oversized_message_is_rejected_not_truncated() {
        let message = Message::new(MessageKind::Setting, "CalData")
            .with_data(Value::String("x".repeat(MAX_MESSAGE_SIZE)));
        assert!(matches!(
            encode_envelope(&message),
            Err(ProtocolError::MessageTooLong { .. })
        ));
    }
}
