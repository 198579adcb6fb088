//! Decoding of subscriber-sourced control frames.

use crate::domain::{
    ControlError, SubscriberOptionsUpdatePayload, SubscriberSourcedMessage, OPTIONS_UPDATE,
};

/// A decoded control frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlMessage {
    /// Replace the subscriber's filter.
    OptionsUpdate(SubscriberOptionsUpdatePayload),
    /// A type this server does not handle.
    Unknown(String),
}

/// Decode the envelope, then the payload for known types.
pub fn decode_control_message(raw: &str) -> Result<ControlMessage, ControlError> {
    let envelope: SubscriberSourcedMessage = serde_json::from_str(raw)?;
    if envelope.message_type != OPTIONS_UPDATE {
        return Ok(ControlMessage::Unknown(envelope.message_type));
    }
    let payload = serde_json::from_value(envelope.payload)?;
    Ok(ControlMessage::OptionsUpdate(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_options_update() {
        let msg = decode_control_message(concat!(
            r#"{"type":"options_update","payload":"#,
            r#"{"wantedCollections":["foo"],"maxMessageSizeBytes":1000}}"#,
        ))
        .unwrap();
        let ControlMessage::OptionsUpdate(payload) = msg else {
            panic!("wrong variant");
        };
        assert_eq!(payload.wanted_collections, vec!["foo".to_string()]);
        assert_eq!(payload.max_message_size_bytes, 1000);
    }

    #[test]
    fn test_decode_unknown_type() {
        let msg = decode_control_message(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ControlMessage::Unknown("ping".to_string()));
    }

    #[test]
    fn test_decode_bad_json() {
        assert!(matches!(
            decode_control_message("{not json"),
            Err(ControlError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_missing_payload() {
        assert!(decode_control_message(r#"{"type":"options_update"}"#).is_err());
    }

    #[test]
    fn test_decode_wrong_field_type() {
        assert!(decode_control_message(
            r#"{"type":"options_update","payload":{"wantedDids":"did:plc:a"}}"#
        )
        .is_err());
    }
}
