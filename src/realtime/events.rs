//! Frames exchanged over the realtime channel.
//!
//! Every frame is a JSON object `{"type": ..., "payload": ...}`.

use serde::{Deserialize, Serialize};

use crate::api::{Chat, Message};

/// Frame pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// A message was posted in one of the user's chats
    NewMessage(Message),
    /// A chat was opened with the user
    NewChat(Chat),
    /// Any frame this client does not understand, kept verbatim
    Unknown(serde_json::Value),
}

impl ServerEvent {
    /// Decodes a text frame. Unrecognised `type`s become [`ServerEvent::Unknown`];
    /// invalid JSON or a known type with a malformed payload is an error.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let payload = || value.get("payload").cloned().unwrap_or(serde_json::Value::Null);
        match value.get("type").and_then(|t| t.as_str()) {
            Some("new_message") => Ok(ServerEvent::NewMessage(serde_json::from_value(payload())?)),
            Some("new_chat") => Ok(ServerEvent::NewChat(serde_json::from_value(payload())?)),
            _ => Ok(ServerEvent::Unknown(value)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::NewMessage(_) => "new_message",
            ServerEvent::NewChat(_) => "new_chat",
            ServerEvent::Unknown(_) => "unknown",
        }
    }
}

/// Frame sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Post `text` into `chat_id`
    NewMessage { chat_id: i64, text: String },
    /// Open a chat with a match
    NewChat { match_id: String },
}

impl ClientCommand {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_decode_new_message() {
        let text = json!({
            "type": "new_message",
            "payload": {
                "id": 5,
                "chat_id": 3,
                "user_id": "u2",
                "text": "hi",
                "created_at": "2024-05-01 12:00:00.000001",
                "updated_at": "2024-05-01 12:00:00.000001"
            }
        })
        .to_string();
        match ServerEvent::decode(&text).unwrap() {
            ServerEvent::NewMessage(message) => {
                assert_eq!(message.chat_id, 3);
                assert_eq!(message.text, "hi");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_new_chat_ignores_orm_noise() {
        let text = r#"{"type":"new_chat","payload":{"_sa_instance_state":"<state>","id":11,"created_at":"2024-05-01 12:00:00","updated_at":"2024-05-01 12:00:00"}}"#;
        let event = ServerEvent::decode(text).unwrap();
        assert_eq!(event.kind(), "new_chat");
    }

    #[test]
    fn test_decode_unknown_type() {
        let event = ServerEvent::decode(r#"{"type":"typing","payload":{}}"#).unwrap();
        assert!(matches!(event, ServerEvent::Unknown(_)));
    }

    #[test]
    fn test_decode_malformed_payload_is_error() {
        assert!(ServerEvent::decode(r#"{"type":"new_message","payload":{"id":"x"}}"#).is_err());
        assert!(ServerEvent::decode("not json").is_err());
    }

    #[test]
    fn test_encode_commands() {
        let cmd = ClientCommand::NewMessage {
            chat_id: 3,
            text: "hello".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&cmd.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "new_message", "payload": {"chat_id": 3, "text": "hello"}}));

        let cmd = ClientCommand::NewChat {
            match_id: "u9".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&cmd.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "new_chat", "payload": {"match_id": "u9"}}));
    }
}
