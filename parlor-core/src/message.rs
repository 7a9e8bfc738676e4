use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{identity::SessionIdentity, util::random_string};

/// A chat message as it is displayed and persisted.
/// Immutable once created, identified by a sender-generated id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub username: String,
    pub avatar: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a new message with a fresh id and timestamp
    pub fn new(identity: &SessionIdentity, text: &str) -> Self {
        Self {
            id: format!("msg-{}", random_string(7)),
            text: text.to_string(),
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            avatar: identity.avatar.clone(),
            created_at: Utc::now(),
        }
    }

    /// Parses a persisted entry, rejecting anything that doesn't fit the schema.
    /// Entries from the store are untrusted, a malformed one must never reach subscribers.
    pub fn from_stored(raw: &str) -> Option<Self> {
        let message: Message = serde_json::from_str(raw).ok()?;

        if message.id.is_empty() || message.user_id.is_empty() {
            return None;
        }

        Some(message)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn identity() -> SessionIdentity {
        SessionIdentity::generate()
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let message = Message::new(&identity(), "hi");

        let raw = serde_json::to_string(&message).unwrap();
        let restored = Message::from_stored(&raw).expect("message parses back");

        assert_eq!(message, restored);
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let message = Message::new(&identity(), "hi");
        let raw = serde_json::to_string(&message).unwrap();

        assert!(raw.contains("\"userId\""));
        assert!(raw.contains("\"createdAt\""));
    }

    #[test]
    fn test_malformed_entries_are_quarantined() {
        assert!(Message::from_stored("not json").is_none());
        assert!(Message::from_stored("{\"text\":\"hi\"}").is_none());

        // Right shape, but an empty id is not a usable message
        let raw = r#"{"id":"","text":"hi","userId":"user-a","username":"u","avatar":"","createdAt":"2024-01-01T00:00:00Z"}"#;
        assert!(Message::from_stored(raw).is_none());
    }
}
