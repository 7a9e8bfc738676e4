use parlor_core::{Message, SessionIdentity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct NewTopicSchema {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedTopicSchema {
    /// Where the caller should navigate to
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageSchema {
    /// The id of the session sending, handed out in the stream snapshot
    pub session_id: String,
    pub text: String,
}

/// The first event on a room's stream: who the session is and what the
/// room looked like at join time
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "kebab-case")]
pub enum StreamEvent<'a> {
    Snapshot {
        identity: &'a SessionIdentity,
        messages: Vec<Message>,
        count: usize,
    },
}
