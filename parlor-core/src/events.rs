use serde::{Deserialize, Serialize};

use crate::Message;

/// The state of a session's underlying channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Events delivered to the subscribers of a room's channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "kebab-case")]
pub enum RoomEvent {
    /// A message was published to the room
    Message { message: Message },
    /// The number of present participants changed
    Presence { count: usize },
    /// The state of the channel itself changed
    Connection { state: ConnectionState },
}
