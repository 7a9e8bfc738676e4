use std::sync::Arc;

use dashmap::DashMap;
use parlor_core::RoomSession;
use parlor_impls::{MemoryBroker, MemoryChat, MemoryStorage};

/// The session type this server hosts
pub type ServerSession = RoomSession<MemoryStorage, MemoryBroker>;

/// Live sessions by their ephemeral user id, so message sends can be
/// routed to the session that owns the event stream
pub type SessionRegistry = DashMap<String, Arc<ServerSession>>;

#[derive(Clone)]
pub struct ServerContext {
    pub chat: Arc<MemoryChat>,
    pub sessions: Arc<SessionRegistry>,
}

impl ServerContext {
    pub fn new(chat: MemoryChat) -> Self {
        Self {
            chat: Arc::new(chat),
            sessions: Default::default(),
        }
    }
}
