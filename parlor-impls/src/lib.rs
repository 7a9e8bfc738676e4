mod broker;
mod storage;

pub use broker::*;
pub use storage::*;

use parlor_core::{Chat, Config};

/// A [Chat] backed entirely by process memory
pub type MemoryChat = Chat<MemoryStorage, MemoryBroker>;

/// Builds a chat system with in-memory storage and fan-out
pub fn memory_chat(config: Config) -> MemoryChat {
    Chat::new(config, MemoryStorage::new(), MemoryBroker::new())
}
