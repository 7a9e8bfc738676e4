use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use thiserror::Error;

use crate::{Config, Message, TopicError, TopicName};

/// The well-known key holding the set of registered topics
const TOPIC_SET_KEY: &str = "existing-topics";
/// The well-known key counting history fetches across all rooms
const SERVED_REQUESTS_KEY: &str = "served-requests";

pub type StorageResult<T> = Result<T, StorageError>;

/// An error from the underlying key-value store.
/// Always transient from the core's point of view, the caller decides whether to retry.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be reached or failed mid-operation
    #[error(transparent)]
    Unavailable(Box<dyn std::error::Error + Send + Sync>),
}

/// An error from a [RoomStore] operation
#[derive(Debug, Error)]
pub enum StoreError {
    /// The topic name did not pass validation
    #[error(transparent)]
    InvalidName(#[from] TopicError),
    /// The underlying store failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Represents a key-value store with the list, set, and counter
/// primitives the chat core needs. What actually backs it is irrelevant here.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Pushes a value to the front of a list and trims the tail to `limit`, as one unit.
    /// After this returns Ok, the list holds at most `limit` entries.
    async fn list_push_trim(&self, key: &str, value: String, limit: usize) -> StorageResult<()>;

    /// Returns up to `limit` entries from the front of a list, in storage order
    async fn list_range(&self, key: &str, limit: usize) -> StorageResult<Vec<String>>;

    /// Adds a member to a set. Adding an existing member is a no-op.
    async fn set_add(&self, key: &str, member: &str) -> StorageResult<()>;

    /// Removes a member from a set
    async fn set_remove(&self, key: &str, member: &str) -> StorageResult<()>;

    async fn set_contains(&self, key: &str, member: &str) -> StorageResult<bool>;

    async fn set_members(&self, key: &str) -> StorageResult<Vec<String>>;

    /// Increments an integer counter, returning the new value
    async fn counter_incr(&self, key: &str) -> StorageResult<i64>;

    /// Reads an integer counter, zero if it was never incremented
    async fn counter_get(&self, key: &str) -> StorageResult<i64>;

    /// Deletes a key of any kind
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// The durable side of a room: a bounded message log per topic,
/// and the registry of topics that exist.
pub struct RoomStore<S> {
    storage: Arc<S>,
    history_limit: usize,
}

impl<S> RoomStore<S>
where
    S: Storage,
{
    pub fn new(storage: &Arc<S>, config: &Config) -> Self {
        Self {
            storage: storage.clone(),
            history_limit: config.history_limit,
        }
    }

    /// Persists a message to the room's history.
    /// The push and the trim are a single unit, so the bound always holds afterwards.
    pub async fn append_message(&self, topic: &TopicName, message: &Message) -> Result<(), StoreError> {
        let raw = serde_json::to_string(message).expect("message serializes");

        self.storage
            .list_push_trim(&history_key(topic), raw, self.history_limit)
            .await?;

        Ok(())
    }

    /// Returns the retained messages for a room, ascending by creation time.
    /// Storage order is newest-first, so this is where the contract is enforced.
    pub async fn recent_messages(&self, topic: &TopicName) -> Result<Vec<Message>, StoreError> {
        let raw_messages = self
            .storage
            .list_range(&history_key(topic), self.history_limit)
            .await?;

        let mut messages: Vec<_> = raw_messages
            .iter()
            .filter_map(|raw| {
                let parsed = Message::from_stored(raw);

                if parsed.is_none() {
                    warn!("Quarantined a malformed entry in room {}", topic);
                }

                parsed
            })
            .collect();

        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        if let Err(e) = self.storage.counter_incr(SERVED_REQUESTS_KEY).await {
            warn!("Failed to bump served requests: {}", e);
        }

        Ok(messages)
    }

    /// Validates and registers a topic. Registering an existing topic is a no-op.
    pub async fn register_topic(&self, name: &str) -> Result<TopicName, StoreError> {
        let topic = TopicName::new(name)?;

        self.storage.set_add(TOPIC_SET_KEY, topic.as_str()).await?;

        Ok(topic)
    }

    pub async fn topic_exists(&self, topic: &TopicName) -> Result<bool, StoreError> {
        let exists = self
            .storage
            .set_contains(TOPIC_SET_KEY, topic.as_str())
            .await?;

        Ok(exists)
    }

    pub async fn list_topics(&self) -> Result<Vec<String>, StoreError> {
        let topics = self.storage.set_members(TOPIC_SET_KEY).await?;

        Ok(topics)
    }

    /// Removes a topic and discards its history.
    /// Best-effort with respect to concurrent appends.
    pub async fn delete_topic(&self, topic: &TopicName) -> Result<(), StoreError> {
        self.storage
            .set_remove(TOPIC_SET_KEY, topic.as_str())
            .await?;

        self.storage.delete(&history_key(topic)).await?;

        Ok(())
    }

    /// How many history fetches this deployment has served
    pub async fn served_requests(&self) -> Result<i64, StoreError> {
        let count = self.storage.counter_get(SERVED_REQUESTS_KEY).await?;

        Ok(count)
    }
}

fn history_key(topic: &TopicName) -> String {
    format!("messages:{}", topic)
}
