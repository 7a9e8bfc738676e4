mod broker;
mod config;
mod events;
mod identity;
mod message;
mod presence;
mod session;
mod store;
mod topic;
mod util;

use std::sync::Arc;

pub use broker::*;
pub use config::*;
pub use events::*;
pub use identity::*;
pub use message::*;
pub use presence::*;
pub use session::*;
pub use store::*;
pub use topic::*;
pub use util::random_string;

/// The parlor chat system, facilitating bounded room history, live
/// fan-out, and presence tracking. Generic over the key-value store
/// and the broadcast transport that back it.
pub struct Chat<S, B> {
    context: ChatContext<S, B>,
}

/// A type passed to sessions and background tasks, to access the
/// store, the broker, and the presence tracker.
pub struct ChatContext<S, B> {
    pub config: Config,

    pub store: Arc<RoomStore<S>>,
    pub broker: Arc<B>,
    pub presence: Arc<PresenceTracker>,
}

impl<S, B> Chat<S, B>
where
    S: Storage,
    B: Broker,
{
    pub fn new(config: Config, storage: S, broker: B) -> Self {
        let storage = Arc::new(storage);
        let store = Arc::new(RoomStore::new(&storage, &config));
        let presence = Arc::new(PresenceTracker::new(config.presence_ttl));

        let context = ChatContext {
            config,
            store,
            broker: Arc::new(broker),
            presence,
        };

        Self { context }
    }

    pub fn context(&self) -> ChatContext<S, B> {
        self.context.clone()
    }

    /// Validates and registers a topic, so clients can join it.
    /// Registering an existing topic is a no-op.
    pub async fn create_topic(&self, name: &str) -> Result<TopicName, StoreError> {
        self.context.store.register_topic(name).await
    }

    pub async fn list_topics(&self) -> Result<Vec<String>, StoreError> {
        self.context.store.list_topics().await
    }

    /// Removes a topic and its history
    pub async fn delete_topic(&self, topic: &TopicName) -> Result<(), StoreError> {
        self.context.store.delete_topic(topic).await
    }

    /// Looks up a registered topic by name
    pub async fn topic(&self, name: &str) -> Result<TopicName, SessionError> {
        let topic =
            TopicName::new(name).map_err(|_| SessionError::RoomNotFound(name.to_string()))?;

        let exists = self.context.store.topic_exists(&topic).await?;

        if !exists {
            return Err(SessionError::RoomNotFound(name.to_string()));
        }

        Ok(topic)
    }

    /// Starts a session in a registered room
    pub async fn join(
        &self,
        name: &str,
    ) -> Result<(SessionHandle<S, B>, SessionEvents), SessionError> {
        let topic = self.topic(name).await?;

        RoomSession::connect(&self.context, topic).await
    }

    /// Fetches the retained history of a registered room
    pub async fn recent_messages(&self, name: &str) -> Result<Vec<Message>, SessionError> {
        let topic = self.topic(name).await?;
        let messages = self.context.store.recent_messages(&topic).await?;

        Ok(messages)
    }
}

impl<S, B> Clone for ChatContext<S, B> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
            broker: self.broker.clone(),
            presence: self.presence.clone(),
        }
    }
}
