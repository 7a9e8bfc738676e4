use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

use crate::RoomEvent;

pub type BrokerResult<T> = Result<T, BrokerError>;

/// An error from the publish/subscribe transport
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The transport could not be reached
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send + Sync>),
    /// The channel for a topic is gone
    #[error("channel for topic {0} is closed")]
    ChannelClosed(String),
}

/// Represents a transport that can fan out [RoomEvent]s to every
/// current subscriber of a named channel. Delivery is best-effort:
/// nothing is replayed to late or disconnected subscribers.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    type Subscription: Subscription;

    /// Subscribes to a topic's channel. The subscription yields a
    /// `Connection { state: Connected }` event once it is live.
    async fn subscribe(&self, topic: &str) -> BrokerResult<Self::Subscription>;

    /// Broadcasts an event to all current subscribers of a topic
    async fn publish(&self, topic: &str, event: RoomEvent) -> BrokerResult<()>;
}

/// A live subscription to a room's channel.
/// Dropping it unsubscribes, as does [Subscription::unsubscribe].
pub trait Subscription: Stream<Item = RoomEvent> + Send + Unpin + 'static {
    /// Detaches from the channel. Safe to call more than once.
    fn unsubscribe(&mut self);
}
