use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::Stream;
use parlor_core::{Broker, BrokerResult, ConnectionState, RoomEvent, Subscription};
use tokio::sync::mpsc;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

type Channels = Arc<DashMap<String, Vec<Subscriber>>>;

struct Subscriber {
    id: u64,
    sender: mpsc::UnboundedSender<RoomEvent>,
}

/// A [Broker] fanning events out entirely in process memory.
/// One logical pub/sub domain, which is all the chat core assumes.
#[derive(Default)]
pub struct MemoryBroker {
    channels: Channels,
}

/// A live subscription to one of a [MemoryBroker]'s channels
pub struct MemorySubscription {
    id: u64,
    topic: String,
    channels: Channels,
    receiver: mpsc::UnboundedReceiver<RoomEvent>,
    detached: bool,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many subscriptions a topic's channel currently has
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.channels.get(topic).map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    type Subscription = MemorySubscription;

    async fn subscribe(&self, topic: &str) -> BrokerResult<Self::Subscription> {
        let id = NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        // In-process channels are live the moment they exist
        sender
            .send(RoomEvent::Connection {
                state: ConnectionState::Connected,
            })
            .expect("receiver is held by this subscription");

        self.channels
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, sender });

        Ok(MemorySubscription {
            id,
            topic: topic.to_string(),
            channels: self.channels.clone(),
            receiver,
            detached: false,
        })
    }

    async fn publish(&self, topic: &str, event: RoomEvent) -> BrokerResult<()> {
        if let Some(mut subscribers) = self.channels.get_mut(topic) {
            // A failed send just means the subscriber is gone
            subscribers.retain(|s| s.sender.send(event.clone()).is_ok());
        }

        Ok(())
    }
}

impl Subscription for MemorySubscription {
    fn unsubscribe(&mut self) {
        if self.detached {
            return;
        }

        self.detached = true;

        if let Some(mut subscribers) = self.channels.get_mut(&self.topic) {
            subscribers.retain(|s| s.id != self.id);
        }

        self.receiver.close();
    }
}

impl Stream for MemorySubscription {
    type Item = RoomEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.unsubscribe()
    }
}

#[cfg(test)]
mod test {
    use futures_util::StreamExt;
    use parlor_core::{Message, SessionIdentity};

    use super::*;

    fn message_event(text: &str) -> RoomEvent {
        RoomEvent::Message {
            message: Message::new(&SessionIdentity::generate(), text),
        }
    }

    fn text_of(event: RoomEvent) -> String {
        match event {
            RoomEvent::Message { message } => message.text,
            other => panic!("expected a message event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_subscription_starts_connected() {
        let broker = MemoryBroker::new();
        let mut subscription = broker.subscribe("room").await.unwrap();

        let first = subscription.next().await.unwrap();

        assert!(matches!(
            first,
            RoomEvent::Connection {
                state: ConnectionState::Connected
            }
        ));
    }

    #[tokio::test]
    async fn test_fans_out_to_all_current_subscribers() {
        let broker = MemoryBroker::new();

        let mut first = broker.subscribe("room").await.unwrap();
        let mut second = broker.subscribe("room").await.unwrap();

        // Skip the connection events
        first.next().await.unwrap();
        second.next().await.unwrap();

        broker.publish("room", message_event("hi")).await.unwrap();

        assert_eq!(text_of(first.next().await.unwrap()), "hi");
        assert_eq!(text_of(second.next().await.unwrap()), "hi");
    }

    #[tokio::test]
    async fn test_late_subscribers_miss_earlier_events() {
        let broker = MemoryBroker::new();

        broker.publish("room", message_event("early")).await.unwrap();

        let mut late = broker.subscribe("room").await.unwrap();
        late.next().await.unwrap();

        broker.publish("room", message_event("late")).await.unwrap();

        assert_eq!(text_of(late.next().await.unwrap()), "late");
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent_and_ends_the_stream() {
        let broker = MemoryBroker::new();

        let mut subscription = broker.subscribe("room").await.unwrap();
        subscription.next().await.unwrap();

        subscription.unsubscribe();
        subscription.unsubscribe();

        assert_eq!(broker.subscriber_count("room"), 0);
        assert!(subscription.next().await.is_none());

        // Publishing to a room with no subscribers is fine
        broker.publish("room", message_event("void")).await.unwrap();
    }

    #[tokio::test]
    async fn test_dropping_a_subscription_detaches_it() {
        let broker = MemoryBroker::new();

        let subscription = broker.subscribe("room").await.unwrap();
        assert_eq!(broker.subscriber_count("room"), 1);

        drop(subscription);
        assert_eq!(broker.subscriber_count("room"), 0);
    }
}
