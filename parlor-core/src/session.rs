use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use log::{info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};

use crate::{
    broker::{Broker, BrokerError, Subscription},
    ChatContext, ConnectionState, Message, RoomEvent, SessionIdentity, Storage, StoreError,
    TopicName,
};

/// The lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Initializing,
    Joining,
    Connected,
    Reconnecting,
    Disconnecting,
    Terminated,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("room {0} was not found")]
    RoomNotFound(String),
    #[error("message text cannot be empty")]
    EmptyMessage,
    #[error("session is not connected")]
    NotConnected,
    #[error("session has been terminated")]
    Terminated,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Events surfaced to whoever is driving the session, usually a
/// connected client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "kebab-case")]
pub enum SessionEvent {
    /// A message from another participant was appended to the view
    MessageReceived { message: Message },
    /// The room's participant count changed
    PresenceChanged { count: usize },
    /// The channel's connection state changed
    ConnectionChanged { state: ConnectionState },
    /// A sent message could not be fully delivered or persisted.
    /// It stays in the local view, the caller decides whether to retry.
    SendFailed { message_id: String },
}

/// One client's participation in a room.
///
/// The session composes the store, the presence tracker, and the broker:
/// it seeds its view from history, registers presence once the channel
/// confirms it is live, fans sent messages out over two independent
/// paths (durable store, live broadcast), and filters its own echo.
pub struct RoomSession<S, B>
where
    B: Broker,
{
    context: ChatContext<S, B>,
    topic: TopicName,
    identity: SessionIdentity,

    state: Mutex<SessionState>,
    /// The messages this session displays, oldest first
    view: Mutex<Vec<Message>>,
    /// The last participant count observed for the room
    count: AtomicUsize,
    /// Set exactly once, when teardown starts
    left: AtomicBool,

    events: mpsc::UnboundedSender<SessionEvent>,
    shutdown: Notify,
}

/// Owner of a [RoomSession]. Dropping it tears the session down,
/// the same way navigating away from a room does.
pub struct SessionHandle<S, B>
where
    S: Storage,
    B: Broker,
{
    session: Arc<RoomSession<S, B>>,
}

/// The stream of [SessionEvent]s produced by a session
pub struct SessionEvents {
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<S, B> RoomSession<S, B>
where
    S: Storage,
    B: Broker,
{
    /// Enters a room: seeds the view from history, subscribes to the
    /// channel, and registers presence once the subscription is live.
    pub async fn connect(
        context: &ChatContext<S, B>,
        topic: TopicName,
    ) -> Result<(SessionHandle<S, B>, SessionEvents), SessionError> {
        // Initializing: generate an identity and seed the view from history
        let identity = SessionIdentity::generate();
        let initial_view = context.store.recent_messages(&topic).await?;

        // Joining: subscribe, presence follows once the channel confirms
        let subscription = context.broker.subscribe(topic.as_str()).await?;
        let (sender, receiver) = mpsc::unbounded_channel();

        let session = Arc::new(Self {
            context: context.clone(),
            topic,
            identity,
            state: Mutex::new(SessionState::Joining),
            view: Mutex::new(initial_view),
            count: AtomicUsize::new(0),
            left: AtomicBool::new(false),
            events: sender,
            shutdown: Notify::new(),
        });

        tokio::spawn(Self::run(session.clone(), subscription));

        info!(
            "Session {} joining room {}",
            session.identity.user_id, session.topic
        );

        Ok((
            SessionHandle { session },
            SessionEvents { receiver },
        ))
    }

    /// Sends a message to the room.
    ///
    /// The message is appended to the local view immediately. Durable
    /// storage and live broadcast are then two independent paths: either
    /// failing surfaces a [SessionEvent::SendFailed], but never retracts
    /// the optimistic entry or blocks the other path.
    pub async fn send(&self, text: &str) -> Result<Message, SessionError> {
        if self.has_left() {
            return Err(SessionError::Terminated);
        }

        let text = text.trim();

        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        if *self.state.lock() != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }

        let message = Message::new(&self.identity, text);
        self.view.lock().push(message.clone());

        let mut failed = false;

        if let Err(e) = self.context.store.append_message(&self.topic, &message).await {
            warn!("Failed to persist message {}: {}", message.id, e);
            failed = true;
        }

        let event = RoomEvent::Message {
            message: message.clone(),
        };

        if let Err(e) = self.context.broker.publish(self.topic.as_str(), event).await {
            warn!("Failed to broadcast message {}: {}", message.id, e);
            failed = true;
        }

        if failed {
            self.emit(SessionEvent::SendFailed {
                message_id: message.id.clone(),
            });
        }

        Ok(message)
    }

    /// Tears the session down: deregisters presence, then unsubscribes.
    /// Runs exactly once, no matter how many times or from where it is
    /// triggered.
    pub async fn leave(&self) {
        if self.left.swap(true, Ordering::SeqCst) {
            return;
        }

        // Deregistering shares the state lock with the join confirmation
        // handler, so neither can interleave with the other
        let count = {
            let mut state = self.state.lock();
            *state = SessionState::Disconnecting;

            self.context
                .presence
                .leave(self.topic.as_str(), &self.identity.user_id)
        };

        let event = RoomEvent::Presence { count };

        if let Err(e) = self.context.broker.publish(self.topic.as_str(), event).await {
            warn!("Failed to broadcast presence after leave: {}", e);
        }

        self.shutdown.notify_one();
        *self.state.lock() = SessionState::Terminated;

        info!(
            "Session {} left room {}",
            self.identity.user_id, self.topic
        );
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn topic(&self) -> &TopicName {
        &self.topic
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// The session's current view of the room, oldest message first
    pub fn messages(&self) -> Vec<Message> {
        self.view.lock().clone()
    }

    pub fn presence_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn has_left(&self) -> bool {
        self.left.load(Ordering::SeqCst)
    }

    /// Drives the session until it leaves or the channel goes away
    async fn run(session: Arc<Self>, mut subscription: B::Subscription) {
        let mut heartbeat = tokio::time::interval(session.context.config.heartbeat_interval());

        loop {
            tokio::select! {
                _ = session.shutdown.notified() => {
                    subscription.unsubscribe();
                    break;
                }
                _ = heartbeat.tick() => {
                    if !session.has_left() && session.state() == SessionState::Connected {
                        session
                            .context
                            .presence
                            .heartbeat(session.topic.as_str(), &session.identity.user_id);
                    }
                }
                event = subscription.next() => match event {
                    Some(event) => session.handle_event(event).await,
                    None => {
                        // The channel collapsed underneath us
                        if !session.has_left() {
                            *session.state.lock() = SessionState::Reconnecting;
                            session.emit(SessionEvent::ConnectionChanged {
                                state: ConnectionState::Disconnected,
                            });
                        }

                        break;
                    }
                }
            }
        }
    }

    async fn handle_event(&self, event: RoomEvent) {
        match event {
            RoomEvent::Connection { state } => self.handle_connection(state).await,
            RoomEvent::Message { message } => {
                // The sender's own view was already updated at publish time
                if message.user_id == self.identity.user_id {
                    return;
                }

                self.view.lock().push(message.clone());
                self.emit(SessionEvent::MessageReceived { message });
            }
            RoomEvent::Presence { count } => {
                if self.count.swap(count, Ordering::SeqCst) != count {
                    self.emit(SessionEvent::PresenceChanged { count });
                }
            }
        }
    }

    async fn handle_connection(&self, state: ConnectionState) {
        // A leave that raced ahead of us wins, never re-register
        if self.has_left() {
            return;
        }

        match state {
            ConnectionState::Connected => {
                // The channel is confirmed live, presence can be registered.
                // This also re-runs after a reconnect, join refreshes the entry.
                // The left re-check and the join hold the state lock that
                // [Self::leave] takes, so a finished leave can never be
                // followed by its own session's join.
                let count = {
                    let mut session_state = self.state.lock();

                    if self.has_left() {
                        return;
                    }

                    let count = self
                        .context
                        .presence
                        .join(self.topic.as_str(), &self.identity.user_id);

                    *session_state = SessionState::Connected;

                    count
                };

                self.emit(SessionEvent::ConnectionChanged { state });

                if self.count.swap(count, Ordering::SeqCst) != count {
                    self.emit(SessionEvent::PresenceChanged { count });
                }

                let event = RoomEvent::Presence { count };

                if let Err(e) = self.context.broker.publish(self.topic.as_str(), event).await {
                    warn!("Failed to broadcast presence after join: {}", e);
                }
            }
            ConnectionState::Disconnected => {
                *self.state.lock() = SessionState::Reconnecting;
                self.emit(SessionEvent::ConnectionChanged { state });
            }
            ConnectionState::Connecting => {
                self.emit(SessionEvent::ConnectionChanged { state });
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        // The receiver being gone just means nobody is listening anymore
        let _ = self.events.send(event);
    }
}

impl<S, B> SessionHandle<S, B>
where
    S: Storage,
    B: Broker,
{
    pub fn session(&self) -> &Arc<RoomSession<S, B>> {
        &self.session
    }
}

impl<S, B> std::ops::Deref for SessionHandle<S, B>
where
    S: Storage,
    B: Broker,
{
    type Target = RoomSession<S, B>;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl<S, B> Drop for SessionHandle<S, B>
where
    S: Storage,
    B: Broker,
{
    fn drop(&mut self) {
        if !self.session.has_left() {
            let session = self.session.clone();
            tokio::spawn(async move { session.leave().await });
        }
    }
}

impl Stream for SessionEvents {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
