use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json,
};
use futures_util::Stream;
use parlor_core::{Message, SessionEvents, SessionHandle};
use parlor_impls::{MemoryBroker, MemoryStorage};

use crate::{
    context::{ServerContext, SessionRegistry},
    errors::{ServerError, ServerResult},
    schemas::{SendMessageSchema, StreamEvent},
    Router,
};

async fn recent_messages(
    State(context): State<ServerContext>,
    Path(topic): Path<String>,
) -> ServerResult<Json<Vec<Message>>> {
    let messages = context.chat.recent_messages(&topic).await?;

    Ok(Json(messages))
}

async fn send_message(
    State(context): State<ServerContext>,
    Path(topic): Path<String>,
    Json(body): Json<SendMessageSchema>,
) -> ServerResult<Json<Message>> {
    let session = context
        .sessions
        .get(&body.session_id)
        .map(|s| s.clone())
        .ok_or_else(|| ServerError::SessionNotFound(body.session_id.clone()))?;

    // A session only ever speaks in the room it joined
    if session.topic().as_str() != topic {
        return Err(ServerError::SessionNotFound(body.session_id));
    }

    let message = session.send(&body.text).await?;

    Ok(Json(message))
}

/// Opens a session in the room and streams its events to the client.
/// The first event is a snapshot with the session's identity and the
/// seeded history; closing the stream tears the session down.
async fn room_events(
    State(context): State<ServerContext>,
    Path(topic): Path<String>,
) -> ServerResult<Sse<RoomStream>> {
    let (handle, events) = context.chat.join(&topic).await?;

    let session = handle.session().clone();
    let user_id = session.identity().user_id.clone();

    context.sessions.insert(user_id.clone(), session.clone());

    let snapshot = StreamEvent::Snapshot {
        identity: session.identity(),
        messages: session.messages(),
        count: session.presence_count(),
    };
    let snapshot = serde_json::to_string(&snapshot).expect("snapshot serializes");

    let stream = RoomStream {
        handle,
        events,
        snapshot: Some(snapshot),
        registry: context.sessions.clone(),
        user_id,
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// The event stream backing one client's room connection.
/// Holds the session handle, so the session leaves when the client goes.
struct RoomStream {
    handle: SessionHandle<MemoryStorage, MemoryBroker>,
    events: SessionEvents,
    snapshot: Option<String>,
    registry: Arc<SessionRegistry>,
    user_id: String,
}

impl Stream for RoomStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(snapshot) = this.snapshot.take() {
            return Poll::Ready(Some(Ok(Event::default().data(snapshot))));
        }

        match Pin::new(&mut this.events).poll_next(cx) {
            Poll::Ready(Some(event)) => {
                let data = serde_json::to_string(&event).expect("serializes properly");

                Poll::Ready(Some(Ok(Event::default().data(data))))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RoomStream {
    fn drop(&mut self) {
        // The handle takes care of leaving, this only unregisters routing
        self.registry.remove(&self.user_id);
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/:topic/messages", get(recent_messages))
        .route("/:topic/messages", post(send_message))
        .route("/:topic/events", get(room_events))
}
