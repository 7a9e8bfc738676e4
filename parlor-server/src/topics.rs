use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json,
};

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{CreatedTopicSchema, NewTopicSchema},
    Router,
};

async fn list_topics(State(context): State<ServerContext>) -> ServerResult<Json<Vec<String>>> {
    let topics = context.chat.list_topics().await?;

    Ok(Json(topics))
}

async fn create_topic(
    State(context): State<ServerContext>,
    Json(body): Json<NewTopicSchema>,
) -> ServerResult<(StatusCode, Json<CreatedTopicSchema>)> {
    let topic = context.chat.create_topic(&body.name).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedTopicSchema {
            name: topic.to_string(),
        }),
    ))
}

async fn delete_topic(
    State(context): State<ServerContext>,
    Path(name): Path<String>,
) -> ServerResult<()> {
    let topic = context.chat.topic(&name).await?;

    context.chat.delete_topic(&topic).await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_topics))
        .route("/", post(create_topic))
        .route("/:name", delete(delete_topic))
}
