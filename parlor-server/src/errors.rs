use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parlor_core::{SessionError, StoreError, TopicError};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Validation(#[from] TopicError),
    #[error("room {0} was not found")]
    RoomNotFound(String),
    #[error("session {0} was not found")]
    SessionNotFound(String),
    #[error("message text cannot be empty")]
    EmptyMessage,
    #[error("session is not connected")]
    NotConnected,
    #[error("store is unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RoomNotFound(_) => StatusCode::NOT_FOUND,
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::EmptyMessage => StatusCode::BAD_REQUEST,
            Self::NotConnected => StatusCode::CONFLICT,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<StoreError> for ServerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::InvalidName(e) => Self::Validation(e),
            StoreError::Storage(e) => Self::StoreUnavailable(e.to_string()),
        }
    }
}

impl From<SessionError> for ServerError {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::RoomNotFound(name) => Self::RoomNotFound(name),
            SessionError::EmptyMessage => Self::EmptyMessage,
            SessionError::NotConnected => Self::NotConnected,
            SessionError::Terminated => Self::NotConnected,
            SessionError::Store(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}
