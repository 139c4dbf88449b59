use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session {0} has no recorded actions")]
    EmptySession(String),

    #[error(transparent)]
    Store(SessionError),
}

impl From<SessionError> for ReplayError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => Self::SessionNotFound(id),
            other => Self::Store(other),
        }
    }
}
