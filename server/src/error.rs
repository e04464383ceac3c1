// error.rs
use thiserror::Error;

/// Rejected submission. The display strings are the messages returned to
/// the game client verbatim.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Level, image name, and positive moves are required.")]
    MissingFields,
    #[error("Invalid level provided.")]
    InvalidLevel,
}

/// Failure talking to (or encoding for) the backing store.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to encode score document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("store worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("invalid store url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type ScoreResult<T> = Result<T, ScoreError>;
