use thiserror::Error;

use crate::executor::FetchFailure;

#[derive(Error, Debug)]
pub enum NexaError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid schedule {spec:?}: {reason}")]
    InvalidSchedule { spec: String, reason: String },

    #[error(transparent)]
    Fetch(Box<FetchFailure>),

    #[error("{0}")]
    Other(String),
}

impl From<FetchFailure> for NexaError {
    fn from(failure: FetchFailure) -> Self {
        NexaError::Fetch(Box::new(failure))
    }
}

pub type Result<T> = std::result::Result<T, NexaError>;
