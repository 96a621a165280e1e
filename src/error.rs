
use thiserror::Error;

use crate::tweet::TweetId;

#[derive(Error, Debug)]
pub enum TweeterError {
    #[error("user is required")]
    EmptyAuthor,
    #[error("text in tweet is required")]
    EmptyBody,
    #[error("text has over 140 characters ({length})")]
    BodyTooLong { length: usize },
    #[error("no tweet with id {0}")]
    NotFound(TweetId),
    #[error("no tweets have been published")]
    EmptyStore,
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Data corruption: {message}")]
    DataCorruption { message: String },
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TweeterError {
    /// Validation failures are the caller's fault and leave the store untouched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyAuthor | Self::EmptyBody | Self::BodyTooLong { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TweeterError>;

// Helper conversions
impl From<rusqlite::Error> for TweeterError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}

impl From<config::ConfigError> for TweeterError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
