//! Error types for failure handling across the chat engine
//!
//! The taxonomy mirrors how failures propagate: authentication problems feed
//! the bounded retry branch, transport problems terminate an attempt, and a
//! superseded attempt short-circuits without touching the conversation.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ChatError {
    #[error("Host did not supply credentials within the timeout window")]
    AuthTimeout,
    #[error("Request was rejected with 401 Unauthorized")]
    Unauthorized,
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Host bridge failure: {0}")]
    Bridge(String),
    #[error("Submission superseded by a newer one")]
    Cancelled,
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}
