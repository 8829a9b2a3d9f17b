//! Error types for the trivia server
//!
//! Defines application-level errors with thiserror. Fatal variants end the
//! connection; business variants are converted to client error replies.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send error message to client).
#[derive(Debug, Error)]
pub enum GameError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No session exists with the given code (connection closed with 4004)
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Operation not legal in the session's current state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Sender lacks the role the operation requires
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Player name already taken within the session
    #[error("Name already taken: {0}")]
    DuplicateIdentity(String),

    /// Sender has not registered as a player yet
    #[error("Player registration required")]
    NotRegistered,

    /// Connection is not attached to any session
    #[error("Not in a session")]
    NotInSession,
}

impl GameError {
    /// Shorthand for an [`GameError::InvalidTransition`]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    /// Shorthand for an [`GameError::Unauthorized`]
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
}
