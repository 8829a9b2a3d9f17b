//! Basic type definitions for the trivia server
//!
//! Provides newtype wrappers for type safety:
//! - `PlayerId`: UUID-based unique player identifier
//! - `ConnectionId`: UUID-based unique connection identifier
//! - `SessionCode`: 6-character alphanumeric session code
//! - `Generation`: monotonic tag guarding stale timer/verdict delivery

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique player identifier (newtype pattern)
///
/// Server-issued; stable across reconnects of the same player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Create a new random player ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique network connection identifier
///
/// A player may be bound to many connection ids over their lifetime
/// (reconnect churn), but at most one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session code (6-character uppercase alphanumeric)
///
/// Used to identify and join game sessions.
/// Generated randomly or parsed from user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionCode(pub String);

impl SessionCode {
    /// Generate a new random 6-character session code
    pub fn generate() -> Self {
        use rand::Rng;
        let code: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(6)
            .map(char::from)
            .collect::<String>()
            .to_uppercase();
        Self(code)
    }

    /// Create a SessionCode from a string (converts to uppercase)
    pub fn from_string(code: String) -> Self {
        Self(code.to_uppercase())
    }
}

impl std::fmt::Display for SessionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic generation counter for an open question's deferred events.
///
/// Every time a timer is (re)armed the open question takes a fresh
/// generation; a timer firing or judge verdict carrying an older value is
/// stale and must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    /// Advance and return the new generation
    pub fn bump(&mut self) -> Generation {
        self.0 += 1;
        *self
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}
