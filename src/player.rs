//! Player entity
//!
//! A player belongs to exactly one session and survives connection churn:
//! the connection reference is a weak back-reference owned by the session's
//! connection table, cleared on disconnect without touching score or roster
//! membership.

use crate::types::{ConnectionId, PlayerId};

/// A registered player within a session
#[derive(Debug)]
pub struct Player {
    /// Server-issued stable identifier
    pub id: PlayerId,
    /// Session-scoped unique name (case-sensitive)
    pub name: String,
    /// Current score; signed and unbounded
    pub score: i64,
    /// First registrant of a session is the host
    pub is_host: bool,
    /// Registration ordinal, used as the documented winner tie-break
    pub ordinal: usize,
    /// Current connection, if any (weak back-reference)
    pub connection: Option<ConnectionId>,
    /// Free-text board-topic preferences, forwarded to the content provider
    pub preferences: String,
}

impl Player {
    /// Create a new player with a fresh id and zero score
    pub fn new(name: String, ordinal: usize, is_host: bool, connection: ConnectionId) -> Self {
        Self {
            id: PlayerId::new(),
            name,
            score: 0,
            is_host,
            ordinal,
            connection: Some(connection),
            preferences: String::new(),
        }
    }

    /// Whether the player currently has a live connection
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Bind a (possibly superseding) connection to this player
    pub fn bind(&mut self, connection: ConnectionId) -> Option<ConnectionId> {
        self.connection.replace(connection)
    }

    /// Clear the connection back-reference, keeping all game state
    pub fn unbind(&mut self) {
        self.connection = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_creation() {
        let conn = ConnectionId::new();
        let player = Player::new("Alice".to_string(), 0, true, conn);

        assert_eq!(player.score, 0);
        assert!(player.is_host);
        assert!(player.is_connected());
        assert_eq!(player.connection, Some(conn));
    }

    #[test]
    fn test_rebind_supersedes() {
        let first = ConnectionId::new();
        let second = ConnectionId::new();
        let mut player = Player::new("Bob".to_string(), 1, false, first);

        let prior = player.bind(second);
        assert_eq!(prior, Some(first));
        assert_eq!(player.connection, Some(second));
    }

    #[test]
    fn test_unbind_keeps_state() {
        let mut player = Player::new("Carol".to_string(), 2, false, ConnectionId::new());
        player.score = -400;
        player.unbind();

        assert!(!player.is_connected());
        assert_eq!(player.score, -400);
        assert_eq!(player.name, "Carol");
    }
}
