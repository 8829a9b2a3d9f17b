//! Wire protocol definitions
//!
//! JSON envelopes of the shape `{ "kind": ..., "payload": {...} }`, modeled
//! as Serde adjacently-tagged enums for type-safe (de)serialization.
//! Payload-less kinds use empty struct variants so they still carry an
//! empty `payload` object on the wire.

use serde::{Deserialize, Serialize};

use crate::board::BoardView;
use crate::error::GameError;
use crate::session::SessionStatus;

/// Client → Server message
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a fresh session and attach to it
    CreateSession {},
    /// Attach to an existing session by code
    JoinSession { code: String },
    /// Register as a player (or reconnect as an existing one)
    RegisterPlayer {
        name: String,
        #[serde(default)]
        preferences: String,
    },
    /// Host requests the lobby -> board-generating transition
    StartGame {},
    /// Controller selects a question by coordinates
    SelectQuestion { category: String, value: i64 },
    /// Contend for the open question's answer window
    Buzz {},
    /// Submit an answer for judging
    SubmitAnswer { text: String },
    /// Submit a wager for an open high-stakes question
    SubmitWager { amount: i64 },
    /// Append to the session chat
    Chat { message: String },
    /// Host requests completed -> lobby restart
    RestartGame {},
}

/// Server → Client message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Session created; the connection is attached
    SessionCreated { code: String },
    /// Attached to an existing session
    SessionJoined { code: String },
    /// Registration (or reconnection) succeeded
    Registered {
        player_id: String,
        name: String,
        is_host: bool,
        reconnected: bool,
    },
    /// Roster update
    PlayerList { players: Vec<PlayerInfo> },
    /// Full authoritative snapshot of the session
    SessionState { state: SessionSnapshot },
    /// Board generation has started
    BoardGenerating {},
    /// A question is open; text present only for views allowed to see it
    QuestionOpened {
        category: String,
        value: i64,
        text: String,
        high_stakes: bool,
    },
    /// The buzzer is live for eligible players
    BuzzerActivated {},
    /// A player won the buzz race
    BuzzerWon { player: String },
    /// The winner's answer window has started
    AnswerTimerStarted { player: String, seconds: u64 },
    /// A judged answer was applied
    AnswerResult {
        player: String,
        correct: bool,
        delta: i64,
        score: i64,
    },
    /// The question resolved; the accepted answer is revealed
    QuestionClosed { correct_answer: String },
    /// Board control moved (or was restored)
    ControlChanged { player: String },
    /// A high-stakes question awaits a wager from the selecting player
    WagerRequired {
        category: String,
        value: i64,
        player: String,
        min: i64,
        max: i64,
    },
    /// The wager is locked; the question is being revealed to the selector
    WagerLocked { player: String, amount: i64 },
    /// Chat relay
    Chat { from: String, message: String },
    /// A player's connection dropped (roster unchanged)
    PlayerDisconnected { player: String },
    /// A player re-bound a live connection
    PlayerReconnected { player: String },
    /// All questions played; final scores and winner
    SessionCompleted {
        scores: Vec<PlayerInfo>,
        winner: String,
    },
    /// Collaborator failure surfaced to the whole session, retryable
    SessionError { message: String, retryable: bool },
    /// Validation error, sent to the offending connection only
    Error { code: ErrorCode, message: String },
}

/// Roster entry as clients see it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub score: i64,
    pub is_host: bool,
    pub connected: bool,
}

/// Open-question projection inside a snapshot
///
/// `text` is withheld for a high-stakes question whose wager is not yet
/// locked, and for every view but the selector's once it is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenQuestionInfo {
    pub category: String,
    pub value: i64,
    pub text: Option<String>,
    pub high_stakes: bool,
    pub buzzer_active: bool,
    pub buzz_owner: Option<String>,
    pub excluded: Vec<String>,
}

/// One bounded chat-log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub from: String,
    pub message: String,
}

/// Full session snapshot, sufficient to reconstruct a client's view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub code: String,
    pub status: SessionStatus,
    pub players: Vec<PlayerInfo>,
    pub board: Option<BoardView>,
    pub open_question: Option<OpenQuestionInfo>,
    pub controller: Option<String>,
    pub chat: Vec<ChatEntry>,
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Non-existent session code
    SessionNotFound,
    /// Operation not legal in the current state
    InvalidTransition,
    /// Sender lacks the required role
    Unauthorized,
    /// Player name already taken in this session
    DuplicateIdentity,
    /// Player registration required first
    NotRegistered,
    /// Connection is not attached to a session
    NotInSession,
    /// Undecodable or malformed message
    InvalidMessage,
}

/// Convert GameError to ServerMessage for client notification
impl From<GameError> for ServerMessage {
    fn from(err: GameError) -> Self {
        let (code, message) = match &err {
            GameError::SessionNotFound(code) => (
                ErrorCode::SessionNotFound,
                format!("Session '{}' not found", code),
            ),
            GameError::InvalidTransition(msg) => (ErrorCode::InvalidTransition, msg.clone()),
            GameError::Unauthorized(msg) => (ErrorCode::Unauthorized, msg.clone()),
            GameError::DuplicateIdentity(name) => (
                ErrorCode::DuplicateIdentity,
                format!("Name '{}' is already taken", name),
            ),
            GameError::NotRegistered => (
                ErrorCode::NotRegistered,
                "Register a player first".to_string(),
            ),
            GameError::NotInSession => (
                ErrorCode::NotInSession,
                "Join or create a session first".to_string(),
            ),
            GameError::Json(e) => (
                ErrorCode::InvalidMessage,
                format!("Invalid message format: {}", e),
            ),
            // Fatal errors are not typically converted (connection closes)
            _ => (ErrorCode::InvalidMessage, "Internal error".to_string()),
        };
        ServerMessage::Error { code, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_deserialize() {
        let json = r#"{"kind": "register_player", "payload": {"name": "Alice"}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::RegisterPlayer { name, preferences } => {
                assert_eq!(name, "Alice");
                assert_eq!(preferences, "");
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_payloadless_kind_roundtrip() {
        let json = r#"{"kind": "buzz", "payload": {}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Buzz {}));
    }

    #[test]
    fn test_select_question_deserialize() {
        let json = r#"{"kind": "select_question", "payload": {"category": "History", "value": 400}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::SelectQuestion { category, value } => {
                assert_eq!(category, "History");
                assert_eq!(value, 400);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_server_message_envelope_shape() {
        let msg = ServerMessage::BuzzerWon {
            player: "Alice".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"kind\":\"buzzer_won\""));
        assert!(json.contains("\"payload\":{\"player\":\"Alice\"}"));
    }

    #[test]
    fn test_error_code_serialize() {
        let msg = ServerMessage::Error {
            code: ErrorCode::DuplicateIdentity,
            message: "Test".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"code\":\"duplicate_identity\""));
    }

    #[test]
    fn test_game_error_to_reply() {
        let reply: ServerMessage = GameError::DuplicateIdentity("Bob".to_string()).into();
        match reply {
            ServerMessage::Error { code, message } => {
                assert_eq!(code, ErrorCode::DuplicateIdentity);
                assert!(message.contains("Bob"));
            }
            _ => panic!("Wrong variant"),
        }
    }
}
