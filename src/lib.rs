//! Real-time multiplayer trivia session server
//!
//! Players join a shared session identified by a 6-character code, a board
//! of categorized questions is revealed progressively, players race to
//! answer each question, and scores are adjusted and broadcast to every
//! participant in real time.
//!
//! # Architecture
//! One actor task per session, fed by an `mpsc` channel:
//! - `SessionRegistry` maps codes to session handles (the only
//!   cross-session state)
//! - Each `Session` actor owns its roster, board, open question, and
//!   connection table; commands from connections, timers, and provider
//!   tasks are serialized through its channel
//! - Timers and provider calls re-enter the actor as generation-tagged
//!   commands, so stale firings are discarded instead of racing newer state
//! - Content generation and answer judging are external collaborators
//!   behind the `BoardProvider` and `AnswerJudge` traits
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use quizwire::{handle_connection, Config, ExactMatchJudge, SampleBoardProvider, SessionRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let registry = Arc::new(SessionRegistry::new(
//!         config.clone(),
//!         Arc::new(SampleBoardProvider::new(config.value_multiplier)),
//!         Arc::new(ExactMatchJudge),
//!     ));
//!     let listener = TcpListener::bind(&config.bind).await.unwrap();
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, Arc::clone(&registry)));
//!     }
//! }
//! ```

pub mod board;
pub mod buzzer;
pub mod config;
pub mod error;
pub mod hub;
pub mod player;
pub mod protocol;
pub mod providers;
pub mod registry;
pub mod session;
pub mod types;
pub mod wager;

// Re-export main types for convenience
pub use board::{Board, Category, Question};
pub use buzzer::{OpenQuestion, QuestionPhase, TimerKind};
pub use config::Config;
pub use error::GameError;
pub use hub::handle_connection;
pub use player::Player;
pub use protocol::{ClientMessage, ErrorCode, ServerMessage};
pub use providers::{AnswerJudge, BoardProvider, ExactMatchJudge, ProviderError, SampleBoardProvider};
pub use registry::SessionRegistry;
pub use session::{Session, SessionCommand, SessionHandle, SessionStatus};
pub use types::{ConnectionId, Generation, PlayerId, SessionCode};
pub use wager::Wager;
