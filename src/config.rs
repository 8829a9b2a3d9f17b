//! Runtime configuration
//!
//! All game tunables flow from here into each session actor at spawn time.
//! Defaults match the classic board: 200-1000 values, 5 second buzz window,
//! 7 second answer window.

use std::time::Duration;

use clap::Parser;

/// Trivia session server configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "quizwire", about = "Real-time multiplayer trivia session server")]
pub struct Config {
    /// Address to bind the WebSocket listener to
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Minimum players required before the host may start
    #[arg(long, default_value_t = 3)]
    pub min_players: usize,

    /// Multiplier applied to the base question values
    #[arg(long, default_value_t = 1)]
    pub value_multiplier: i64,

    /// Grace period between question reveal and buzzer activation (ms)
    #[arg(long, default_value_t = 3000)]
    pub grace_ms: u64,

    /// How long the buzzer stays open with no buzz before the question
    /// closes unanswered (ms)
    #[arg(long, default_value_t = 5000)]
    pub buzz_window_ms: u64,

    /// How long a buzz winner has to submit an answer (ms)
    #[arg(long, default_value_t = 7000)]
    pub answer_window_ms: u64,

    /// Minimum wager on a high-stakes question
    #[arg(long, default_value_t = 5)]
    pub min_wager: i64,

    /// Wager ceiling floor: the ceiling is max(this, selector's score)
    #[arg(long, default_value_t = 1000)]
    pub wager_ceiling_floor: i64,

    /// Maximum retained chat-log entries per session
    #[arg(long, default_value_t = 100)]
    pub chat_log_cap: usize,
}

impl Config {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn buzz_window(&self) -> Duration {
        Duration::from_millis(self.buzz_window_ms)
    }

    pub fn answer_window(&self) -> Duration {
        Duration::from_millis(self.answer_window_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            min_players: 3,
            value_multiplier: 1,
            grace_ms: 3000,
            buzz_window_ms: 5000,
            answer_window_ms: 7000,
            min_wager: 5,
            wager_ceiling_floor: 1000,
            chat_log_cap: 100,
        }
    }
}
