//! External collaborator contracts
//!
//! The engine never generates content or judges answers itself; it calls
//! these providers and applies the results back inside the session actor.
//! Both may be slow — callers must not hold session state across the await.

use async_trait::async_trait;
use rand::Rng;

use crate::board::{Board, Category, Question, BASE_VALUES, BOARD_CATEGORIES};

/// Content-generation collaborator
///
/// Invoked once per lobby -> board-generating transition (and again after a
/// retried failure). The returned board is validated before use.
#[async_trait]
pub trait BoardProvider: Send + Sync {
    async fn generate_board(&self, preferences: &str) -> Result<Board, ProviderError>;
}

/// Answer-judging collaborator
///
/// Invoked once per submission. The answer-window timer bounds the player's
/// submission time, not this call's latency.
#[async_trait]
pub trait AnswerJudge: Send + Sync {
    async fn judge(&self, accepted_answer: &str, submitted: &str) -> Result<bool, ProviderError>;
}

/// Failure of an external collaborator
///
/// Surfaced to the whole session as a retryable error event; never fatal to
/// the session or the process.
#[derive(Debug, thiserror::Error)]
#[error("provider error: {0}")]
pub struct ProviderError(pub String);

/// Trivial judge: case-insensitive, whitespace-trimmed equality.
///
/// Stands in where no natural-language judge is wired up.
pub struct ExactMatchJudge;

#[async_trait]
impl AnswerJudge for ExactMatchJudge {
    async fn judge(&self, accepted_answer: &str, submitted: &str) -> Result<bool, ProviderError> {
        Ok(accepted_answer.trim().eq_ignore_ascii_case(submitted.trim()))
    }
}

/// Placeholder content provider producing a fixed-topic board.
///
/// Stands in where no real content-generation service is wired up; places
/// two high-stakes cells at random, never on the lowest-value row.
pub struct SampleBoardProvider {
    multiplier: i64,
}

impl SampleBoardProvider {
    pub fn new(multiplier: i64) -> Self {
        Self { multiplier }
    }
}

#[async_trait]
impl BoardProvider for SampleBoardProvider {
    async fn generate_board(&self, _preferences: &str) -> Result<Board, ProviderError> {
        let mut board = Board {
            categories: (0..BOARD_CATEGORIES)
                .map(|c| Category {
                    name: format!("Sample Category {}", c + 1),
                    questions: BASE_VALUES
                        .iter()
                        .map(|v| Question {
                            text: format!("Sample clue worth ${}", v * self.multiplier),
                            answer: format!("sample answer {}", v),
                            value: v * self.multiplier,
                            used: false,
                            high_stakes: false,
                        })
                        .collect(),
                })
                .collect(),
        };

        let mut rng = rand::thread_rng();
        for _ in 0..2 {
            let category = rng.gen_range(0..BOARD_CATEGORIES);
            // Skip the lowest-value row
            let row = rng.gen_range(1..BASE_VALUES.len());
            board.categories[category].questions[row].high_stakes = true;
        }
        Ok(board)
    }
}
