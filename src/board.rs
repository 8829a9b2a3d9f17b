//! Board data model
//!
//! A board is exactly 5 categories of 5 questions each, with ascending
//! values (200/400/600/800/1000 scaled by an optional multiplier). Answer
//! text is opaque to the engine: it is forwarded to the judge and revealed
//! to clients only after a question resolves.

use serde::{Deserialize, Serialize};

/// Number of categories on a board
pub const BOARD_CATEGORIES: usize = 5;
/// Number of questions per category
pub const QUESTIONS_PER_CATEGORY: usize = 5;
/// Base values of the five rows before the multiplier is applied
pub const BASE_VALUES: [i64; QUESTIONS_PER_CATEGORY] = [200, 400, 600, 800, 1000];
/// Upper bound on high-stakes questions per board
pub const MAX_HIGH_STAKES: usize = 3;

/// A single question cell on the board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// The clue text shown to players when the question opens
    pub text: String,
    /// Accepted-answer reference, passed verbatim to the judge
    pub answer: String,
    /// Dollar value (already scaled by the board multiplier)
    pub value: i64,
    /// Whether this cell has already been played
    #[serde(default)]
    pub used: bool,
    /// Whether this cell requires a wager before reveal
    #[serde(default)]
    pub high_stakes: bool,
}

/// A column of the board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub questions: Vec<Question>,
}

/// A full game board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub categories: Vec<Category>,
}

impl Board {
    /// Validate the board shape returned by the content provider.
    ///
    /// Checks the 5x5 layout, ascending per-column values matching the
    /// configured multiplier, and the high-stakes cap.
    pub fn validate(&self, multiplier: i64) -> Result<(), String> {
        if self.categories.len() != BOARD_CATEGORIES {
            return Err(format!(
                "expected {} categories, got {}",
                BOARD_CATEGORIES,
                self.categories.len()
            ));
        }
        let mut high_stakes = 0;
        for category in &self.categories {
            if category.questions.len() != QUESTIONS_PER_CATEGORY {
                return Err(format!(
                    "category '{}' has {} questions, expected {}",
                    category.name,
                    category.questions.len(),
                    QUESTIONS_PER_CATEGORY
                ));
            }
            for (row, question) in category.questions.iter().enumerate() {
                let expected = BASE_VALUES[row] * multiplier;
                if question.value != expected {
                    return Err(format!(
                        "category '{}' row {} has value {}, expected {}",
                        category.name, row, question.value, expected
                    ));
                }
                if question.high_stakes {
                    high_stakes += 1;
                }
            }
        }
        if high_stakes > MAX_HIGH_STAKES {
            return Err(format!(
                "{} high-stakes questions, at most {} allowed",
                high_stakes, MAX_HIGH_STAKES
            ));
        }
        Ok(())
    }

    /// Find a question by category name and value
    pub fn find(&self, category: &str, value: i64) -> Option<&Question> {
        self.categories
            .iter()
            .find(|c| c.name == category)?
            .questions
            .iter()
            .find(|q| q.value == value)
    }

    /// Mutable lookup by category name and value
    pub fn find_mut(&mut self, category: &str, value: i64) -> Option<&mut Question> {
        self.categories
            .iter_mut()
            .find(|c| c.name == category)?
            .questions
            .iter_mut()
            .find(|q| q.value == value)
    }

    /// True once every question on the board has been played
    pub fn exhausted(&self) -> bool {
        self.categories
            .iter()
            .all(|c| c.questions.iter().all(|q| q.used))
    }

    /// Client-safe projection: cell metadata without clue or answer text.
    ///
    /// Clue text is delivered only when a question opens; answer text only
    /// when it closes.
    pub fn client_view(&self) -> BoardView {
        BoardView {
            categories: self
                .categories
                .iter()
                .map(|c| CategoryView {
                    name: c.name.clone(),
                    questions: c
                        .questions
                        .iter()
                        .map(|q| QuestionView {
                            value: q.value,
                            used: q.used,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Board as clients see it: values and used flags only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    pub categories: Vec<CategoryView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryView {
    pub name: String,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub value: i64,
    pub used: bool,
}
