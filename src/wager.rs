//! High-stakes wager sub-protocol
//!
//! A high-stakes question hides its text until the selecting player locks a
//! wager. Submitted amounts are clamped into
//! `[min_wager, max(ceiling_floor, selector's score)]` rather than rejected.

use crate::types::PlayerId;

/// Wager state for an open high-stakes question
#[derive(Debug, Clone)]
pub struct Wager {
    /// Player who selected the question and must answer it
    pub selecting_player: PlayerId,
    /// Locked amount; None until submitted
    pub amount: Option<i64>,
}

impl Wager {
    pub fn new(selecting_player: PlayerId) -> Self {
        Self {
            selecting_player,
            amount: None,
        }
    }

    /// Whether the wager has been locked, gating question reveal
    pub fn locked(&self) -> bool {
        self.amount.is_some()
    }

    /// Lock a submitted amount after clamping it into bounds
    pub fn lock(&mut self, submitted: i64, min_wager: i64, ceiling_floor: i64, score: i64) -> i64 {
        let clamped = clamp_wager(submitted, min_wager, ceiling_floor, score);
        self.amount = Some(clamped);
        clamped
    }
}

/// Clamp a wager into `[min_wager, max(ceiling_floor, score)]`
pub fn clamp_wager(submitted: i64, min_wager: i64, ceiling_floor: i64, score: i64) -> i64 {
    let ceiling = ceiling_floor.max(score);
    submitted.clamp(min_wager, ceiling)
}

/// Upper wager bound for a given score
pub fn wager_ceiling(ceiling_floor: i64, score: i64) -> i64 {
    ceiling_floor.max(score)
}
