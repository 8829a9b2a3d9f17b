//! Open-question state machine and buzzer arbitration
//!
//! One `OpenQuestion` exists per session at most, tagged with a monotonic
//! generation. Timers are spawned tasks that feed `TimerFired` commands back
//! into the session actor's channel; each (re)arming bumps the generation,
//! so a firing that raced a phase change is discarded by generation
//! mismatch. Aborting the task on re-arm is a fast path, not the
//! correctness mechanism.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::session::SessionCommand;
use crate::types::{Generation, PlayerId};
use crate::wager::Wager;

/// Which deadline a timer firing refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Reveal-narration grace before the buzzer opens
    Grace,
    /// Open buzzer with nobody buzzed yet
    BuzzWindow,
    /// Buzz winner (or wager selector) composing an answer
    AnswerWindow,
}

/// Phase of the open question's lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionPhase {
    /// High-stakes only: question text withheld until the wager locks
    AwaitingWager,
    /// Question revealed, buzzer not yet active (grace running)
    Reading,
    /// Buzzer active for all eligible players
    BuzzerOpen,
    /// Exactly one player is inside the answer window
    Answering { player: PlayerId },
    /// Submission handed to the judge; no player timer runs here
    Judging { player: PlayerId },
}

/// Transient state for the question currently being played
#[derive(Debug)]
pub struct OpenQuestion {
    /// Board coordinates
    pub category: String,
    /// Face value of the cell (wager amount overrides it for scoring)
    pub value: i64,
    /// Clue text
    pub text: String,
    /// Accepted-answer reference, forwarded to the judge
    pub answer: String,
    pub high_stakes: bool,
    pub phase: QuestionPhase,
    /// Players who answered incorrectly and may not buzz again
    pub excluded: HashSet<PlayerId>,
    /// Controller at selection time; control reverts here on an
    /// all-incorrect or no-buzz resolution
    pub prior_controller: PlayerId,
    /// Wager sub-state, present iff `high_stakes`
    pub wager: Option<Wager>,
    generation: Generation,
    timer: Option<JoinHandle<()>>,
}

impl OpenQuestion {
    pub fn new(
        category: String,
        value: i64,
        text: String,
        answer: String,
        high_stakes: bool,
        prior_controller: PlayerId,
        selecting_player: PlayerId,
    ) -> Self {
        let (phase, wager) = if high_stakes {
            (QuestionPhase::AwaitingWager, Some(Wager::new(selecting_player)))
        } else {
            (QuestionPhase::Reading, None)
        };
        Self {
            category,
            value,
            text,
            answer,
            high_stakes,
            phase,
            excluded: HashSet::new(),
            prior_controller,
            wager,
            generation: Generation::default(),
            timer: None,
        }
    }

    /// Current generation; commands carrying an older one are stale
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether a deferred command's generation is still current
    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    /// The player currently inside the answer window, if any
    pub fn buzz_owner(&self) -> Option<PlayerId> {
        match &self.phase {
            QuestionPhase::Answering { player } | QuestionPhase::Judging { player } => {
                Some(*player)
            }
            _ => None,
        }
    }

    /// Whether the buzzer is currently accepting buzzes
    pub fn buzzer_active(&self) -> bool {
        self.phase == QuestionPhase::BuzzerOpen
    }

    /// Points at stake: the locked wager for high-stakes, the face value
    /// otherwise
    pub fn stake(&self) -> i64 {
        self.wager
            .as_ref()
            .and_then(|w| w.amount)
            .unwrap_or(self.value)
    }

    /// Arm a timer for this question, invalidating all prior deferred
    /// commands.
    ///
    /// The firing re-enters the session actor through `tx`; the returned
    /// generation is embedded so the actor can drop it if the question has
    /// moved on by then.
    pub fn arm_timer(
        &mut self,
        kind: TimerKind,
        after: Duration,
        tx: &mpsc::Sender<SessionCommand>,
    ) -> Generation {
        self.cancel_timer();
        let generation = self.generation.bump();
        let tx = tx.clone();
        debug!("arming {:?} timer for {:?} at {}", kind, after, generation);
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(SessionCommand::TimerFired { kind, generation }).await;
        }));
        generation
    }

    /// Cancel the outstanding timer and invalidate in-flight deferred
    /// commands (judge verdicts included) by bumping the generation.
    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation.bump();
    }

    /// Transition into the answer window for `player`
    pub fn begin_answering(&mut self, player: PlayerId) {
        self.phase = QuestionPhase::Answering { player };
    }

    /// Transition into judging; the answer timer no longer applies
    pub fn begin_judging(&mut self, player: PlayerId) {
        self.cancel_timer();
        self.phase = QuestionPhase::Judging { player };
    }

    /// Reopen the buzzer after an incorrect answer (grace skipped)
    pub fn reopen(&mut self) {
        self.phase = QuestionPhase::BuzzerOpen;
    }
}

impl Drop for OpenQuestion {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
