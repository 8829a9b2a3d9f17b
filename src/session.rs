//! Per-session actor
//!
//! Each session runs as one task owning all of its mutable state, consuming
//! `SessionCommand`s from a single mpsc channel. Commands come from
//! connection handlers, timer tasks, and provider completion tasks, so
//! every state transition is serialized per session while sessions proceed
//! in parallel. Provider calls (board generation, judging) run in spawned
//! tasks and re-enter the actor with their result; the actor never awaits a
//! collaborator directly.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::board::Board;
use crate::buzzer::{OpenQuestion, QuestionPhase, TimerKind};
use crate::config::Config;
use crate::error::GameError;
use crate::player::Player;
use crate::protocol::{
    ChatEntry, ErrorCode, OpenQuestionInfo, PlayerInfo, ServerMessage, SessionSnapshot,
};
use crate::providers::{AnswerJudge, BoardProvider, ProviderError};
use crate::types::{ConnectionId, Generation, PlayerId, SessionCode};
use crate::wager::wager_ceiling;

/// Channel buffer size for session commands
const COMMAND_BUFFER_SIZE: usize = 256;
/// Channel buffer size for per-connection outbound messages
const CONNECTION_BUFFER_SIZE: usize = 32;

/// Session lifecycle status, strictly forward-only
/// (restart loops from Completed back into BoardGenerating)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Lobby,
    BoardGenerating,
    Active,
    Completed,
}

/// Commands sent from handlers, timers, and provider tasks to the session
/// actor
#[derive(Debug)]
pub enum SessionCommand {
    /// A connection attached to this session
    Attach {
        conn_id: ConnectionId,
        tx: mpsc::Sender<ServerMessage>,
    },
    /// A connection went away
    Detach { conn_id: ConnectionId },
    /// Register (or reconnect) a player on a connection
    Register {
        conn_id: ConnectionId,
        name: String,
        preferences: String,
    },
    /// Host requests the game start
    Start { conn_id: ConnectionId },
    /// Board generation finished
    BoardReady {
        result: Result<Board, ProviderError>,
    },
    /// Controller selects a question
    Select {
        conn_id: ConnectionId,
        category: String,
        value: i64,
    },
    /// A player contends for the open question
    Buzz { conn_id: ConnectionId },
    /// The answering player submits text for judging
    SubmitAnswer { conn_id: ConnectionId, text: String },
    /// The selecting player submits a wager
    SubmitWager { conn_id: ConnectionId, amount: i64 },
    /// Judge verdict arrived for an earlier submission
    JudgeVerdict {
        player: PlayerId,
        verdict: Result<bool, ProviderError>,
        generation: Generation,
    },
    /// A deferred timer fired
    TimerFired {
        kind: TimerKind,
        generation: Generation,
    },
    /// Chat relay
    Chat { conn_id: ConnectionId, message: String },
    /// Host requests a restart after completion
    Restart { conn_id: ConnectionId },
    /// A frame that decoded but is not valid for an attached connection
    Malformed { conn_id: ConnectionId, detail: String },
    /// Registry teardown
    Shutdown,
}

/// Handle for feeding commands into a session actor
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Send a command to the session; ignores a closed channel
    /// (the session has shut down).
    pub async fn send(&self, cmd: SessionCommand) {
        let _ = self.tx.send(cmd).await;
    }

    /// Open a server-to-client channel sized for one connection
    pub fn connection_channel() -> (mpsc::Sender<ServerMessage>, mpsc::Receiver<ServerMessage>) {
        mpsc::channel(CONNECTION_BUFFER_SIZE)
    }
}

/// A connection bound into the session, possibly not yet registered
#[derive(Debug)]
struct ConnectionEntry {
    tx: mpsc::Sender<ServerMessage>,
    player: Option<PlayerId>,
}

/// The per-session actor
pub struct Session {
    code: SessionCode,
    config: Config,
    status: SessionStatus,
    /// Registration order is the winner tie-break
    players: Vec<Player>,
    board: Option<Board>,
    open: Option<OpenQuestion>,
    controller: Option<PlayerId>,
    chat: VecDeque<ChatEntry>,
    connections: HashMap<ConnectionId, ConnectionEntry>,
    /// Set after a failed generation so the host may retry from
    /// BoardGenerating
    generation_failed: bool,
    receiver: mpsc::Receiver<SessionCommand>,
    self_tx: mpsc::Sender<SessionCommand>,
    board_provider: Arc<dyn BoardProvider>,
    judge: Arc<dyn AnswerJudge>,
}

impl Session {
    fn new(
        code: SessionCode,
        config: Config,
        board_provider: Arc<dyn BoardProvider>,
        judge: Arc<dyn AnswerJudge>,
        receiver: mpsc::Receiver<SessionCommand>,
        self_tx: mpsc::Sender<SessionCommand>,
    ) -> Self {
        Self {
            code,
            config,
            status: SessionStatus::Lobby,
            players: Vec::new(),
            board: None,
            open: None,
            controller: None,
            chat: VecDeque::new(),
            connections: HashMap::new(),
            generation_failed: false,
            receiver,
            self_tx,
            board_provider,
            judge,
        }
    }

    /// Spawn the session actor task and return its command handle
    pub fn spawn(
        code: SessionCode,
        config: Config,
        board_provider: Arc<dyn BoardProvider>,
        judge: Arc<dyn AnswerJudge>,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let session = Session::new(code, config, board_provider, judge, rx, tx.clone());
        tokio::spawn(session.run());
        SessionHandle { tx }
    }

    /// Run the session event loop
    ///
    /// Continuously receives and processes commands until shutdown or until
    /// all senders are dropped.
    pub async fn run(mut self) {
        info!("Session {} started", self.code);

        while let Some(cmd) = self.receiver.recv().await {
            if matches!(cmd, SessionCommand::Shutdown) {
                break;
            }
            self.handle_command(cmd).await;
        }

        info!("Session {} shutting down", self.code);
        // Dropping the connection table closes every write task; dropping
        // the open question aborts its timer.
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Attach { conn_id, tx } => self.handle_attach(conn_id, tx).await,
            SessionCommand::Detach { conn_id } => self.handle_detach(conn_id).await,
            SessionCommand::Register {
                conn_id,
                name,
                preferences,
            } => self.handle_register(conn_id, name, preferences).await,
            SessionCommand::Start { conn_id } => self.handle_start(conn_id).await,
            SessionCommand::BoardReady { result } => self.handle_board_ready(result).await,
            SessionCommand::Select {
                conn_id,
                category,
                value,
            } => self.handle_select(conn_id, category, value).await,
            SessionCommand::Buzz { conn_id } => self.handle_buzz(conn_id).await,
            SessionCommand::SubmitAnswer { conn_id, text } => {
                self.handle_submit_answer(conn_id, text).await
            }
            SessionCommand::SubmitWager { conn_id, amount } => {
                self.handle_submit_wager(conn_id, amount).await
            }
            SessionCommand::JudgeVerdict {
                player,
                verdict,
                generation,
            } => self.handle_judge_verdict(player, verdict, generation).await,
            SessionCommand::TimerFired { kind, generation } => {
                self.handle_timer_fired(kind, generation).await
            }
            SessionCommand::Chat { conn_id, message } => self.handle_chat(conn_id, message).await,
            SessionCommand::Restart { conn_id } => self.handle_restart(conn_id).await,
            SessionCommand::Malformed { conn_id, detail } => {
                self.handle_malformed(conn_id, detail).await
            }
            SessionCommand::Shutdown => unreachable!("handled in run loop"),
        }
    }

    // ------------------------------------------------------------------
    // Connection hub
    // ------------------------------------------------------------------

    async fn handle_attach(&mut self, conn_id: ConnectionId, tx: mpsc::Sender<ServerMessage>) {
        debug!("Connection {} attached to session {}", conn_id, self.code);
        self.connections
            .insert(conn_id, ConnectionEntry { tx, player: None });
        self.send_snapshot(conn_id).await;
    }

    async fn handle_detach(&mut self, conn_id: ConnectionId) {
        let Some(entry) = self.connections.remove(&conn_id) else {
            return;
        };
        debug!("Connection {} detached from session {}", conn_id, self.code);

        if let Some(player_id) = entry.player {
            // Only unbind if this connection is still the player's current
            // one; a superseded connection must not clear the new binding.
            let name = match self.players.iter_mut().find(|p| p.id == player_id) {
                Some(player) if player.connection == Some(conn_id) => {
                    player.unbind();
                    Some(player.name.clone())
                }
                _ => None,
            };
            if let Some(name) = name {
                info!("Player '{}' disconnected from session {}", name, self.code);
                self.broadcast(ServerMessage::PlayerDisconnected { player: name })
                    .await;
                self.broadcast_player_list().await;
            }
        }
    }

    async fn handle_register(&mut self, conn_id: ConnectionId, name: String, preferences: String) {
        let Some(entry) = self.connections.get(&conn_id) else {
            return;
        };

        // A connection already bound to a player may only re-register as
        // itself (idempotent reconnect).
        if let Some(bound) = entry.player {
            let own_name = self
                .players
                .iter()
                .find(|p| p.id == bound)
                .map(|p| p.name.clone());
            if own_name.as_deref() == Some(name.as_str()) {
                let (player_id, is_host) = match self.players.iter().find(|p| p.id == bound) {
                    Some(p) => (p.id, p.is_host),
                    None => return,
                };
                self.send_to(
                    conn_id,
                    ServerMessage::Registered {
                        player_id: player_id.to_string(),
                        name,
                        is_host,
                        reconnected: true,
                    },
                )
                .await;
            } else {
                self.reply_err(conn_id, GameError::DuplicateIdentity(name))
                    .await;
            }
            return;
        }

        if let Some(idx) = self.players.iter().position(|p| p.name == name) {
            // Existing name: reconnect. A second connection for the same
            // player supersedes the prior one.
            let (player_id, is_host, superseded) = {
                let player = &mut self.players[idx];
                let prior = player.bind(conn_id);
                (player.id, player.is_host, prior.filter(|c| *c != conn_id))
            };
            if let Some(old_conn) = superseded {
                // The session holds the only sender for a connection, so
                // dropping the entry ends its write task and closes the
                // socket.
                self.connections.remove(&old_conn);
                debug!(
                    "Superseded connection {} for player '{}' in session {}",
                    old_conn, name, self.code
                );
            }
            if let Some(entry) = self.connections.get_mut(&conn_id) {
                entry.player = Some(player_id);
            }

            info!("Player '{}' reconnected to session {}", name, self.code);
            self.send_to(
                conn_id,
                ServerMessage::Registered {
                    player_id: player_id.to_string(),
                    name: name.clone(),
                    is_host,
                    reconnected: true,
                },
            )
            .await;
            self.broadcast(ServerMessage::PlayerReconnected { player: name })
                .await;
            self.broadcast_player_list().await;
            self.send_snapshot(conn_id).await;
            return;
        }

        if self.status == SessionStatus::Completed {
            self.reply_err(
                conn_id,
                GameError::invalid("Session has completed; wait for a restart"),
            )
            .await;
            return;
        }

        // New player; the first registrant becomes the host.
        let is_host = self.players.is_empty();
        let ordinal = self.players.len();
        let mut player = Player::new(name.clone(), ordinal, is_host, conn_id);
        player.preferences = preferences;
        let player_id = player.id;
        self.players.push(player);
        if let Some(entry) = self.connections.get_mut(&conn_id) {
            entry.player = Some(player_id);
        }

        info!(
            "Player '{}' registered in session {} (host: {})",
            name, self.code, is_host
        );
        self.send_to(
            conn_id,
            ServerMessage::Registered {
                player_id: player_id.to_string(),
                name,
                is_host,
                reconnected: false,
            },
        )
        .await;
        self.broadcast_player_list().await;
        self.send_snapshot(conn_id).await;
    }

    async fn handle_malformed(&self, conn_id: ConnectionId, detail: String) {
        warn!("Session {} received an invalid frame: {}", self.code, detail);
        self.send_to(
            conn_id,
            ServerMessage::Error {
                code: ErrorCode::InvalidMessage,
                message: detail,
            },
        )
        .await;
    }

    // ------------------------------------------------------------------
    // Lifecycle state machine
    // ------------------------------------------------------------------

    async fn handle_start(&mut self, conn_id: ConnectionId) {
        let player = match self.bound_player(conn_id) {
            Ok(p) => p,
            Err(e) => return self.reply_err(conn_id, e).await,
        };
        if !player.is_host {
            return self
                .reply_err(conn_id, GameError::unauthorized("Only the host may start"))
                .await;
        }
        let retrying = self.status == SessionStatus::BoardGenerating && self.generation_failed;
        if self.status != SessionStatus::Lobby && !retrying {
            return self
                .reply_err(conn_id, GameError::invalid("Game has already started"))
                .await;
        }
        if self.players.len() < self.config.min_players {
            return self
                .reply_err(
                    conn_id,
                    GameError::invalid(format!(
                        "Need at least {} players to start",
                        self.config.min_players
                    )),
                )
                .await;
        }

        info!("Session {} generating board", self.code);
        self.begin_board_generation().await;
    }

    /// Move into BoardGenerating and kick off the provider task.
    ///
    /// Board generation may be slow; it runs outside the actor and
    /// re-enters through the command channel as `BoardReady`.
    async fn begin_board_generation(&mut self) {
        self.status = SessionStatus::BoardGenerating;
        self.generation_failed = false;
        self.broadcast(ServerMessage::BoardGenerating {}).await;

        let preferences = self
            .players
            .iter()
            .map(|p| p.preferences.as_str())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        let provider = Arc::clone(&self.board_provider);
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            let result = provider.generate_board(&preferences).await;
            let _ = tx.send(SessionCommand::BoardReady { result }).await;
        });
    }

    async fn handle_board_ready(&mut self, result: Result<Board, ProviderError>) {
        if self.status != SessionStatus::BoardGenerating {
            debug!("Ignoring board result in state {:?}", self.status);
            return;
        }

        let board = match result {
            Ok(board) => match board.validate(self.config.value_multiplier) {
                Ok(()) => board,
                Err(reason) => {
                    warn!("Session {} received malformed board: {}", self.code, reason);
                    self.generation_failed = true;
                    self.broadcast(ServerMessage::SessionError {
                        message: format!("Board generation produced an invalid board: {}", reason),
                        retryable: true,
                    })
                    .await;
                    return;
                }
            },
            Err(e) => {
                warn!("Session {} board generation failed: {}", self.code, e);
                self.generation_failed = true;
                self.broadcast(ServerMessage::SessionError {
                    message: format!("Board generation failed: {}", e),
                    retryable: true,
                })
                .await;
                return;
            }
        };

        self.board = Some(board);
        self.status = SessionStatus::Active;

        // First control goes to the earliest-registered connected player.
        let first = self
            .players
            .iter()
            .find(|p| p.is_connected())
            .or_else(|| self.players.first())
            .map(|p| (p.id, p.name.clone()));
        if let Some((player_id, name)) = first {
            self.controller = Some(player_id);
            info!(
                "Session {} active; '{}' has control of the board",
                self.code, name
            );
            self.broadcast_snapshot().await;
            self.broadcast(ServerMessage::ControlChanged { player: name })
                .await;
        }
    }

    async fn handle_restart(&mut self, conn_id: ConnectionId) {
        let player = match self.bound_player(conn_id) {
            Ok(p) => p,
            Err(e) => return self.reply_err(conn_id, e).await,
        };
        if !player.is_host {
            return self
                .reply_err(conn_id, GameError::unauthorized("Only the host may restart"))
                .await;
        }
        if self.status != SessionStatus::Completed {
            return self
                .reply_err(
                    conn_id,
                    GameError::invalid("Restart is only possible after the game completes"),
                )
                .await;
        }

        // Dropping the open question (there should be none) cancels any
        // outstanding timer.
        self.open = None;
        self.board = None;
        self.controller = None;
        self.chat.clear();
        for player in self.players.iter_mut() {
            player.score = 0;
        }

        // Restart goes straight back through board generation; the roster
        // already satisfied the player minimum when the game first started.
        info!("Session {} restarting with a fresh board", self.code);
        self.begin_board_generation().await;
        self.broadcast_snapshot().await;
    }

    // ------------------------------------------------------------------
    // Question selection and buzzer race
    // ------------------------------------------------------------------

    async fn handle_select(&mut self, conn_id: ConnectionId, category: String, value: i64) {
        let player = match self.bound_player(conn_id) {
            Ok(p) => (p.id, p.name.clone(), p.score),
            Err(e) => return self.reply_err(conn_id, e).await,
        };
        if self.status != SessionStatus::Active {
            return self
                .reply_err(conn_id, GameError::invalid("Game is not active"))
                .await;
        }
        if self.open.is_some() {
            return self
                .reply_err(conn_id, GameError::invalid("A question is already open"))
                .await;
        }
        if self.controller != Some(player.0) {
            return self
                .reply_err(
                    conn_id,
                    GameError::unauthorized("Only the controlling player may select"),
                )
                .await;
        }
        let Some(board) = self.board.as_ref() else {
            return self
                .reply_err(conn_id, GameError::invalid("No board available"))
                .await;
        };
        let Some(question) = board.find(&category, value) else {
            return self
                .reply_err(
                    conn_id,
                    GameError::invalid(format!("No question at {} ${}", category, value)),
                )
                .await;
        };
        if question.used {
            return self
                .reply_err(conn_id, GameError::invalid("That question was already played"))
                .await;
        }

        let (player_id, name, score) = player;
        let mut open = OpenQuestion::new(
            category.clone(),
            value,
            question.text.clone(),
            question.answer.clone(),
            question.high_stakes,
            player_id,
            player_id,
        );

        if open.high_stakes {
            info!(
                "Session {}: '{}' selected high-stakes {} ${}",
                self.code, name, category, value
            );
            self.open = Some(open);
            self.broadcast(ServerMessage::WagerRequired {
                category,
                value,
                player: name,
                min: self.config.min_wager,
                max: wager_ceiling(self.config.wager_ceiling_floor, score),
            })
            .await;
        } else {
            info!(
                "Session {}: '{}' selected {} ${}",
                self.code, name, category, value
            );
            let text = open.text.clone();
            open.arm_timer(TimerKind::Grace, self.config.grace(), &self.self_tx);
            self.open = Some(open);
            self.broadcast(ServerMessage::QuestionOpened {
                category,
                value,
                text,
                high_stakes: false,
            })
            .await;
        }
    }

    async fn handle_buzz(&mut self, conn_id: ConnectionId) {
        let (player_id, name) = match self.bound_player(conn_id) {
            Ok(p) => (p.id, p.name.clone()),
            Err(e) => return self.reply_err(conn_id, e).await,
        };
        let Some(open) = self.open.as_mut() else {
            return self
                .reply_err(conn_id, GameError::invalid("No question is open"))
                .await;
        };
        if !open.buzzer_active() {
            return self
                .reply_err(conn_id, GameError::invalid("Buzzer is not active"))
                .await;
        }
        if open.excluded.contains(&player_id) {
            return self
                .reply_err(
                    conn_id,
                    GameError::invalid("You already answered this question"),
                )
                .await;
        }

        // First buzz wins; arrival order on the command channel is the
        // documented tie-break.
        open.begin_answering(player_id);
        open.arm_timer(
            TimerKind::AnswerWindow,
            self.config.answer_window(),
            &self.self_tx,
        );
        info!("Session {}: '{}' won the buzz", self.code, name);
        self.broadcast(ServerMessage::BuzzerWon {
            player: name.clone(),
        })
        .await;
        self.broadcast(ServerMessage::AnswerTimerStarted {
            player: name,
            seconds: self.config.answer_window().as_secs(),
        })
        .await;
    }

    async fn handle_submit_answer(&mut self, conn_id: ConnectionId, text: String) {
        let player_id = match self.bound_player(conn_id) {
            Ok(p) => p.id,
            Err(e) => return self.reply_err(conn_id, e).await,
        };
        let Some(open) = self.open.as_mut() else {
            return self
                .reply_err(conn_id, GameError::invalid("No question is open"))
                .await;
        };
        match open.phase {
            QuestionPhase::Answering { player } if player == player_id => {}
            _ => {
                return self
                    .reply_err(conn_id, GameError::invalid("It is not your answer window"))
                    .await;
            }
        }

        // The answer window bounds the player's submission time, not the
        // judge's latency: stop the clock before judging.
        open.begin_judging(player_id);
        let generation = open.generation();
        let accepted = open.answer.clone();
        let judge = Arc::clone(&self.judge);
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            let verdict = judge.judge(&accepted, &text).await;
            let _ = tx
                .send(SessionCommand::JudgeVerdict {
                    player: player_id,
                    verdict,
                    generation,
                })
                .await;
        });
    }

    async fn handle_submit_wager(&mut self, conn_id: ConnectionId, amount: i64) {
        let (player_id, name, score) = match self.bound_player(conn_id) {
            Ok(p) => (p.id, p.name.clone(), p.score),
            Err(e) => return self.reply_err(conn_id, e).await,
        };
        let Some(open) = self.open.as_mut() else {
            return self
                .reply_err(conn_id, GameError::invalid("No question is open"))
                .await;
        };
        if open.phase != QuestionPhase::AwaitingWager {
            return self
                .reply_err(conn_id, GameError::invalid("No wager is expected"))
                .await;
        }
        let Some(wager) = open.wager.as_mut() else {
            return self
                .reply_err(conn_id, GameError::invalid("No wager is expected"))
                .await;
        };
        if wager.selecting_player != player_id {
            return self
                .reply_err(
                    conn_id,
                    GameError::unauthorized("Only the selecting player may wager"),
                )
                .await;
        }

        // Out-of-range submissions are clamped, never silently accepted.
        let locked = wager.lock(
            amount,
            self.config.min_wager,
            self.config.wager_ceiling_floor,
            score,
        );
        let (category, value, text) = (open.category.clone(), open.value, open.text.clone());
        open.begin_answering(player_id);
        open.arm_timer(
            TimerKind::AnswerWindow,
            self.config.answer_window(),
            &self.self_tx,
        );

        info!(
            "Session {}: '{}' wagered {} (submitted {})",
            self.code, name, locked, amount
        );
        self.broadcast(ServerMessage::WagerLocked {
            player: name.clone(),
            amount: locked,
        })
        .await;
        // The question text is revealed only to the selecting player.
        self.send_to(
            conn_id,
            ServerMessage::QuestionOpened {
                category,
                value,
                text,
                high_stakes: true,
            },
        )
        .await;
        self.broadcast(ServerMessage::AnswerTimerStarted {
            player: name,
            seconds: self.config.answer_window().as_secs(),
        })
        .await;
    }

    // ------------------------------------------------------------------
    // Deferred events: verdicts and timers
    // ------------------------------------------------------------------

    async fn handle_judge_verdict(
        &mut self,
        player_id: PlayerId,
        verdict: Result<bool, ProviderError>,
        generation: Generation,
    ) {
        let Some(open) = self.open.as_mut() else {
            debug!("Dropping verdict: no open question");
            return;
        };
        if !open.is_current(generation) {
            debug!("Dropping stale verdict at {}", generation);
            return;
        }
        match open.phase {
            QuestionPhase::Judging { player } if player == player_id => {}
            _ => {
                debug!("Dropping verdict: phase {:?}", open.phase);
                return;
            }
        }

        match verdict {
            Ok(correct) => self.resolve_answer(player_id, correct).await,
            Err(e) => {
                warn!("Session {} judging failed: {}", self.code, e);
                // Retry affordance: put the player back in their answer
                // window so they can resubmit.
                open.begin_answering(player_id);
                open.arm_timer(
                    TimerKind::AnswerWindow,
                    self.config.answer_window(),
                    &self.self_tx,
                );
                let name = self.player_name(player_id);
                self.broadcast(ServerMessage::SessionError {
                    message: format!("Answer judging failed: {}", e),
                    retryable: true,
                })
                .await;
                self.broadcast(ServerMessage::AnswerTimerStarted {
                    player: name,
                    seconds: self.config.answer_window().as_secs(),
                })
                .await;
            }
        }
    }

    async fn handle_timer_fired(&mut self, kind: TimerKind, generation: Generation) {
        let Some(open) = self.open.as_mut() else {
            debug!("Dropping {:?} timer: no open question", kind);
            return;
        };
        if !open.is_current(generation) {
            debug!("Dropping stale {:?} timer at {}", kind, generation);
            return;
        }

        match (kind, open.phase.clone()) {
            (TimerKind::Grace, QuestionPhase::Reading) => {
                open.reopen();
                open.arm_timer(TimerKind::BuzzWindow, self.config.buzz_window(), &self.self_tx);
                self.broadcast(ServerMessage::BuzzerActivated {}).await;
            }
            (TimerKind::BuzzWindow, QuestionPhase::BuzzerOpen) => {
                info!("Session {}: nobody buzzed", self.code);
                self.close_unanswered().await;
            }
            (TimerKind::AnswerWindow, QuestionPhase::Answering { player }) => {
                info!(
                    "Session {}: '{}' ran out of time",
                    self.code,
                    self.player_name(player)
                );
                // No submission counts as an incorrect answer.
                self.resolve_answer(player, false).await;
            }
            (kind, phase) => {
                debug!("Dropping {:?} timer in phase {:?}", kind, phase);
            }
        }
    }

    // ------------------------------------------------------------------
    // Question resolution (shared by judged answers and timeouts)
    // ------------------------------------------------------------------

    async fn resolve_answer(&mut self, player_id: PlayerId, correct: bool) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        let stake = open.stake();
        let high_stakes = open.high_stakes;
        let delta = if correct { stake } else { -stake };

        let (name, score) = {
            let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) else {
                return;
            };
            player.score += delta;
            (player.name.clone(), player.score)
        };

        self.broadcast(ServerMessage::AnswerResult {
            player: name.clone(),
            correct,
            delta,
            score,
        })
        .await;

        if correct {
            // Correct answer: answerer takes control, question is done.
            info!(
                "Session {}: '{}' answered correctly for {}",
                self.code, name, delta
            );
            self.controller = Some(player_id);
            self.close_question().await;
            self.broadcast(ServerMessage::ControlChanged { player: name })
                .await;
            self.maybe_complete().await;
        } else if high_stakes {
            // High-stakes questions are single-shot: no reopening, control
            // stays with the selecting player.
            info!(
                "Session {}: '{}' missed the high-stakes question for {}",
                self.code, name, stake
            );
            self.close_question().await;
            self.maybe_complete().await;
        } else {
            let open = match self.open.as_mut() {
                Some(open) => open,
                None => return,
            };
            open.excluded.insert(player_id);
            let excluded = open.excluded.clone();
            let eligible_remain = self
                .players
                .iter()
                .any(|p| p.is_connected() && !excluded.contains(&p.id));

            if eligible_remain {
                // Reopen for the rest of the field; grace is skipped on
                // reactivation.
                let open = match self.open.as_mut() {
                    Some(open) => open,
                    None => return,
                };
                open.reopen();
                open.arm_timer(TimerKind::BuzzWindow, self.config.buzz_window(), &self.self_tx);
                self.broadcast(ServerMessage::BuzzerActivated {}).await;
            } else {
                info!("Session {}: everyone missed it", self.code);
                self.close_unanswered().await;
            }
        }
    }

    /// Close the question with nobody credited: reveal the answer and
    /// revert control to whoever held it before the selection.
    async fn close_unanswered(&mut self) {
        let prior = self.open.as_ref().map(|o| o.prior_controller);
        self.close_question().await;
        if let Some(prior) = prior {
            self.controller = Some(prior);
            let name = self.player_name(prior);
            self.broadcast(ServerMessage::ControlChanged { player: name })
                .await;
        }
        self.maybe_complete().await;
    }

    /// Mark the open question used, reveal its answer, and destroy it
    /// (dropping it cancels any outstanding timer).
    async fn close_question(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };
        if let Some(board) = self.board.as_mut() {
            if let Some(question) = board.find_mut(&open.category, open.value) {
                question.used = true;
            }
        }
        self.broadcast(ServerMessage::QuestionClosed {
            correct_answer: open.answer.clone(),
        })
        .await;
    }

    /// Transition to Completed once the board is exhausted
    async fn maybe_complete(&mut self) {
        let exhausted = self.board.as_ref().map(|b| b.exhausted()).unwrap_or(false);
        if !exhausted || self.status != SessionStatus::Active {
            return;
        }

        self.status = SessionStatus::Completed;
        // Winner: strictly highest score; ties break to the
        // earliest-registered player.
        let winner = self
            .players
            .iter()
            .max_by(|a, b| a.score.cmp(&b.score).then(b.ordinal.cmp(&a.ordinal)))
            .map(|p| p.name.clone())
            .unwrap_or_default();

        info!("Session {} completed; winner '{}'", self.code, winner);
        self.broadcast(ServerMessage::SessionCompleted {
            scores: self.player_infos(),
            winner,
        })
        .await;
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    async fn handle_chat(&mut self, conn_id: ConnectionId, message: String) {
        let name = match self.bound_player(conn_id) {
            Ok(p) => p.name.clone(),
            Err(e) => return self.reply_err(conn_id, e).await,
        };

        self.chat.push_back(ChatEntry {
            from: name.clone(),
            message: message.clone(),
        });
        while self.chat.len() > self.config.chat_log_cap {
            self.chat.pop_front();
        }
        self.broadcast(ServerMessage::Chat { from: name, message })
            .await;
    }

    // ------------------------------------------------------------------
    // Broadcast bus and snapshots
    // ------------------------------------------------------------------

    /// Fan a message out to every attached connection.
    ///
    /// All sends happen inside the actor, so per-connection channel FIFO
    /// gives every client the same delivery order.
    async fn broadcast(&self, msg: ServerMessage) {
        for entry in self.connections.values() {
            let _ = entry.tx.send(msg.clone()).await;
        }
    }

    async fn send_to(&self, conn_id: ConnectionId, msg: ServerMessage) {
        if let Some(entry) = self.connections.get(&conn_id) {
            let _ = entry.tx.send(msg).await;
        }
    }

    async fn reply_err(&self, conn_id: ConnectionId, err: GameError) {
        warn!("Session {} rejected message: {}", self.code, err);
        self.send_to(conn_id, err.into()).await;
    }

    async fn broadcast_player_list(&self) {
        self.broadcast(ServerMessage::PlayerList {
            players: self.player_infos(),
        })
        .await;
    }

    async fn broadcast_snapshot(&self) {
        let conn_ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for conn_id in conn_ids {
            self.send_snapshot(conn_id).await;
        }
    }

    /// Send the full authoritative snapshot to one connection.
    ///
    /// Question text visibility is per-recipient: a locked high-stakes
    /// question is readable only by its selector, an unlocked one by
    /// nobody.
    async fn send_snapshot(&self, conn_id: ConnectionId) {
        let viewer = self
            .connections
            .get(&conn_id)
            .and_then(|entry| entry.player);
        let open_question = self.open.as_ref().map(|open| {
            let selector = open.wager.as_ref().map(|w| w.selecting_player);
            let text = if !open.high_stakes {
                Some(open.text.clone())
            } else if open.wager.as_ref().map(|w| w.locked()).unwrap_or(false)
                && viewer.is_some()
                && viewer == selector
            {
                Some(open.text.clone())
            } else {
                None
            };
            OpenQuestionInfo {
                category: open.category.clone(),
                value: open.value,
                text,
                high_stakes: open.high_stakes,
                buzzer_active: open.buzzer_active(),
                buzz_owner: open.buzz_owner().map(|id| self.player_name(id)),
                excluded: open.excluded.iter().map(|id| self.player_name(*id)).collect(),
            }
        });

        let snapshot = SessionSnapshot {
            code: self.code.to_string(),
            status: self.status,
            players: self.player_infos(),
            board: self.board.as_ref().map(|b| b.client_view()),
            open_question,
            controller: self.controller.map(|id| self.player_name(id)),
            chat: self.chat.iter().cloned().collect(),
        };
        self.send_to(conn_id, ServerMessage::SessionState { state: snapshot })
            .await;
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn bound_player(&self, conn_id: ConnectionId) -> Result<&Player, GameError> {
        let player_id = self
            .connections
            .get(&conn_id)
            .and_then(|entry| entry.player)
            .ok_or(GameError::NotRegistered)?;
        self.players
            .iter()
            .find(|p| p.id == player_id)
            .ok_or(GameError::NotRegistered)
    }

    fn player_name(&self, player_id: PlayerId) -> String {
        self.players
            .iter()
            .find(|p| p.id == player_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "?".to_string())
    }

    fn player_infos(&self) -> Vec<PlayerInfo> {
        self.players
            .iter()
            .map(|p| PlayerInfo {
                name: p.name.clone(),
                score: p.score,
                is_host: p.is_host,
                connected: p.is_connected(),
            })
            .collect()
    }
}
