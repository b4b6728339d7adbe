//! Game session task - owns a manager and drives the authoritative tick loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::util::time::{tick_delta, tick_duration, Timer, DEFAULT_SNAPSHOT_RATE, DEFAULT_TICK_RATE};

use super::events::{GameEvent, GameEventKind};
use super::manager::GameStateManager;
use super::snapshot::{GameSnapshot, SnapshotBuilder, SnapshotStats};
use super::state::GameSettings;
use super::tank::ControlUpdate;
use super::terrain::MapConfig;

const COMMAND_BUFFER: usize = 256;
const MESSAGE_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Snapshots per second
    pub snapshot_rate: u32,
    pub game: GameSettings,
    pub map: MapConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            snapshot_rate: DEFAULT_SNAPSHOT_RATE,
            game: GameSettings::default(),
            map: MapConfig::default(),
        }
    }
}

impl SessionSettings {
    fn snapshot_interval(&self) -> u32 {
        (self.tick_rate / self.snapshot_rate.max(1)).max(1)
    }
}

/// Requests accepted by a running session
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Join { player_id: String, name: String },
    Leave { player_id: String },
    Controls { player_id: String, update: ControlUpdate },
    Fire { player_id: String },
    Start,
    Pause,
    Resume,
    End { reason: String },
    Shutdown,
}

/// Messages broadcast to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionMsg {
    Snapshot {
        snapshot: Box<GameSnapshot>,
    },
    Event {
        event: GameEvent,
    },
    GameEnded {
        reason: String,
        winner: Option<String>,
        scores: Vec<(String, i32)>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Game session has shut down")]
    Closed,
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub game_id: String,
    command_tx: mpsc::Sender<SessionCommand>,
    msg_tx: broadcast::Sender<SessionMsg>,
    player_count: Arc<AtomicUsize>,
}

impl SessionHandle {
    pub async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionMsg> {
        self.msg_tx.subscribe()
    }

    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}

/// The authoritative game session
pub struct GameSession {
    manager: GameStateManager,
    settings: SessionSettings,
    command_rx: mpsc::Receiver<SessionCommand>,
    msg_tx: broadcast::Sender<SessionMsg>,
    snapshot_builder: SnapshotBuilder,
    stats: SnapshotStats,
    player_count: Arc<AtomicUsize>,
}

impl GameSession {
    /// Create a session with a freshly generated map
    pub fn new(game_id: impl Into<String>, settings: SessionSettings) -> (Self, SessionHandle) {
        let game_id = game_id.into();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (msg_tx, _) = broadcast::channel(MESSAGE_BUFFER);
        let player_count = Arc::new(AtomicUsize::new(0));

        let mut manager = GameStateManager::new(game_id.clone(), settings.game.clone());
        let events_tx = msg_tx.clone();
        manager.on_game_event(move |event| {
            // no subscribers is fine
            let _ = events_tx.send(SessionMsg::Event {
                event: event.clone(),
            });
        });
        manager.initialize_game(&settings.map);

        let handle = SessionHandle {
            game_id,
            command_tx,
            msg_tx: msg_tx.clone(),
            player_count: player_count.clone(),
        };

        let session = Self {
            manager,
            snapshot_builder: SnapshotBuilder::new(settings.snapshot_interval()),
            settings,
            command_rx,
            msg_tx,
            stats: SnapshotStats::default(),
            player_count,
        };
        (session, handle)
    }

    pub fn manager(&self) -> &GameStateManager {
        &self.manager
    }

    /// Run the tick loop until the game finishes or a shutdown is requested
    pub async fn run(mut self) {
        let game_id = self.manager.game_id().to_string();
        info!(
            game_id = %game_id,
            tick_rate = self.settings.tick_rate,
            snapshot_rate = self.settings.snapshot_rate,
            "Session started"
        );

        let dt = tick_delta(self.settings.tick_rate);
        let budget = tick_duration(self.settings.tick_rate);
        let mut tick_interval = interval(budget);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            let timer = Timer::new();

            if !self.process_commands() {
                if !self.manager.state().is_finished() {
                    self.manager.end_game("shutdown");
                }
                break;
            }

            self.manager.update(dt);

            if self.snapshot_builder.should_send() {
                self.broadcast_snapshot();
            }

            let elapsed = timer.elapsed_micros();
            if elapsed > budget.as_micros() as u64 {
                warn!(
                    game_id = %game_id,
                    tick = self.manager.state().tick,
                    elapsed_us = elapsed,
                    "Slow tick"
                );
            }

            if self.manager.state().is_finished() {
                break;
            }
        }

        self.broadcast_snapshot();
        let _ = self.msg_tx.send(self.game_ended_msg());
        info!(
            game_id = %game_id,
            snapshots = self.stats.total_snapshots,
            avg_snapshot_bytes = self.stats.avg_bytes(),
            largest_snapshot_bytes = self.stats.largest_bytes,
            "Session ended"
        );
    }

    /// Drain the command queue. Returns false once the session should stop.
    fn process_commands(&mut self) -> bool {
        loop {
            let command = match self.command_rx.try_recv() {
                Ok(command) => command,
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    info!(game_id = %self.manager.game_id(), "All handles dropped");
                    return false;
                }
            };

            match command {
                SessionCommand::Join { player_id, name } => {
                    if !self.manager.add_player(&player_id, &name) {
                        warn!(player_id = %player_id, "Player already in game");
                    }
                    self.snapshot_builder.force_next();
                }
                SessionCommand::Leave { player_id } => {
                    self.manager.remove_player(&player_id);
                    self.snapshot_builder.force_next();
                }
                SessionCommand::Controls { player_id, update } => {
                    if !self.manager.set_tank_controls(&player_id, update) {
                        debug!(player_id = %player_id, "Controls for unknown player");
                    }
                }
                SessionCommand::Fire { player_id } => {
                    self.manager.fire_tank(&player_id);
                }
                SessionCommand::Start => {
                    self.manager.start_game();
                    self.snapshot_builder.force_next();
                }
                SessionCommand::Pause => {
                    self.manager.pause_game();
                }
                SessionCommand::Resume => {
                    self.manager.resume_game();
                }
                SessionCommand::End { reason } => {
                    self.manager.end_game(&reason);
                }
                SessionCommand::Shutdown => return false,
            }
            self.player_count
                .store(self.manager.state().players.len(), Ordering::Relaxed);
        }
    }

    fn broadcast_snapshot(&mut self) {
        let snapshot = self.snapshot_builder.build(self.manager.state());
        match serde_json::to_vec(&snapshot) {
            Ok(bytes) => self.stats.record(bytes.len()),
            Err(err) => warn!(error = %err, "Failed to size snapshot"),
        }
        let _ = self.msg_tx.send(SessionMsg::Snapshot {
            snapshot: Box::new(snapshot),
        });
    }

    fn game_ended_msg(&self) -> SessionMsg {
        let state = self.manager.state();
        let reason = state
            .events
            .iter()
            .rev()
            .find_map(|e| match &e.kind {
                GameEventKind::GameEnded { reason, .. } => Some(reason.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "shutdown".to_string());

        SessionMsg::GameEnded {
            reason,
            winner: state.winner.clone(),
            scores: state.scores.iter().map(|(id, s)| (id.clone(), *s)).collect(),
        }
    }
}
