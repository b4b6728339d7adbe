//! Game events and the bounded event log

use std::collections::VecDeque;

use serde::Serialize;

use super::powerup::PowerupType;
use super::terrain::GridPos;
use super::vector::Vector2D;

/// Most recent events kept by the log
pub const MAX_EVENTS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEventKind {
    PlayerJoined {
        player_id: String,
        name: String,
    },
    PlayerLeft {
        player_id: String,
    },
    TankDestroyed {
        tank_id: String,
        /// None for environmental or self-inflicted deaths
        killer_id: Option<String>,
        position: Vector2D,
    },
    TankRespawned {
        tank_id: String,
        position: Vector2D,
    },
    ProjectileFired {
        projectile_id: String,
        owner_id: String,
        position: Vector2D,
    },
    PowerupCollected {
        powerup_id: String,
        collector_id: String,
        powerup_type: PowerupType,
    },
    GameStarted,
    GameEnded {
        reason: String,
        winner: Option<String>,
    },
    ScoreChanged {
        player_id: String,
        score: i32,
    },
    MapChanged {
        destroyed_tiles: Vec<GridPos>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameEvent {
    /// Game clock in milliseconds
    pub timestamp: f64,
    #[serde(flatten)]
    pub kind: GameEventKind,
}

impl GameEvent {
    pub fn new(timestamp: f64, kind: GameEventKind) -> Self {
        Self { timestamp, kind }
    }
}

#[derive(Debug, Default)]
pub struct EventLog {
    events: VecDeque<GameEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: GameEvent) {
        if self.events.len() == MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &GameEvent> {
        self.events.iter()
    }

    /// Last `n` events, oldest first
    pub fn recent(&self, n: usize) -> Vec<GameEvent> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
