//! Authoritative game state (owned by the manager)

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::events::EventLog;
use super::powerup::PowerupSystem;
use super::projectile::Projectile;
use super::tank::{Tank, TankStats};
use super::terrain::GameMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Deathmatch,
    TeamDeathmatch,
    CaptureTheFlag,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameMode::Deathmatch => "deathmatch",
            GameMode::TeamDeathmatch => "team_deathmatch",
            GameMode::CaptureTheFlag => "capture_the_flag",
        };
        f.write_str(name)
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deathmatch" | "dm" => Ok(GameMode::Deathmatch),
            "team_deathmatch" | "tdm" => Ok(GameMode::TeamDeathmatch),
            "capture_the_flag" | "ctf" => Ok(GameMode::CaptureTheFlag),
            other => Err(other.to_string()),
        }
    }
}

/// Game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Map generated, waiting for start
    #[default]
    Waiting,
    Running,
    Paused,
    Finished,
}

/// Rules fixed for the lifetime of a game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSettings {
    pub mode: GameMode,
    /// Milliseconds; None disables the time limit
    pub time_limit: Option<f64>,
    /// None disables the score limit
    pub score_limit: Option<i32>,
    pub tank_stats: TankStats,
    /// Seeds spawn selection and power-up rolls
    pub seed: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            mode: GameMode::Deathmatch,
            time_limit: Some(600_000.0),
            score_limit: Some(20),
            tank_stats: TankStats::default(),
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    /// Team index in team modes
    pub team: Option<u8>,
    pub joined_at: f64,
}

pub struct GameState {
    pub game_id: String,
    pub settings: GameSettings,
    pub status: GameStatus,
    pub start_time: Option<f64>,
    /// Game clock in milliseconds, advanced only by `update`
    pub current_time: f64,
    pub tick: u64,
    pub players: BTreeMap<String, Player>,
    pub tanks: BTreeMap<String, Tank>,
    pub projectiles: BTreeMap<String, Projectile>,
    pub map: Option<GameMap>,
    pub powerups: PowerupSystem,
    pub scores: BTreeMap<String, i32>,
    pub events: EventLog,
    pub winner: Option<String>,
}

impl GameState {
    pub fn new(game_id: impl Into<String>, settings: GameSettings) -> Self {
        Self {
            game_id: game_id.into(),
            settings,
            status: GameStatus::Waiting,
            start_time: None,
            current_time: 0.0,
            tick: 0,
            players: BTreeMap::new(),
            tanks: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            map: None,
            powerups: PowerupSystem::new(),
            scores: BTreeMap::new(),
            events: EventLog::new(),
            winner: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == GameStatus::Running
    }

    pub fn is_paused(&self) -> bool {
        self.status == GameStatus::Paused
    }

    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    /// Milliseconds since `start_game`
    pub fn elapsed(&self) -> f64 {
        self.start_time.map_or(0.0, |start| self.current_time - start)
    }

    pub fn alive_count(&self) -> usize {
        self.tanks.values().filter(|t| t.is_alive()).count()
    }

    /// Highest score; ties go to the lowest id
    pub fn leader(&self) -> Option<(&String, i32)> {
        self.scores
            .iter()
            .fold(None, |best: Option<(&String, i32)>, (id, score)| match best {
                Some((_, top)) if top >= *score => best,
                _ => Some((id, *score)),
            })
    }
}
