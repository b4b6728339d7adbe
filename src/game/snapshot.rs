//! Snapshot building and stats

use serde::Serialize;

use super::events::GameEvent;
use super::powerup::{PowerupState, PowerupType};
use super::projectile::{Projectile, ProjectileType};
use super::state::{GameMode, GameState, GameStatus};
use super::tank::{ActivePowerup, Tank};
use super::terrain::GameMap;
use super::vector::Vector2D;

/// Events carried by every snapshot
pub const SNAPSHOT_EVENT_COUNT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub id: String,
    pub name: String,
    pub team: Option<u8>,
    pub score: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TankSnapshot {
    pub id: String,
    pub position: Vector2D,
    pub rotation: f32,
    pub velocity: Vector2D,
    pub health: f32,
    pub max_health: f32,
    pub fuel: f32,
    pub ammo: u32,
    pub kills: u32,
    pub deaths: u32,
    pub is_destroyed: bool,
    pub respawn_time: Option<f64>,
    pub active_powerups: Vec<ActivePowerup>,
}

impl From<&Tank> for TankSnapshot {
    fn from(t: &Tank) -> Self {
        Self {
            id: t.id.clone(),
            position: t.position,
            rotation: t.rotation,
            velocity: t.velocity,
            health: t.health,
            max_health: t.stats.max_health,
            fuel: t.fuel,
            ammo: t.ammo,
            kills: t.kills,
            deaths: t.deaths,
            is_destroyed: t.is_destroyed,
            respawn_time: t.respawn_time,
            active_powerups: t.active_powerups.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectileSnapshot {
    pub id: String,
    pub projectile_type: ProjectileType,
    pub owner_id: String,
    pub position: Vector2D,
    pub velocity: Vector2D,
    pub rotation: f32,
    pub trail: Vec<Vector2D>,
}

impl From<&Projectile> for ProjectileSnapshot {
    fn from(p: &Projectile) -> Self {
        Self {
            id: p.id.clone(),
            projectile_type: p.config.projectile_type,
            owner_id: p.owner_id.clone(),
            position: p.position,
            velocity: p.velocity,
            rotation: p.rotation,
            trail: p.trail.iter().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PowerupSnapshot {
    pub id: String,
    pub powerup_type: PowerupType,
    pub position: Vector2D,
    pub expiry_time: f64,
}

impl From<&PowerupState> for PowerupSnapshot {
    fn from(p: &PowerupState) -> Self {
        Self {
            id: p.id.clone(),
            powerup_type: p.kind,
            position: p.position,
            expiry_time: p.expiry_time,
        }
    }
}

/// Enough to fetch or regenerate the map; tile changes travel as `map_changed` events
#[derive(Debug, Clone, Serialize)]
pub struct MapReference {
    pub width: u32,
    pub height: u32,
    pub tile_size: f32,
    pub seed: u64,
    pub revision: u64,
}

impl From<&GameMap> for MapReference {
    fn from(m: &GameMap) -> Self {
        Self {
            width: m.width,
            height: m.height,
            tile_size: m.tile_size,
            seed: m.seed,
            revision: m.revision,
        }
    }
}

/// Full serialized game state for the network layer
#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshot {
    pub game_id: String,
    pub tick: u64,
    pub timestamp: f64,
    pub mode: GameMode,
    pub status: GameStatus,
    pub players: Vec<PlayerSnapshot>,
    pub tanks: Vec<TankSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub powerups: Vec<PowerupSnapshot>,
    pub scores: Vec<(String, i32)>,
    pub map: Option<MapReference>,
    pub events: Vec<GameEvent>,
}

impl GameSnapshot {
    pub fn capture(state: &GameState) -> Self {
        let players = state
            .players
            .values()
            .map(|p| PlayerSnapshot {
                id: p.id.clone(),
                name: p.name.clone(),
                team: p.team,
                score: state.scores.get(&p.id).copied().unwrap_or(0),
            })
            .collect();

        Self {
            game_id: state.game_id.clone(),
            tick: state.tick,
            timestamp: state.current_time,
            mode: state.settings.mode,
            status: state.status,
            players,
            tanks: state.tanks.values().map(TankSnapshot::from).collect(),
            projectiles: state
                .projectiles
                .values()
                .filter(|p| !p.is_destroyed)
                .map(ProjectileSnapshot::from)
                .collect(),
            powerups: state.powerups.powerups().map(PowerupSnapshot::from).collect(),
            scores: state.scores.iter().map(|(id, s)| (id.clone(), *s)).collect(),
            map: state.map.as_ref().map(MapReference::from),
            events: state.events.recent(SNAPSHOT_EVENT_COUNT),
        }
    }
}

/// Counts session ticks down to the next snapshot
pub struct SnapshotBuilder {
    interval: u32,
    countdown: u32,
}

impl SnapshotBuilder {
    pub fn new(interval: u32) -> Self {
        let interval = interval.max(1);
        Self {
            interval,
            countdown: interval,
        }
    }

    /// Call once per session tick
    pub fn should_send(&mut self) -> bool {
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            return false;
        }
        self.countdown = self.interval;
        true
    }

    /// Roster changes and game start go out on the next tick
    pub fn force_next(&mut self) {
        self.countdown = 0;
    }

    pub fn build(&self, state: &GameState) -> GameSnapshot {
        GameSnapshot::capture(state)
    }
}

/// Serialized snapshot sizes over a session
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub largest_bytes: usize,
}

impl SnapshotStats {
    pub fn record(&mut self, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;
        self.largest_bytes = self.largest_bytes.max(bytes);
    }

    pub fn avg_bytes(&self) -> f64 {
        if self.total_snapshots == 0 {
            return 0.0;
        }
        self.total_bytes as f64 / self.total_snapshots as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sends_every_interval() {
        let mut builder = SnapshotBuilder::new(3);
        let sent: Vec<bool> = (0..6).map(|_| builder.should_send()).collect();
        assert_eq!(sent, vec![false, false, true, false, false, true]);

        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn zero_interval_sends_every_tick() {
        let mut builder = SnapshotBuilder::new(0);
        assert!(builder.should_send());
        assert!(builder.should_send());
    }

    #[test]
    fn stats_track_average_and_largest() {
        let mut stats = SnapshotStats::default();
        assert_eq!(stats.avg_bytes(), 0.0);
        stats.record(100);
        stats.record(300);
        assert_eq!(stats.total_snapshots, 2);
        assert_eq!(stats.largest_bytes, 300);
        assert_eq!(stats.avg_bytes(), 200.0);
    }
}
