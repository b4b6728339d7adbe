//! Power-ups - spawn-point scheduling, rarity-weighted selection, collection

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::vector::Vector2D;

/// Pickup radius used for the physics trigger body
pub const POWERUP_RADIUS: f32 = 15.0;
/// Uncollected power-ups vanish after this long (ms)
pub const POWERUP_LIFETIME_MS: f64 = 30_000.0;
/// Default per-spawn-point cooldown (ms)
pub const DEFAULT_SPAWN_COOLDOWN_MS: f64 = 15_000.0;
/// A spawn point stays idle while a collectible power-up lies this close
pub const MIN_POWERUP_SEPARATION: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn weight(self) -> u32 {
        match self {
            Rarity::Common => 50,
            Rarity::Uncommon => 25,
            Rarity::Rare => 15,
            Rarity::Epic => 8,
            Rarity::Legendary => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerupType {
    HealthPack,
    AmmoPack,
    FuelPack,
    SpeedBoost,
    RapidFire,
    Armor,
    DamageBoost,
    Invincibility,
}

impl PowerupType {
    pub const ALL: [PowerupType; 8] = [
        PowerupType::HealthPack,
        PowerupType::AmmoPack,
        PowerupType::FuelPack,
        PowerupType::SpeedBoost,
        PowerupType::RapidFire,
        PowerupType::Armor,
        PowerupType::DamageBoost,
        PowerupType::Invincibility,
    ];

    pub fn rarity(self) -> Rarity {
        match self {
            PowerupType::HealthPack | PowerupType::AmmoPack | PowerupType::FuelPack => Rarity::Common,
            PowerupType::SpeedBoost | PowerupType::RapidFire => Rarity::Uncommon,
            PowerupType::Armor => Rarity::Rare,
            PowerupType::DamageBoost => Rarity::Epic,
            PowerupType::Invincibility => Rarity::Legendary,
        }
    }

    /// Timed effects stay on the tank; the rest apply instantly
    pub fn is_timed(self) -> bool {
        !matches!(
            self,
            PowerupType::HealthPack | PowerupType::AmmoPack | PowerupType::FuelPack
        )
    }
}

/// What a power-up does once collected
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerupEffect {
    pub kind: PowerupType,
    /// Milliseconds; zero for instant effects
    pub duration: f64,
    pub multiplier: Option<f32>,
    pub amount: Option<f32>,
}

impl PowerupEffect {
    pub fn for_type(kind: PowerupType) -> Self {
        let (duration, multiplier, amount) = match kind {
            PowerupType::HealthPack => (0.0, None, Some(50.0)),
            PowerupType::AmmoPack => (0.0, None, Some(20.0)),
            PowerupType::FuelPack => (0.0, None, Some(50.0)),
            PowerupType::SpeedBoost => (10_000.0, Some(1.5), None),
            PowerupType::RapidFire => (8_000.0, Some(2.0), None),
            PowerupType::Armor => (15_000.0, Some(0.5), None),
            PowerupType::DamageBoost => (10_000.0, Some(1.5), None),
            PowerupType::Invincibility => (5_000.0, Some(0.0), None),
        };
        Self {
            kind,
            duration,
            multiplier,
            amount,
        }
    }
}

/// A power-up lying on the map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerupState {
    pub id: String,
    pub kind: PowerupType,
    pub position: Vector2D,
    pub spawn_time: f64,
    pub expiry_time: f64,
    pub effect: PowerupEffect,
    pub is_collected: bool,
    #[serde(skip)]
    pub spawn_point: Option<usize>,
}

impl PowerupState {
    pub fn is_collectible(&self, current_time: f64) -> bool {
        !self.is_collected && current_time < self.expiry_time
    }
}

#[derive(Debug, Clone)]
pub struct PowerupSpawnPoint {
    pub position: Vector2D,
    /// Milliseconds between spawns
    pub cooldown: f64,
    /// Empty means every type
    pub allowed_types: Vec<PowerupType>,
    pub last_spawn_time: Option<f64>,
}

impl PowerupSpawnPoint {
    pub fn new(position: Vector2D) -> Self {
        Self {
            position,
            cooldown: DEFAULT_SPAWN_COOLDOWN_MS,
            allowed_types: Vec::new(),
            last_spawn_time: None,
        }
    }

    pub fn with_cooldown(mut self, cooldown: f64) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_types(mut self, types: Vec<PowerupType>) -> Self {
        self.allowed_types = types;
        self
    }

    fn is_ready(&self, current_time: f64) -> bool {
        self.last_spawn_time
            .map_or(true, |last| current_time - last >= self.cooldown)
    }
}

/// Receives collected power-ups
pub trait PowerupListener {
    fn on_powerup_applied(&mut self, collector_id: &str, powerup: &PowerupState);
}

impl<F> PowerupListener for F
where
    F: FnMut(&str, &PowerupState),
{
    fn on_powerup_applied(&mut self, collector_id: &str, powerup: &PowerupState) {
        self(collector_id, powerup)
    }
}

/// Rarity-weighted draw over `allowed` (every type when empty)
pub fn pick_weighted<R: Rng + ?Sized>(allowed: &[PowerupType], rng: &mut R) -> PowerupType {
    let pool: &[PowerupType] = if allowed.is_empty() { &PowerupType::ALL } else { allowed };
    let total: u32 = pool.iter().map(|t| t.rarity().weight()).sum();
    let mut roll = rng.gen_range(0..total);
    for kind in pool {
        let weight = kind.rarity().weight();
        if roll < weight {
            return *kind;
        }
        roll -= weight;
    }
    pool[pool.len() - 1]
}

#[derive(Debug, Default)]
pub struct PowerupSystem {
    spawn_points: Vec<PowerupSpawnPoint>,
    powerups: BTreeMap<String, PowerupState>,
    next_id: u64,
}

impl PowerupSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_spawn_point(&mut self, point: PowerupSpawnPoint) -> usize {
        self.spawn_points.push(point);
        self.spawn_points.len() - 1
    }

    pub fn spawn_points(&self) -> &[PowerupSpawnPoint] {
        &self.spawn_points
    }

    pub fn powerups(&self) -> impl Iterator<Item = &PowerupState> {
        self.powerups.values()
    }

    pub fn get(&self, id: &str) -> Option<&PowerupState> {
        self.powerups.get(id)
    }

    pub fn len(&self) -> usize {
        self.powerups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.powerups.is_empty()
    }

    pub fn clear(&mut self) {
        self.powerups.clear();
        for point in &mut self.spawn_points {
            point.last_spawn_time = None;
        }
    }

    /// Expire stale power-ups and spawn at every ready spawn point.
    /// Returns the ids spawned this call.
    pub fn update<R: Rng + ?Sized>(&mut self, current_time: f64, rng: &mut R) -> Vec<String> {
        self.powerups.retain(|_, p| p.is_collectible(current_time));

        let mut spawned = Vec::new();
        for index in 0..self.spawn_points.len() {
            let point = &self.spawn_points[index];
            if !point.is_ready(current_time) || self.is_occupied(point.position, current_time) {
                continue;
            }
            let kind = pick_weighted(&point.allowed_types, rng);
            let position = point.position;
            let id = self.insert(kind, position, current_time, Some(index));
            self.spawn_points[index].last_spawn_time = Some(current_time);
            spawned.push(id);
        }
        spawned
    }

    fn is_occupied(&self, position: Vector2D, current_time: f64) -> bool {
        let limit = MIN_POWERUP_SEPARATION * MIN_POWERUP_SEPARATION;
        self.powerups
            .values()
            .any(|p| p.is_collectible(current_time) && p.position.distance_squared(position) < limit)
    }

    fn insert(&mut self, kind: PowerupType, position: Vector2D, now: f64, spawn_point: Option<usize>) -> String {
        self.next_id += 1;
        let id = format!("powerup_{}", self.next_id);
        self.powerups.insert(
            id.clone(),
            PowerupState {
                id: id.clone(),
                kind,
                position,
                spawn_time: now,
                expiry_time: now + POWERUP_LIFETIME_MS,
                effect: PowerupEffect::for_type(kind),
                is_collected: false,
                spawn_point,
            },
        );
        id
    }

    pub fn spawn_powerup(&mut self, kind: PowerupType, position: Vector2D, current_time: f64) -> String {
        self.insert(kind, position, current_time, None)
    }

    /// Collect the closest power-up within `radius` of `position`.
    /// Ties go to the lower id.
    pub fn try_collect_powerup(
        &mut self,
        position: Vector2D,
        collector_id: &str,
        radius: f32,
        listener: &mut dyn PowerupListener,
    ) -> Option<PowerupState> {
        let limit = radius * radius;
        let id = self
            .powerups
            .values()
            .filter(|p| !p.is_collected)
            .map(|p| (p.position.distance_squared(position), &p.id))
            .filter(|(d, _)| *d <= limit)
            .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)))
            .map(|(_, id)| id.clone())?;

        let mut powerup = self.powerups.remove(&id)?;
        powerup.is_collected = true;
        listener.on_powerup_applied(collector_id, &powerup);
        Some(powerup)
    }
}
