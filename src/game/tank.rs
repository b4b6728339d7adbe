//! Tank entity - movement, fuel, firing, damage, power-ups, respawn

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use super::combat::CombatSystem;
use super::powerup::{PowerupEffect, PowerupType};
use super::projectile::{ProjectileConfig, ProjectileType};
use super::vector::Vector2D;

/// Chip damage dealt to both tanks when they ram each other
pub const RAM_DAMAGE: f32 = 5.0;
/// Minimum time between two ram damage applications to the same tank (ms)
pub const RAM_DAMAGE_COOLDOWN_MS: f64 = 500.0;
/// Muzzle distance beyond the hull radius
pub const BARREL_LENGTH: f32 = 15.0;
/// Per-tick angular velocity decay when no turn control is held
const TURN_DECAY: f32 = 0.8;
/// Per-tick velocity multiplier while braking
const BRAKE_FACTOR: f32 = 0.9;
/// Below this speed the tank is considered stationary for fuel use
const MOVING_SPEED: f32 = 1.0;

/// Tank tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TankStats {
    pub max_health: f32,
    pub fuel_capacity: f32,
    pub starting_ammo: u32,
    /// Milliseconds between shots
    pub reload_time: f64,
    /// Forward acceleration (units/s²)
    pub acceleration: f32,
    /// Reverse thrust as a fraction of forward
    pub reverse_factor: f32,
    pub max_speed: f32,
    /// Turn rate in radians per second
    pub turn_speed: f32,
    /// Per-tick velocity retention
    pub drag: f32,
    pub collision_radius: f32,
    pub mass: f32,
    /// Fuel burned per world unit travelled
    pub fuel_per_unit: f32,
    /// Backward impulse applied on firing
    pub recoil: f32,
    pub bounciness: f32,
    /// Milliseconds from destruction to automatic respawn
    pub respawn_delay: f64,
    pub weapon: ProjectileType,
}

impl Default for TankStats {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            fuel_capacity: 100.0,
            starting_ammo: 50,
            reload_time: 500.0,
            acceleration: 300.0,
            reverse_factor: 0.6,
            max_speed: 200.0,
            turn_speed: 3.0,
            drag: 0.95,
            collision_radius: 20.0,
            mass: 10.0,
            fuel_per_unit: 0.01,
            recoil: 30.0,
            bounciness: 0.3,
            respawn_delay: 3000.0,
            weapon: ProjectileType::Bullet,
        }
    }
}

/// Held control inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlState {
    pub forward: bool,
    pub backward: bool,
    pub turn_left: bool,
    pub turn_right: bool,
    pub fire: bool,
    pub brake: bool,
}

/// Partial control update; `None` leaves the current value untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlUpdate {
    pub forward: Option<bool>,
    pub backward: Option<bool>,
    pub turn_left: Option<bool>,
    pub turn_right: Option<bool>,
    pub fire: Option<bool>,
    pub brake: Option<bool>,
}

impl ControlUpdate {
    pub fn apply_to(&self, controls: &mut ControlState) {
        let fields = [
            (self.forward, &mut controls.forward),
            (self.backward, &mut controls.backward),
            (self.turn_left, &mut controls.turn_left),
            (self.turn_right, &mut controls.turn_right),
            (self.fire, &mut controls.fire),
            (self.brake, &mut controls.brake),
        ];
        for (update, slot) in fields {
            if let Some(value) = update {
                *slot = value;
            }
        }
    }
}

/// A timed power-up effect currently on a tank
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActivePowerup {
    pub kind: PowerupType,
    pub end_time: f64,
    pub multiplier: Option<f32>,
}

/// A successful shot, handed to the manager to spawn a projectile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireCommand {
    pub position: Vector2D,
    pub direction: Vector2D,
    pub damage: f32,
    pub projectile_type: ProjectileType,
}

#[derive(Debug, Clone)]
pub struct Tank {
    pub id: String,
    pub position: Vector2D,
    pub rotation: f32,
    pub velocity: Vector2D,
    pub angular_velocity: f32,
    pub health: f32,
    pub fuel: f32,
    pub ammo: u32,
    pub last_fire_time: Option<f64>,
    pub active_powerups: Vec<ActivePowerup>,
    pub kills: u32,
    pub deaths: u32,
    pub is_destroyed: bool,
    pub respawn_time: Option<f64>,
    pub spawn_position: Vector2D,
    pub controls: ControlState,
    pub last_damage_source: Option<String>,
    last_ram_damage_time: Option<f64>,
    pub stats: TankStats,
}

impl Tank {
    pub fn new(id: impl Into<String>, spawn_position: Vector2D, stats: TankStats) -> Self {
        Self {
            id: id.into(),
            position: spawn_position,
            rotation: 0.0,
            velocity: Vector2D::ZERO,
            angular_velocity: 0.0,
            health: stats.max_health,
            fuel: stats.fuel_capacity,
            ammo: stats.starting_ammo,
            last_fire_time: None,
            active_powerups: Vec::new(),
            kills: 0,
            deaths: 0,
            is_destroyed: false,
            respawn_time: None,
            spawn_position,
            controls: ControlState::default(),
            last_damage_source: None,
            last_ram_damage_time: None,
            stats,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.is_destroyed
    }

    pub fn speed(&self) -> f32 {
        self.velocity.magnitude()
    }

    pub fn collision_radius(&self) -> f32 {
        self.stats.collision_radius
    }

    /// Multiplier of an active timed power-up, 1.0 when absent
    pub fn powerup_multiplier(&self, kind: PowerupType) -> f32 {
        self.active_powerups
            .iter()
            .find(|p| p.kind == kind)
            .and_then(|p| p.multiplier)
            .unwrap_or(1.0)
    }

    pub fn has_powerup(&self, kind: PowerupType) -> bool {
        self.active_powerups.iter().any(|p| p.kind == kind)
    }

    pub fn speed_multiplier(&self) -> f32 {
        self.powerup_multiplier(PowerupType::SpeedBoost)
    }

    /// Fraction of incoming damage actually taken
    pub fn armor_multiplier(&self) -> f32 {
        self.powerup_multiplier(PowerupType::Armor)
            * self.powerup_multiplier(PowerupType::Invincibility)
    }

    pub fn damage_multiplier(&self) -> f32 {
        self.powerup_multiplier(PowerupType::DamageBoost)
    }

    /// Current reload time, shortened by rapid fire
    pub fn reload_time(&self) -> f64 {
        let rapid = self.powerup_multiplier(PowerupType::RapidFire).max(f32::EPSILON);
        self.stats.reload_time / rapid as f64
    }

    pub fn is_respawn_due(&self, current_time: f64) -> bool {
        self.is_destroyed && self.respawn_time.is_some_and(|t| current_time >= t)
    }

    /// Advance one tick. Returns true if the tank respawned automatically.
    pub fn update(&mut self, dt: f32, current_time: f64) -> bool {
        if self.is_destroyed {
            if self.is_respawn_due(current_time) {
                self.respawn(self.spawn_position);
                return true;
            }
            return false;
        }

        self.active_powerups.retain(|p| p.end_time > current_time);

        let boost = self.speed_multiplier();
        let heading = Vector2D::from_angle(self.rotation);

        if self.fuel > 0.0 {
            let mut thrust = 0.0;
            if self.controls.forward {
                thrust += self.stats.acceleration;
            }
            if self.controls.backward {
                thrust -= self.stats.acceleration * self.stats.reverse_factor;
            }
            self.velocity += heading * (thrust * boost * dt);
        }

        match (self.controls.turn_left, self.controls.turn_right) {
            (true, false) => self.angular_velocity = -self.stats.turn_speed,
            (false, true) => self.angular_velocity = self.stats.turn_speed,
            _ => {
                self.angular_velocity *= TURN_DECAY;
                if self.angular_velocity.abs() < 1e-3 {
                    self.angular_velocity = 0.0;
                }
            }
        }
        self.rotation = (self.rotation + self.angular_velocity * dt).rem_euclid(TAU);

        if self.controls.brake {
            self.velocity *= BRAKE_FACTOR;
        }
        self.velocity *= self.stats.drag;
        self.velocity = self.velocity.clamp_magnitude(self.stats.max_speed * boost);
        self.position += self.velocity * dt;

        let speed = self.speed();
        if speed > MOVING_SPEED {
            self.fuel = (self.fuel - speed * self.stats.fuel_per_unit * dt).max(0.0);
        }
        false
    }

    fn reload_ready(&self, current_time: f64) -> bool {
        self.last_fire_time
            .map_or(true, |last| current_time - last >= self.reload_time())
    }

    pub fn can_fire(&self, current_time: f64) -> bool {
        !self.is_destroyed && self.ammo > 0 && self.reload_ready(current_time)
    }

    pub fn fire(&mut self, current_time: f64) -> Option<FireCommand> {
        if !self.can_fire(current_time) {
            return None;
        }

        self.ammo -= 1;
        self.last_fire_time = Some(current_time);

        let direction = Vector2D::from_angle(self.rotation);
        let position = self.position + direction * (self.stats.collision_radius + BARREL_LENGTH);
        self.velocity -= direction * self.stats.recoil;

        let base = ProjectileConfig::for_type(self.stats.weapon).damage;
        Some(FireCommand {
            position,
            direction,
            damage: CombatSystem::calculate_damage(base, self.damage_multiplier()),
            projectile_type: self.stats.weapon,
        })
    }

    /// Returns true exactly once per death: when this call destroyed the tank
    pub fn take_damage(&mut self, amount: f32, source: Option<&str>, current_time: f64) -> bool {
        if self.is_destroyed {
            return false;
        }

        let (health, dead) = CombatSystem::apply_damage(self.health, amount * self.armor_multiplier());
        self.health = health;
        if let Some(source) = source {
            self.last_damage_source = Some(source.to_string());
        }
        if dead {
            self.destroy(current_time);
        }
        dead
    }

    fn destroy(&mut self, current_time: f64) {
        self.health = 0.0;
        self.is_destroyed = true;
        self.deaths += 1;
        self.respawn_time = Some(current_time + self.stats.respawn_delay);
        self.velocity = Vector2D::ZERO;
        self.angular_velocity = 0.0;
        self.controls = ControlState::default();
    }

    /// Back to full resources at `position`
    pub fn respawn(&mut self, position: Vector2D) {
        self.position = position;
        self.spawn_position = position;
        self.velocity = Vector2D::ZERO;
        self.angular_velocity = 0.0;
        self.health = self.stats.max_health;
        self.fuel = self.stats.fuel_capacity;
        self.ammo = self.stats.starting_ammo;
        self.active_powerups.clear();
        self.is_destroyed = false;
        self.respawn_time = None;
        self.last_fire_time = None;
        self.last_damage_source = None;
    }

    /// Bounce off terrain. `normal` points from the tank toward the wall.
    pub fn on_terrain_contact(&mut self, normal: Vector2D) {
        let into_wall = self.velocity.dot(normal);
        if into_wall > 0.0 {
            self.velocity -= normal * (into_wall * (1.0 + self.stats.bounciness));
        }
    }

    /// Ram chip damage; returns true if it destroyed this tank
    pub fn on_tank_contact(&mut self, other_id: &str, current_time: f64) -> bool {
        if self.is_destroyed {
            return false;
        }
        if self
            .last_ram_damage_time
            .is_some_and(|t| current_time - t < RAM_DAMAGE_COOLDOWN_MS)
        {
            return false;
        }
        self.last_ram_damage_time = Some(current_time);
        self.take_damage(RAM_DAMAGE, Some(other_id), current_time)
    }

    /// Apply a collected power-up. Timed effects of the same kind are refreshed.
    pub fn apply_powerup(&mut self, effect: &PowerupEffect, current_time: f64) {
        if self.is_destroyed {
            return;
        }
        let amount = effect.amount.unwrap_or(0.0).max(0.0);
        match effect.kind {
            PowerupType::HealthPack => {
                self.health = (self.health + amount).min(self.stats.max_health);
            }
            PowerupType::AmmoPack => {
                self.ammo = (self.ammo + amount as u32).min(self.stats.starting_ammo);
            }
            PowerupType::FuelPack => {
                self.fuel = (self.fuel + amount).min(self.stats.fuel_capacity);
            }
            kind => {
                self.active_powerups.retain(|p| p.kind != kind);
                self.active_powerups.push(ActivePowerup {
                    kind,
                    end_time: current_time + effect.duration,
                    multiplier: effect.multiplier,
                });
            }
        }
    }
}
