//! Projectiles - ballistic integration, lifetime, impact response

use std::collections::VecDeque;
use std::f32::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use super::combat::CombatSystem;
use super::vector::Vector2D;

/// Owner collisions are ignored this long after firing (ms)
pub const SELF_HIT_GRACE_MS: f64 = 100.0;
/// Downward acceleration for gravity-affected shells (units/s²)
pub const GRAVITY: f32 = 98.0;
/// Fraction of velocity lost per second to air resistance
pub const AIR_RESISTANCE: f32 = 0.02;
/// Maximum homing turn rate (radians/s)
pub const HOMING_TURN_RATE: f32 = 2.5;
/// Homing projectiles only lock onto targets this close
pub const HOMING_RANGE: f32 = 400.0;

/// Projectile types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileType {
    /// Fast point-damage round
    #[default]
    Bullet,
    /// Arcing explosive shell
    Shell,
    /// Slow homing rocket with a large blast
    Rocket,
    /// Very fast round that pierces tanks
    Plasma,
}

/// Per-type projectile parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectileConfig {
    pub projectile_type: ProjectileType,
    /// Muzzle speed (units/s)
    pub speed: f32,
    pub damage: f32,
    /// Milliseconds before the projectile expires
    pub lifetime: f64,
    pub gravity: bool,
    pub homing: bool,
    /// Blast radius; zero for point-damage weapons
    pub explosion_radius: f32,
    pub piercing: bool,
    pub trail_length: usize,
    /// Hitbox radius
    pub radius: f32,
    /// Whether the owner can be hit once the grace period passes
    pub hits_owner: bool,
}

impl ProjectileConfig {
    pub fn for_type(projectile_type: ProjectileType) -> Self {
        match projectile_type {
            ProjectileType::Bullet => Self {
                projectile_type,
                speed: 600.0,
                damage: 20.0,
                lifetime: 2000.0,
                gravity: false,
                homing: false,
                explosion_radius: 0.0,
                piercing: false,
                trail_length: 5,
                radius: 3.0,
                hits_owner: false,
            },
            ProjectileType::Shell => Self {
                projectile_type,
                speed: 450.0,
                damage: 35.0,
                lifetime: 3000.0,
                gravity: true,
                homing: false,
                explosion_radius: 40.0,
                piercing: false,
                trail_length: 8,
                radius: 5.0,
                hits_owner: false,
            },
            ProjectileType::Rocket => Self {
                projectile_type,
                speed: 350.0,
                damage: 50.0,
                lifetime: 4000.0,
                gravity: false,
                homing: true,
                explosion_radius: 80.0,
                piercing: false,
                trail_length: 12,
                radius: 6.0,
                hits_owner: false,
            },
            ProjectileType::Plasma => Self {
                projectile_type,
                speed: 800.0,
                damage: 25.0,
                lifetime: 1500.0,
                gravity: false,
                homing: false,
                explosion_radius: 0.0,
                piercing: true,
                trail_length: 6,
                radius: 4.0,
                hits_owner: false,
            },
        }
    }
}

/// What an impact did to the projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactOutcome {
    /// Collision did not apply (owner, already hit, already gone)
    Ignored,
    /// Point impact, projectile removed
    Destroyed,
    /// Area-damage detonation, projectile removed
    Exploded,
    /// Piercing round kept flying
    PassedThrough,
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: String,
    pub position: Vector2D,
    pub previous_position: Vector2D,
    pub velocity: Vector2D,
    pub rotation: f32,
    pub damage: f32,
    pub owner_id: String,
    pub creation_time: f64,
    pub is_destroyed: bool,
    pub has_exploded: bool,
    pub trail: VecDeque<Vector2D>,
    /// Tanks already damaged (piercing rounds hit each tank once)
    pub hit_tanks: Vec<String>,
    pub config: ProjectileConfig,
}

impl Projectile {
    pub fn new(
        id: String,
        origin: Vector2D,
        direction: Vector2D,
        owner_id: String,
        config: ProjectileConfig,
        creation_time: f64,
    ) -> Self {
        let mut direction = direction.normalize();
        if direction.is_zero() {
            direction = Vector2D::UNIT_X;
        }
        Self {
            id,
            position: origin,
            previous_position: origin,
            velocity: direction * config.speed,
            rotation: direction.angle(),
            damage: config.damage,
            owner_id,
            creation_time,
            is_destroyed: false,
            has_exploded: false,
            trail: VecDeque::with_capacity(config.trail_length),
            hit_tanks: Vec::new(),
            config,
        }
    }

    /// Override the preset damage (e.g. a damage-boosted shot)
    pub fn with_damage(mut self, damage: f32) -> Self {
        self.damage = damage.max(0.0);
        self
    }

    pub fn is_explosive(&self) -> bool {
        self.config.explosion_radius > 0.0
    }

    pub fn is_expired(&self, current_time: f64) -> bool {
        current_time - self.creation_time > self.config.lifetime
    }

    /// Advance one tick. `homing_target` is only used by homing projectiles.
    pub fn update(&mut self, dt: f32, current_time: f64, homing_target: Option<Vector2D>) {
        if self.is_destroyed {
            return;
        }

        if self.config.homing {
            if let Some(target) = homing_target {
                self.steer_towards(target, dt);
            }
        }
        if self.config.gravity {
            self.velocity.y += GRAVITY * dt;
        }
        let drag = self.velocity * (AIR_RESISTANCE * dt);
        self.velocity -= drag;

        self.previous_position = self.position;
        self.position += self.velocity * dt;
        if !self.velocity.is_zero() {
            self.rotation = self.velocity.angle();
        }

        self.trail.push_back(self.position);
        while self.trail.len() > self.config.trail_length {
            self.trail.pop_front();
        }

        if self.is_expired(current_time) {
            self.destroy();
        }
    }

    fn steer_towards(&mut self, target: Vector2D, dt: f32) {
        let to_target = target - self.position;
        if to_target.is_zero() || to_target.magnitude() > HOMING_RANGE || self.velocity.is_zero() {
            return;
        }
        let mut diff = (to_target.angle() - self.velocity.angle()).rem_euclid(TAU);
        if diff > PI {
            diff -= TAU;
        }
        let max_turn = HOMING_TURN_RATE * dt;
        self.velocity = self.velocity.rotate(diff.clamp(-max_turn, max_turn));
    }

    /// Owner policy: the owner is never hit unless the weapon allows it,
    /// and even then only after the self-hit grace period.
    pub fn can_hit(&self, tank_id: &str, current_time: f64) -> bool {
        if self.is_destroyed || self.hit_tanks.iter().any(|id| id == tank_id) {
            return false;
        }
        if tank_id == self.owner_id {
            return self.config.hits_owner
                && current_time - self.creation_time >= SELF_HIT_GRACE_MS;
        }
        true
    }

    pub fn on_terrain_hit(&mut self) -> ImpactOutcome {
        if self.is_destroyed {
            return ImpactOutcome::Ignored;
        }
        if self.is_explosive() {
            self.explode();
            ImpactOutcome::Exploded
        } else {
            self.destroy();
            ImpactOutcome::Destroyed
        }
    }

    pub fn on_tank_hit(&mut self, tank_id: &str, current_time: f64) -> ImpactOutcome {
        if !self.can_hit(tank_id, current_time) {
            return ImpactOutcome::Ignored;
        }
        self.hit_tanks.push(tank_id.to_string());
        self.has_exploded = true;
        if self.is_explosive() {
            self.explode();
            ImpactOutcome::Exploded
        } else if self.config.piercing {
            ImpactOutcome::PassedThrough
        } else {
            self.destroy();
            ImpactOutcome::Destroyed
        }
    }

    fn explode(&mut self) {
        self.has_exploded = true;
        self.is_destroyed = true;
    }

    pub fn destroy(&mut self) {
        self.is_destroyed = true;
    }

    /// Full damage for point weapons; linear falloff inside the blast otherwise
    pub fn calculate_damage_at_position(&self, position: Vector2D) -> f32 {
        if !self.is_explosive() {
            return self.damage;
        }
        CombatSystem::explosion_damage(
            self.damage,
            self.position,
            self.config.explosion_radius,
            position,
        )
    }
}
