//! Combat math - damage application, explosion falloff, hit records

use super::vector::Vector2D;

/// Combat helpers shared by tanks, projectiles and the manager
pub struct CombatSystem;

impl CombatSystem {
    /// Linear falloff factor in [0, 1]; zero at and beyond `radius`
    pub fn falloff(distance: f32, radius: f32) -> f32 {
        if radius <= 0.0 {
            return 0.0;
        }
        (1.0 - distance / radius).clamp(0.0, 1.0)
    }

    /// Damage dealt by a blast of `base_damage` centered at `center`
    pub fn explosion_damage(base_damage: f32, center: Vector2D, radius: f32, target: Vector2D) -> f32 {
        base_damage * Self::falloff(center.distance(target), radius)
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = (current_health - damage.max(0.0)).max(0.0);
        (new_health, new_health <= 0.0)
    }

    /// Base damage with an optional multiplier (power-ups)
    pub fn calculate_damage(base_damage: f32, multiplier: f32) -> f32 {
        (base_damage * multiplier).max(0.0)
    }
}

/// Hit result from combat resolution
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub projectile_id: String,
    pub shooter_id: String,
    pub target_id: String,
    pub damage: f32,
    pub position: Vector2D,
    pub target_killed: bool,
}
