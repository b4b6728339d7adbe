//! Game state manager - lifecycle, players, the ordered tick and contact routing

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::combat::{CombatSystem, HitResult};
use super::events::{GameEvent, GameEventKind};
use super::physics::{BodyKind, Contact, PhysicsBody, PhysicsWorld};
use super::powerup::{PowerupSpawnPoint, PowerupState, PowerupType, POWERUP_RADIUS};
use super::projectile::{ImpactOutcome, Projectile, ProjectileConfig};
use super::snapshot::GameSnapshot;
use super::state::{GameMode, GameSettings, GameState, GameStatus, Player};
use super::tank::{ControlUpdate, Tank};
use super::terrain::{GameMap, GridPos, MapConfig, TerrainGenerator};
use super::vector::Vector2D;
use super::GameRng;

/// Spawn points with a living tank this many collision radii away are avoided
const SPAWN_CLEARANCE_RADII: f32 = 3.0;
/// Splash reaches this many explosion radii from the blast
const SPLASH_RANGE_FACTOR: f32 = 2.0;

pub type EventListener = Box<dyn FnMut(&GameEvent) + Send>;

/// Owns the authoritative state and advances it one tick at a time
pub struct GameStateManager {
    state: GameState,
    physics: PhysicsWorld,
    rng: GameRng,
    listeners: Vec<EventListener>,
    next_projectile_id: u64,
    /// Hits resolved during the last tick
    hits: Vec<HitResult>,
}

impl GameStateManager {
    pub fn new(game_id: impl Into<String>, settings: GameSettings) -> Self {
        let rng = GameRng::seed_from_u64(settings.seed);
        Self {
            state: GameState::new(game_id, settings),
            physics: PhysicsWorld::default(),
            rng,
            listeners: Vec::new(),
            next_projectile_id: 0,
            hits: Vec::new(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn game_id(&self) -> &str {
        &self.state.game_id
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn map(&self) -> Option<&GameMap> {
        self.state.map.as_ref()
    }

    pub fn tank(&self, id: &str) -> Option<&Tank> {
        self.state.tanks.get(id)
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.state.players.get(id)
    }

    pub fn score(&self, id: &str) -> Option<i32> {
        self.state.scores.get(id).copied()
    }

    pub fn hits_last_tick(&self) -> &[HitResult] {
        &self.hits
    }

    /// Listeners run synchronously for every event, in registration order
    pub fn on_game_event<F>(&mut self, listener: F)
    where
        F: FnMut(&GameEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, kind: GameEventKind) {
        let event = GameEvent::new(self.state.current_time, kind);
        for listener in &mut self.listeners {
            listener(&event);
        }
        self.state.events.push(event);
    }

    // ---- Lifecycle ----

    /// Generate the arena and register its power-up spawns and wall bodies
    pub fn initialize_game(&mut self, map_config: &MapConfig) {
        let map = TerrainGenerator::generate(map_config);

        self.state.projectiles.clear();
        self.state.powerups = Default::default();
        for position in map.powerup_positions() {
            self.state
                .powerups
                .register_spawn_point(PowerupSpawnPoint::new(position));
        }

        self.physics = PhysicsWorld::default();
        for body in map.wall_bodies() {
            self.physics.add_body(body);
        }

        info!(
            game_id = %self.state.game_id,
            width = map.width,
            height = map.height,
            seed = map.seed,
            spawns = map.spawn_points.len(),
            "Game initialized"
        );

        self.state.map = Some(map);
        self.state.status = GameStatus::Waiting;
        self.sync_bodies();
    }

    pub fn start_game(&mut self) {
        if matches!(self.state.status, GameStatus::Running | GameStatus::Paused) {
            return;
        }
        if self.state.map.is_none() {
            self.initialize_game(&MapConfig::default());
        }

        self.state.status = GameStatus::Running;
        self.state.start_time = Some(self.state.current_time);
        self.state.winner = None;
        self.state.projectiles.clear();
        for score in self.state.scores.values_mut() {
            *score = 0;
        }

        let ids: Vec<String> = self.state.tanks.keys().cloned().collect();
        for id in ids {
            let spawn = self.choose_spawn();
            if let Some(tank) = self.state.tanks.get_mut(&id) {
                tank.respawn(spawn);
                tank.kills = 0;
                tank.deaths = 0;
            }
        }
        self.sync_bodies();

        info!(
            game_id = %self.state.game_id,
            mode = %self.state.settings.mode,
            players = self.state.players.len(),
            "Game started"
        );
        self.emit(GameEventKind::GameStarted);
    }

    pub fn pause_game(&mut self) -> bool {
        if self.state.status != GameStatus::Running {
            return false;
        }
        self.state.status = GameStatus::Paused;
        info!(game_id = %self.state.game_id, "Game paused");
        true
    }

    pub fn resume_game(&mut self) -> bool {
        if self.state.status != GameStatus::Paused {
            return false;
        }
        self.state.status = GameStatus::Running;
        info!(game_id = %self.state.game_id, "Game resumed");
        true
    }

    pub fn end_game(&mut self, reason: &str) {
        if self.state.status == GameStatus::Finished {
            return;
        }
        self.state.status = GameStatus::Finished;
        let winner = self.state.leader().map(|(id, _)| id.clone());
        self.state.winner = winner.clone();

        info!(
            game_id = %self.state.game_id,
            reason,
            winner = ?winner,
            elapsed_ms = self.state.elapsed(),
            "Game ended"
        );
        self.emit(GameEventKind::GameEnded {
            reason: reason.to_string(),
            winner,
        });
    }

    // ---- Players ----

    /// Returns false if the id is already taken
    pub fn add_player(&mut self, id: &str, name: &str) -> bool {
        if self.state.players.contains_key(id) {
            return false;
        }

        let team = match self.state.settings.mode {
            GameMode::Deathmatch => None,
            GameMode::TeamDeathmatch | GameMode::CaptureTheFlag => {
                Some((self.state.players.len() % 2) as u8)
            }
        };
        self.state.players.insert(
            id.to_string(),
            Player {
                id: id.to_string(),
                name: name.to_string(),
                team,
                joined_at: self.state.current_time,
            },
        );
        self.state.scores.insert(id.to_string(), 0);

        let spawn = self.choose_spawn();
        let tank = Tank::new(id, spawn, self.state.settings.tank_stats);
        self.physics.add_body(tank_body(&tank));
        self.state.tanks.insert(id.to_string(), tank);

        info!(game_id = %self.state.game_id, player_id = %id, name, "Player joined");
        self.emit(GameEventKind::PlayerJoined {
            player_id: id.to_string(),
            name: name.to_string(),
        });
        true
    }

    pub fn remove_player(&mut self, id: &str) -> bool {
        if self.state.players.remove(id).is_none() {
            return false;
        }
        self.state.scores.remove(id);
        self.state.tanks.remove(id);
        self.physics.remove_body(&BodyKind::Tank(id.to_string()));

        info!(game_id = %self.state.game_id, player_id = %id, "Player left");
        self.emit(GameEventKind::PlayerLeft {
            player_id: id.to_string(),
        });
        true
    }

    pub fn set_tank_controls(&mut self, player_id: &str, update: ControlUpdate) -> bool {
        match self.state.tanks.get_mut(player_id) {
            Some(tank) => {
                update.apply_to(&mut tank.controls);
                true
            }
            None => false,
        }
    }

    /// One-off shot outside the held fire control. Returns the projectile id.
    pub fn fire_tank(&mut self, player_id: &str) -> Option<String> {
        if !self.state.is_running() {
            return None;
        }
        self.spawn_projectile(player_id)
    }

    /// Place a power-up directly, bypassing spawn points
    pub fn spawn_powerup(&mut self, kind: PowerupType, position: Vector2D) -> String {
        let id = self
            .state
            .powerups
            .spawn_powerup(kind, position, self.state.current_time);
        self.physics
            .add_body(PhysicsBody::powerup(&id, position, POWERUP_RADIUS));
        id
    }

    pub fn serialize(&self) -> GameSnapshot {
        GameSnapshot::capture(&self.state)
    }

    // ---- Tick ----

    /// Advance the game by `dt` seconds. No-op unless running.
    pub fn update(&mut self, dt: f32) {
        if self.state.status != GameStatus::Running || !dt.is_finite() || dt <= 0.0 {
            return;
        }
        self.hits.clear();
        self.state.current_time += dt as f64 * 1000.0;
        self.state.tick += 1;
        let now = self.state.current_time;

        self.process_respawns(now);
        self.process_fire_controls();
        self.update_tanks(dt, now);
        self.update_projectiles(dt, now);
        self.sync_bodies();

        let contacts = self.physics.step(dt);
        self.write_back_tanks();
        self.route_contacts(contacts);
        self.drop_destroyed_projectiles();

        self.state.powerups.update(now, &mut self.rng);
        self.sync_powerup_bodies();
        self.collect_powerups();

        self.check_win_conditions();
    }

    fn process_respawns(&mut self, now: f64) {
        let due: Vec<String> = self
            .state
            .tanks
            .values()
            .filter(|t| t.is_respawn_due(now))
            .map(|t| t.id.clone())
            .collect();

        for id in due {
            let spawn = self.choose_spawn();
            let Some(tank) = self.state.tanks.get_mut(&id) else {
                continue;
            };
            tank.respawn(spawn);
            self.physics.add_body(tank_body(tank));
            debug!(game_id = %self.state.game_id, tank_id = %id, "Tank respawned");
            self.emit(GameEventKind::TankRespawned {
                tank_id: id,
                position: spawn,
            });
        }
    }

    fn process_fire_controls(&mut self) {
        let firing: Vec<String> = self
            .state
            .tanks
            .values()
            .filter(|t| t.is_alive() && t.controls.fire)
            .map(|t| t.id.clone())
            .collect();
        for id in firing {
            self.spawn_projectile(&id);
        }
    }

    fn spawn_projectile(&mut self, tank_id: &str) -> Option<String> {
        let now = self.state.current_time;
        let command = self.state.tanks.get_mut(tank_id)?.fire(now)?;

        self.next_projectile_id += 1;
        let id = format!("proj_{}", self.next_projectile_id);
        let config = ProjectileConfig::for_type(command.projectile_type);
        let projectile = Projectile::new(
            id.clone(),
            command.position,
            command.direction,
            tank_id.to_string(),
            config,
            now,
        )
        .with_damage(command.damage);

        self.physics.add_body(PhysicsBody::projectile(
            &id,
            projectile.position,
            projectile.velocity,
            config.radius,
        ));
        self.state.projectiles.insert(id.clone(), projectile);

        self.emit(GameEventKind::ProjectileFired {
            projectile_id: id.clone(),
            owner_id: tank_id.to_string(),
            position: command.position,
        });
        Some(id)
    }

    fn update_tanks(&mut self, dt: f32, now: f64) {
        let mut respawned = Vec::new();
        for tank in self.state.tanks.values_mut() {
            let before = tank.position;
            if tank.update(dt, now) {
                respawned.push((tank.id.clone(), tank.position));
                continue;
            }
            if tank.is_destroyed {
                continue;
            }

            let slow = self
                .state
                .map
                .as_ref()
                .and_then(|m| m.tile_at(tank.position))
                .map_or(1.0, |tile| tile.slow_factor);
            if slow < 1.0 {
                tank.position = before + (tank.position - before) * slow;
                let cap = tank.stats.max_speed * tank.speed_multiplier() * slow;
                tank.velocity = tank.velocity.clamp_magnitude(cap);
            }
        }

        for (id, position) in respawned {
            self.emit(GameEventKind::TankRespawned {
                tank_id: id,
                position,
            });
        }
    }

    fn update_projectiles(&mut self, dt: f32, now: f64) {
        let targets: Vec<(String, Vector2D)> = self
            .state
            .tanks
            .values()
            .filter(|t| t.is_alive())
            .map(|t| (t.id.clone(), t.position))
            .collect();

        for projectile in self.state.projectiles.values_mut() {
            let target = if projectile.config.homing {
                nearest_target(&targets, &projectile.owner_id, projectile.position)
            } else {
                None
            };
            projectile.update(dt, now, target);
        }
        self.drop_destroyed_projectiles();
    }

    fn drop_destroyed_projectiles(&mut self) {
        let physics = &mut self.physics;
        self.state.projectiles.retain(|id, p| {
            if p.is_destroyed {
                physics.remove_body(&BodyKind::Projectile(id.clone()));
            }
            !p.is_destroyed
        });
    }

    /// Mirror tank and projectile state into the physics registry
    fn sync_bodies(&mut self) {
        let tanks = &self.state.tanks;
        let projectiles = &self.state.projectiles;
        let powerups = &self.state.powerups;
        self.physics.retain(|body| match &body.kind {
            BodyKind::Terrain(_) => true,
            BodyKind::Tank(id) => tanks.get(id).is_some_and(Tank::is_alive),
            BodyKind::Projectile(id) => projectiles.contains_key(id),
            BodyKind::Powerup(id) => powerups.get(id).is_some(),
        });

        for tank in self.state.tanks.values().filter(|t| t.is_alive()) {
            match self.physics.get_mut(&BodyKind::Tank(tank.id.clone())) {
                Some(body) => {
                    body.move_to(tank.position, tank.velocity);
                    body.rotation = tank.rotation;
                }
                None => self.physics.add_body(tank_body(tank)),
            }
        }

        for projectile in self.state.projectiles.values() {
            match self.physics.get_mut(&BodyKind::Projectile(projectile.id.clone())) {
                Some(body) => body.move_to(projectile.position, projectile.velocity),
                None => {
                    let mut body = PhysicsBody::projectile(
                        &projectile.id,
                        projectile.position,
                        projectile.velocity,
                        projectile.config.radius,
                    );
                    body.previous_position = projectile.previous_position;
                    self.physics.add_body(body);
                }
            }
        }
    }

    fn write_back_tanks(&mut self) {
        for tank in self.state.tanks.values_mut().filter(|t| t.is_alive()) {
            if let Some(body) = self.physics.get(&BodyKind::Tank(tank.id.clone())) {
                tank.position = body.position;
            }
        }
    }

    /// Body contacts in registry order, then each projectile's contacts nearest
    /// first from where it started the tick, until one of them stops it
    fn route_contacts(&mut self, contacts: Vec<Contact>) {
        let mut shots: BTreeMap<String, Vec<(f32, Contact)>> = BTreeMap::new();
        for contact in contacts {
            let shot = match (&contact.body_a, &contact.body_b) {
                (BodyKind::Projectile(p), other) | (other, BodyKind::Projectile(p)) => {
                    Some((p.clone(), other.clone()))
                }
                _ => None,
            };
            let Some((projectile_id, other)) = shot else {
                self.route_contact(contact);
                continue;
            };
            let distance = self.impact_distance(&projectile_id, &other);
            shots.entry(projectile_id).or_default().push((distance, contact));
        }

        for (projectile_id, mut hits) in shots {
            // terrain sorts ahead of tanks at equal distance
            hits.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.body_a.cmp(&b.1.body_a)));
            for (_, contact) in hits {
                let in_flight = self
                    .state
                    .projectiles
                    .get(&projectile_id)
                    .is_some_and(|p| !p.is_destroyed);
                if !in_flight {
                    break;
                }
                self.route_contact(contact);
            }
        }
    }

    /// Gap between the projectile's start-of-tick position and the body it touched
    fn impact_distance(&self, projectile_id: &str, other: &BodyKind) -> f32 {
        let Some(start) = self
            .state
            .projectiles
            .get(projectile_id)
            .map(|p| p.previous_position)
        else {
            return 0.0;
        };
        self.physics
            .get(other)
            .map_or(0.0, |body| body.surface_distance(start))
    }

    fn route_contact(&mut self, contact: Contact) {
        let result = contact.result;
        match (contact.body_a, contact.body_b) {
            (BodyKind::Projectile(p), BodyKind::Tank(t)) | (BodyKind::Tank(t), BodyKind::Projectile(p)) => {
                self.handle_projectile_tank(&p, &t);
            }
            (BodyKind::Projectile(p), BodyKind::Terrain(grid)) | (BodyKind::Terrain(grid), BodyKind::Projectile(p)) => {
                self.handle_projectile_terrain(&p, grid, result.contact_point);
            }
            (BodyKind::Tank(t), BodyKind::Terrain(_)) => {
                if let Some(tank) = self.state.tanks.get_mut(&t) {
                    tank.on_terrain_contact(result.normal);
                }
            }
            (BodyKind::Terrain(_), BodyKind::Tank(t)) => {
                if let Some(tank) = self.state.tanks.get_mut(&t) {
                    tank.on_terrain_contact(-result.normal);
                }
            }
            (BodyKind::Tank(a), BodyKind::Tank(b)) => {
                self.handle_tank_tank(&a, &b);
            }
            // collection runs separately, closest-first
            _ => {}
        }
    }

    fn handle_projectile_tank(&mut self, projectile_id: &str, tank_id: &str) {
        let now = self.state.current_time;
        if !self.state.tanks.get(tank_id).is_some_and(Tank::is_alive) {
            return;
        }
        let Some(projectile) = self.state.projectiles.get_mut(projectile_id) else {
            return;
        };
        let outcome = projectile.on_tank_hit(tank_id, now);
        if outcome == ImpactOutcome::Ignored {
            return;
        }

        let owner = projectile.owner_id.clone();
        let damage = projectile.damage;
        let position = projectile.position;
        let blast_radius = projectile.config.explosion_radius;

        let target_killed = self.damage_tank(tank_id, damage, &owner);
        self.hits.push(HitResult {
            projectile_id: projectile_id.to_string(),
            shooter_id: owner.clone(),
            target_id: tank_id.to_string(),
            damage,
            position,
            target_killed,
        });

        if outcome == ImpactOutcome::Exploded {
            self.splash_tanks(&owner, position, damage, blast_radius, Some(tank_id));
        }
    }

    fn handle_projectile_terrain(&mut self, projectile_id: &str, grid: GridPos, impact: Vector2D) {
        let Some(projectile) = self.state.projectiles.get_mut(projectile_id) else {
            return;
        };
        let outcome = projectile.on_terrain_hit();
        if outcome == ImpactOutcome::Ignored {
            return;
        }

        let owner = projectile.owner_id.clone();
        let damage = projectile.damage;
        let radius = projectile.config.explosion_radius;

        let mut destroyed = Vec::new();
        if let Some(map) = self.state.map.as_mut() {
            if map.damage_tile_at_grid(grid, damage) {
                destroyed.push(grid);
            }
            if outcome == ImpactOutcome::Exploded {
                for (tile, distance) in map.tiles_within(impact, radius) {
                    if tile == grid {
                        continue;
                    }
                    let falloff = damage * CombatSystem::falloff(distance, radius);
                    if falloff > 0.0 && map.damage_tile_at_grid(tile, falloff) {
                        destroyed.push(tile);
                    }
                }
            }
        }

        if outcome == ImpactOutcome::Exploded {
            self.splash_tanks(&owner, impact, damage, radius, None);
        }

        if !destroyed.is_empty() {
            self.rebuild_wall_bodies();
            info!(
                game_id = %self.state.game_id,
                tiles = destroyed.len(),
                "Terrain destroyed"
            );
            self.emit(GameEventKind::MapChanged {
                destroyed_tiles: destroyed,
            });
        }
    }

    fn handle_tank_tank(&mut self, a: &str, b: &str) {
        let now = self.state.current_time;
        for (victim, other) in [(a, b), (b, a)] {
            let Some(tank) = self.state.tanks.get_mut(victim) else {
                continue;
            };
            if tank.on_tank_contact(other, now) {
                let position = tank.position;
                self.record_kill(victim, Some(other), position);
            }
        }
    }

    /// Area damage to every other living tank within twice the blast radius
    fn splash_tanks(
        &mut self,
        owner: &str,
        center: Vector2D,
        base_damage: f32,
        blast_radius: f32,
        exclude: Option<&str>,
    ) {
        let range = blast_radius * SPLASH_RANGE_FACTOR;
        let victims: Vec<(String, f32)> = self
            .state
            .tanks
            .values()
            .filter(|t| t.is_alive() && t.id != owner && Some(t.id.as_str()) != exclude)
            .map(|t| (t.id.clone(), CombatSystem::explosion_damage(base_damage, center, range, t.position)))
            .filter(|(_, damage)| *damage > 0.0)
            .collect();

        for (id, damage) in victims {
            self.damage_tank(&id, damage, owner);
        }
    }

    /// Returns true when the tank died from this damage
    fn damage_tank(&mut self, tank_id: &str, damage: f32, source: &str) -> bool {
        let now = self.state.current_time;
        let Some(tank) = self.state.tanks.get_mut(tank_id) else {
            return false;
        };
        if !tank.take_damage(damage, Some(source), now) {
            return false;
        }
        let position = tank.position;
        self.record_kill(tank_id, Some(source), position);
        true
    }

    fn record_kill(&mut self, victim: &str, killer: Option<&str>, position: Vector2D) {
        let killer = killer.filter(|k| *k != victim && self.state.players.contains_key(*k));
        self.physics.remove_body(&BodyKind::Tank(victim.to_string()));

        info!(
            game_id = %self.state.game_id,
            victim,
            killer = ?killer,
            "Tank destroyed"
        );
        self.emit(GameEventKind::TankDestroyed {
            tank_id: victim.to_string(),
            killer_id: killer.map(str::to_string),
            position,
        });

        let Some(killer) = killer else {
            return;
        };
        if let Some(tank) = self.state.tanks.get_mut(killer) {
            tank.kills += 1;
        }
        let score = {
            let entry = self.state.scores.entry(killer.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        self.emit(GameEventKind::ScoreChanged {
            player_id: killer.to_string(),
            score,
        });
    }

    fn rebuild_wall_bodies(&mut self) {
        self.physics
            .retain(|body| !matches!(body.kind, BodyKind::Terrain(_)));
        if let Some(map) = self.state.map.as_ref() {
            for body in map.wall_bodies() {
                self.physics.add_body(body);
            }
        }
    }

    fn sync_powerup_bodies(&mut self) {
        let powerups = &self.state.powerups;
        self.physics.retain(|body| match &body.kind {
            BodyKind::Powerup(id) => powerups.get(id).is_some(),
            _ => true,
        });
        for powerup in self.state.powerups.powerups() {
            if !self.physics.contains(&BodyKind::Powerup(powerup.id.clone())) {
                self.physics
                    .add_body(PhysicsBody::powerup(&powerup.id, powerup.position, POWERUP_RADIUS));
            }
        }
    }

    fn collect_powerups(&mut self) {
        let now = self.state.current_time;
        let mut collected = Vec::new();

        let state = &mut self.state;
        for tank in state.tanks.values_mut().filter(|t| t.is_alive()) {
            let radius = tank.collision_radius() + POWERUP_RADIUS;
            let position = tank.position;
            let id = tank.id.clone();
            let mut apply = |_: &str, powerup: &PowerupState| tank.apply_powerup(&powerup.effect, now);
            if let Some(powerup) = state.powerups.try_collect_powerup(position, &id, radius, &mut apply) {
                collected.push((id, powerup));
            }
        }

        for (collector, powerup) in collected {
            self.physics.remove_body(&BodyKind::Powerup(powerup.id.clone()));
            debug!(
                game_id = %self.state.game_id,
                player_id = %collector,
                powerup = ?powerup.kind,
                "Power-up collected"
            );
            self.emit(GameEventKind::PowerupCollected {
                powerup_id: powerup.id,
                collector_id: collector,
                powerup_type: powerup.kind,
            });
        }
    }

    fn check_win_conditions(&mut self) {
        let settings = &self.state.settings;
        if settings
            .time_limit
            .is_some_and(|limit| self.state.elapsed() >= limit)
        {
            self.end_game("time_limit");
            return;
        }
        if let Some(limit) = settings.score_limit {
            if self.state.scores.values().any(|s| *s >= limit) {
                self.end_game("score_limit");
            }
        }
    }

    /// Random spawn point clear of living tanks, else any spawn point
    fn choose_spawn(&mut self) -> Vector2D {
        let candidates = match self.state.map.as_ref() {
            Some(map) if !map.spawn_points.is_empty() => map.spawn_positions(),
            Some(map) => vec![map.world_size() * 0.5],
            None => vec![Vector2D::ZERO],
        };

        let clearance = self.state.settings.tank_stats.collision_radius * SPAWN_CLEARANCE_RADII;
        let limit = clearance * clearance;
        let free: Vec<Vector2D> = candidates
            .iter()
            .copied()
            .filter(|spot| {
                !self
                    .state
                    .tanks
                    .values()
                    .any(|t| t.is_alive() && t.position.distance_squared(*spot) < limit)
            })
            .collect();

        let pool = if free.is_empty() { &candidates } else { &free };
        pool[self.rng.gen_range(0..pool.len())]
    }
}

fn tank_body(tank: &Tank) -> PhysicsBody {
    let mut body = PhysicsBody::tank(&tank.id, tank.position, tank.collision_radius(), tank.stats.mass);
    body.velocity = tank.velocity;
    body.rotation = tank.rotation;
    body.bounciness = tank.stats.bounciness;
    body
}

fn nearest_target(targets: &[(String, Vector2D)], owner: &str, from: Vector2D) -> Option<Vector2D> {
    targets
        .iter()
        .filter(|(id, _)| id != owner)
        .map(|(_, pos)| (*pos, pos.distance_squared(from)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(pos, _)| pos)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::game::powerup::PowerupSystem;
    use crate::game::projectile::ProjectileType;
    use crate::game::terrain::TileType;

    const DT: f32 = 1.0 / 30.0;

    fn open_map() -> MapConfig {
        MapConfig {
            width: 30,
            height: 20,
            wall_density: 0.0,
            water_bodies: 0,
            mud_patches: 0,
            seed: Some(11),
            ..MapConfig::default()
        }
    }

    /// Open arena without scheduled power-ups
    fn quiet_game(settings: GameSettings) -> GameStateManager {
        let mut game = GameStateManager::new("test", settings);
        game.initialize_game(&open_map());
        game.state.powerups = PowerupSystem::new();
        game
    }

    fn running_game(players: &[&str]) -> GameStateManager {
        let mut game = quiet_game(GameSettings::default());
        for id in players {
            assert!(game.add_player(id, id));
        }
        game.start_game();
        game
    }

    fn place(game: &mut GameStateManager, id: &str, position: Vector2D, rotation: f32) {
        let tank = game.state.tanks.get_mut(id).unwrap();
        tank.position = position;
        tank.rotation = rotation;
        tank.velocity = Vector2D::ZERO;
        game.sync_bodies();
    }

    fn set_tile(game: &mut GameStateManager, col: u32, row: u32, tile_type: TileType, health: Option<f32>) {
        let map = game.state.map.as_mut().unwrap();
        let idx = (row * map.width + col) as usize;
        let tile = &mut map.tiles[idx];
        tile.set_type(tile_type);
        if health.is_some() {
            tile.health = health;
            tile.max_health = health;
        }
        game.rebuild_wall_bodies();
    }

    #[test]
    fn duplicate_join_is_rejected() {
        let mut game = running_game(&["a"]);
        assert!(!game.add_player("a", "again"));
        assert_eq!(game.state().players.len(), 1);
    }

    #[test]
    fn leave_removes_everything() {
        let mut game = running_game(&["a", "b"]);
        assert!(game.remove_player("a"));
        assert!(game.tank("a").is_none());
        assert!(game.score("a").is_none());
        assert!(!game.physics().contains(&BodyKind::Tank("a".into())));
        assert!(!game.remove_player("a"));
    }

    #[test]
    fn update_is_gated_by_status() {
        let mut game = GameStateManager::new("g", GameSettings::default());
        game.initialize_game(&open_map());
        game.update(DT);
        assert_eq!(game.state().current_time, 0.0);

        game.start_game();
        game.update(DT);
        let t = game.state().current_time;
        assert!(t > 0.0);

        assert!(game.pause_game());
        game.update(DT);
        assert_eq!(game.state().current_time, t);
        assert!(game.resume_game());
        game.update(DT);
        assert!(game.state().current_time > t);
    }

    #[test]
    fn bullet_kill_scores_for_shooter() {
        let mut game = running_game(&["a", "b"]);
        place(&mut game, "a", Vector2D::new(200.0, 400.0), 0.0);
        place(&mut game, "b", Vector2D::new(400.0, 400.0), 0.0);
        game.state.tanks.get_mut("b").unwrap().health = 10.0;

        game.set_tank_controls(
            "a",
            ControlUpdate {
                fire: Some(true),
                ..ControlUpdate::default()
            },
        );
        for _ in 0..30 {
            game.update(DT);
            if game.tank("b").unwrap().is_destroyed {
                break;
            }
        }

        let b = game.tank("b").unwrap();
        assert!(b.is_destroyed);
        assert_eq!(b.deaths, 1);
        assert_eq!(game.tank("a").unwrap().kills, 1);
        assert_eq!(game.score("a"), Some(1));
        assert!(game.state().events.iter().any(|e| matches!(
            &e.kind,
            GameEventKind::TankDestroyed { tank_id, killer_id: Some(k), .. } if tank_id == "b" && k == "a"
        )));
    }

    #[test]
    fn projectiles_never_hit_their_owner() {
        let mut game = running_game(&["a"]);
        place(&mut game, "a", Vector2D::new(400.0, 400.0), 0.0);
        game.fire_tank("a");
        for _ in 0..10 {
            game.update(DT);
        }
        assert_eq!(game.tank("a").unwrap().health, 100.0);
    }

    #[test]
    fn rocket_splash_spares_owner_and_hits_bystanders() {
        let mut settings = GameSettings::default();
        settings.tank_stats.weapon = ProjectileType::Rocket;
        let mut game = quiet_game(settings);
        for id in ["a", "b", "c"] {
            game.add_player(id, id);
        }
        game.start_game();

        place(&mut game, "a", Vector2D::new(200.0, 400.0), 0.0);
        place(&mut game, "b", Vector2D::new(330.0, 400.0), 0.0);
        place(&mut game, "c", Vector2D::new(330.0, 460.0), 0.0);

        game.fire_tank("a");
        for _ in 0..20 {
            game.update(DT);
            if !game.hits_last_tick().is_empty() {
                break;
            }
        }

        assert_eq!(game.tank("a").unwrap().health, 100.0);
        assert!(game.tank("b").unwrap().health < 100.0);
        assert!(game.tank("c").unwrap().health < 100.0);
        assert!(game.tank("c").unwrap().health > game.tank("b").unwrap().health);
    }

    #[test]
    fn shooting_a_destructible_wall_opens_the_map() {
        let mut game = running_game(&["a"]);
        set_tile(&mut game, 7, 10, TileType::DestructibleWall, Some(10.0));
        assert!(game.physics().contains(&BodyKind::Terrain(GridPos::new(7, 10))));

        place(&mut game, "a", Vector2D::new(200.0, 420.0), 0.0);
        game.fire_tank("a");
        for _ in 0..10 {
            game.update(DT);
        }

        let tile = game.map().unwrap().tile_at_grid(7, 10).unwrap();
        assert!(tile.passable);
        assert!(!game.physics().contains(&BodyKind::Terrain(GridPos::new(7, 10))));
        assert!(game.state().projectiles.is_empty());
        assert!(game.state().events.iter().any(|e| matches!(
            &e.kind,
            GameEventKind::MapChanged { destroyed_tiles } if destroyed_tiles.contains(&GridPos::new(7, 10))
        )));
    }

    #[test]
    fn respawn_after_delay_emits_event() {
        let mut game = running_game(&["a"]);
        let now = game.state().current_time;
        game.state.tanks.get_mut("a").unwrap().take_damage(500.0, None, now);
        game.sync_bodies();
        assert!(!game.physics().contains(&BodyKind::Tank("a".into())));

        let ticks = (3000.0 / (DT as f64 * 1000.0)).ceil() as usize + 1;
        for _ in 0..ticks {
            game.update(DT);
        }
        let tank = game.tank("a").unwrap();
        assert!(tank.is_alive());
        assert_eq!(tank.health, 100.0);
        assert!(game.physics().contains(&BodyKind::Tank("a".into())));
        assert!(game
            .state()
            .events
            .iter()
            .any(|e| matches!(&e.kind, GameEventKind::TankRespawned { tank_id, .. } if tank_id == "a")));
    }

    #[test]
    fn powerup_collected_by_nearby_tank() {
        let mut game = running_game(&["a"]);
        place(&mut game, "a", Vector2D::new(300.0, 300.0), 0.0);
        game.spawn_powerup(PowerupType::SpeedBoost, Vector2D::new(310.0, 300.0));
        game.update(DT);

        let tank = game.tank("a").unwrap();
        assert!(tank.has_powerup(PowerupType::SpeedBoost));
        assert!(game.state().events.iter().any(|e| matches!(
            &e.kind,
            GameEventKind::PowerupCollected { collector_id, .. } if collector_id == "a"
        )));
    }

    #[test]
    fn score_limit_ends_game() {
        let mut settings = GameSettings::default();
        settings.score_limit = Some(1);
        let mut game = GameStateManager::new("g", settings);
        game.initialize_game(&open_map());
        game.add_player("a", "a");
        game.add_player("b", "b");
        game.start_game();

        game.record_kill("b", Some("a"), Vector2D::ZERO);
        game.update(DT);
        assert!(game.state().is_finished());
        assert_eq!(game.state().winner.as_deref(), Some("a"));
    }

    #[test]
    fn time_limit_ends_game() {
        let mut settings = GameSettings::default();
        settings.time_limit = Some(100.0);
        let mut game = GameStateManager::new("g", settings);
        game.initialize_game(&open_map());
        game.start_game();
        for _ in 0..4 {
            game.update(DT);
        }
        assert!(game.state().is_finished());
    }

    #[test]
    fn listeners_see_every_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut game = GameStateManager::new("g", GameSettings::default());
        game.on_game_event(move |e| sink.lock().unwrap().push(e.kind.clone()));
        game.initialize_game(&open_map());
        game.add_player("a", "a");
        game.start_game();
        game.end_game("manual");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), game.state().events.len());
        assert!(matches!(seen.last(), Some(GameEventKind::GameEnded { .. })));
    }

    #[test]
    fn team_modes_alternate_teams() {
        let settings = GameSettings {
            mode: GameMode::TeamDeathmatch,
            ..GameSettings::default()
        };
        let mut game = GameStateManager::new("g", settings);
        game.initialize_game(&open_map());
        for id in ["a", "b", "c"] {
            game.add_player(id, id);
        }
        let teams: Vec<Option<u8>> = ["a", "b", "c"]
            .iter()
            .map(|id| game.player(id).unwrap().team)
            .collect();
        assert_eq!(teams, vec![Some(0), Some(1), Some(0)]);
    }

    #[test]
    fn spawn_prefers_free_points() {
        let mut game = running_game(&[]);
        let spawns = game.map().unwrap().spawn_positions();
        assert!(spawns.len() >= 2);
        for i in 0..(spawns.len() - 1) {
            game.add_player(&format!("p{i}"), "p");
        }
        let taken: Vec<Vector2D> = game.state().tanks.values().map(|t| t.position).collect();
        let free = spawns.iter().find(|s| !taken.contains(s)).copied().unwrap();
        assert_eq!(game.choose_spawn(), free);
    }

    #[test]
    fn every_spawn_taken_falls_back_to_any_spawn() {
        let mut game = running_game(&[]);
        let spawns = game.map().unwrap().spawn_positions();
        for (i, spawn) in spawns.iter().enumerate() {
            let id = format!("p{i}");
            game.add_player(&id, "p");
            place(&mut game, &id, *spawn, 0.0);
        }

        for _ in 0..20 {
            assert!(spawns.contains(&game.choose_spawn()));
        }

        game.state.map.as_mut().unwrap().spawn_points.clear();
        let center = game.map().unwrap().world_size() * 0.5;
        assert_eq!(game.choose_spawn(), center);
    }

    #[test]
    fn water_and_mud_scale_movement() {
        let mut game = running_game(&["dry", "mud", "wet"]);
        set_tile(&mut game, 5, 5, TileType::Water, None);
        set_tile(&mut game, 15, 5, TileType::Mud, None);
        place(&mut game, "wet", Vector2D::new(220.0, 220.0), 0.0);
        place(&mut game, "mud", Vector2D::new(620.0, 220.0), 0.0);
        place(&mut game, "dry", Vector2D::new(620.0, 620.0), 0.0);

        let forward = ControlUpdate {
            forward: Some(true),
            ..ControlUpdate::default()
        };
        for id in ["dry", "mud", "wet"] {
            game.set_tank_controls(id, forward);
        }
        game.update(DT);

        let moved = |id: &str, from: Vector2D| game.tank(id).unwrap().position.distance(from);
        let dry = moved("dry", Vector2D::new(620.0, 620.0));
        assert!(dry > 0.0);
        assert!((moved("wet", Vector2D::new(220.0, 220.0)) - dry * 0.4).abs() < 1e-3);
        assert!((moved("mud", Vector2D::new(620.0, 220.0)) - dry * 0.6).abs() < 1e-3);
    }

    #[test]
    fn explosive_terrain_hit_craters_and_splashes() {
        let mut game = running_game(&["a", "b"]);
        set_tile(&mut game, 10, 10, TileType::DestructibleWall, None);
        set_tile(&mut game, 10, 9, TileType::DestructibleWall, Some(10.0));
        set_tile(&mut game, 12, 10, TileType::DestructibleWall, None);
        place(&mut game, "a", Vector2D::new(300.0, 420.0), 0.0);
        place(&mut game, "b", Vector2D::new(380.0, 470.0), 0.0);

        let rocket = Projectile::new(
            "shot".to_string(),
            Vector2D::new(390.0, 420.0),
            Vector2D::UNIT_X,
            "a".to_string(),
            ProjectileConfig::for_type(ProjectileType::Rocket),
            game.state().current_time,
        );
        game.state.projectiles.insert("shot".to_string(), rocket);
        game.handle_projectile_terrain("shot", GridPos::new(10, 10), Vector2D::new(400.0, 420.0));

        let map = game.map().unwrap();
        assert_eq!(map.tile_at_grid(10, 10).unwrap().health, Some(50.0));
        assert!(map.tile_at_grid(10, 9).unwrap().passable);
        assert_eq!(map.tile_at_grid(12, 10).unwrap().health, Some(100.0));
        assert!(!game.physics().contains(&BodyKind::Terrain(GridPos::new(10, 9))));
        assert!(game.state().events.iter().any(|e| matches!(
            &e.kind,
            GameEventKind::MapChanged { destroyed_tiles } if destroyed_tiles == &vec![GridPos::new(10, 9)]
        )));

        assert_eq!(game.tank("a").unwrap().health, 100.0);
        let b = game.tank("b").unwrap().health;
        assert!(b < 100.0 && b > 50.0);
        assert!(game.state().projectiles["shot"].is_destroyed);
    }

    #[test]
    fn player_ids_never_replace_generated_bodies() {
        let mut game = quiet_game(GameSettings::default());
        assert!(game.add_player("wall_0_5", "w"));
        assert!(game.physics().contains(&BodyKind::Terrain(GridPos::new(0, 5))));
        assert!(game.physics().contains(&BodyKind::Tank("wall_0_5".into())));

        game.add_player("proj_1", "p");
        game.add_player("shooter", "s");
        game.start_game();
        assert_eq!(game.fire_tank("shooter").as_deref(), Some("proj_1"));
        assert!(game.physics().contains(&BodyKind::Tank("proj_1".into())));
        assert!(game.physics().contains(&BodyKind::Projectile("proj_1".into())));
    }

    #[test]
    fn solid_wall_stops_shot_before_tank_behind_it() {
        let mut settings = GameSettings::default();
        settings.tank_stats.weapon = ProjectileType::Plasma;
        let mut game = quiet_game(settings);
        game.add_player("a", "a");
        game.add_player("b", "b");
        game.start_game();

        set_tile(&mut game, 10, 10, TileType::Wall, None);
        place(&mut game, "a", Vector2D::new(380.0, 420.0), 0.0);
        place(&mut game, "b", Vector2D::new(460.0, 420.0), 0.0);

        assert!(game.fire_tank("a").is_some());
        game.update(DT);

        assert_eq!(game.tank("b").unwrap().health, 100.0);
        assert!(game.state().projectiles.is_empty());
        assert!(game.hits_last_tick().is_empty());
    }
}
