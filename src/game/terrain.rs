//! Procedural arena generation and the runtime tile map

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::physics::PhysicsBody;
use super::vector::Vector2D;

/// Health of a freshly generated destructible wall
pub const DESTRUCTIBLE_WALL_HEALTH: f32 = 100.0;
/// Minimum Euclidean tile distance between two spawn points
pub const MIN_SPAWN_SEPARATION: f32 = 5.0;
/// Tiles force-cleared around each flag base
pub const FLAG_CLEAR_RADIUS: f32 = 2.0;

const CLUSTER_STRIDE: usize = 4;
const SCATTER_FACTOR: f32 = 0.15;
const PLACEMENT_ATTEMPTS_PER_ITEM: u32 = 50;

/// Wall cluster shapes stamped during generation, as (dx, dy) offsets
const CLUSTER_PATTERNS: [&[(i32, i32)]; 5] = [
    // single
    &[(0, 0)],
    // line
    &[(0, 0), (1, 0), (2, 0)],
    // 2x2 block
    &[(0, 0), (1, 0), (0, 1), (1, 1)],
    // plus
    &[(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)],
    // X
    &[(0, 0), (1, 1), (-1, -1), (1, -1), (-1, 1)],
];
const LINE_PATTERN: usize = 1;

/// Terrain tile kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileType {
    Empty,
    Wall,
    DestructibleWall,
    Water,
    Mud,
    Bridge,
    Spawn,
    FlagBase,
    PowerupSpawn,
}

impl TileType {
    pub fn is_passable(self) -> bool {
        !matches!(self, TileType::Wall | TileType::DestructibleWall)
    }

    /// Velocity multiplier applied to tanks standing on this tile
    pub fn slow_factor(self) -> f32 {
        match self {
            TileType::Water => 0.4,
            TileType::Mud => 0.6,
            _ => 1.0,
        }
    }

    pub fn is_destructible(self) -> bool {
        self == TileType::DestructibleWall
    }
}

/// Column/row address of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub col: u32,
    pub row: u32,
}

impl GridPos {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tile {
    pub tile_type: TileType,
    pub grid: GridPos,
    /// World position of the tile center
    pub position: Vector2D,
    pub passable: bool,
    pub slow_factor: f32,
    pub destructible: bool,
    pub health: Option<f32>,
    pub max_health: Option<f32>,
}

impl Tile {
    fn new(tile_type: TileType, grid: GridPos, tile_size: f32) -> Self {
        let position = Vector2D::new(
            (grid.col as f32 + 0.5) * tile_size,
            (grid.row as f32 + 0.5) * tile_size,
        );
        let mut tile = Self {
            tile_type,
            grid,
            position,
            passable: true,
            slow_factor: 1.0,
            destructible: false,
            health: None,
            max_health: None,
        };
        tile.set_type(tile_type);
        tile
    }

    pub(crate) fn set_type(&mut self, tile_type: TileType) {
        self.tile_type = tile_type;
        self.passable = tile_type.is_passable();
        self.slow_factor = tile_type.slow_factor();
        self.destructible = tile_type.is_destructible();
        if self.destructible {
            self.health = Some(DESTRUCTIBLE_WALL_HEALTH);
            self.max_health = Some(DESTRUCTIBLE_WALL_HEALTH);
        } else {
            self.health = None;
            self.max_health = None;
        }
    }
}

/// Map generation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Width in tiles
    pub width: u32,
    /// Height in tiles
    pub height: u32,
    /// World units per tile edge
    pub tile_size: f32,
    pub wall_density: f32,
    pub destructible_ratio: f32,
    pub water_bodies: u32,
    pub mud_patches: u32,
    pub spawn_points: u32,
    pub powerup_spots: u32,
    pub seed: Option<u64>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 40,
            height: 30,
            tile_size: 40.0,
            wall_density: 0.15,
            destructible_ratio: 0.4,
            water_bodies: 3,
            mud_patches: 4,
            spawn_points: 8,
            powerup_spots: 6,
            seed: None,
        }
    }
}

/// Generated arena; the single source of truth for terrain during a game
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameMap {
    pub width: u32,
    pub height: u32,
    pub tile_size: f32,
    /// Seed the map was generated from (replayable)
    pub seed: u64,
    pub tiles: Vec<Tile>,
    pub spawn_points: Vec<GridPos>,
    pub flag_bases: Vec<GridPos>,
    pub powerup_spawns: Vec<GridPos>,
    /// Bumped on every tile destruction
    pub revision: u64,
}

impl GameMap {
    fn index(&self, col: u32, row: u32) -> Option<usize> {
        if col < self.width && row < self.height {
            Some(row as usize * self.width as usize + col as usize)
        } else {
            None
        }
    }

    pub fn tile_at_grid(&self, col: u32, row: u32) -> Option<&Tile> {
        self.index(col, row).map(|idx| &self.tiles[idx])
    }

    /// Grid cell containing a world position
    pub fn grid_of(&self, position: Vector2D) -> Option<GridPos> {
        if self.tile_size <= 0.0 || position.x < 0.0 || position.y < 0.0 {
            return None;
        }
        let col = (position.x / self.tile_size).floor();
        let row = (position.y / self.tile_size).floor();
        if !col.is_finite() || !row.is_finite() {
            return None;
        }
        let (col, row) = (col as u32, row as u32);
        self.index(col, row).map(|_| GridPos::new(col, row))
    }

    /// Bounds-checked lookup by world position
    pub fn tile_at(&self, position: Vector2D) -> Option<&Tile> {
        self.grid_of(position)
            .and_then(|grid| self.tile_at_grid(grid.col, grid.row))
    }

    pub fn tile_center(&self, grid: GridPos) -> Vector2D {
        Vector2D::new(
            (grid.col as f32 + 0.5) * self.tile_size,
            (grid.row as f32 + 0.5) * self.tile_size,
        )
    }

    /// World-space extent of the arena
    pub fn world_size(&self) -> Vector2D {
        Vector2D::new(
            self.width as f32 * self.tile_size,
            self.height as f32 * self.tile_size,
        )
    }

    /// Damages the destructible tile under `position`.
    /// Returns true when the tile was destroyed by this hit.
    pub fn damage_tile(&mut self, position: Vector2D, damage: f32) -> bool {
        match self.grid_of(position) {
            Some(grid) => self.damage_tile_at_grid(grid, damage),
            None => false,
        }
    }

    pub fn damage_tile_at_grid(&mut self, grid: GridPos, damage: f32) -> bool {
        let Some(idx) = self.index(grid.col, grid.row) else {
            return false;
        };
        let tile = &mut self.tiles[idx];
        if !tile.destructible {
            return false;
        }
        let Some(health) = tile.health else {
            return false;
        };

        let remaining = health - damage;
        if remaining <= 0.0 {
            tile.set_type(TileType::Empty);
            self.revision += 1;
            debug!(col = grid.col, row = grid.row, "Destructible wall destroyed");
            true
        } else {
            tile.health = Some(remaining);
            false
        }
    }

    /// Tiles whose centers lie within `radius` of `center`, with their distance
    pub fn tiles_within(&self, center: Vector2D, radius: f32) -> Vec<(GridPos, f32)> {
        if self.tile_size <= 0.0 || radius < 0.0 {
            return Vec::new();
        }
        let span = (radius / self.tile_size).ceil() as i64 + 1;
        let c_col = (center.x / self.tile_size).floor() as i64;
        let c_row = (center.y / self.tile_size).floor() as i64;

        let mut found = Vec::new();
        for row in (c_row - span)..=(c_row + span) {
            for col in (c_col - span)..=(c_col + span) {
                if col < 0 || row < 0 || col >= self.width as i64 || row >= self.height as i64 {
                    continue;
                }
                let grid = GridPos::new(col as u32, row as u32);
                let dist = self.tile_center(grid).distance(center);
                if dist <= radius {
                    found.push((grid, dist));
                }
            }
        }
        found
    }

    pub fn spawn_positions(&self) -> Vec<Vector2D> {
        self.spawn_points.iter().map(|g| self.tile_center(*g)).collect()
    }

    pub fn powerup_positions(&self) -> Vec<Vector2D> {
        self.powerup_spawns.iter().map(|g| self.tile_center(*g)).collect()
    }

    /// True when every passable tile reaches every other over the 4-neighbourhood
    pub fn is_fully_connected(&self) -> bool {
        let passable: Vec<bool> = self.tiles.iter().map(|t| t.passable).collect();
        let Some(start) = passable.iter().position(|p| *p) else {
            return true;
        };
        let reached = flood_fill(&passable, self.width as usize, self.height as usize, start);
        passable
            .iter()
            .zip(reached.iter())
            .all(|(p, r)| !*p || *r)
    }

    /// Static, infinite-mass bodies for every wall tile
    pub fn wall_bodies(&self) -> Vec<PhysicsBody> {
        self.tiles
            .iter()
            .filter(|t| !t.passable)
            .map(|t| PhysicsBody::wall(t.grid, t.position, self.tile_size))
            .collect()
    }
}

/// Seeded procedural arena generator
pub struct TerrainGenerator {
    rng: ChaCha8Rng,
    width: i32,
    height: i32,
    cells: Vec<TileType>,
}

impl TerrainGenerator {
    /// Build a complete, connected arena. Same seed and config, same map.
    pub fn generate(config: &MapConfig) -> GameMap {
        let seed = config.seed.unwrap_or_else(rand::random);
        let width = config.width as i32;
        let height = config.height as i32;
        let mut generator = Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            width,
            height,
            cells: vec![TileType::Empty; (config.width as usize) * (config.height as usize)],
        };

        generator.stamp_boundary();
        generator.place_wall_clusters(config.wall_density, config.destructible_ratio);
        generator.scatter_walls(config.wall_density, config.destructible_ratio);
        for _ in 0..config.water_bodies {
            generator.stamp_blob(TileType::Water, 1.5, 3.5);
        }
        for _ in 0..config.mud_patches {
            generator.stamp_blob(TileType::Mud, 1.0, 2.5);
        }
        let spawn_points = generator.place_spawn_points(config.spawn_points);
        let flag_bases = generator.place_flag_bases();
        let powerup_spawns = generator.place_powerup_spots(config.powerup_spots);
        generator.repair_connectivity();

        let tiles = generator
            .cells
            .iter()
            .enumerate()
            .map(|(idx, tile_type)| {
                let col = (idx % config.width.max(1) as usize) as u32;
                let row = (idx / config.width.max(1) as usize) as u32;
                Tile::new(*tile_type, GridPos::new(col, row), config.tile_size)
            })
            .collect();

        debug!(
            seed,
            width = config.width,
            height = config.height,
            spawns = spawn_points.len(),
            "Generated terrain"
        );

        GameMap {
            width: config.width,
            height: config.height,
            tile_size: config.tile_size,
            seed,
            tiles,
            spawn_points,
            flag_bases,
            powerup_spawns,
            revision: 0,
        }
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn is_interior(&self, x: i32, y: i32) -> bool {
        x >= 1 && y >= 1 && x < self.width - 1 && y < self.height - 1
    }

    fn has_interior(&self) -> bool {
        self.width > 2 && self.height > 2
    }

    fn idx(&self, x: i32, y: i32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn get(&self, x: i32, y: i32) -> TileType {
        self.cells[self.idx(x, y)]
    }

    fn set(&mut self, x: i32, y: i32, tile_type: TileType) {
        let idx = self.idx(x, y);
        self.cells[idx] = tile_type;
    }

    fn random_interior(&mut self) -> (i32, i32) {
        let x = self.rng.gen_range(1..self.width - 1);
        let y = self.rng.gen_range(1..self.height - 1);
        (x, y)
    }

    fn wall_type(&mut self, destructible_ratio: f32) -> TileType {
        if self.rng.gen::<f32>() < destructible_ratio {
            TileType::DestructibleWall
        } else {
            TileType::Wall
        }
    }

    fn stamp_boundary(&mut self) {
        if self.width <= 0 || self.height <= 0 {
            return;
        }
        for x in 0..self.width {
            self.set(x, 0, TileType::Wall);
            self.set(x, self.height - 1, TileType::Wall);
        }
        for y in 0..self.height {
            self.set(0, y, TileType::Wall);
            self.set(self.width - 1, y, TileType::Wall);
        }
    }

    fn place_wall_clusters(&mut self, wall_density: f32, destructible_ratio: f32) {
        if !self.has_interior() {
            return;
        }
        let cluster_chance = (wall_density * 2.0).clamp(0.0, 1.0);
        for gy in (2..self.height - 2).step_by(CLUSTER_STRIDE) {
            for gx in (2..self.width - 2).step_by(CLUSTER_STRIDE) {
                if self.rng.gen::<f32>() >= cluster_chance {
                    continue;
                }
                let cx = gx + self.rng.gen_range(-1..=1);
                let cy = gy + self.rng.gen_range(-1..=1);
                let pattern_idx = self.rng.gen_range(0..CLUSTER_PATTERNS.len());
                let vertical = pattern_idx == LINE_PATTERN && self.rng.gen_bool(0.5);

                for &(dx, dy) in CLUSTER_PATTERNS[pattern_idx] {
                    let (dx, dy) = if vertical { (dy, dx) } else { (dx, dy) };
                    let (x, y) = (cx + dx, cy + dy);
                    if self.is_interior(x, y) {
                        let wall = self.wall_type(destructible_ratio);
                        self.set(x, y, wall);
                    }
                }
            }
        }
    }

    fn scatter_walls(&mut self, wall_density: f32, destructible_ratio: f32) {
        let chance = wall_density * SCATTER_FACTOR;
        for y in 1..self.height - 1 {
            for x in 1..self.width - 1 {
                if self.rng.gen::<f32>() < chance && self.get(x, y) == TileType::Empty {
                    let wall = self.wall_type(destructible_ratio);
                    self.set(x, y, wall);
                }
            }
        }
    }

    /// Circular patch that only overwrites currently-passable interior tiles
    fn stamp_blob(&mut self, tile_type: TileType, min_radius: f32, max_radius: f32) {
        if !self.has_interior() {
            return;
        }
        let (cx, cy) = self.random_interior();
        let radius = self.rng.gen_range(min_radius..max_radius);
        let reach = radius.ceil() as i32;
        for y in (cy - reach)..=(cy + reach) {
            for x in (cx - reach)..=(cx + reach) {
                if !self.is_interior(x, y) || !self.get(x, y).is_passable() {
                    continue;
                }
                let dist = (((x - cx).pow(2) + (y - cy).pow(2)) as f32).sqrt();
                if dist <= radius {
                    self.set(x, y, tile_type);
                }
            }
        }
    }

    fn place_spawn_points(&mut self, count: u32) -> Vec<GridPos> {
        let mut placed: Vec<(i32, i32)> = Vec::new();
        if !self.has_interior() || count == 0 {
            return Vec::new();
        }

        let attempts = count * PLACEMENT_ATTEMPTS_PER_ITEM;
        for _ in 0..attempts {
            if placed.len() >= count as usize {
                break;
            }
            let (x, y) = self.random_interior();
            if self.get(x, y) != TileType::Empty || !self.neighbours_passable(x, y) {
                continue;
            }
            let too_close = placed.iter().any(|&(px, py)| {
                let dist = (((x - px).pow(2) + (y - py).pow(2)) as f32).sqrt();
                dist < MIN_SPAWN_SEPARATION
            });
            if too_close {
                continue;
            }
            self.set(x, y, TileType::Spawn);
            placed.push((x, y));
        }

        if placed.is_empty() {
            // Crowded map: carve a guaranteed spawn at the center
            let (cx, cy) = (self.width / 2, self.height / 2);
            for y in (cy - 1)..=(cy + 1) {
                for x in (cx - 1)..=(cx + 1) {
                    if self.is_interior(x, y) {
                        self.set(x, y, TileType::Empty);
                    }
                }
            }
            self.set(cx, cy, TileType::Spawn);
            placed.push((cx, cy));
        }

        placed
            .into_iter()
            .map(|(x, y)| GridPos::new(x as u32, y as u32))
            .collect()
    }

    fn neighbours_passable(&self, x: i32, y: i32) -> bool {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (x + dx, y + dy);
                if !self.in_bounds(nx, ny) || !self.get(nx, ny).is_passable() {
                    return false;
                }
            }
        }
        true
    }

    fn place_flag_bases(&mut self) -> Vec<GridPos> {
        if !self.has_interior() {
            return Vec::new();
        }
        let row = self.height / 2;
        let mut bases = Vec::with_capacity(2);
        for fraction in [0.2_f32, 0.8] {
            let col = ((self.width as f32 * fraction) as i32).clamp(1, self.width - 2);
            let reach = FLAG_CLEAR_RADIUS.ceil() as i32;
            for y in (row - reach)..=(row + reach) {
                for x in (col - reach)..=(col + reach) {
                    let dist = (((x - col).pow(2) + (y - row).pow(2)) as f32).sqrt();
                    if dist <= FLAG_CLEAR_RADIUS
                        && self.is_interior(x, y)
                        && self.get(x, y) != TileType::Spawn
                    {
                        self.set(x, y, TileType::Empty);
                    }
                }
            }
            if self.get(col, row) != TileType::Spawn {
                self.set(col, row, TileType::FlagBase);
            }
            bases.push(GridPos::new(col as u32, row as u32));
        }
        bases
    }

    fn place_powerup_spots(&mut self, count: u32) -> Vec<GridPos> {
        let mut spots = Vec::new();
        if !self.has_interior() {
            return spots;
        }
        for _ in 0..count * PLACEMENT_ATTEMPTS_PER_ITEM {
            if spots.len() >= count as usize {
                break;
            }
            let (x, y) = self.random_interior();
            if self.get(x, y) == TileType::Empty {
                self.set(x, y, TileType::PowerupSpawn);
                spots.push(GridPos::new(x as u32, y as u32));
            }
        }
        spots
    }

    /// Carves 4-connected corridors until every passable tile is reachable
    fn repair_connectivity(&mut self) {
        let (w, h) = (self.width.max(0) as usize, self.height.max(0) as usize);
        // Every pass merges at least one region, so the tile count bounds the loop
        for _ in 0..self.cells.len() {
            let passable: Vec<bool> = self.cells.iter().map(|t| t.is_passable()).collect();
            let Some(start) = passable.iter().position(|p| *p) else {
                return;
            };
            let reached = flood_fill(&passable, w, h, start);
            let Some(orphan) = (0..passable.len()).find(|&i| passable[i] && !reached[i]) else {
                return;
            };

            let (ox, oy) = ((orphan % w) as i32, (orphan / w) as i32);
            let target = (0..reached.len())
                .filter(|&i| reached[i])
                .min_by_key(|&i| {
                    let (x, y) = ((i % w) as i32, (i / w) as i32);
                    (x - ox).pow(2) + (y - oy).pow(2)
                });
            let Some(target) = target else {
                return;
            };
            let (tx, ty) = ((target % w) as i32, (target / w) as i32);
            self.carve_corridor((ox, oy), (tx, ty));
        }
    }

    fn carve_corridor(&mut self, from: (i32, i32), to: (i32, i32)) {
        let (mut x, mut y) = from;
        let (sx, sy) = ((to.0 - x).signum(), (to.1 - y).signum());
        loop {
            if !self.get(x, y).is_passable() {
                self.set(x, y, TileType::Empty);
            }
            if (x, y) == to {
                break;
            }
            if (to.0 - x).abs() >= (to.1 - y).abs() {
                x += sx;
            } else {
                y += sy;
            }
        }
    }
}

/// 4-neighbourhood flood fill over a passability grid
fn flood_fill(passable: &[bool], width: usize, height: usize, start: usize) -> Vec<bool> {
    let mut reached = vec![false; passable.len()];
    if start >= passable.len() || !passable[start] {
        return reached;
    }

    let mut queue = VecDeque::new();
    reached[start] = true;
    queue.push_back(start);
    while let Some(idx) = queue.pop_front() {
        let (x, y) = (idx % width, idx / width);
        let mut neighbours = [None; 4];
        if x > 0 {
            neighbours[0] = Some(idx - 1);
        }
        if x + 1 < width {
            neighbours[1] = Some(idx + 1);
        }
        if y > 0 {
            neighbours[2] = Some(idx - width);
        }
        if y + 1 < height {
            neighbours[3] = Some(idx + width);
        }
        for next in neighbours.into_iter().flatten() {
            if passable[next] && !reached[next] {
                reached[next] = true;
                queue.push_back(next);
            }
        }
    }
    reached
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(width: u32, height: u32, seed: u64) -> MapConfig {
        MapConfig {
            width,
            height,
            seed: Some(seed),
            ..MapConfig::default()
        }
    }

    #[test]
    fn same_seed_same_map() {
        let a = TerrainGenerator::generate(&config(40, 30, 1234));
        let b = TerrainGenerator::generate(&config(40, 30, 1234));
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let a = TerrainGenerator::generate(&config(40, 30, 1));
        let b = TerrainGenerator::generate(&config(40, 30, 2));
        assert_ne!(a.tiles, b.tiles);
    }

    #[test]
    fn every_map_is_connected() {
        for seed in 0..25 {
            let dense = MapConfig {
                wall_density: 0.45,
                water_bodies: 6,
                ..config(32, 24, seed)
            };
            let map = TerrainGenerator::generate(&dense);
            assert!(map.is_fully_connected(), "seed {seed} produced a split map");
        }
    }

    #[test]
    fn small_arena_scenario() {
        let map = TerrainGenerator::generate(&config(20, 15, 42));
        for (col, row) in [(0, 0), (19, 0), (0, 14), (19, 14)] {
            let tile = map.tile_at_grid(col, row).unwrap();
            assert_eq!(tile.tile_type, TileType::Wall);
            assert!(!tile.passable);
        }
        assert!(!map.spawn_points.is_empty());
        for spawn in &map.spawn_points {
            assert!(map.tile_at_grid(spawn.col, spawn.row).unwrap().passable);
        }
    }

    #[test]
    fn two_flag_bases_on_midline() {
        let map = TerrainGenerator::generate(&config(40, 30, 9));
        assert_eq!(map.flag_bases.len(), 2);
        assert_eq!(map.flag_bases[0], GridPos::new(8, 15));
        assert_eq!(map.flag_bases[1], GridPos::new(32, 15));
    }

    #[test]
    fn spawns_are_separated() {
        let map = TerrainGenerator::generate(&config(60, 40, 77));
        for (i, a) in map.spawn_points.iter().enumerate() {
            for b in &map.spawn_points[i + 1..] {
                let dx = a.col as f32 - b.col as f32;
                let dy = a.row as f32 - b.row as f32;
                assert!((dx * dx + dy * dy).sqrt() >= MIN_SPAWN_SEPARATION);
            }
        }
    }

    #[test]
    fn degenerate_sizes_do_not_panic() {
        for (w, h) in [(0, 0), (4, 0), (1, 1), (2, 5), (3, 3)] {
            let map = TerrainGenerator::generate(&config(w, h, 5));
            assert_eq!(map.tiles.len(), (w * h) as usize);
            assert!(map.is_fully_connected());
        }
    }

    #[test]
    fn damage_tile_destroys_destructible_walls_only() {
        let mut map = TerrainGenerator::generate(&config(20, 15, 3));
        let boundary = map.tile_center(GridPos::new(0, 0));
        assert!(!map.damage_tile(boundary, 1000.0));

        let grid = GridPos::new(5, 5);
        let idx = map.index(5, 5).unwrap();
        map.tiles[idx].set_type(TileType::DestructibleWall);
        let center = map.tile_center(grid);

        assert!(!map.damage_tile(center, 60.0));
        assert_eq!(map.tile_at(center).unwrap().health, Some(40.0));
        assert!(map.damage_tile(center, 60.0));
        let tile = map.tile_at(center).unwrap();
        assert_eq!(tile.tile_type, TileType::Empty);
        assert!(tile.passable);
        assert_eq!(map.revision, 1);
    }

    #[test]
    fn tile_lookup_is_bounds_checked() {
        let map = TerrainGenerator::generate(&config(10, 10, 1));
        assert!(map.tile_at(Vector2D::new(-1.0, 5.0)).is_none());
        assert!(map.tile_at(Vector2D::new(5.0, 400.0)).is_none());
        let tile = map.tile_at(Vector2D::new(45.0, 85.0)).unwrap();
        assert_eq!(tile.grid, GridPos::new(1, 2));
    }

    #[test]
    fn wall_bodies_cover_every_blocking_tile() {
        let map = TerrainGenerator::generate(&config(20, 15, 8));
        let blocking = map.tiles.iter().filter(|t| !t.passable).count();
        let bodies = map.wall_bodies();
        assert_eq!(bodies.len(), blocking);
        assert!(bodies.iter().all(|b| b.is_static));
    }
}
