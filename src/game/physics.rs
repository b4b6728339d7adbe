//! Physics body registry with broad and narrow phase collision

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::collision::{
    circle_circle, circle_rect, rect_rect, segment_rect_entry, swept_circle_circle,
    CollisionResult, Rect,
};
use super::terrain::GridPos;
use super::vector::Vector2D;

/// Collision layer bits shared with renderers
pub mod layers {
    pub const TERRAIN: u32 = 1;
    pub const TANK: u32 = 2;
    pub const PROJECTILE: u32 = 4;
    pub const POWERUP: u32 = 8;
}

/// Broad phase grid cell edge in world units
pub const DEFAULT_CELL_SIZE: f32 = 128.0;

/// What a body stands for in the simulation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BodyKind {
    Terrain(GridPos),
    Tank(String),
    Projectile(String),
    Powerup(String),
}

impl BodyKind {
    pub fn layer(&self) -> u32 {
        match self {
            BodyKind::Terrain(_) => layers::TERRAIN,
            BodyKind::Tank(_) => layers::TANK,
            BodyKind::Projectile(_) => layers::PROJECTILE,
            BodyKind::Powerup(_) => layers::POWERUP,
        }
    }

    /// Layers this kind reacts to
    pub fn default_mask(&self) -> u32 {
        match self {
            BodyKind::Terrain(_) => layers::TANK | layers::PROJECTILE,
            BodyKind::Tank(_) => layers::TERRAIN | layers::TANK | layers::PROJECTILE,
            BodyKind::Projectile(_) => layers::TERRAIN | layers::TANK,
            BodyKind::Powerup(_) => layers::TANK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyShape {
    Circle { radius: f32 },
    /// Axis-aligned box centered on the body position
    Rect { half_width: f32, half_height: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsBody {
    /// Registry key; tanks, projectiles and power-ups live in separate namespaces
    pub kind: BodyKind,
    pub position: Vector2D,
    /// Position before this tick's integration, used for swept tests
    pub previous_position: Vector2D,
    pub velocity: Vector2D,
    pub acceleration: Vector2D,
    pub rotation: f32,
    pub angular_velocity: f32,
    pub mass: f32,
    pub shape: BodyShape,
    /// Bounding radius used by the broad phase
    pub collision_radius: f32,
    pub collision_layer: u32,
    pub collision_mask: u32,
    pub is_static: bool,
    /// Reports contacts but never takes part in positional resolution
    pub is_trigger: bool,
    /// Fast mover: also tested along its path since the previous tick
    pub is_bullet: bool,
    pub friction: f32,
    pub bounciness: f32,
}

impl PhysicsBody {
    fn base(kind: BodyKind, position: Vector2D, shape: BodyShape) -> Self {
        let collision_radius = match shape {
            BodyShape::Circle { radius } => radius,
            BodyShape::Rect {
                half_width,
                half_height,
            } => (half_width * half_width + half_height * half_height).sqrt(),
        };
        let collision_layer = kind.layer();
        let collision_mask = kind.default_mask();
        Self {
            kind,
            position,
            previous_position: position,
            velocity: Vector2D::ZERO,
            acceleration: Vector2D::ZERO,
            rotation: 0.0,
            angular_velocity: 0.0,
            mass: 1.0,
            shape,
            collision_radius,
            collision_layer,
            collision_mask,
            is_static: false,
            is_trigger: false,
            is_bullet: false,
            friction: 0.0,
            bounciness: 0.0,
        }
    }

    pub fn tank(id: &str, position: Vector2D, radius: f32, mass: f32) -> Self {
        let mut body = Self::base(
            BodyKind::Tank(id.to_string()),
            position,
            BodyShape::Circle { radius },
        );
        body.mass = mass.max(f32::EPSILON);
        body.friction = 0.3;
        body.bounciness = 0.3;
        body
    }

    pub fn projectile(id: &str, position: Vector2D, velocity: Vector2D, radius: f32) -> Self {
        let mut body = Self::base(
            BodyKind::Projectile(id.to_string()),
            position,
            BodyShape::Circle { radius },
        );
        body.velocity = velocity;
        body.mass = 0.1;
        body.is_trigger = true;
        body.is_bullet = true;
        body
    }

    pub fn powerup(id: &str, position: Vector2D, radius: f32) -> Self {
        let mut body = Self::base(
            BodyKind::Powerup(id.to_string()),
            position,
            BodyShape::Circle { radius },
        );
        body.is_static = true;
        body.is_trigger = true;
        body.mass = f32::INFINITY;
        body
    }

    /// One-tile static wall
    pub fn wall(grid: GridPos, center: Vector2D, tile_size: f32) -> Self {
        let half = tile_size * 0.5;
        let mut body = Self::base(
            BodyKind::Terrain(grid),
            center,
            BodyShape::Rect {
                half_width: half,
                half_height: half,
            },
        );
        body.is_static = true;
        body.mass = f32::INFINITY;
        body.friction = 1.0;
        body
    }

    pub fn inverse_mass(&self) -> f32 {
        if self.is_static || !self.mass.is_finite() || self.mass <= 0.0 {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    pub fn rect(&self) -> Option<Rect> {
        match self.shape {
            BodyShape::Rect {
                half_width,
                half_height,
            } => Some(Rect {
                center: self.position,
                half_width,
                half_height,
                rotation: self.rotation,
            }),
            BodyShape::Circle { .. } => None,
        }
    }

    /// Distance from `point` to the body's outline, zero when inside
    pub fn surface_distance(&self, point: Vector2D) -> f32 {
        match self.shape {
            BodyShape::Circle { radius } => (point.distance(self.position) - radius).max(0.0),
            BodyShape::Rect {
                half_width,
                half_height,
            } => {
                let local = (point - self.position).rotate(-self.rotation);
                let dx = (local.x.abs() - half_width).max(0.0);
                let dy = (local.y.abs() - half_height).max(0.0);
                (dx * dx + dy * dy).sqrt()
            }
        }
    }

    /// Moves the body, remembering where it was for swept tests
    pub fn move_to(&mut self, position: Vector2D, velocity: Vector2D) {
        self.previous_position = self.position;
        self.position = position;
        self.velocity = velocity;
    }

    fn reacts_to(&self, other: &PhysicsBody) -> bool {
        (self.collision_mask & other.collision_layer) != 0
            && (other.collision_mask & self.collision_layer) != 0
    }

    fn bounds(&self) -> (Vector2D, Vector2D) {
        let r = self.collision_radius;
        let mut min = Vector2D::new(self.position.x - r, self.position.y - r);
        let mut max = Vector2D::new(self.position.x + r, self.position.y + r);
        if self.is_bullet {
            min.x = min.x.min(self.previous_position.x - r);
            min.y = min.y.min(self.previous_position.y - r);
            max.x = max.x.max(self.previous_position.x + r);
            max.y = max.y.max(self.previous_position.y + r);
        }
        (min, max)
    }
}

/// A detected collision between two registered bodies
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub body_a: BodyKind,
    pub body_b: BodyKind,
    /// Normal points from `body_a` toward `body_b`
    pub result: CollisionResult,
}

/// Registry of every simulated body, keyed by kind in sorted order
#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    bodies: BTreeMap<BodyKind, PhysicsBody>,
    cell_size: f32,
}

impl PhysicsWorld {
    pub fn new(cell_size: f32) -> Self {
        Self {
            bodies: BTreeMap::new(),
            cell_size: if cell_size > 0.0 {
                cell_size
            } else {
                DEFAULT_CELL_SIZE
            },
        }
    }

    /// Replaces any body of the same kind and id
    pub fn add_body(&mut self, body: PhysicsBody) {
        self.bodies.insert(body.kind.clone(), body);
    }

    pub fn remove_body(&mut self, kind: &BodyKind) -> Option<PhysicsBody> {
        self.bodies.remove(kind)
    }

    pub fn get(&self, kind: &BodyKind) -> Option<&PhysicsBody> {
        self.bodies.get(kind)
    }

    pub fn get_mut(&mut self, kind: &BodyKind) -> Option<&mut PhysicsBody> {
        self.bodies.get_mut(kind)
    }

    pub fn contains(&self, kind: &BodyKind) -> bool {
        self.bodies.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn bodies(&self) -> impl Iterator<Item = &PhysicsBody> {
        self.bodies.values()
    }

    /// Bodies on any of the given layers
    pub fn bodies_on_layer(&self, layer_mask: u32) -> impl Iterator<Item = &PhysicsBody> {
        self.bodies
            .values()
            .filter(move |b| b.collision_layer & layer_mask != 0)
    }

    /// Keeps only the bodies the predicate accepts
    pub fn retain(&mut self, mut keep: impl FnMut(&PhysicsBody) -> bool) {
        self.bodies.retain(|_, body| keep(body));
    }

    /// Broad phase, narrow phase and positional resolution for one tick.
    /// Contacts come back in deterministic (kind) order.
    pub fn step(&mut self, dt: f32) -> Vec<Contact> {
        let keys: Vec<BodyKind> = self.bodies.keys().cloned().collect();
        let pairs = self.broad_phase(&keys);

        let mut contacts = Vec::new();
        for (i, j) in pairs {
            let (Some(a), Some(b)) = (self.bodies.get(&keys[i]), self.bodies.get(&keys[j])) else {
                continue;
            };
            if (a.is_static && b.is_static) || !a.reacts_to(b) {
                continue;
            }

            let result = narrow_phase(a, b, dt);
            if !result.is_colliding {
                continue;
            }
            if !a.is_trigger && !b.is_trigger {
                self.separate(&keys[i], &keys[j], &result);
            }

            contacts.push(Contact {
                body_a: keys[i].clone(),
                body_b: keys[j].clone(),
                result,
            });
        }
        contacts
    }

    fn broad_phase(&self, keys: &[BodyKind]) -> BTreeSet<(usize, usize)> {
        let mut grid: HashMap<(i32, i32), Vec<usize>> = HashMap::new();
        for (idx, key) in keys.iter().enumerate() {
            let Some(body) = self.bodies.get(key) else {
                continue;
            };
            let (min, max) = body.bounds();
            let (x0, y0) = self.cell_of(min);
            let (x1, y1) = self.cell_of(max);
            for cy in y0..=y1 {
                for cx in x0..=x1 {
                    grid.entry((cx, cy)).or_default().push(idx);
                }
            }
        }

        let mut pairs = BTreeSet::new();
        for members in grid.values() {
            for (n, &i) in members.iter().enumerate() {
                for &j in &members[n + 1..] {
                    pairs.insert((i.min(j), i.max(j)));
                }
            }
        }
        pairs
    }

    fn cell_of(&self, point: Vector2D) -> (i32, i32) {
        (
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }

    /// Push overlapping bodies apart, weighted by inverse mass
    fn separate(&mut self, a: &BodyKind, b: &BodyKind, result: &CollisionResult) {
        let inv_a = self.bodies.get(a).map_or(0.0, PhysicsBody::inverse_mass);
        let inv_b = self.bodies.get(b).map_or(0.0, PhysicsBody::inverse_mass);
        let total = inv_a + inv_b;
        if total <= 0.0 {
            return;
        }

        let correction = result.normal * (result.penetration / total);
        if let Some(body) = self.bodies.get_mut(a) {
            body.position -= correction * inv_a;
        }
        if let Some(body) = self.bodies.get_mut(b) {
            body.position += correction * inv_b;
        }
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

fn narrow_phase(a: &PhysicsBody, b: &PhysicsBody, dt: f32) -> CollisionResult {
    match (a.shape, b.shape) {
        (BodyShape::Circle { radius: ra }, BodyShape::Circle { radius: rb }) => {
            let result = circle_circle(a.position, ra, b.position, rb);
            if result.is_colliding || !(a.is_bullet || b.is_bullet) || dt <= 0.0 {
                return result;
            }
            let va = (a.position - a.previous_position) * (1.0 / dt);
            let vb = (b.position - b.previous_position) * (1.0 / dt);
            match swept_circle_circle(a.previous_position, va, ra, b.previous_position, vb, rb, dt) {
                Some(hit) => CollisionResult::hit(0.0, hit.normal, hit.contact_point),
                None => CollisionResult::NONE,
            }
        }
        (BodyShape::Circle { radius }, BodyShape::Rect { .. }) => match b.rect() {
            Some(rect) => circle_vs_rect(a, radius, &rect),
            None => CollisionResult::NONE,
        },
        (BodyShape::Rect { .. }, BodyShape::Circle { radius }) => match a.rect() {
            Some(rect) => circle_vs_rect(b, radius, &rect).flipped(),
            None => CollisionResult::NONE,
        },
        (BodyShape::Rect { .. }, BodyShape::Rect { .. }) => match (a.rect(), b.rect()) {
            (Some(ra), Some(rb)) => rect_rect(&ra, &rb),
            _ => CollisionResult::NONE,
        },
    }
}

fn circle_vs_rect(circle: &PhysicsBody, radius: f32, rect: &Rect) -> CollisionResult {
    let result = circle_rect(circle.position, radius, rect);
    if result.is_colliding || !circle.is_bullet {
        return result;
    }
    // Thin-wall tunneling check along the path travelled this tick
    match segment_rect_entry(circle.previous_position, circle.position, rect) {
        Some(entry) => {
            let travel = (circle.position - circle.previous_position).normalize();
            CollisionResult::hit(0.0, travel, entry)
        }
        None => CollisionResult::NONE,
    }
}
