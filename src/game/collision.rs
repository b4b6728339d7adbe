//! Stateless collision primitives
//!
//! Every test returns a [`CollisionResult`] whose normal points from the first
//! shape toward the second. Degenerate input (coincident points, zero-length
//! segments, parallel lines) never produces NaN: it either falls back to a
//! canonical axis or reports no collision.

use super::vector::Vector2D;

/// Denominators below this are treated as parallel/degenerate
pub const DEGENERATE_EPSILON: f32 = 1e-10;

/// Outcome of a narrow-phase test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    pub is_colliding: bool,
    /// Overlap depth along `normal`
    pub penetration: f32,
    /// Unit vector from shape 1 toward shape 2
    pub normal: Vector2D,
    pub contact_point: Vector2D,
}

impl CollisionResult {
    pub const NONE: Self = Self {
        is_colliding: false,
        penetration: 0.0,
        normal: Vector2D::ZERO,
        contact_point: Vector2D::ZERO,
    };

    pub fn hit(penetration: f32, normal: Vector2D, contact_point: Vector2D) -> Self {
        Self {
            is_colliding: true,
            penetration,
            normal,
            contact_point,
        }
    }

    /// Same contact seen from the other body
    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }
}

/// Oriented rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub center: Vector2D,
    pub half_width: f32,
    pub half_height: f32,
    /// Radians
    pub rotation: f32,
}

impl Rect {
    pub fn new(center: Vector2D, width: f32, height: f32, rotation: f32) -> Self {
        Self {
            center,
            half_width: width * 0.5,
            half_height: height * 0.5,
            rotation,
        }
    }

    pub fn axis_aligned(center: Vector2D, width: f32, height: f32) -> Self {
        Self::new(center, width, height, 0.0)
    }

    /// Local x and y axes in world space
    pub fn axes(&self) -> [Vector2D; 2] {
        let x_axis = Vector2D::from_angle(self.rotation);
        [x_axis, x_axis.perpendicular()]
    }

    pub fn corners(&self) -> [Vector2D; 4] {
        let [ax, ay] = self.axes();
        let ex = ax * self.half_width;
        let ey = ay * self.half_height;
        [
            self.center - ex - ey,
            self.center + ex - ey,
            self.center + ex + ey,
            self.center - ex + ey,
        ]
    }

    /// Edges as (start, end) pairs
    pub fn edges(&self) -> [(Vector2D, Vector2D); 4] {
        let c = self.corners();
        [(c[0], c[1]), (c[1], c[2]), (c[2], c[3]), (c[3], c[0])]
    }

    fn project(&self, axis: Vector2D) -> (f32, f32) {
        let corners = self.corners();
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for corner in corners {
            let p = corner.dot(axis);
            min = min.min(p);
            max = max.max(p);
        }
        (min, max)
    }
}

/// Swept contact found by [`swept_circle_circle`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweptHit {
    /// Seconds into the step at which the circles first touch
    pub time: f32,
    pub normal: Vector2D,
    pub contact_point: Vector2D,
}

pub fn circle_circle(
    center1: Vector2D,
    radius1: f32,
    center2: Vector2D,
    radius2: f32,
) -> CollisionResult {
    let delta = center2 - center1;
    let dist_sq = delta.magnitude_squared();
    let combined = radius1 + radius2;
    if dist_sq >= combined * combined {
        return CollisionResult::NONE;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist < DEGENERATE_EPSILON {
        Vector2D::UNIT_X
    } else {
        delta * (1.0 / dist)
    };
    let contact = center1 + normal * radius1;
    CollisionResult::hit(combined - dist, normal, contact)
}

/// Separating-axis test between two oriented rectangles
pub fn rect_rect(rect1: &Rect, rect2: &Rect) -> CollisionResult {
    let [a0, a1] = rect1.axes();
    let [b0, b1] = rect2.axes();

    let mut min_overlap = f32::INFINITY;
    let mut best_axis = Vector2D::UNIT_X;
    for axis in [a0, a1, b0, b1] {
        let (min1, max1) = rect1.project(axis);
        let (min2, max2) = rect2.project(axis);
        let overlap = max1.min(max2) - min1.max(min2);
        if overlap <= 0.0 {
            return CollisionResult::NONE;
        }
        if overlap < min_overlap {
            min_overlap = overlap;
            best_axis = axis;
        }
    }

    let center_delta = rect2.center - rect1.center;
    if center_delta.dot(best_axis) < 0.0 {
        best_axis = -best_axis;
    }

    // Deepest corners of rect2 along the normal approximate the contact
    let corners = rect2.corners();
    let depth_of = |c: Vector2D| c.dot(best_axis);
    let min_depth = corners
        .iter()
        .map(|c| depth_of(*c))
        .fold(f32::INFINITY, f32::min);
    let mut sum = Vector2D::ZERO;
    let mut count = 0.0;
    for corner in corners {
        if depth_of(corner) - min_depth < 1e-3 {
            sum += corner;
            count += 1.0;
        }
    }
    let contact = sum.divide(count);

    CollisionResult::hit(min_overlap, best_axis, contact)
}

pub fn circle_rect(center: Vector2D, radius: f32, rect: &Rect) -> CollisionResult {
    let local = (center - rect.center).rotate(-rect.rotation);
    let clamped = Vector2D::new(
        local.x.clamp(-rect.half_width, rect.half_width),
        local.y.clamp(-rect.half_height, rect.half_height),
    );

    let inside = (clamped.x - local.x).abs() < DEGENERATE_EPSILON
        && (clamped.y - local.y).abs() < DEGENERATE_EPSILON;

    if inside {
        // Push out through the nearest face
        let dx = rect.half_width - local.x.abs();
        let dy = rect.half_height - local.y.abs();
        let sign = |v: f32| if v < 0.0 { -1.0 } else { 1.0 };
        let (outward, face_point, depth) = if dx <= dy {
            (
                Vector2D::new(sign(local.x), 0.0),
                Vector2D::new(sign(local.x) * rect.half_width, local.y),
                dx,
            )
        } else {
            (
                Vector2D::new(0.0, sign(local.y)),
                Vector2D::new(local.x, sign(local.y) * rect.half_height),
                dy,
            )
        };
        let normal = (-outward).rotate(rect.rotation);
        let contact = face_point.rotate(rect.rotation) + rect.center;
        return CollisionResult::hit(radius + depth, normal, contact);
    }

    let diff = local - clamped;
    let dist_sq = diff.magnitude_squared();
    if dist_sq >= radius * radius {
        return CollisionResult::NONE;
    }
    let dist = dist_sq.sqrt();
    let normal_local = if dist < DEGENERATE_EPSILON {
        Vector2D::UNIT_X
    } else {
        -(diff * (1.0 / dist))
    };
    let contact = clamped.rotate(rect.rotation) + rect.center;
    CollisionResult::hit(radius - dist, normal_local.rotate(rect.rotation), contact)
}

/// Segment `start..end` against a circle; normal points from the segment to the circle
pub fn line_circle(start: Vector2D, end: Vector2D, center: Vector2D, radius: f32) -> CollisionResult {
    let segment = end - start;
    let len_sq = segment.magnitude_squared();
    let t = if len_sq < DEGENERATE_EPSILON {
        0.0
    } else {
        ((center - start).dot(segment) / len_sq).clamp(0.0, 1.0)
    };
    let closest = start + segment * t;
    let diff = center - closest;
    let dist_sq = diff.magnitude_squared();
    if dist_sq >= radius * radius {
        return CollisionResult::NONE;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist >= DEGENERATE_EPSILON {
        diff * (1.0 / dist)
    } else if len_sq >= DEGENERATE_EPSILON {
        segment.perpendicular().normalize()
    } else {
        Vector2D::UNIT_X
    };
    CollisionResult::hit(radius - dist, normal, closest)
}

/// Intersection point of segments `a1..a2` and `b1..b2`
pub fn line_intersection(
    a1: Vector2D,
    a2: Vector2D,
    b1: Vector2D,
    b2: Vector2D,
) -> Option<Vector2D> {
    let da = a2 - a1;
    let db = b2 - b1;
    let denom = da.cross(db);
    if denom.abs() < DEGENERATE_EPSILON {
        return None;
    }

    let offset = b1 - a1;
    let t = offset.cross(db) / denom;
    let u = offset.cross(da) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(a1 + da * t)
    } else {
        None
    }
}

/// First point along a segment where it crosses a rectangle's boundary
pub fn segment_rect_entry(start: Vector2D, end: Vector2D, rect: &Rect) -> Option<Vector2D> {
    rect.edges()
        .iter()
        .filter_map(|(e1, e2)| line_intersection(start, end, *e1, *e2))
        .min_by(|p, q| {
            start
                .distance_squared(*p)
                .total_cmp(&start.distance_squared(*q))
        })
}

/// Earliest time of impact within `[0, dt]` for two moving circles
pub fn swept_circle_circle(
    center1: Vector2D,
    velocity1: Vector2D,
    radius1: f32,
    center2: Vector2D,
    velocity2: Vector2D,
    radius2: f32,
    dt: f32,
) -> Option<SweptHit> {
    let rel_pos = center2 - center1;
    let rel_vel = velocity2 - velocity1;
    let combined = radius1 + radius2;

    let c = rel_pos.magnitude_squared() - combined * combined;
    let time = if c < 0.0 {
        // Already overlapping at the start of the step
        0.0
    } else {
        let a = rel_vel.magnitude_squared();
        if a < DEGENERATE_EPSILON {
            return None;
        }
        let b = 2.0 * rel_pos.dot(rel_vel);
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }
        let t = (-b - discriminant.sqrt()) / (2.0 * a);
        if !(0.0..=dt).contains(&t) {
            return None;
        }
        t
    };

    let p1 = center1 + velocity1 * time;
    let p2 = center2 + velocity2 * time;
    let mut normal = (p2 - p1).normalize();
    if normal.is_zero() {
        normal = Vector2D::UNIT_X;
    }
    Some(SweptHit {
        time,
        normal,
        contact_point: p1 + normal * radius1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circles_overlapping_on_x_axis() {
        let result = circle_circle(Vector2D::new(0.0, 0.0), 10.0, Vector2D::new(15.0, 0.0), 10.0);
        assert!(result.is_colliding);
        assert!((result.penetration - 5.0).abs() < 1e-5);
        assert!((result.normal.x - 1.0).abs() < 1e-5);
        assert!(result.normal.y.abs() < 1e-5);
    }

    #[test]
    fn circle_circle_is_symmetric() {
        let a = Vector2D::new(3.0, -2.0);
        let b = Vector2D::new(9.0, 5.0);
        let ab = circle_circle(a, 6.0, b, 5.0);
        let ba = circle_circle(b, 5.0, a, 6.0);
        assert!(ab.is_colliding && ba.is_colliding);
        assert_eq!(ab.penetration, ba.penetration);
        assert!((ab.normal + ba.normal).magnitude() < 1e-6);
    }

    #[test]
    fn coincident_circles_use_canonical_axis() {
        let p = Vector2D::new(4.0, 4.0);
        let result = circle_circle(p, 2.0, p, 3.0);
        assert!(result.is_colliding);
        assert_eq!(result.normal, Vector2D::UNIT_X);
        assert_eq!(result.penetration, 5.0);
    }

    #[test]
    fn separated_circles_return_zeroed_result() {
        let result = circle_circle(Vector2D::ZERO, 1.0, Vector2D::new(10.0, 0.0), 1.0);
        assert_eq!(result, CollisionResult::NONE);
    }

    #[test]
    fn rect_rect_reports_min_axis() {
        let r1 = Rect::axis_aligned(Vector2D::new(0.0, 0.0), 10.0, 10.0);
        let r2 = Rect::axis_aligned(Vector2D::new(8.0, 1.0), 10.0, 10.0);
        let result = rect_rect(&r1, &r2);
        assert!(result.is_colliding);
        assert!((result.penetration - 2.0).abs() < 1e-4);
        assert!((result.normal.x - 1.0).abs() < 1e-5);

        let far = Rect::axis_aligned(Vector2D::new(30.0, 0.0), 10.0, 10.0);
        assert!(!rect_rect(&r1, &far).is_colliding);
    }

    #[test]
    fn rotated_rect_separates_on_own_axis() {
        // Diamond whose corner points at r1 but does not reach it
        let r1 = Rect::axis_aligned(Vector2D::ZERO, 10.0, 10.0);
        let diamond = Rect::new(Vector2D::new(12.5, 0.0), 10.0, 10.0, std::f32::consts::FRAC_PI_4);
        assert!(!rect_rect(&r1, &diamond).is_colliding);
    }

    #[test]
    fn circle_touching_rect_face() {
        let rect = Rect::axis_aligned(Vector2D::new(0.0, 0.0), 20.0, 20.0);
        let result = circle_rect(Vector2D::new(-14.0, 0.0), 5.0, &rect);
        assert!(result.is_colliding);
        assert!((result.penetration - 1.0).abs() < 1e-4);
        assert!((result.normal.x - 1.0).abs() < 1e-5);
        assert!((result.contact_point.x + 10.0).abs() < 1e-4);
    }

    #[test]
    fn circle_center_inside_rect_pushes_out() {
        let rect = Rect::axis_aligned(Vector2D::ZERO, 20.0, 20.0);
        let result = circle_rect(Vector2D::new(8.0, 0.0), 3.0, &rect);
        assert!(result.is_colliding);
        assert!((result.penetration - 5.0).abs() < 1e-4);
        // Normal points from circle into the box, so the circle moves along -normal (+X)
        assert!((result.normal.x + 1.0).abs() < 1e-5);
    }

    #[test]
    fn line_circle_clamps_to_segment() {
        let hit = line_circle(Vector2D::ZERO, Vector2D::new(10.0, 0.0), Vector2D::new(5.0, 2.0), 3.0);
        assert!(hit.is_colliding);
        assert!((hit.penetration - 1.0).abs() < 1e-5);
        let miss = line_circle(Vector2D::ZERO, Vector2D::new(10.0, 0.0), Vector2D::new(14.0, 0.0), 3.0);
        assert!(!miss.is_colliding);
    }

    #[test]
    fn parallel_lines_do_not_intersect() {
        let p = line_intersection(
            Vector2D::ZERO,
            Vector2D::new(10.0, 0.0),
            Vector2D::new(0.0, 1.0),
            Vector2D::new(10.0, 1.0),
        );
        assert!(p.is_none());
        let q = line_intersection(
            Vector2D::ZERO,
            Vector2D::new(10.0, 10.0),
            Vector2D::new(0.0, 10.0),
            Vector2D::new(10.0, 0.0),
        )
        .unwrap();
        assert!((q.x - 5.0).abs() < 1e-5 && (q.y - 5.0).abs() < 1e-5);
    }

    #[test]
    fn swept_catches_tunneling() {
        // Moves 100 units in one step straight through a radius-5 target
        let hit = swept_circle_circle(
            Vector2D::ZERO,
            Vector2D::new(1000.0, 0.0),
            2.0,
            Vector2D::new(50.0, 0.0),
            Vector2D::ZERO,
            5.0,
            0.1,
        )
        .unwrap();
        assert!((hit.time - 0.043).abs() < 1e-4);
        assert!((hit.normal.x - 1.0).abs() < 1e-5);

        let miss = swept_circle_circle(
            Vector2D::ZERO,
            Vector2D::new(100.0, 0.0),
            2.0,
            Vector2D::new(50.0, 0.0),
            Vector2D::ZERO,
            5.0,
            0.1,
        );
        assert!(miss.is_none());
    }

    #[test]
    fn segment_enters_rect_at_near_face() {
        let rect = Rect::axis_aligned(Vector2D::new(20.0, 0.0), 10.0, 10.0);
        let entry = segment_rect_entry(Vector2D::ZERO, Vector2D::new(40.0, 0.0), &rect).unwrap();
        assert!((entry.x - 15.0).abs() < 1e-4);
    }
}
