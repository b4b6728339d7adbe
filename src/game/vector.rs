//! 2D vector math shared by every simulated entity

use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Below this magnitude a vector is treated as zero
const EPSILON: f32 = 1e-10;

/// 2D vector in world units (y grows downward, screen space)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2D {
    pub x: f32,
    pub y: f32,
}

impl Vector2D {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };
    pub const UNIT_X: Self = Self { x: 1.0, y: 0.0 };
    pub const UNIT_Y: Self = Self { x: 0.0, y: 1.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `angle` (radians)
    pub fn from_angle(angle: f32) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }

    pub fn multiply(self, scalar: f32) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }

    /// Division by a (near) zero scalar yields the zero vector
    pub fn divide(self, scalar: f32) -> Self {
        if scalar.abs() < EPSILON {
            return Self::ZERO;
        }
        Self::new(self.x / scalar, self.y / scalar)
    }

    pub fn add_in_place(&mut self, other: Self) -> &mut Self {
        self.x += other.x;
        self.y += other.y;
        self
    }

    pub fn subtract_in_place(&mut self, other: Self) -> &mut Self {
        self.x -= other.x;
        self.y -= other.y;
        self
    }

    pub fn multiply_in_place(&mut self, scalar: f32) -> &mut Self {
        self.x *= scalar;
        self.y *= scalar;
        self
    }

    pub fn divide_in_place(&mut self, scalar: f32) -> &mut Self {
        *self = self.divide(scalar);
        self
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product
    pub fn cross(self, other: Self) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn magnitude_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn magnitude(self) -> f32 {
        self.magnitude_squared().sqrt()
    }

    pub fn is_zero(self) -> bool {
        self.magnitude_squared() < EPSILON * EPSILON
    }

    /// Unit vector in the same direction; zero stays zero
    pub fn normalize(self) -> Self {
        let len = self.magnitude();
        if len < EPSILON {
            return Self::ZERO;
        }
        Self::new(self.x / len, self.y / len)
    }

    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(self, other: Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Heading in radians measured from +X
    pub fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Standard rotation matrix, radians
    pub fn rotate(self, angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    pub fn perpendicular(self) -> Self {
        Self::new(-self.y, self.x)
    }

    pub fn lerp(self, target: Self, t: f32) -> Self {
        Self::new(
            self.x + (target.x - self.x) * t,
            self.y + (target.y - self.y) * t,
        )
    }

    /// `v - 2(v·n̂)n̂`
    pub fn reflect(self, normal: Self) -> Self {
        let n = normal.normalize();
        self.subtract(n.multiply(2.0 * self.dot(n)))
    }

    /// Scales down only when the magnitude exceeds `max`
    pub fn clamp_magnitude(self, max: f32) -> Self {
        let len_sq = self.magnitude_squared();
        if len_sq > max * max && len_sq > 0.0 {
            self.multiply(max / len_sq.sqrt())
        } else {
            self
        }
    }
}

impl Add for Vector2D {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Vector2D::add(self, rhs)
    }
}

impl Sub for Vector2D {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.subtract(rhs)
    }
}

impl Mul<f32> for Vector2D {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        self.multiply(rhs)
    }
}

impl Neg for Vector2D {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl AddAssign for Vector2D {
    fn add_assign(&mut self, rhs: Self) {
        self.add_in_place(rhs);
    }
}

impl SubAssign for Vector2D {
    fn sub_assign(&mut self, rhs: Self) {
        self.subtract_in_place(rhs);
    }
}

impl MulAssign<f32> for Vector2D {
    fn mul_assign(&mut self, rhs: f32) {
        self.multiply_in_place(rhs);
    }
}
