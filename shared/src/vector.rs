use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// A point or direction in the 2D universe.
///
/// Equality is exact component equality, which is what direction comparisons
/// rely on. The serialized form uses upper-case `X`/`Y` keys.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2D {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
}

impl Vector2D {
    pub const ZERO: Vector2D = Vector2D { x: 0.0, y: 0.0 };
    pub const UP: Vector2D = Vector2D { x: 0.0, y: -1.0 };
    pub const DOWN: Vector2D = Vector2D { x: 0.0, y: 1.0 };
    pub const LEFT: Vector2D = Vector2D { x: -1.0, y: 0.0 };
    pub const RIGHT: Vector2D = Vector2D { x: 1.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns the magnitude of the vector.
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(&self, other: Vector2D) -> f64 {
        (*self - other).length()
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// Returns the unit axis direction pointing from `self` to `other`.
    ///
    /// Only meaningful for axis-aligned pairs; returns `None` when the points
    /// coincide.
    pub fn axis_direction_to(&self, other: Vector2D) -> Option<Vector2D> {
        let delta = other - *self;
        if delta.is_zero() {
            return None;
        }
        if delta.x.abs() >= delta.y.abs() {
            Some(Vector2D::new(delta.x.signum(), 0.0))
        } else {
            Some(Vector2D::new(0.0, delta.y.signum()))
        }
    }
}

impl Add for Vector2D {
    type Output = Vector2D;

    fn add(self, other: Vector2D) -> Vector2D {
        Vector2D::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Vector2D {
    fn add_assign(&mut self, other: Vector2D) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vector2D {
    type Output = Vector2D;

    fn sub(self, other: Vector2D) -> Vector2D {
        Vector2D::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Vector2D {
    type Output = Vector2D;

    fn mul(self, scalar: f64) -> Vector2D {
        Vector2D::new(self.x * scalar, self.y * scalar)
    }
}

impl Neg for Vector2D {
    type Output = Vector2D;

    fn neg(self) -> Vector2D {
        Vector2D::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_arithmetic() {
        let a = Vector2D::new(3.0, 4.0);
        let b = Vector2D::new(1.0, -2.0);

        assert_eq!(a + b, Vector2D::new(4.0, 2.0));
        assert_eq!(a - b, Vector2D::new(2.0, 6.0));
        assert_eq!(b * 3.0, Vector2D::new(3.0, -6.0));
        assert_approx_eq!(a.length(), 5.0);
    }

    #[test]
    fn test_negated_zero_component_still_equal() {
        // -(1, 0) is (-1, -0.0) which must compare equal to LEFT.
        assert_eq!(-Vector2D::RIGHT, Vector2D::LEFT);
        assert_eq!(-Vector2D::UP, Vector2D::DOWN);
    }

    #[test]
    fn test_axis_direction_to() {
        let origin = Vector2D::ZERO;
        assert_eq!(
            origin.axis_direction_to(Vector2D::new(0.0, -40.0)),
            Some(Vector2D::UP)
        );
        assert_eq!(
            origin.axis_direction_to(Vector2D::new(12.0, 0.0)),
            Some(Vector2D::RIGHT)
        );
        assert_eq!(origin.axis_direction_to(origin), None);
    }

    #[test]
    fn test_wire_keys_are_upper_case() {
        let json = serde_json::to_string(&Vector2D::new(1.5, -2.0)).unwrap();
        assert_eq!(json, r#"{"X":1.5,"Y":-2.0}"#);
    }
}
