use std::f64::consts::TAU;
use std::ops::{Add, Div, Mul, Neg, Sub};

use rand::Rng;

/// Immutable 2-D vector handed to scripts as `Vector`.
///
/// Every operation returns a new value. Any result with a non-finite
/// component collapses to [`Vector::ZERO`] instead of propagating NaN or
/// infinity into script state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }.healed()
    }

    pub fn from_angle(angle: f64, length: f64) -> Self {
        Self::new(length * angle.cos(), length * angle.sin())
    }

    pub fn random_unit<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let angle = rng.gen_range(0.0..TAU);
        Self::from_angle(angle, 1.0)
    }

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn add(self, other: Vector) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Vector) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }

    pub fn add_scalar(self, value: f64) -> Self {
        Self::new(self.x + value, self.y + value)
    }

    pub fn sub_scalar(self, value: f64) -> Self {
        Self::new(self.x - value, self.y - value)
    }

    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Division by zero (or by a non-finite divisor) yields the zero vector.
    pub fn div(self, divisor: f64) -> Self {
        if divisor == 0.0 || !divisor.is_finite() {
            return Self::ZERO;
        }
        Self::new(self.x / divisor, self.y / divisor)
    }

    pub fn mag(self) -> f64 {
        finite_or_zero(self.x.hypot(self.y))
    }

    pub fn mag_sq(self) -> f64 {
        finite_or_zero(self.x * self.x + self.y * self.y)
    }

    pub fn normalize(self) -> Self {
        let mag = self.mag();
        if mag > 0.0 {
            self.div(mag)
        } else {
            Self::ZERO
        }
    }

    pub fn set_mag(self, length: f64) -> Self {
        self.normalize().scale(length)
    }

    /// Clamps the magnitude to `max`, keeping the direction.
    pub fn limit(self, max: f64) -> Self {
        if self.mag_sq() > max * max {
            self.set_mag(max)
        } else {
            self
        }
    }

    pub fn heading(self) -> f64 {
        finite_or_zero(self.y.atan2(self.x))
    }

    pub fn rotate(self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    pub fn lerp(self, target: Vector, amount: f64) -> Self {
        Self::new(
            self.x + (target.x - self.x) * amount,
            self.y + (target.y - self.y) * amount,
        )
    }

    pub fn dot(self, other: Vector) -> f64 {
        finite_or_zero(self.x * other.x + self.y * other.y)
    }

    /// 2-D cross product (z component of the 3-D cross product).
    pub fn cross(self, other: Vector) -> f64 {
        finite_or_zero(self.x * other.y - self.y * other.x)
    }

    pub fn dist(self, other: Vector) -> f64 {
        finite_or_zero((self.x - other.x).hypot(self.y - other.y))
    }

    pub fn dist_sq(self, other: Vector) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        finite_or_zero(dx * dx + dy * dy)
    }

    fn healed(self) -> Self {
        if self.x.is_finite() && self.y.is_finite() {
            self
        } else {
            Self::ZERO
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Vector) -> Vector {
        Vector::add(self, rhs)
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, rhs: Vector) -> Vector {
        Vector::sub(self, rhs)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, rhs: f64) -> Vector {
        self.scale(rhs)
    }
}

impl Div<f64> for Vector {
    type Output = Vector;

    fn div(self, rhs: f64) -> Vector {
        Vector::div(self, rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        self.scale(-1.0)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn normalize_of_zero_vector_is_zero() {
        let result = Vector::ZERO.normalize();
        assert_eq!(result, Vector::ZERO);
        assert!(result.x.is_finite() && result.y.is_finite());
    }

    #[test]
    fn divide_by_zero_yields_zero_vector() {
        assert_eq!(Vector::new(3.0, -4.0).div(0.0), Vector::ZERO);
        assert_eq!(Vector::new(3.0, -4.0) / 0.0, Vector::ZERO);
        assert_eq!(Vector::new(3.0, -4.0).div(f64::NAN), Vector::ZERO);
    }

    #[test]
    fn constructor_heals_non_finite_components() {
        assert_eq!(Vector::new(f64::NAN, 1.0), Vector::ZERO);
        assert_eq!(Vector::new(1.0, f64::INFINITY), Vector::ZERO);
    }

    #[test]
    fn overflowing_scale_heals_to_zero() {
        let huge = Vector::new(f64::MAX, f64::MAX);
        assert_eq!(huge.scale(10.0), Vector::ZERO);
        assert_eq!(huge.mag_sq(), 0.0);
    }

    #[test]
    fn operations_return_new_values_without_touching_operands() {
        let a = Vector::new(1.0, 2.0);
        let b = Vector::new(3.0, 5.0);
        let sum = a + b;
        assert_eq!(sum, Vector::new(4.0, 7.0));
        assert_eq!(a, Vector::new(1.0, 2.0));
        assert_eq!(b, Vector::new(3.0, 5.0));
        assert_eq!(b - a, Vector::new(2.0, 3.0));
        assert_eq!(-a, Vector::new(-1.0, -2.0));
        assert_eq!(a.add_scalar(1.0), Vector::new(2.0, 3.0));
        assert_eq!(a.sub_scalar(1.0), Vector::new(0.0, 1.0));
    }

    #[test]
    fn magnitude_and_normalize() {
        let v = Vector::new(3.0, 4.0);
        assert!(approx(v.mag(), 5.0));
        assert!(approx(v.mag_sq(), 25.0));
        let unit = v.normalize();
        assert!(approx(unit.mag(), 1.0));
        assert!(approx(unit.x, 0.6));
    }

    #[test]
    fn limit_clamps_only_longer_vectors() {
        let long = Vector::new(30.0, 40.0).limit(5.0);
        assert!(approx(long.mag(), 5.0));
        let short = Vector::new(1.0, 1.0);
        assert_eq!(short.limit(5.0), short);
    }

    #[test]
    fn rotate_quarter_turn() {
        let rotated = Vector::new(1.0, 0.0).rotate(FRAC_PI_2);
        assert!(approx(rotated.x, 0.0));
        assert!(approx(rotated.y, 1.0));
    }

    #[test]
    fn heading_and_from_angle_agree() {
        let v = Vector::from_angle(PI / 3.0, 2.0);
        assert!(approx(v.heading(), PI / 3.0));
        assert!(approx(v.mag(), 2.0));
    }

    #[test]
    fn dot_cross_and_distance() {
        let a = Vector::new(1.0, 0.0);
        let b = Vector::new(0.0, 1.0);
        assert!(approx(a.dot(b), 0.0));
        assert!(approx(a.cross(b), 1.0));
        assert!(approx(b.cross(a), -1.0));
        assert!(approx(a.dist(b), 2f64.sqrt()));
        assert!(approx(a.dist_sq(b), 2.0));
    }

    #[test]
    fn lerp_moves_fraction_of_the_way() {
        let mid = Vector::new(0.0, 0.0).lerp(Vector::new(10.0, -10.0), 0.25);
        assert_eq!(mid, Vector::new(2.5, -2.5));
    }

    #[test]
    fn random_unit_has_unit_length() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            assert!(approx(Vector::random_unit(&mut rng).mag(), 1.0));
        }
    }
}
