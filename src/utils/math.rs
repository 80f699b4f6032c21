//! Additional 2D math helpers layered on top of `glam`.

use glam::Vec2;

/// Scalar cross product `a × b` of two planar vectors.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.perp_dot(b)
}

/// Cross product of a scalar (out-of-plane) and a vector: `s × v`.
#[inline]
pub fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Cross product of a vector and a scalar: `v × s`.
#[inline]
pub fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// Velocity of a point offset by `r` from the center of mass.
#[inline]
pub fn point_velocity(linear: Vec2, angular: f32, r: Vec2) -> Vec2 {
    linear + cross_sv(angular, r)
}

/// Tangent direction of a contact normal (the normal rotated by -90°).
#[inline]
pub fn tangent_of(normal: Vec2) -> Vec2 {
    cross_vs(normal, 1.0)
}

/// Inverse of a positive scalar effective mass, zero when degenerate.
#[inline]
pub fn inverse_or_zero(value: f32) -> f32 {
    if value > f32::EPSILON && value.is_finite() {
        1.0 / value
    } else {
        0.0
    }
}

/// Wraps an angle into `(-π, π]`.
pub fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let mut wrapped = angle % TAU;
    if wrapped > PI {
        wrapped -= TAU;
    } else if wrapped <= -PI {
        wrapped += TAU;
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    #[test]
    fn scalar_cross_products_match_3d_embedding() {
        let r = Vec2::new(2.0, -1.0);
        let w = 3.0;
        let v = cross_sv(w, r);
        assert_abs_diff_eq!(v.x, 3.0);
        assert_abs_diff_eq!(v.y, 6.0);
        assert_abs_diff_eq!(cross(r, v), w * r.length_squared());
        assert_abs_diff_eq!(cross_vs(r, w), -cross_sv(w, r));
    }

    #[test]
    fn tangent_is_perpendicular() {
        let n = Vec2::new(0.6, 0.8);
        let t = tangent_of(n);
        assert_abs_diff_eq!(n.dot(t), 0.0);
        assert_abs_diff_eq!(t.length(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn wrap_angle_stays_in_range() {
        assert_abs_diff_eq!(wrap_angle(3.0 * PI - 0.1), PI - 0.1, epsilon = 1e-4);
        assert_abs_diff_eq!(wrap_angle(-PI / 2.0 - 4.0 * PI), -PI / 2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(wrap_angle(0.25), 0.25);
    }
}
