use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::shapes::{Aabb, ColliderShape};
use crate::{
    core::types::Transform,
    error::{PhysicsError, PhysicsResult},
    utils::allocator::{BodyHandle, ColliderHandle},
};

/// Ray with a unit direction, tested up to `max_distance`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Vec2,
    pub direction: Vec2,
    pub max_distance: f32,
}

impl Ray {
    /// Normalizes `direction`; a zero direction yields a ray that hits nothing.
    ///
    /// `origin` and `max_distance` must be finite, and `max_distance` non-negative.
    pub fn new(origin: Vec2, direction: Vec2, max_distance: f32) -> PhysicsResult<Self> {
        if !(max_distance >= 0.0 && max_distance.is_finite()) {
            return Err(PhysicsError::InvalidConfig {
                name: "max_distance",
                value: max_distance,
            });
        }
        if !origin.is_finite() || !direction.is_finite() {
            return Err(PhysicsError::InvalidConfig {
                name: "ray",
                value: f32::NAN,
            });
        }
        Ok(Self {
            origin,
            direction: direction.normalize_or_zero(),
            max_distance,
        })
    }

    pub fn point_at(&self, distance: f32) -> Vec2 {
        self.origin + self.direction * distance
    }

    /// Bounds of the swept segment, used to pre-filter candidates.
    pub fn aabb(&self) -> Aabb {
        let end = self.point_at(self.max_distance);
        Aabb::new(self.origin.min(end), self.origin.max(end))
    }
}

/// Result of a ray cast against colliders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub collider: ColliderHandle,
    pub body: BodyHandle,
    pub point: Vec2,
    pub normal: Vec2,
    pub distance: f32,
}

/// Distance and surface normal where `ray` enters `shape`.
pub fn ray_cast_shape(ray: &Ray, shape: &ColliderShape, transform: &Transform) -> Option<(f32, Vec2)> {
    if ray.direction == Vec2::ZERO || !(ray.max_distance >= 0.0) {
        return None;
    }
    match shape {
        ColliderShape::Circle { center, radius } => {
            ray_circle(ray, transform.apply(*center), *radius)
        }
        ColliderShape::Polygon {
            vertices, normals, ..
        } => {
            let local = Ray {
                origin: transform.apply_inverse(ray.origin),
                direction: transform.rotation.inv_rotate(ray.direction),
                max_distance: ray.max_distance,
            };
            ray_polygon(&local, vertices, normals)
                .map(|(distance, normal)| (distance, transform.rotation.rotate(normal)))
        }
    }
}

fn ray_circle(ray: &Ray, center: Vec2, radius: f32) -> Option<(f32, Vec2)> {
    let oc = ray.origin - center;
    let b = oc.dot(ray.direction);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = -b - discriminant.sqrt();
    if t < 0.0 || t > ray.max_distance {
        return None;
    }
    let normal = (ray.point_at(t) - center).normalize_or_zero();
    Some((t, normal))
}

/// Cyrus-Beck clipping of the ray against each polygon edge.
fn ray_polygon(ray: &Ray, vertices: &[Vec2], normals: &[Vec2]) -> Option<(f32, Vec2)> {
    let mut lower = 0.0;
    let mut upper = ray.max_distance;
    let mut entry_edge = None;

    for (vertex, normal) in vertices.iter().zip(normals) {
        let numerator = normal.dot(*vertex - ray.origin);
        let denominator = normal.dot(ray.direction);

        if denominator.abs() < 1e-6 {
            if numerator < 0.0 {
                return None;
            }
        } else if denominator < 0.0 && numerator < lower * denominator {
            lower = numerator / denominator;
            entry_edge = Some(*normal);
        } else if denominator > 0.0 && numerator < upper * denominator {
            upper = numerator / denominator;
        }

        if upper < lower {
            return None;
        }
    }

    entry_edge.map(|normal| (lower, normal))
}

/// Slab test returning the entry distance of `ray` into `aabb`.
pub fn ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    let mut t_min = 0.0_f32;
    let mut t_max = ray.max_distance;

    for i in 0..2 {
        let origin = ray.origin[i];
        let direction = ray.direction[i];
        let (min, max) = (aabb.min[i], aabb.max[i]);

        if direction.abs() < 1e-6 {
            if origin < min || origin > max {
                return None;
            }
        } else {
            let inv_dir = 1.0 / direction;
            let mut t1 = (min - origin) * inv_dir;
            let mut t2 = (max - origin) * inv_dir;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }
    }

    Some(t_min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ray_hits_circle_front_face() {
        let circle = ColliderShape::circle(1.0).expect("circle");
        let ray = Ray::new(Vec2::new(-5.0, 0.0), Vec2::X, 10.0).expect("ray");
        let (distance, normal) =
            ray_cast_shape(&ray, &circle, &Transform::from_position(Vec2::new(2.0, 0.0))).expect("hit");
        assert_abs_diff_eq!(distance, 6.0, epsilon = 1e-5);
        assert_abs_diff_eq!(normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn ray_hits_rotated_box() {
        let square = ColliderShape::cuboid(1.0, 1.0).expect("box");
        let xf = Transform::new(Vec2::new(0.0, 5.0), std::f32::consts::FRAC_PI_2);
        let ray = Ray::new(Vec2::ZERO, Vec2::Y, 10.0).expect("ray");
        let (distance, normal) = ray_cast_shape(&ray, &square, &xf).expect("hit");
        assert_abs_diff_eq!(distance, 4.0, epsilon = 1e-5);
        assert_abs_diff_eq!(normal.y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn ray_stops_at_max_distance() {
        let square = ColliderShape::cuboid(1.0, 1.0).expect("box");
        let ray = Ray::new(Vec2::ZERO, Vec2::X, 2.0).expect("ray");
        assert!(ray_cast_shape(&ray, &square, &Transform::from_position(Vec2::new(5.0, 0.0))).is_none());
    }

    #[test]
    fn slab_test_matches_entry_distance() {
        let aabb = Aabb::new(Vec2::new(2.0, -1.0), Vec2::new(4.0, 1.0));
        let ray = Ray::new(Vec2::ZERO, Vec2::X, 10.0).expect("ray");
        assert_abs_diff_eq!(ray_aabb(&ray, &aabb).expect("hit"), 2.0);
        let miss = Ray::new(Vec2::new(0.0, 3.0), Vec2::X, 10.0).expect("ray");
        assert!(ray_aabb(&miss, &aabb).is_none());
    }

    #[test]
    fn unbounded_rays_are_rejected() {
        assert!(matches!(
            Ray::new(Vec2::ZERO, Vec2::X, f32::INFINITY),
            Err(PhysicsError::InvalidConfig { name: "max_distance", .. })
        ));
        assert!(Ray::new(Vec2::ZERO, Vec2::X, -1.0).is_err());
        assert!(Ray::new(Vec2::ZERO, Vec2::X, f32::NAN).is_err());
        assert!(Ray::new(Vec2::new(f32::NAN, 0.0), Vec2::X, 1.0).is_err());
        assert!(Ray::new(Vec2::ZERO, Vec2::X, 0.0).is_ok());
    }
}
