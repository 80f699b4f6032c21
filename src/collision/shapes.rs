//! Shape descriptions handed to the collision backend, plus bounds and mass helpers.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{
    core::types::{MassData, Transform},
    error::{PhysicsError, PhysicsResult},
    utils::math::cross,
};

/// Largest vertex count accepted for a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn expanded(&self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }
}

/// Enumeration of supported collider geometries, in the collider's local frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Circle {
        center: Vec2,
        radius: f32,
    },
    /// Convex polygon with counter-clockwise vertices and outward edge normals.
    Polygon {
        vertices: Vec<Vec2>,
        normals: Vec<Vec2>,
        centroid: Vec2,
    },
}

impl ColliderShape {
    pub fn circle(radius: f32) -> PhysicsResult<Self> {
        Self::circle_at(Vec2::ZERO, radius)
    }

    pub fn circle_at(center: Vec2, radius: f32) -> PhysicsResult<Self> {
        if !(radius > 0.0 && radius.is_finite()) || !center.is_finite() {
            return Err(PhysicsError::InvalidShape("circle radius must be positive and finite"));
        }
        Ok(ColliderShape::Circle { center, radius })
    }

    /// Rectangle centered on the local origin.
    pub fn cuboid(half_width: f32, half_height: f32) -> PhysicsResult<Self> {
        Self::polygon(vec![
            Vec2::new(-half_width, -half_height),
            Vec2::new(half_width, -half_height),
            Vec2::new(half_width, half_height),
            Vec2::new(-half_width, half_height),
        ])
    }

    /// Convex polygon; vertices may be given in either winding.
    pub fn polygon(mut vertices: Vec<Vec2>) -> PhysicsResult<Self> {
        if vertices.len() < 3 || vertices.len() > MAX_POLYGON_VERTICES {
            return Err(PhysicsError::InvalidShape("polygon needs 3 to 8 vertices"));
        }
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(PhysicsError::InvalidShape("polygon vertices must be finite"));
        }

        if signed_area(&vertices) < 0.0 {
            vertices.reverse();
        }

        let count = vertices.len();
        let mut normals = Vec::with_capacity(count);
        for i in 0..count {
            let edge = vertices[(i + 1) % count] - vertices[i];
            if edge.length_squared() <= f32::EPSILON * f32::EPSILON {
                return Err(PhysicsError::InvalidShape("polygon has a degenerate edge"));
            }
            normals.push(Vec2::new(edge.y, -edge.x).normalize());
        }

        for i in 0..count {
            let a = vertices[i];
            let b = vertices[(i + 1) % count];
            let c = vertices[(i + 2) % count];
            if cross(b - a, c - b) <= 0.0 {
                return Err(PhysicsError::InvalidShape("polygon must be strictly convex"));
            }
        }

        let centroid = polygon_centroid(&vertices);
        Ok(ColliderShape::Polygon {
            vertices,
            normals,
            centroid,
        })
    }

    /// Tight bounds of the shape placed at `transform`.
    pub fn aabb(&self, transform: &Transform) -> Aabb {
        match self {
            ColliderShape::Circle { center, radius } => {
                Aabb::from_center_half_extents(transform.apply(*center), Vec2::splat(*radius))
            }
            ColliderShape::Polygon { vertices, .. } => {
                let first = transform.apply(vertices[0]);
                let mut aabb = Aabb::new(first, first);
                for vertex in &vertices[1..] {
                    let world = transform.apply(*vertex);
                    aabb.min = aabb.min.min(world);
                    aabb.max = aabb.max.max(world);
                }
                aabb
            }
        }
    }

    /// Mass properties for a uniform density.
    pub fn mass_data(&self, density: f32) -> MassData {
        match self {
            ColliderShape::Circle { center, radius } => {
                let mass = density * std::f32::consts::PI * radius * radius;
                MassData {
                    mass,
                    center: *center,
                    inertia: 0.5 * mass * radius * radius,
                }
            }
            ColliderShape::Polygon {
                vertices, centroid, ..
            } => polygon_mass_data(vertices, *centroid, density),
        }
    }

    /// Radius of the smallest origin-centered circle containing the shape.
    pub fn bounding_radius(&self) -> f32 {
        match self {
            ColliderShape::Circle { center, radius } => center.length() + radius,
            ColliderShape::Polygon { vertices, .. } => {
                vertices.iter().map(|v| v.length()).fold(0.0, f32::max)
            }
        }
    }
}

fn signed_area(vertices: &[Vec2]) -> f32 {
    let count = vertices.len();
    (0..count)
        .map(|i| cross(vertices[i], vertices[(i + 1) % count]))
        .sum::<f32>()
        * 0.5
}

fn polygon_centroid(vertices: &[Vec2]) -> Vec2 {
    let origin = vertices[0];
    let mut area = 0.0;
    let mut center = Vec2::ZERO;
    for i in 1..vertices.len() - 1 {
        let e1 = vertices[i] - origin;
        let e2 = vertices[i + 1] - origin;
        let triangle_area = 0.5 * cross(e1, e2);
        area += triangle_area;
        center += triangle_area * (e1 + e2) / 3.0;
    }
    origin + center / area
}

fn polygon_mass_data(vertices: &[Vec2], centroid: Vec2, density: f32) -> MassData {
    // Triangle fan around the centroid; inertia accumulates about the centroid.
    let mut area = 0.0;
    let mut inertia = 0.0;
    let count = vertices.len();
    for i in 0..count {
        let e1 = vertices[i] - centroid;
        let e2 = vertices[(i + 1) % count] - centroid;
        let d = cross(e1, e2);
        area += 0.5 * d;
        let intx2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
        let inty2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
        inertia += (0.25 / 3.0 * d) * (intx2 + inty2);
    }

    MassData {
        mass: density * area,
        center: centroid,
        inertia: density * inertia,
    }
}
