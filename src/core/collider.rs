use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{
    collision::shapes::{Aabb, ColliderShape},
    core::types::{MassData, Material, Transform},
    error::PhysicsResult,
    utils::allocator::{BodyHandle, ColliderHandle},
};

/// Layer/mask collision filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub layer: u32,
    pub mask: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            layer: 1,
            mask: u32::MAX,
        }
    }
}

impl CollisionFilter {
    pub fn allows(&self, other: &CollisionFilter) -> bool {
        (self.mask & other.layer) != 0 && (other.mask & self.layer) != 0
    }
}

/// Shape attached to a rigid body, in the body's local frame.
#[derive(Debug, Clone)]
pub struct Collider {
    pub(crate) handle: ColliderHandle,
    pub(crate) body: BodyHandle,
    pub(crate) shape: ColliderShape,
    pub material: Material,
    /// Sensors report contact begin/end but never push bodies apart.
    pub is_sensor: bool,
    pub collision_filter: CollisionFilter,
    pub user_data: u64,
    /// Broad-phase bounds committed at the end of the last step.
    pub(crate) aabb: Aabb,
}

impl Collider {
    pub fn handle(&self) -> ColliderHandle {
        self.handle
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn shape(&self) -> &ColliderShape {
        &self.shape
    }

    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    pub fn mass_data(&self) -> MassData {
        self.shape.mass_data(self.material.density)
    }

    pub(crate) fn compute_aabb(&self, from: &Transform, to: &Transform, margin: f32) -> Aabb {
        let start = self.shape.aabb(from);
        let end = self.shape.aabb(to);
        start.union(&end).expanded(margin)
    }

    pub fn builder(shape: ColliderShape) -> ColliderBuilder {
        ColliderBuilder::new(shape)
    }
}

/// Description of a collider to attach with [`crate::PhysicsWorld::create_collider`].
#[derive(Debug, Clone)]
pub struct ColliderBuilder {
    shape: ColliderShape,
    material: Material,
    is_sensor: bool,
    filter: CollisionFilter,
    user_data: u64,
}

impl ColliderBuilder {
    pub fn new(shape: ColliderShape) -> Self {
        Self {
            shape,
            material: Material::default(),
            is_sensor: false,
            filter: CollisionFilter::default(),
            user_data: 0,
        }
    }

    pub fn circle(radius: f32) -> PhysicsResult<Self> {
        Ok(Self::new(ColliderShape::circle(radius)?))
    }

    pub fn cuboid(half_width: f32, half_height: f32) -> PhysicsResult<Self> {
        Ok(Self::new(ColliderShape::cuboid(half_width, half_height)?))
    }

    pub fn polygon(vertices: Vec<Vec2>) -> PhysicsResult<Self> {
        Ok(Self::new(ColliderShape::polygon(vertices)?))
    }

    pub fn material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn density(mut self, density: f32) -> Self {
        self.material.density = density;
        self
    }

    pub fn friction(mut self, friction: f32) -> Self {
        self.material.friction = friction;
        self
    }

    pub fn restitution(mut self, restitution: f32) -> Self {
        self.material.restitution = restitution;
        self
    }

    pub fn sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    pub fn filter(mut self, layer: u32, mask: u32) -> Self {
        self.filter = CollisionFilter { layer, mask };
        self
    }

    pub fn user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }

    pub(crate) fn build(self, handle: ColliderHandle, body: BodyHandle) -> Collider {
        Collider {
            handle,
            body,
            shape: self.shape,
            material: self.material,
            is_sensor: self.is_sensor,
            collision_filter: self.filter,
            user_data: self.user_data,
            aabb: Aabb::default(),
        }
    }

    pub(crate) fn material_ref(&self) -> &Material {
        &self.material
    }
}
