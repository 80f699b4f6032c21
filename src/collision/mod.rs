//! Collision collaborators: the backend boundary the dynamics core consumes and a
//! reference implementation built on a uniform grid and circle/polygon tests.

pub mod broadphase;
pub mod ccd;
pub mod clipping;
pub mod contact;
pub mod narrowphase;
pub mod queries;
pub mod shapes;

pub use broadphase::{BroadPhase, SpatialGrid};
pub use ccd::{CcdSolver, ToiInput, ToiOutput, ToiState};
pub use contact::{Contact, ContactKey, ContactManager, Manifold, ManifoldPoint};
pub use narrowphase::NarrowPhase;
pub use queries::{Ray, RayHit};
pub use shapes::{Aabb, ColliderShape};

use crate::{
    config::SimulationConfig,
    core::{
        collider::Collider,
        rigidbody::RigidBody,
        types::{MassData, Transform},
    },
    utils::allocator::{Arena, BodyHandle, ColliderHandle},
};

/// Current bounds of every collider whose body takes part in the simulation.
/// Colliders on disabled bodies get no proxy.
pub(crate) fn enabled_proxies(
    bodies: &Arena<BodyHandle, RigidBody>,
    colliders: &Arena<ColliderHandle, Collider>,
) -> Vec<(ColliderHandle, Aabb)> {
    colliders
        .iter()
        .filter(|(_, collider)| bodies.get(collider.body()).is_some_and(RigidBody::is_enabled))
        .map(|(handle, collider)| (handle, collider.aabb()))
        .collect()
}

/// Everything the simulation core needs from collision geometry.
///
/// The world commits collider bounds once per step through [`CollisionBackend::sync`]
/// and asks for candidate pairs, manifolds, times of impact and mass properties.
pub trait CollisionBackend: Send + Sync {
    /// Replaces the set of broad-phase proxies with the given bounds.
    fn sync(&mut self, proxies: &[(ColliderHandle, Aabb)]);

    /// Colliders whose committed bounds overlap, each pair once, in handle order.
    fn candidate_pairs(&self) -> Vec<(ColliderHandle, ColliderHandle)>;

    /// Colliders whose committed bounds overlap `aabb`.
    fn query_aabb(&self, aabb: &Aabb) -> Vec<ColliderHandle>;

    fn compute_manifold(
        &self,
        shape_a: &ColliderShape,
        xf_a: &Transform,
        shape_b: &ColliderShape,
        xf_b: &Transform,
    ) -> Manifold;

    fn time_of_impact(&self, input: &ToiInput<'_>) -> ToiOutput;

    fn mass_data(&self, shape: &ColliderShape, density: f32) -> MassData {
        shape.mass_data(density)
    }

    /// Entry distance and normal of `ray` into a placed shape.
    fn ray_cast(&self, ray: &Ray, shape: &ColliderShape, xf: &Transform) -> Option<(f32, glam::Vec2)> {
        queries::ray_cast_shape(ray, shape, xf)
    }
}

/// Grid broad-phase plus the built-in narrow-phase and conservative advancement.
#[derive(Debug, Clone)]
pub struct DefaultBackend {
    broadphase: BroadPhase,
    narrowphase: NarrowPhase,
    ccd: CcdSolver,
}

impl DefaultBackend {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            broadphase: BroadPhase::new(config.broadphase_cell_size),
            narrowphase: NarrowPhase::new(4.0 * config.linear_slop),
            ccd: CcdSolver {
                target: -3.0 * config.linear_slop,
                tolerance: 0.25 * config.linear_slop,
                ..CcdSolver::default()
            },
        }
    }
}

impl Default for DefaultBackend {
    fn default() -> Self {
        Self::new(&SimulationConfig::default())
    }
}

impl CollisionBackend for DefaultBackend {
    fn sync(&mut self, proxies: &[(ColliderHandle, Aabb)]) {
        self.broadphase.sync(proxies);
    }

    fn candidate_pairs(&self) -> Vec<(ColliderHandle, ColliderHandle)> {
        self.broadphase.potential_pairs()
    }

    fn query_aabb(&self, aabb: &Aabb) -> Vec<ColliderHandle> {
        self.broadphase.query(aabb)
    }

    fn compute_manifold(
        &self,
        shape_a: &ColliderShape,
        xf_a: &Transform,
        shape_b: &ColliderShape,
        xf_b: &Transform,
    ) -> Manifold {
        self.narrowphase.collide(shape_a, xf_a, shape_b, xf_b)
    }

    fn time_of_impact(&self, input: &ToiInput<'_>) -> ToiOutput {
        self.ccd.time_of_impact(input)
    }
}
