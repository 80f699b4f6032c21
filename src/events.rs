//! Notifications produced during a step and the contact veto hook.

use crate::{
    collision::contact::Manifold,
    config::MAX_MANIFOLD_POINTS,
    core::collider::Collider,
    utils::allocator::{ColliderHandle, ContactHandle, JointHandle},
};

/// Something that happened inside [`crate::PhysicsWorld::step`] or a destroy call.
///
/// Events queue up in the world until [`crate::PhysicsWorld::drain_events`] is called.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    ContactBegin {
        contact: ContactHandle,
        collider_a: ColliderHandle,
        collider_b: ColliderHandle,
    },
    ContactEnd {
        contact: ContactHandle,
        collider_a: ColliderHandle,
        collider_b: ColliderHandle,
    },
    /// Fresh manifold of a touching contact, before the solver runs.
    PreSolve {
        contact: ContactHandle,
        manifold: Manifold,
    },
    /// Accumulated impulses of a touching contact after its island was solved.
    PostSolve {
        contact: ContactHandle,
        normal_impulses: [f32; MAX_MANIFOLD_POINTS],
        tangent_impulses: [f32; MAX_MANIFOLD_POINTS],
        point_count: usize,
    },
    JointBroke {
        joint: JointHandle,
        error: f32,
    },
    /// A joint was destroyed together with one of its bodies.
    JointRemoved {
        joint: JointHandle,
    },
}

/// User hook consulted for every candidate contact on every step.
///
/// Returning `false` clears the contact's points for that step, so it neither
/// touches nor produces solver constraints.
pub trait ContactFilter: Send + Sync {
    fn should_collide(&self, collider_a: &Collider, collider_b: &Collider) -> bool;
}

impl<F> ContactFilter for F
where
    F: Fn(&Collider, &Collider) -> bool + Send + Sync,
{
    fn should_collide(&self, collider_a: &Collider, collider_b: &Collider) -> bool {
        self(collider_a, collider_b)
    }
}
