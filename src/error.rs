//! Error taxonomy for world mutations and configuration.

use thiserror::Error;

use crate::utils::allocator::{BodyHandle, ColliderHandle, JointHandle};

/// Errors surfaced by world construction and mutation calls.
///
/// Numerical trouble inside a step never produces one of these: the solver
/// drops the offending impulse and records it in the step metrics instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// Bodies, colliders and joints cannot be created or destroyed mid-step.
    #[error("the world is locked while a step is in progress")]
    WorldLocked,

    #[error("body {0:?} does not exist")]
    InvalidBody(BodyHandle),

    #[error("collider {0:?} does not exist")]
    InvalidCollider(ColliderHandle),

    #[error("joint {0:?} does not exist")]
    InvalidJoint(JointHandle),

    #[error("mass must be positive and finite, got {mass}")]
    InvalidMass { mass: f32 },

    #[error("rotational inertia must be non-negative and finite, got {inertia}")]
    InvalidInertia { inertia: f32 },

    #[error("invalid shape: {0}")]
    InvalidShape(&'static str),

    #[error("a joint cannot connect body {0:?} to itself")]
    SelfJoint(BodyHandle),

    /// Neither endpoint can move along the constrained degrees of freedom.
    #[error("joint effective mass is singular: both endpoints are immovable")]
    SingularJoint,

    #[error("invalid joint parameter `{name}`: {value}")]
    InvalidJointParameter { name: &'static str, value: f32 },

    #[error("invalid configuration value `{name}`: {value}")]
    InvalidConfig { name: &'static str, value: f32 },
}

pub type PhysicsResult<T> = Result<T, PhysicsError>;
