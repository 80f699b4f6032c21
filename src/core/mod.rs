//! Core types describing bodies, colliders and the shared value types between them.

pub mod collider;
pub mod rigidbody;
pub mod types;

pub use collider::{Collider, ColliderBuilder, CollisionFilter};
pub use rigidbody::{BodyDef, BodyType, MotionState, RigidBody};
pub use types::{
    MassData, Material, MaterialMixing, MaterialPairProperties, MixingMode, Rotation, Sweep,
    Transform, Velocity,
};
