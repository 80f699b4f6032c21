//! Utility helpers: generational arenas, 2D math and step profiling.

pub mod allocator;
pub mod math;
pub mod profiling;

pub use allocator::{Arena, ArenaHandle, BodyHandle, ColliderHandle, ContactHandle, GenerationalId, JointHandle};
pub use math::*;
