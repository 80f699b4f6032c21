//! impulse2d – a 2D rigid-body simulation core.
//!
//! Bodies carry colliders and are linked by joints; every step the world
//! updates contacts, partitions awake bodies into islands, solves each island
//! with sequential impulses, puts resting islands to sleep and finally sub-steps
//! fast movers at their time of impact so they cannot tunnel.
//!
//! ```no_run
//! use impulse2d::{BodyDef, ColliderBuilder, PhysicsEngine, Vec2};
//!
//! # fn main() -> Result<(), impulse2d::PhysicsError> {
//! let mut engine = PhysicsEngine::new(1.0 / 60.0)?;
//! let world = engine.world_mut();
//! let ground = world.create_body(&BodyDef::fixed())?;
//! world.create_collider(ground, ColliderBuilder::cuboid(10.0, 0.5)?)?;
//! let ball = world.create_body(&BodyDef::dynamic().position(Vec2::new(0.0, 4.0)))?;
//! world.create_collider(ball, ColliderBuilder::circle(0.5)?)?;
//! engine.step(1.0)?;
//! # Ok(())
//! # }
//! ```

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod events;
pub mod utils;
pub mod world;

pub use glam::{Mat2, Vec2};

pub use collision::{
    queries::{Ray, RayHit},
    Aabb, CollisionBackend, ColliderShape, Contact, ContactManager, DefaultBackend, Manifold,
    ManifoldPoint,
};
pub use config::SimulationConfig;
pub use core::{
    collider::{Collider, ColliderBuilder, CollisionFilter},
    rigidbody::{BodyDef, BodyType, RigidBody},
    types::{MassData, Material, MaterialMixing, MixingMode, Rotation, Sweep, Transform, Velocity},
};
pub use dynamics::{
    forces::{DragForce, ForceGenerator, ForceRegistry, SpringForce},
    joints::{Joint, JointDef, JointDefKind, JointKind, JointParams, LimitState},
    solver::SolverStepMetrics,
};
pub use error::{PhysicsError, PhysicsResult};
pub use events::{ContactFilter, WorldEvent};
pub use utils::{
    allocator::{BodyHandle, ColliderHandle, ContactHandle, JointHandle},
    profiling::{StepPhase, StepProfile},
};
pub use world::PhysicsWorld;

/// Fixed-step driver that owns a [`PhysicsWorld`].
///
/// Frame times are accumulated and consumed in whole steps of the configured
/// length, so the simulation stays deterministic whatever the frame rate.
#[derive(Debug)]
pub struct PhysicsEngine {
    world: PhysicsWorld,
    time_step: f32,
    accumulator: f32,
    /// Upper bound on steps taken per call, to avoid a spiral of death.
    max_steps_per_call: u32,
}

impl PhysicsEngine {
    /// Creates an engine with default settings and the given fixed timestep.
    pub fn new(time_step: f32) -> PhysicsResult<Self> {
        Self::with_config(SimulationConfig {
            time_step,
            ..SimulationConfig::default()
        })
    }

    pub fn with_config(config: SimulationConfig) -> PhysicsResult<Self> {
        let time_step = config.time_step;
        Ok(Self {
            world: PhysicsWorld::with_config(config)?,
            time_step,
            accumulator: 0.0,
            max_steps_per_call: 8,
        })
    }

    pub fn set_max_steps_per_call(&mut self, steps: u32) {
        self.max_steps_per_call = steps.max(1);
    }

    pub fn time_step(&self) -> f32 {
        self.time_step
    }

    /// Leftover time not yet consumed by a whole step.
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Adds `dt` to the accumulator and runs as many fixed steps as fit.
    /// Returns the number of steps taken.
    pub fn step(&mut self, dt: f32) -> PhysicsResult<u32> {
        if !(dt >= 0.0 && dt.is_finite()) {
            return Err(PhysicsError::InvalidConfig { name: "dt", value: dt });
        }
        self.accumulator += dt;

        let config = *self.world.config();
        let mut steps = 0;
        while self.accumulator >= self.time_step && steps < self.max_steps_per_call {
            self.world
                .step(self.time_step, config.velocity_iterations, config.position_iterations)?;
            self.accumulator -= self.time_step;
            steps += 1;
        }
        if steps == self.max_steps_per_call && self.accumulator >= self.time_step {
            log::warn!(
                "dropping {:.3} s of simulation time after {} steps",
                self.accumulator,
                steps
            );
            self.accumulator %= self.time_step;
        }
        Ok(steps)
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_consumes_whole_steps() {
        let mut engine = PhysicsEngine::new(0.25).expect("engine");
        assert_eq!(engine.step(0.6).expect("step"), 2);
        assert!((engine.accumulator() - 0.1).abs() < 1e-5);
        assert_eq!(engine.step(0.2).expect("step"), 1);
    }

    #[test]
    fn engine_caps_catch_up_steps() {
        let mut engine = PhysicsEngine::new(0.1).expect("engine");
        engine.set_max_steps_per_call(3);
        assert_eq!(engine.step(10.0).expect("step"), 3);
        assert!(engine.accumulator() < 0.1);
    }

    #[test]
    fn non_positive_time_step_is_rejected() {
        assert!(PhysicsEngine::new(0.0).is_err());
    }
}
