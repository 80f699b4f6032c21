use glam::Vec2;

use crate::{config::SimulationConfig, core::rigidbody::MotionState};

/// Semi-implicit Euler integration over an island's body states.
#[derive(Debug, Clone, Copy)]
pub struct Integrator {
    pub gravity: Vec2,
    pub max_translation: f32,
    pub max_rotation: f32,
}

impl Integrator {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            gravity: config.gravity,
            max_translation: config.max_translation,
            max_rotation: config.max_rotation,
        }
    }

    /// Applies gravity, accumulated forces and damping to every dynamic state.
    pub fn integrate_velocities(&self, states: &mut [MotionState], dt: f32) {
        for state in states.iter_mut() {
            state.integrate_velocity(dt, self.gravity);
        }
    }

    /// Moves every non-static state along its velocity, clamping runaway motion.
    pub fn integrate_positions(&self, states: &mut [MotionState], dt: f32) {
        for state in states.iter_mut() {
            state.integrate_position(dt, self.max_translation, self.max_rotation);
        }
    }
}
