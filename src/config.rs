//! Global configuration constants and the tunable [`SimulationConfig`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};

/// Default gravity vector applied in the physics world (Y-up).
pub const DEFAULT_GRAVITY: [f32; 2] = [0.0, -10.0];

/// Default integration timestep (in seconds).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Number of velocity iterations performed per step.
pub const DEFAULT_VELOCITY_ITERATIONS: u32 = 8;

/// Number of position-correction iterations performed per step.
pub const DEFAULT_POSITION_ITERATIONS: u32 = 3;

/// Collision and constraint tolerance, in meters.
pub const LINEAR_SLOP: f32 = 0.005;

/// Angular tolerance for limits, in radians (2 degrees).
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * std::f32::consts::PI;

/// Fraction of the positional error fed back into the solve per step.
pub const BAUMGARTE: f32 = 0.2;

/// Position-correction factor used inside TOI sub-steps.
pub const TOI_BAUMGARTE: f32 = 0.75;

/// Largest linear position correction applied in one iteration.
pub const MAX_LINEAR_CORRECTION: f32 = 0.2;

/// Largest angular position correction applied in one iteration (8 degrees).
pub const MAX_ANGULAR_CORRECTION: f32 = 8.0 / 180.0 * std::f32::consts::PI;

/// Largest translation a body may make in one step.
pub const MAX_TRANSLATION: f32 = 2.0;

/// Largest rotation a body may make in one step.
pub const MAX_ROTATION: f32 = 0.5 * std::f32::consts::PI;

/// Approach speed below which collisions are treated as inelastic.
pub const VELOCITY_THRESHOLD: f32 = 1.0;

/// Seconds a body must rest before it may fall asleep.
pub const TIME_TO_SLEEP: f32 = 0.5;

/// Linear speed below which a body counts as resting.
pub const LINEAR_SLEEP_TOLERANCE: f32 = 0.01;

/// Angular speed below which a body counts as resting (2 degrees/s).
pub const ANGULAR_SLEEP_TOLERANCE: f32 = 2.0 / 180.0 * std::f32::consts::PI;

/// Hard capacity of a contact manifold.
pub const MAX_MANIFOLD_POINTS: usize = 4;

/// Default number of manifold points kept per contact.
pub const DEFAULT_MAX_CONTACT_POINTS: usize = 2;

/// Maximum contacts gathered into one TOI island.
pub const MAX_TOI_CONTACTS: usize = 32;

/// Maximum TOI sub-steps a single contact may take part in per step.
pub const MAX_SUB_STEPS: u32 = 8;

/// Upper bound on TOI events resolved in one step.
pub const MAX_TOI_PASSES: u32 = 64;

/// Default cell size for the broad-phase uniform grid.
pub const DEFAULT_BROADPHASE_CELL_SIZE: f32 = 4.0;

/// Margin added around collider bounds before pairing.
pub const AABB_MARGIN: f32 = 0.1;

/// Tunable parameters of a [`crate::PhysicsWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub gravity: Vec2,
    pub time_step: f32,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub linear_slop: f32,
    pub angular_slop: f32,
    pub baumgarte: f32,
    pub toi_baumgarte: f32,
    pub max_linear_correction: f32,
    pub max_angular_correction: f32,
    pub max_translation: f32,
    pub max_rotation: f32,
    pub velocity_threshold: f32,
    pub time_to_sleep: f32,
    pub linear_sleep_tolerance: f32,
    pub angular_sleep_tolerance: f32,
    pub max_contact_points: usize,
    pub max_toi_contacts: usize,
    pub max_sub_steps: u32,
    pub max_toi_passes: u32,
    pub broadphase_cell_size: f32,
    pub aabb_margin: f32,
    pub warm_starting: bool,
    pub continuous_physics: bool,
    pub allow_sleep: bool,
    /// Record `PreSolve`/`PostSolve` events for every touching contact.
    pub solve_events: bool,
    /// Solve independent islands on the rayon pool (requires the `parallel` feature).
    pub parallel_islands: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::from_array(DEFAULT_GRAVITY),
            time_step: DEFAULT_TIME_STEP,
            velocity_iterations: DEFAULT_VELOCITY_ITERATIONS,
            position_iterations: DEFAULT_POSITION_ITERATIONS,
            linear_slop: LINEAR_SLOP,
            angular_slop: ANGULAR_SLOP,
            baumgarte: BAUMGARTE,
            toi_baumgarte: TOI_BAUMGARTE,
            max_linear_correction: MAX_LINEAR_CORRECTION,
            max_angular_correction: MAX_ANGULAR_CORRECTION,
            max_translation: MAX_TRANSLATION,
            max_rotation: MAX_ROTATION,
            velocity_threshold: VELOCITY_THRESHOLD,
            time_to_sleep: TIME_TO_SLEEP,
            linear_sleep_tolerance: LINEAR_SLEEP_TOLERANCE,
            angular_sleep_tolerance: ANGULAR_SLEEP_TOLERANCE,
            max_contact_points: DEFAULT_MAX_CONTACT_POINTS,
            max_toi_contacts: MAX_TOI_CONTACTS,
            max_sub_steps: MAX_SUB_STEPS,
            max_toi_passes: MAX_TOI_PASSES,
            broadphase_cell_size: DEFAULT_BROADPHASE_CELL_SIZE,
            aabb_margin: AABB_MARGIN,
            warm_starting: true,
            continuous_physics: true,
            allow_sleep: true,
            solve_events: false,
            parallel_islands: false,
        }
    }
}

impl SimulationConfig {
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_iterations(mut self, velocity: u32, position: u32) -> Self {
        self.velocity_iterations = velocity;
        self.position_iterations = position;
        self
    }

    pub fn with_sleeping(mut self, allow: bool) -> Self {
        self.allow_sleep = allow;
        self
    }

    pub fn with_continuous(mut self, enabled: bool) -> Self {
        self.continuous_physics = enabled;
        self
    }

    pub fn with_solve_events(mut self, enabled: bool) -> Self {
        self.solve_events = enabled;
        self
    }

    pub fn with_parallel_islands(mut self, enabled: bool) -> Self {
        self.parallel_islands = enabled;
        self
    }

    /// Rejects values that would make the solver diverge or loop without bound.
    pub fn validate(&self) -> PhysicsResult<()> {
        fn check(name: &'static str, value: f32, ok: bool) -> PhysicsResult<()> {
            if ok && value.is_finite() {
                Ok(())
            } else {
                Err(PhysicsError::InvalidConfig { name, value })
            }
        }

        check("gravity.x", self.gravity.x, true)?;
        check("gravity.y", self.gravity.y, true)?;
        check("time_step", self.time_step, self.time_step > 0.0)?;
        check("linear_slop", self.linear_slop, self.linear_slop > 0.0)?;
        check("angular_slop", self.angular_slop, self.angular_slop > 0.0)?;
        check("baumgarte", self.baumgarte, (0.0..=1.0).contains(&self.baumgarte))?;
        check(
            "toi_baumgarte",
            self.toi_baumgarte,
            (0.0..=1.0).contains(&self.toi_baumgarte),
        )?;
        check(
            "max_linear_correction",
            self.max_linear_correction,
            self.max_linear_correction > 0.0,
        )?;
        check(
            "max_angular_correction",
            self.max_angular_correction,
            self.max_angular_correction > 0.0,
        )?;
        check("max_translation", self.max_translation, self.max_translation > 0.0)?;
        check("max_rotation", self.max_rotation, self.max_rotation > 0.0)?;
        check(
            "velocity_threshold",
            self.velocity_threshold,
            self.velocity_threshold >= 0.0,
        )?;
        check("time_to_sleep", self.time_to_sleep, self.time_to_sleep >= 0.0)?;
        check(
            "linear_sleep_tolerance",
            self.linear_sleep_tolerance,
            self.linear_sleep_tolerance >= 0.0,
        )?;
        check(
            "angular_sleep_tolerance",
            self.angular_sleep_tolerance,
            self.angular_sleep_tolerance >= 0.0,
        )?;
        check(
            "broadphase_cell_size",
            self.broadphase_cell_size,
            self.broadphase_cell_size > 0.0,
        )?;
        check("aabb_margin", self.aabb_margin, self.aabb_margin >= 0.0)?;

        let points = self.max_contact_points;
        check(
            "max_contact_points",
            points as f32,
            (1..=MAX_MANIFOLD_POINTS).contains(&points),
        )?;
        check(
            "max_toi_contacts",
            self.max_toi_contacts as f32,
            self.max_toi_contacts > 0,
        )?;
        check("max_sub_steps", self.max_sub_steps as f32, self.max_sub_steps > 0)?;
        check(
            "max_toi_passes",
            self.max_toi_passes as f32,
            self.max_toi_passes > 0,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let config = SimulationConfig {
            max_contact_points: MAX_MANIFOLD_POINTS + 1,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PhysicsError::InvalidConfig {
                name: "max_contact_points",
                ..
            })
        ));

        let config = SimulationConfig {
            baumgarte: f32::NAN,
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SimulationConfig::default().with_gravity(Vec2::new(0.0, f32::INFINITY));
        assert!(config.validate().is_err());
    }
}
