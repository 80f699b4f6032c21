use super::{constraint_impulse, JointParams, LimitState};
use crate::{
    config::SimulationConfig, core::rigidbody::MotionState, dynamics::solver::TimeStep, utils::math::inverse_or_zero,
};

#[inline]
fn relative_angle(a: &MotionState, b: &MotionState) -> f32 {
    b.sweep.a - a.sweep.a
}

#[inline]
fn apply(a: &mut MotionState, b: &mut MotionState, impulse: f32) {
    a.apply_angular_impulse(-impulse);
    b.apply_angular_impulse(impulse);
}

/// Rotates body A and body B by equal and opposite amounts to reduce `error`.
fn correct_angle(a: &mut MotionState, b: &mut MotionState, error: f32, config: &SimulationConfig) {
    let k = a.inv_inertia + b.inv_inertia;
    if k <= 0.0 {
        return;
    }
    let correction = error.clamp(-config.max_angular_correction, config.max_angular_correction);
    let impulse = -correction / k;
    a.sweep.a -= a.inv_inertia * impulse;
    b.sweep.a += b.inv_inertia * impulse;
}

/// Holds the relative angle `angle_b - angle_a` at `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleJoint {
    pub(crate) target: f32,
    mass: f32,
    bias: f32,
    pub(crate) impulse: f32,
}

impl AngleJoint {
    pub(crate) fn new(target: Option<f32>, a: &MotionState, b: &MotionState) -> Self {
        Self {
            target: target.unwrap_or_else(|| relative_angle(a, b)),
            mass: 0.0,
            bias: 0.0,
            impulse: 0.0,
        }
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub(crate) fn error(&self, a: &MotionState, b: &MotionState) -> f32 {
        relative_angle(a, b) - self.target
    }

    pub(crate) fn prepare(&mut self, a: &MotionState, b: &MotionState, params: &JointParams, step: &TimeStep) -> f32 {
        let error = self.error(a, b);
        self.mass = inverse_or_zero(a.inv_inertia + b.inv_inertia + params.softness);
        self.bias = params.bias_factor * step.inv_dt * error;
        self.impulse = if step.warm_starting { self.impulse * step.dt_ratio } else { 0.0 };
        error
    }

    pub(crate) fn warm_start(&self, a: &mut MotionState, b: &mut MotionState) {
        apply(a, b, self.impulse);
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut MotionState, b: &mut MotionState, params: &JointParams) -> bool {
        let cdot = b.angular_velocity - a.angular_velocity;
        let lambda = constraint_impulse(self.mass, cdot, self.bias, params.softness, self.impulse);
        if !lambda.is_finite() {
            return false;
        }
        let previous = self.impulse;
        self.impulse = params.clamp(previous + lambda);
        apply(a, b, self.impulse - previous);
        true
    }

    pub(crate) fn solve_position(&self, a: &mut MotionState, b: &mut MotionState, config: &SimulationConfig) -> bool {
        let error = self.error(a, b);
        correct_angle(a, b, error, config);
        error.abs() <= config.angular_slop
    }
}

/// Keeps the relative angle within `[lower, upper]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleLimitJoint {
    pub(crate) lower: f32,
    pub(crate) upper: f32,
    pub(crate) state: LimitState,
    mass: f32,
    bias: f32,
    pub(crate) impulse: f32,
}

impl AngleLimitJoint {
    pub(crate) fn new(lower: f32, upper: f32) -> Self {
        Self {
            lower,
            upper,
            state: LimitState::Inactive,
            mass: 0.0,
            bias: 0.0,
            impulse: 0.0,
        }
    }

    pub fn limits(&self) -> (f32, f32) {
        (self.lower, self.upper)
    }

    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        if lower <= upper {
            self.lower = lower;
            self.upper = upper;
        }
    }

    pub fn state(&self) -> LimitState {
        self.state
    }

    pub(crate) fn error(&self, a: &MotionState, b: &MotionState, config: &SimulationConfig) -> f32 {
        let angle = relative_angle(a, b);
        LimitState::classify(angle, self.lower, self.upper, config.angular_slop).error(
            angle,
            self.lower,
            self.upper,
            config.angular_slop,
        )
    }

    pub(crate) fn prepare(
        &mut self,
        a: &MotionState,
        b: &MotionState,
        params: &JointParams,
        step: &TimeStep,
        config: &SimulationConfig,
    ) -> f32 {
        let slop = config.angular_slop;
        let angle = relative_angle(a, b);
        let state = LimitState::classify(angle, self.lower, self.upper, slop);
        if state != self.state {
            self.impulse = 0.0;
            self.state = state;
        }

        self.mass = inverse_or_zero(a.inv_inertia + b.inv_inertia + params.softness);
        self.bias = state.bias(angle, self.lower, self.upper, slop, params.bias_factor, step.inv_dt);
        self.impulse = if step.warm_starting { self.impulse * step.dt_ratio } else { 0.0 };
        state.error(angle, self.lower, self.upper, slop)
    }

    pub(crate) fn warm_start(&self, a: &mut MotionState, b: &mut MotionState) {
        if self.state != LimitState::Inactive {
            apply(a, b, self.impulse);
        }
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut MotionState, b: &mut MotionState, params: &JointParams) -> bool {
        if self.state == LimitState::Inactive {
            return true;
        }
        let cdot = b.angular_velocity - a.angular_velocity;
        let lambda = constraint_impulse(self.mass, cdot, self.bias, params.softness, self.impulse);
        if !lambda.is_finite() {
            return false;
        }
        let previous = self.impulse;
        self.impulse = self.state.clamp(previous + lambda, params);
        apply(a, b, self.impulse - previous);
        true
    }

    pub(crate) fn solve_position(&self, a: &mut MotionState, b: &mut MotionState, config: &SimulationConfig) -> bool {
        let error = self.error(a, b, config);
        if error != 0.0 {
            correct_angle(a, b, error, config);
        }
        error.abs() <= config.angular_slop
    }
}
