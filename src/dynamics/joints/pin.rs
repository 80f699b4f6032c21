use glam::Vec2;

use super::{anchor_offset, constraint_impulse, push_apart, JointParams, LimitState};
use crate::{
    config::SimulationConfig,
    core::rigidbody::MotionState,
    dynamics::solver::TimeStep,
    utils::math::{cross, cross_sv, inverse_or_zero},
};

/// Anchor geometry shared by the distance-style joints.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Span {
    r_a: Vec2,
    r_b: Vec2,
    axis: Vec2,
    length: f32,
}

impl Span {
    fn measure(a: &MotionState, b: &MotionState, local_a: Vec2, local_b: Vec2, slop: f32) -> Self {
        let r_a = anchor_offset(a, local_a);
        let r_b = anchor_offset(b, local_b);
        let d = b.sweep.c + r_b - a.sweep.c - r_a;
        let length = d.length();
        let axis = if length > slop { d / length } else { Vec2::ZERO };
        Self { r_a, r_b, axis, length }
    }

    fn effective_mass(&self, a: &MotionState, b: &MotionState) -> f32 {
        let cr_a = cross(self.r_a, self.axis);
        let cr_b = cross(self.r_b, self.axis);
        a.inv_mass + b.inv_mass + a.inv_inertia * cr_a * cr_a + b.inv_inertia * cr_b * cr_b
    }

    fn speed(&self, a: &MotionState, b: &MotionState) -> f32 {
        let v_a = a.linear_velocity + cross_sv(a.angular_velocity, self.r_a);
        let v_b = b.linear_velocity + cross_sv(b.angular_velocity, self.r_b);
        self.axis.dot(v_b - v_a)
    }

    fn apply(&self, a: &mut MotionState, b: &mut MotionState, impulse: f32) {
        let p = impulse * self.axis;
        a.apply_impulse(-p, self.r_a);
        b.apply_impulse(p, self.r_b);
    }
}

/// Distance joint: holds two anchors `length` apart.
#[derive(Debug, Clone, PartialEq)]
pub struct PinJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) length: f32,
    span: Span,
    mass: f32,
    bias: f32,
    pub(crate) impulse: f32,
}

impl PinJoint {
    pub(crate) fn new(
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        length: Option<f32>,
        a: &MotionState,
        b: &MotionState,
    ) -> Self {
        let length =
            length.unwrap_or_else(|| Span::measure(a, b, local_anchor_a, local_anchor_b, 0.0).length);
        Self {
            local_anchor_a,
            local_anchor_b,
            length,
            span: Span::default(),
            mass: 0.0,
            bias: 0.0,
            impulse: 0.0,
        }
    }

    pub fn local_anchors(&self) -> (Vec2, Vec2) {
        (self.local_anchor_a, self.local_anchor_b)
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn set_length(&mut self, length: f32) {
        self.length = length.max(0.0);
    }

    pub(crate) fn error(&self, a: &MotionState, b: &MotionState) -> f32 {
        Span::measure(a, b, self.local_anchor_a, self.local_anchor_b, 0.0).length - self.length
    }

    pub(crate) fn prepare(&mut self, a: &MotionState, b: &MotionState, params: &JointParams, step: &TimeStep) -> f32 {
        self.span = Span::measure(a, b, self.local_anchor_a, self.local_anchor_b, 0.0);
        let error = self.span.length - self.length;
        self.mass = inverse_or_zero(self.span.effective_mass(a, b) + params.softness);
        self.bias = params.bias_factor * step.inv_dt * error;
        self.impulse = if step.warm_starting { self.impulse * step.dt_ratio } else { 0.0 };
        error
    }

    pub(crate) fn warm_start(&self, a: &mut MotionState, b: &mut MotionState) {
        self.span.apply(a, b, self.impulse);
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut MotionState, b: &mut MotionState, params: &JointParams) -> bool {
        let cdot = self.span.speed(a, b);
        let lambda = constraint_impulse(self.mass, cdot, self.bias, params.softness, self.impulse);
        if !lambda.is_finite() {
            return false;
        }
        let previous = self.impulse;
        self.impulse = params.clamp(previous + lambda);
        self.span.apply(a, b, self.impulse - previous);
        true
    }

    pub(crate) fn solve_position(&self, a: &mut MotionState, b: &mut MotionState, config: &SimulationConfig) -> bool {
        let span = Span::measure(a, b, self.local_anchor_a, self.local_anchor_b, 0.0);
        let error = span.length - self.length;
        let correction = error.clamp(-config.max_linear_correction, config.max_linear_correction);
        let impulse = -inverse_or_zero(span.effective_mass(a, b)) * correction;
        push_apart(a, b, impulse * span.axis, span.r_a, span.r_b);
        error.abs() < config.linear_slop
    }
}

/// Distance limit: keeps two anchors between `min_length` and `max_length` apart.
#[derive(Debug, Clone, PartialEq)]
pub struct SliderJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) min_length: f32,
    pub(crate) max_length: f32,
    pub(crate) state: LimitState,
    span: Span,
    mass: f32,
    bias: f32,
    pub(crate) impulse: f32,
}

impl SliderJoint {
    pub(crate) fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, min_length: f32, max_length: f32) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            min_length,
            max_length,
            state: LimitState::Inactive,
            span: Span::default(),
            mass: 0.0,
            bias: 0.0,
            impulse: 0.0,
        }
    }

    pub fn local_anchors(&self) -> (Vec2, Vec2) {
        (self.local_anchor_a, self.local_anchor_b)
    }

    pub fn limits(&self) -> (f32, f32) {
        (self.min_length, self.max_length)
    }

    pub fn state(&self) -> LimitState {
        self.state
    }

    pub(crate) fn error(&self, a: &MotionState, b: &MotionState, config: &SimulationConfig) -> f32 {
        let length = Span::measure(a, b, self.local_anchor_a, self.local_anchor_b, 0.0).length;
        let state = LimitState::classify(length, self.min_length, self.max_length, config.linear_slop);
        state.error(length, self.min_length, self.max_length, config.linear_slop)
    }

    pub(crate) fn prepare(
        &mut self,
        a: &MotionState,
        b: &MotionState,
        params: &JointParams,
        step: &TimeStep,
        config: &SimulationConfig,
    ) -> f32 {
        let slop = config.linear_slop;
        self.span = Span::measure(a, b, self.local_anchor_a, self.local_anchor_b, 0.0);
        let length = self.span.length;

        let state = LimitState::classify(length, self.min_length, self.max_length, slop);
        if state != self.state {
            self.impulse = 0.0;
            self.state = state;
        }

        self.mass = inverse_or_zero(self.span.effective_mass(a, b) + params.softness);
        self.bias = state.bias(length, self.min_length, self.max_length, slop, params.bias_factor, step.inv_dt);
        self.impulse = if step.warm_starting { self.impulse * step.dt_ratio } else { 0.0 };
        state.error(length, self.min_length, self.max_length, slop)
    }

    pub(crate) fn warm_start(&self, a: &mut MotionState, b: &mut MotionState) {
        if self.state != LimitState::Inactive {
            self.span.apply(a, b, self.impulse);
        }
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut MotionState, b: &mut MotionState, params: &JointParams) -> bool {
        if self.state == LimitState::Inactive {
            return true;
        }
        let cdot = self.span.speed(a, b);
        let lambda = constraint_impulse(self.mass, cdot, self.bias, params.softness, self.impulse);
        if !lambda.is_finite() {
            return false;
        }
        let previous = self.impulse;
        self.impulse = self.state.clamp(previous + lambda, params);
        self.span.apply(a, b, self.impulse - previous);
        true
    }

    pub(crate) fn solve_position(&self, a: &mut MotionState, b: &mut MotionState, config: &SimulationConfig) -> bool {
        let slop = config.linear_slop;
        let span = Span::measure(a, b, self.local_anchor_a, self.local_anchor_b, 0.0);
        let state = LimitState::classify(span.length, self.min_length, self.max_length, slop);
        let error = state.error(span.length, self.min_length, self.max_length, slop);
        if error == 0.0 {
            return true;
        }
        let correction = error.clamp(-config.max_linear_correction, config.max_linear_correction);
        let impulse = -inverse_or_zero(span.effective_mass(a, b)) * correction;
        push_apart(a, b, impulse * span.axis, span.r_a, span.r_b);
        error.abs() < slop
    }
}
