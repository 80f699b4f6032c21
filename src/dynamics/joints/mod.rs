//! Joint constraints.
//!
//! Every joint kind is a variant of [`JointKind`]; the island solver drives
//! them through [`Joint`], which owns the parameters shared by all kinds
//! (softness, bias factor, impulse clamp, breakpoint).

mod angle;
mod pin;
mod revolute;

pub use angle::{AngleJoint, AngleLimitJoint};
pub use pin::{PinJoint, SliderJoint};
pub use revolute::RevoluteJoint;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::solver::{SolverStepMetrics, TimeStep};
use crate::{
    config::{SimulationConfig, BAUMGARTE},
    core::{rigidbody::MotionState, types::Rotation},
    error::{PhysicsError, PhysicsResult},
    utils::{
        allocator::{BodyHandle, JointHandle},
        math::cross,
    },
};

/// Tuning shared by every joint kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointParams {
    /// Constraint force mixing added to the effective-mass diagonal. Zero is rigid.
    pub softness: f32,
    /// Fraction of the position error fed back as velocity bias each step.
    pub bias_factor: f32,
    /// Clamp on the accumulated impulse magnitude.
    pub max_impulse: f32,
}

impl Default for JointParams {
    fn default() -> Self {
        Self {
            softness: 0.0,
            bias_factor: BAUMGARTE,
            max_impulse: f32::INFINITY,
        }
    }
}

impl JointParams {
    fn validate(&self) -> PhysicsResult<()> {
        if !self.softness.is_finite() || self.softness < 0.0 {
            return Err(invalid("softness", self.softness));
        }
        if !(0.0..=1.0).contains(&self.bias_factor) {
            return Err(invalid("bias_factor", self.bias_factor));
        }
        if self.max_impulse.is_nan() || self.max_impulse <= 0.0 {
            return Err(invalid("max_impulse", self.max_impulse));
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn clamp(&self, accumulated: f32) -> f32 {
        accumulated.clamp(-self.max_impulse, self.max_impulse)
    }
}

/// Which side of a two-sided limit is currently enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LimitState {
    #[default]
    Inactive,
    AtLower,
    AtUpper,
    /// Lower and upper coincide; the limit acts as an equality.
    Equal,
}

impl LimitState {
    pub fn classify(value: f32, lower: f32, upper: f32, slop: f32) -> Self {
        if (upper - lower).abs() < 2.0 * slop {
            LimitState::Equal
        } else if value <= lower {
            LimitState::AtLower
        } else if value >= upper {
            LimitState::AtUpper
        } else {
            LimitState::Inactive
        }
    }

    /// Clamps an accumulated limit impulse to the sign the active side allows.
    pub(crate) fn clamp(self, accumulated: f32, params: &JointParams) -> f32 {
        match self {
            LimitState::Inactive => 0.0,
            LimitState::AtLower => accumulated.clamp(0.0, params.max_impulse),
            LimitState::AtUpper => accumulated.clamp(-params.max_impulse, 0.0),
            LimitState::Equal => params.clamp(accumulated),
        }
    }

    /// Velocity bias for a limit coordinate `value` against `[lower, upper]`.
    pub(crate) fn bias(self, value: f32, lower: f32, upper: f32, slop: f32, beta: f32, inv_dt: f32) -> f32 {
        beta * inv_dt * self.error(value, lower, upper, slop)
    }

    /// Signed violation beyond the slop band, zero while inside it.
    pub(crate) fn error(self, value: f32, lower: f32, upper: f32, slop: f32) -> f32 {
        match self {
            LimitState::Inactive => 0.0,
            LimitState::AtLower => (value - lower + slop).min(0.0),
            LimitState::AtUpper => (value - upper - slop).max(0.0),
            LimitState::Equal => value - lower,
        }
    }
}

/// Incremental impulse for a scalar constraint with CFM softness.
///
/// `mass` is `1 / (K + softness)`; with zero softness this reduces to the rigid
/// `-(cdot + bias) / K`.
#[inline]
pub(crate) fn constraint_impulse(mass: f32, cdot: f32, bias: f32, softness: f32, accumulated: f32) -> f32 {
    -mass * (cdot + bias + softness * accumulated)
}

/// World-space offset of a body-origin-relative anchor from the center of mass.
#[inline]
pub(crate) fn anchor_offset(state: &MotionState, local_anchor: Vec2) -> Vec2 {
    Rotation::from_angle(state.sweep.a).rotate(local_anchor - state.sweep.local_center)
}

/// Mutable access to two distinct island states.
pub(crate) fn pair_mut(states: &mut [MotionState], a: usize, b: usize) -> (&mut MotionState, &mut MotionState) {
    debug_assert_ne!(a, b);
    if a < b {
        let (head, tail) = states.split_at_mut(b);
        (&mut head[a], &mut tail[0])
    } else {
        let (head, tail) = states.split_at_mut(a);
        (&mut tail[0], &mut head[b])
    }
}

/// Applies an equal and opposite position-level impulse `p` at the given offsets.
#[inline]
pub(crate) fn push_apart(a: &mut MotionState, b: &mut MotionState, p: Vec2, r_a: Vec2, r_b: Vec2) {
    a.sweep.c -= a.inv_mass * p;
    a.sweep.a -= a.inv_inertia * cross(r_a, p);
    b.sweep.c += b.inv_mass * p;
    b.sweep.a += b.inv_inertia * cross(r_b, p);
}

/// Kind-specific parameters of a joint to be created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointDefKind {
    /// Keeps two anchors at `length`; `None` uses the distance at creation.
    Pin {
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        length: Option<f32>,
    },
    /// Keeps the anchor distance within `[min_length, max_length]`.
    Slider {
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        min_length: f32,
        max_length: f32,
    },
    /// Holds `angle_b - angle_a` at `target`; `None` uses the angle at creation.
    Angle { target: Option<f32> },
    /// Keeps `angle_b - angle_a` within `[lower, upper]`.
    AngleLimit { lower: f32, upper: f32 },
    /// Makes two anchors coincide.
    Revolute {
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
    },
}

/// Description of a joint for [`crate::PhysicsWorld::create_joint`].
///
/// `body_a == None` attaches the joint to the world: anchor A is then a world
/// point and angles are measured against zero. These are the `fixed_*` joints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointDef {
    pub body_a: Option<BodyHandle>,
    pub body_b: BodyHandle,
    pub kind: JointDefKind,
    pub params: JointParams,
    /// Error magnitude above which the joint disables itself.
    pub breakpoint: f32,
    /// Whether the joined bodies still collide with each other.
    pub collide_connected: bool,
    pub user_data: u64,
}

impl JointDef {
    fn with_kind(body_a: Option<BodyHandle>, body_b: BodyHandle, kind: JointDefKind) -> Self {
        Self {
            body_a,
            body_b,
            kind,
            params: JointParams::default(),
            breakpoint: f32::INFINITY,
            collide_connected: false,
            user_data: 0,
        }
    }

    pub fn pin(body_a: BodyHandle, body_b: BodyHandle, local_anchor_a: Vec2, local_anchor_b: Vec2) -> Self {
        Self::with_kind(
            Some(body_a),
            body_b,
            JointDefKind::Pin {
                local_anchor_a,
                local_anchor_b,
                length: None,
            },
        )
    }

    /// Pins `local_anchor` of `body` to `world_anchor`.
    pub fn fixed_pin(body: BodyHandle, world_anchor: Vec2, local_anchor: Vec2) -> Self {
        Self::with_kind(
            None,
            body,
            JointDefKind::Pin {
                local_anchor_a: world_anchor,
                local_anchor_b: local_anchor,
                length: None,
            },
        )
    }

    pub fn slider(
        body_a: BodyHandle,
        body_b: BodyHandle,
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        min_length: f32,
        max_length: f32,
    ) -> Self {
        Self::with_kind(
            Some(body_a),
            body_b,
            JointDefKind::Slider {
                local_anchor_a,
                local_anchor_b,
                min_length,
                max_length,
            },
        )
    }

    pub fn angle(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        Self::with_kind(Some(body_a), body_b, JointDefKind::Angle { target: None })
    }

    pub fn fixed_angle(body: BodyHandle) -> Self {
        Self::with_kind(None, body, JointDefKind::Angle { target: None })
    }

    pub fn angle_limit(body_a: BodyHandle, body_b: BodyHandle, lower: f32, upper: f32) -> Self {
        Self::with_kind(Some(body_a), body_b, JointDefKind::AngleLimit { lower, upper })
    }

    pub fn fixed_angle_limit(body: BodyHandle, lower: f32, upper: f32) -> Self {
        Self::with_kind(None, body, JointDefKind::AngleLimit { lower, upper })
    }

    pub fn revolute(body_a: BodyHandle, body_b: BodyHandle, local_anchor_a: Vec2, local_anchor_b: Vec2) -> Self {
        Self::with_kind(
            Some(body_a),
            body_b,
            JointDefKind::Revolute {
                local_anchor_a,
                local_anchor_b,
            },
        )
    }

    pub fn fixed_revolute(body: BodyHandle, world_anchor: Vec2, local_anchor: Vec2) -> Self {
        Self::with_kind(
            None,
            body,
            JointDefKind::Revolute {
                local_anchor_a: world_anchor,
                local_anchor_b: local_anchor,
            },
        )
    }

    /// Target length (pin) or relative angle (angle joint).
    pub fn target(mut self, value: f32) -> Self {
        match &mut self.kind {
            JointDefKind::Pin { length, .. } => *length = Some(value),
            JointDefKind::Angle { target } => *target = Some(value),
            _ => {}
        }
        self
    }

    pub fn softness(mut self, softness: f32) -> Self {
        self.params.softness = softness;
        self
    }

    pub fn bias_factor(mut self, bias_factor: f32) -> Self {
        self.params.bias_factor = bias_factor;
        self
    }

    pub fn max_impulse(mut self, max_impulse: f32) -> Self {
        self.params.max_impulse = max_impulse;
        self
    }

    pub fn breakpoint(mut self, breakpoint: f32) -> Self {
        self.breakpoint = breakpoint;
        self
    }

    pub fn collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }

    pub fn user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }

    pub(crate) fn validate(&self) -> PhysicsResult<()> {
        self.params.validate()?;
        if self.breakpoint.is_nan() || self.breakpoint <= 0.0 {
            return Err(invalid("breakpoint", self.breakpoint));
        }
        match self.kind {
            JointDefKind::Pin {
                local_anchor_a,
                local_anchor_b,
                length,
            } => {
                check_anchors(local_anchor_a, local_anchor_b)?;
                if let Some(length) = length {
                    if !length.is_finite() || length < 0.0 {
                        return Err(invalid("length", length));
                    }
                }
            }
            JointDefKind::Slider {
                local_anchor_a,
                local_anchor_b,
                min_length,
                max_length,
            } => {
                check_anchors(local_anchor_a, local_anchor_b)?;
                if !min_length.is_finite() || min_length < 0.0 {
                    return Err(invalid("min_length", min_length));
                }
                if !max_length.is_finite() || max_length < min_length {
                    return Err(invalid("max_length", max_length));
                }
            }
            JointDefKind::Angle { target } => {
                if let Some(target) = target.filter(|t| !t.is_finite()) {
                    return Err(invalid("target", target));
                }
            }
            JointDefKind::AngleLimit { lower, upper } => {
                if !lower.is_finite() {
                    return Err(invalid("lower", lower));
                }
                if !upper.is_finite() || upper < lower {
                    return Err(invalid("upper", upper));
                }
            }
            JointDefKind::Revolute {
                local_anchor_a,
                local_anchor_b,
            } => check_anchors(local_anchor_a, local_anchor_b)?,
        }
        Ok(())
    }
}

fn check_anchors(a: Vec2, b: Vec2) -> PhysicsResult<()> {
    if !a.is_finite() {
        return Err(invalid("local_anchor_a", a.x + a.y));
    }
    if !b.is_finite() {
        return Err(invalid("local_anchor_b", b.x + b.y));
    }
    Ok(())
}

fn invalid(name: &'static str, value: f32) -> PhysicsError {
    PhysicsError::InvalidJointParameter { name, value }
}

/// Solver payload of a joint.
#[derive(Debug, Clone, PartialEq)]
pub enum JointKind {
    Pin(PinJoint),
    Slider(SliderJoint),
    Angle(AngleJoint),
    AngleLimit(AngleLimitJoint),
    Revolute(RevoluteJoint),
}

/// A joint owned by the world.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub(crate) handle: JointHandle,
    pub(crate) body_a: Option<BodyHandle>,
    pub(crate) body_b: BodyHandle,
    pub(crate) kind: JointKind,
    pub(crate) params: JointParams,
    pub(crate) breakpoint: f32,
    pub(crate) enabled: bool,
    pub(crate) collide_connected: bool,
    /// Constraint error measured at the start of the last solved step.
    pub(crate) error: f32,
    pub(crate) island_flag: bool,
    pub user_data: u64,
}

impl Joint {
    /// Builds a joint from a validated definition and the current endpoint states.
    pub(crate) fn new(
        handle: JointHandle,
        def: &JointDef,
        a: &MotionState,
        b: &MotionState,
        config: &SimulationConfig,
    ) -> PhysicsResult<Self> {
        def.validate()?;

        let linear_locked = a.inv_mass == 0.0 && b.inv_mass == 0.0;
        let angular_locked = a.inv_inertia + b.inv_inertia == 0.0;
        let kind = match def.kind {
            JointDefKind::Pin {
                local_anchor_a,
                local_anchor_b,
                length,
            } => {
                if linear_locked {
                    return Err(PhysicsError::SingularJoint);
                }
                JointKind::Pin(PinJoint::new(local_anchor_a, local_anchor_b, length, a, b))
            }
            JointDefKind::Slider {
                local_anchor_a,
                local_anchor_b,
                min_length,
                max_length,
            } => {
                if linear_locked {
                    return Err(PhysicsError::SingularJoint);
                }
                JointKind::Slider(SliderJoint::new(local_anchor_a, local_anchor_b, min_length, max_length))
            }
            JointDefKind::Angle { target } => {
                if angular_locked && def.params.softness == 0.0 {
                    return Err(PhysicsError::SingularJoint);
                }
                JointKind::Angle(AngleJoint::new(target, a, b))
            }
            JointDefKind::AngleLimit { lower, upper } => {
                if angular_locked && def.params.softness == 0.0 {
                    return Err(PhysicsError::SingularJoint);
                }
                JointKind::AngleLimit(AngleLimitJoint::new(lower, upper))
            }
            JointDefKind::Revolute {
                local_anchor_a,
                local_anchor_b,
            } => {
                if linear_locked {
                    return Err(PhysicsError::SingularJoint);
                }
                JointKind::Revolute(RevoluteJoint::new(local_anchor_a, local_anchor_b))
            }
        };

        let mut joint = Self {
            handle,
            body_a: def.body_a,
            body_b: def.body_b,
            kind,
            params: def.params,
            breakpoint: def.breakpoint,
            enabled: true,
            collide_connected: def.collide_connected,
            error: 0.0,
            island_flag: false,
            user_data: def.user_data,
        };
        joint.error = joint.measure_error(a, b, config);
        Ok(joint)
    }

    pub fn handle(&self) -> JointHandle {
        self.handle
    }

    /// `(body_a, body_b)`; `body_a` is `None` for joints fixed to the world.
    pub fn bodies(&self) -> (Option<BodyHandle>, BodyHandle) {
        (self.body_a, self.body_b)
    }

    pub fn is_fixed(&self) -> bool {
        self.body_a.is_none()
    }

    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    pub fn params(&self) -> &JointParams {
        &self.params
    }

    pub fn set_params(&mut self, params: JointParams) -> PhysicsResult<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Re-enabling a broken joint resumes solving from zero impulse.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.reset_impulses();
        }
        self.enabled = enabled;
    }

    pub fn breakpoint(&self) -> f32 {
        self.breakpoint
    }

    pub fn set_breakpoint(&mut self, breakpoint: f32) -> PhysicsResult<()> {
        if breakpoint.is_nan() || breakpoint <= 0.0 {
            return Err(invalid("breakpoint", breakpoint));
        }
        self.breakpoint = breakpoint;
        Ok(())
    }

    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    /// Constraint error at the start of the last solved step.
    pub fn error(&self) -> f32 {
        self.error
    }

    /// Limit side currently enforced, for limit kinds.
    pub fn limit_state(&self) -> Option<LimitState> {
        match &self.kind {
            JointKind::Slider(joint) => Some(joint.state),
            JointKind::AngleLimit(joint) => Some(joint.state),
            _ => None,
        }
    }

    /// Magnitude of the impulse accumulated in the last step.
    pub fn reaction_impulse(&self) -> f32 {
        match &self.kind {
            JointKind::Pin(joint) => joint.impulse.abs(),
            JointKind::Slider(joint) => joint.impulse.abs(),
            JointKind::Angle(joint) => joint.impulse.abs(),
            JointKind::AngleLimit(joint) => joint.impulse.abs(),
            JointKind::Revolute(joint) => joint.impulse.length(),
        }
    }

    fn reset_impulses(&mut self) {
        match &mut self.kind {
            JointKind::Pin(joint) => joint.impulse = 0.0,
            JointKind::Slider(joint) => joint.impulse = 0.0,
            JointKind::Angle(joint) => joint.impulse = 0.0,
            JointKind::AngleLimit(joint) => joint.impulse = 0.0,
            JointKind::Revolute(joint) => joint.impulse = Vec2::ZERO,
        }
    }

    fn measure_error(&self, a: &MotionState, b: &MotionState, config: &SimulationConfig) -> f32 {
        match &self.kind {
            JointKind::Pin(joint) => joint.error(a, b),
            JointKind::Slider(joint) => joint.error(a, b, config),
            JointKind::Angle(joint) => joint.error(a, b),
            JointKind::AngleLimit(joint) => joint.error(a, b, config),
            JointKind::Revolute(joint) => joint.error(a, b),
        }
    }

    /// Prepares the velocity constraint and warm starts it.
    ///
    /// Returns `Err(error)` when the error exceeds the breakpoint; the joint is
    /// disabled and applies nothing from then on.
    pub(crate) fn init_velocity(
        &mut self,
        states: &mut [MotionState],
        index_a: usize,
        index_b: usize,
        step: &TimeStep,
        config: &SimulationConfig,
    ) -> Result<(), f32> {
        let (a, b) = pair_mut(states, index_a, index_b);
        let params = self.params;
        let error = match &mut self.kind {
            JointKind::Pin(joint) => joint.prepare(a, b, &params, step),
            JointKind::Slider(joint) => joint.prepare(a, b, &params, step, config),
            JointKind::Angle(joint) => joint.prepare(a, b, &params, step),
            JointKind::AngleLimit(joint) => joint.prepare(a, b, &params, step, config),
            JointKind::Revolute(joint) => joint.prepare(a, b, &params, step),
        };
        self.error = error;

        if error.abs() > self.breakpoint {
            self.enabled = false;
            self.reset_impulses();
            return Err(error);
        }

        match &self.kind {
            JointKind::Pin(joint) => joint.warm_start(a, b),
            JointKind::Slider(joint) => joint.warm_start(a, b),
            JointKind::Angle(joint) => joint.warm_start(a, b),
            JointKind::AngleLimit(joint) => joint.warm_start(a, b),
            JointKind::Revolute(joint) => joint.warm_start(a, b),
        }
        Ok(())
    }

    pub(crate) fn solve_velocity(
        &mut self,
        states: &mut [MotionState],
        index_a: usize,
        index_b: usize,
        metrics: &mut SolverStepMetrics,
    ) {
        let (a, b) = pair_mut(states, index_a, index_b);
        let params = self.params;
        let applied = match &mut self.kind {
            JointKind::Pin(joint) => joint.solve_velocity(a, b, &params),
            JointKind::Slider(joint) => joint.solve_velocity(a, b, &params),
            JointKind::Angle(joint) => joint.solve_velocity(a, b, &params),
            JointKind::AngleLimit(joint) => joint.solve_velocity(a, b, &params),
            JointKind::Revolute(joint) => joint.solve_velocity(a, b, &params),
        };
        if !applied {
            metrics.discarded_impulses += 1;
            log::debug!("discarded non-finite impulse on {:?}", self.handle);
        }
    }

    /// One position-correction iteration; returns whether the joint is within tolerance.
    pub(crate) fn solve_position(
        &self,
        states: &mut [MotionState],
        index_a: usize,
        index_b: usize,
        config: &SimulationConfig,
    ) -> bool {
        if self.params.softness > 0.0 {
            return true;
        }
        let (a, b) = pair_mut(states, index_a, index_b);
        match &self.kind {
            JointKind::Pin(joint) => joint.solve_position(a, b, config),
            JointKind::Slider(joint) => joint.solve_position(a, b, config),
            JointKind::Angle(joint) => joint.solve_position(a, b, config),
            JointKind::AngleLimit(joint) => joint.solve_position(a, b, config),
            JointKind::Revolute(joint) => joint.solve_position(a, b, config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rigidbody::BodyType;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    pub(super) fn body_at(position: Vec2) -> MotionState {
        let mut state = MotionState {
            body_type: BodyType::Dynamic,
            inv_mass: 1.0,
            inv_inertia: 1.0,
            gravity_scale: 1.0,
            ..MotionState::GROUND
        };
        state.sweep.c = position;
        state.sweep.c0 = position;
        state
    }

    fn handles() -> (BodyHandle, BodyHandle) {
        (BodyHandle::new(1, 0), BodyHandle::new(2, 0))
    }

    #[test]
    fn limit_state_classifies_sides() {
        assert_eq!(LimitState::classify(-1.0, -0.5, 0.5, 0.01), LimitState::AtLower);
        assert_eq!(LimitState::classify(0.0, -0.5, 0.5, 0.01), LimitState::Inactive);
        assert_eq!(LimitState::classify(0.7, -0.5, 0.5, 0.01), LimitState::AtUpper);
        assert_eq!(LimitState::classify(0.3, 0.3, 0.3, 0.01), LimitState::Equal);
    }

    #[test]
    fn limit_error_ignores_slop_band() {
        let state = LimitState::AtLower;
        assert_eq!(state.error(-0.505, -0.5, 0.5, 0.01), 0.0);
        assert_relative_eq!(state.error(-0.6, -0.5, 0.5, 0.01), -0.09, epsilon = 1e-6);
        assert_eq!(LimitState::AtUpper.clamp(0.3, &JointParams::default()), 0.0);
        assert_eq!(LimitState::AtLower.clamp(-0.3, &JointParams::default()), 0.0);
    }

    #[test]
    fn pair_mut_returns_requested_order() {
        let mut states = vec![MotionState::GROUND, body_at(Vec2::X), body_at(Vec2::Y)];
        let (a, b) = pair_mut(&mut states, 2, 1);
        assert_eq!(a.sweep.c, Vec2::Y);
        assert_eq!(b.sweep.c, Vec2::X);
    }

    #[test]
    fn definition_validation_rejects_bad_parameters() {
        let (a, b) = handles();
        assert!(JointDef::pin(a, b, Vec2::ZERO, Vec2::ZERO).validate().is_ok());
        assert!(matches!(
            JointDef::pin(a, b, Vec2::ZERO, Vec2::ZERO).softness(-1.0).validate(),
            Err(PhysicsError::InvalidJointParameter { name: "softness", .. })
        ));
        assert!(matches!(
            JointDef::angle_limit(a, b, 1.0, -1.0).validate(),
            Err(PhysicsError::InvalidJointParameter { name: "upper", .. })
        ));
        assert!(matches!(
            JointDef::slider(a, b, Vec2::ZERO, Vec2::ZERO, 2.0, 1.0).validate(),
            Err(PhysicsError::InvalidJointParameter { name: "max_length", .. })
        ));
        assert!(JointDef::fixed_pin(b, Vec2::ZERO, Vec2::ZERO).breakpoint(0.0).validate().is_err());
    }

    #[test]
    fn joints_between_immovable_bodies_are_singular() {
        let (a, b) = handles();
        let config = SimulationConfig::default();
        let def = JointDef::pin(a, b, Vec2::ZERO, Vec2::ZERO);
        let ground = MotionState::GROUND;
        let result = Joint::new(JointHandle::new(0, 0), &def, &ground, &ground, &config);
        assert_eq!(result, Err(PhysicsError::SingularJoint));

        let mut spinner_locked = body_at(Vec2::X);
        spinner_locked.inv_inertia = 0.0;
        let def = JointDef::angle(a, b);
        let result = Joint::new(JointHandle::new(0, 0), &def, &ground, &spinner_locked, &config);
        assert_eq!(result, Err(PhysicsError::SingularJoint));
        assert!(Joint::new(JointHandle::new(0, 0), &def.softness(0.5), &ground, &spinner_locked, &config).is_ok());
    }

    #[test]
    fn default_targets_come_from_current_pose() {
        let (a, b) = handles();
        let config = SimulationConfig::default();
        let body_a = body_at(Vec2::ZERO);
        let mut body_b = body_at(Vec2::new(3.0, 4.0));
        body_b.sweep.a = 0.4;
        let pin = Joint::new(
            JointHandle::new(0, 0),
            &JointDef::pin(a, b, Vec2::ZERO, Vec2::ZERO),
            &body_a,
            &body_b,
            &config,
        )
        .unwrap();
        match pin.kind() {
            JointKind::Pin(joint) => assert_relative_eq!(joint.length(), 5.0),
            other => panic!("unexpected kind {other:?}"),
        }
        assert_relative_eq!(pin.error(), 0.0);

        let angle = Joint::new(JointHandle::new(1, 0), &JointDef::angle(a, b), &body_a, &body_b, &config).unwrap();
        match angle.kind() {
            JointKind::Angle(joint) => assert_relative_eq!(joint.target(), 0.4),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn breaking_disables_the_joint() {
        let (a, b) = handles();
        let config = SimulationConfig::default();
        let mut states = vec![MotionState::GROUND, body_at(Vec2::ZERO), body_at(Vec2::new(3.0, 0.0))];
        let def = JointDef::pin(a, b, Vec2::ZERO, Vec2::ZERO).target(1.0).breakpoint(1.5);
        let mut joint = Joint::new(JointHandle::new(0, 0), &def, &states[1], &states[2], &config).unwrap();
        let step = TimeStep::new(1.0 / 60.0, 60.0, 8, 3, true);

        let result = joint.init_velocity(&mut states, 1, 2, &step, &config);
        assert_eq!(result, Err(2.0));
        assert!(!joint.is_enabled());
        assert_eq!(joint.reaction_impulse(), 0.0);
        assert_eq!(states[1].linear_velocity, Vec2::ZERO);
    }

    proptest! {
        #[test]
        fn zero_softness_matches_rigid_impulse(
            k in 0.1f32..50.0,
            cdot in -100.0f32..100.0,
            bias in -10.0f32..10.0,
            accumulated in -5.0f32..5.0,
        ) {
            let rigid = -(cdot + bias) / k;
            let mass = crate::utils::math::inverse_or_zero(k);
            let impulse = constraint_impulse(mass, cdot, bias, 0.0, accumulated);
            prop_assert!((impulse - rigid).abs() <= 1e-4 * rigid.abs().max(1.0));
        }

        #[test]
        fn softness_only_weakens_the_impulse(
            k in 0.1f32..50.0,
            cdot in -100.0f32..100.0,
            softness in 0.0f32..10.0,
        ) {
            let rigid = constraint_impulse(1.0 / k, cdot, 0.0, 0.0, 0.0);
            let soft = constraint_impulse(1.0 / (k + softness), cdot, 0.0, softness, 0.0);
            prop_assert!(soft.abs() <= rigid.abs() + 1e-4);
            prop_assert!(soft * rigid >= 0.0);
        }
    }
}
