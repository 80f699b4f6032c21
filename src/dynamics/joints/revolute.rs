use glam::{Mat2, Vec2};

use super::{anchor_offset, push_apart, JointParams};
use crate::{
    config::SimulationConfig,
    core::rigidbody::MotionState,
    dynamics::solver::TimeStep,
    utils::math::cross_sv,
};

/// Determinant below which the point-constraint matrix is treated as singular.
const SINGULAR_DETERMINANT: f32 = f32::EPSILON;

/// Point-to-point constraint matrix for anchor offsets `r_a`, `r_b`.
fn point_matrix(a: &MotionState, b: &MotionState, r_a: Vec2, r_b: Vec2, softness: f32) -> Mat2 {
    let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_inertia, b.inv_inertia);
    let k11 = m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y + softness;
    let k12 = -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y;
    let k22 = m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x + softness;
    Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22))
}

fn inverse_or_zero(k: Mat2) -> Mat2 {
    if k.determinant().abs() > SINGULAR_DETERMINANT {
        k.inverse()
    } else {
        Mat2::ZERO
    }
}

/// Pins two anchors together while leaving relative rotation free.
#[derive(Debug, Clone, PartialEq)]
pub struct RevoluteJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: Mat2,
    bias: Vec2,
    pub(crate) impulse: Vec2,
}

impl RevoluteJoint {
    pub(crate) fn new(local_anchor_a: Vec2, local_anchor_b: Vec2) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: Mat2::ZERO,
            bias: Vec2::ZERO,
            impulse: Vec2::ZERO,
        }
    }

    pub fn local_anchors(&self) -> (Vec2, Vec2) {
        (self.local_anchor_a, self.local_anchor_b)
    }

    /// Accumulated 2D impulse of the last step.
    pub fn impulse(&self) -> Vec2 {
        self.impulse
    }

    fn separation(&self, a: &MotionState, b: &MotionState) -> (Vec2, Vec2, Vec2) {
        let r_a = anchor_offset(a, self.local_anchor_a);
        let r_b = anchor_offset(b, self.local_anchor_b);
        (r_a, r_b, b.sweep.c + r_b - a.sweep.c - r_a)
    }

    pub(crate) fn error(&self, a: &MotionState, b: &MotionState) -> f32 {
        self.separation(a, b).2.length()
    }

    pub(crate) fn prepare(&mut self, a: &MotionState, b: &MotionState, params: &JointParams, step: &TimeStep) -> f32 {
        let (r_a, r_b, c) = self.separation(a, b);
        self.r_a = r_a;
        self.r_b = r_b;
        let k = point_matrix(a, b, r_a, r_b, params.softness);
        self.mass = inverse_or_zero(k);
        if self.mass == Mat2::ZERO {
            log::debug!("revolute joint matrix is singular (det = {})", k.determinant());
        }
        self.bias = params.bias_factor * step.inv_dt * c;
        self.impulse = if step.warm_starting { self.impulse * step.dt_ratio } else { Vec2::ZERO };
        c.length()
    }

    pub(crate) fn warm_start(&self, a: &mut MotionState, b: &mut MotionState) {
        a.apply_impulse(-self.impulse, self.r_a);
        b.apply_impulse(self.impulse, self.r_b);
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut MotionState, b: &mut MotionState, params: &JointParams) -> bool {
        let v_a = a.linear_velocity + cross_sv(a.angular_velocity, self.r_a);
        let v_b = b.linear_velocity + cross_sv(b.angular_velocity, self.r_b);
        let cdot = v_b - v_a;
        let lambda = -(self.mass * (cdot + self.bias + params.softness * self.impulse));
        if !lambda.is_finite() {
            return false;
        }

        let previous = self.impulse;
        self.impulse = (previous + lambda).clamp_length_max(params.max_impulse);
        let delta = self.impulse - previous;
        a.apply_impulse(-delta, self.r_a);
        b.apply_impulse(delta, self.r_b);
        true
    }

    pub(crate) fn solve_position(&self, a: &mut MotionState, b: &mut MotionState, config: &SimulationConfig) -> bool {
        let (r_a, r_b, c) = self.separation(a, b);
        let error = c.length();
        let correction = c.clamp_length_max(config.max_linear_correction);
        let impulse = -(inverse_or_zero(point_matrix(a, b, r_a, r_b, 0.0)) * correction);
        push_apart(a, b, impulse, r_a, r_b);
        error <= config.linear_slop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::joints::tests::body_at;
    use approx::assert_relative_eq;

    fn step() -> TimeStep {
        TimeStep::new(1.0 / 60.0, 60.0, 8, 3, true)
    }

    #[test]
    fn anchors_move_together_after_solve() {
        let params = JointParams {
            bias_factor: 0.0,
            ..JointParams::default()
        };
        let mut a = body_at(Vec2::ZERO);
        let mut b = body_at(Vec2::new(1.0, 0.0));
        b.linear_velocity = Vec2::new(0.0, 2.0);
        let mut joint = RevoluteJoint::new(Vec2::new(0.5, 0.0), Vec2::new(-0.5, 0.0));
        assert_relative_eq!(joint.prepare(&a, &b, &params, &step()), 0.0);
        for _ in 0..10 {
            joint.solve_velocity(&mut a, &mut b, &params);
        }
        let v_a = a.linear_velocity + cross_sv(a.angular_velocity, joint.r_a);
        let v_b = b.linear_velocity + cross_sv(b.angular_velocity, joint.r_b);
        assert_relative_eq!(v_a.x, v_b.x, epsilon = 1e-4);
        assert_relative_eq!(v_a.y, v_b.y, epsilon = 1e-4);
    }

    #[test]
    fn singular_matrix_yields_no_impulse() {
        let params = JointParams::default();
        let mut a = MotionState::GROUND;
        let mut b = MotionState::GROUND;
        b.linear_velocity = Vec2::new(1.0, 0.0);
        let mut joint = RevoluteJoint::new(Vec2::ZERO, Vec2::ZERO);
        joint.prepare(&a, &b, &params, &step());
        assert!(joint.solve_velocity(&mut a, &mut b, &params));
        assert_eq!(joint.impulse(), Vec2::ZERO);
    }

    #[test]
    fn fixed_revolute_drags_body_to_world_anchor() {
        let config = SimulationConfig::default();
        let mut ground = MotionState::GROUND;
        let mut b = body_at(Vec2::new(0.1, 1.0));
        let joint = RevoluteJoint::new(Vec2::new(0.0, 2.0), Vec2::new(0.0, 1.0));
        for _ in 0..10 {
            joint.solve_position(&mut ground, &mut b, &config);
        }
        assert!(joint.error(&ground, &b) < config.linear_slop);
        assert_eq!(ground.sweep.c, Vec2::ZERO);
    }
}
