//! Sequential-impulse contact constraints.

use glam::Vec2;
use log::debug;

use super::solver::{SolverStepMetrics, TimeStep};
use crate::{
    collision::contact::Contact,
    config::{SimulationConfig, MAX_MANIFOLD_POINTS},
    core::{rigidbody::MotionState, types::Rotation},
    utils::{
        allocator::ContactHandle,
        math::{cross, cross_sv, inverse_or_zero, tangent_of},
    },
};

/// Solver-side state of one manifold point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContactConstraintPoint {
    pub id: u32,
    /// World position from the manifold at the start of the step.
    pub position: Vec2,
    pub normal: Vec2,
    pub base_separation: f32,
    /// Anchor relative to each center of mass, in the body's frame.
    pub local_a: Vec2,
    pub local_b: Vec2,
    /// Normal expressed in body A's frame.
    pub local_normal: Vec2,
    pub r_a: Vec2,
    pub r_b: Vec2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub normal_mass: f32,
    pub tangent_mass: f32,
    /// Minimum normal velocity the solver drives toward.
    pub velocity_bias: f32,
}

/// Position-correction tuning for the regular and TOI passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionParams {
    pub baumgarte: f32,
    pub linear_slop: f32,
    pub max_linear_correction: f32,
}

impl PositionParams {
    pub fn regular(config: &SimulationConfig) -> Self {
        Self {
            baumgarte: config.baumgarte,
            linear_slop: config.linear_slop,
            max_linear_correction: config.max_linear_correction,
        }
    }

    pub fn toi(config: &SimulationConfig) -> Self {
        Self {
            baumgarte: config.toi_baumgarte,
            ..Self::regular(config)
        }
    }
}

/// Island-local view of a touching contact.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactConstraint {
    pub contact: ContactHandle,
    pub index_a: usize,
    pub index_b: usize,
    pub friction: f32,
    pub restitution: f32,
    points: [ContactConstraintPoint; MAX_MANIFOLD_POINTS],
    point_count: usize,
}

impl ContactConstraint {
    pub fn new(contact: &Contact, index_a: usize, index_b: usize) -> Self {
        let mut constraint = Self {
            contact: contact.handle(),
            index_a,
            index_b,
            friction: contact.friction(),
            restitution: contact.restitution(),
            points: [ContactConstraintPoint::default(); MAX_MANIFOLD_POINTS],
            point_count: 0,
        };
        for point in contact.manifold().points() {
            constraint.points[constraint.point_count] = ContactConstraintPoint {
                id: point.id,
                position: point.position,
                normal: point.normal,
                base_separation: point.separation,
                normal_impulse: point.normal_impulse,
                tangent_impulse: point.tangent_impulse,
                ..ContactConstraintPoint::default()
            };
            constraint.point_count += 1;
        }
        constraint
    }

    pub fn points(&self) -> &[ContactConstraintPoint] {
        &self.points[..self.point_count]
    }

    /// Effective masses, velocity bias and anchors for this step.
    pub fn prepare(&mut self, states: &[MotionState], step: &TimeStep, config: &SimulationConfig) {
        let a = &states[self.index_a];
        let b = &states[self.index_b];
        let (m_a, i_a, m_b, i_b) = (a.inv_mass, a.inv_inertia, b.inv_mass, b.inv_inertia);
        let rot_a = Rotation::from_angle(a.sweep.a);
        let rot_b = Rotation::from_angle(b.sweep.a);

        for point in &mut self.points[..self.point_count] {
            let normal = point.normal;
            let tangent = tangent_of(normal);

            point.r_a = point.position - a.sweep.c;
            point.r_b = point.position - b.sweep.c;
            point.local_a = rot_a.inv_rotate(point.r_a);
            point.local_b = rot_b.inv_rotate(point.r_b);
            point.local_normal = rot_a.inv_rotate(normal);

            let rn_a = cross(point.r_a, normal);
            let rn_b = cross(point.r_b, normal);
            point.normal_mass = inverse_or_zero(m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b);

            let rt_a = cross(point.r_a, tangent);
            let rt_b = cross(point.r_b, tangent);
            point.tangent_mass = inverse_or_zero(m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b);

            let separation = point.base_separation;
            let mut bias = if separation > 0.0 {
                // Speculative: allow closing the gap within this step, no further.
                -separation * step.inv_dt
            } else {
                -config.baumgarte * step.inv_dt * (separation + config.linear_slop).min(0.0)
            };

            let dv = b.linear_velocity + cross_sv(b.angular_velocity, point.r_b)
                - a.linear_velocity
                - cross_sv(a.angular_velocity, point.r_a);
            let approach = normal.dot(dv);
            if approach < -config.velocity_threshold {
                bias = bias.max(-self.restitution * approach);
            }
            point.velocity_bias = bias;

            if step.warm_starting {
                point.normal_impulse *= step.dt_ratio;
                point.tangent_impulse *= step.dt_ratio;
            } else {
                point.normal_impulse = 0.0;
                point.tangent_impulse = 0.0;
            }
        }
    }

    /// Applies the carried-over impulses once before iterating.
    pub fn warm_start(&self, states: &mut [MotionState]) {
        let (mut v_a, mut w_a) = velocity(states, self.index_a);
        let (mut v_b, mut w_b) = velocity(states, self.index_b);
        let (m_a, i_a) = inverse_masses(states, self.index_a);
        let (m_b, i_b) = inverse_masses(states, self.index_b);

        for point in self.points() {
            let impulse = point.normal_impulse * point.normal + point.tangent_impulse * tangent_of(point.normal);
            v_a -= m_a * impulse;
            w_a -= i_a * cross(point.r_a, impulse);
            v_b += m_b * impulse;
            w_b += i_b * cross(point.r_b, impulse);
        }

        store_velocity(states, self.index_a, v_a, w_a);
        store_velocity(states, self.index_b, v_b, w_b);
    }

    /// One sequential-impulse pass: normal impulses first, then Coulomb friction.
    pub fn solve_velocity(&mut self, states: &mut [MotionState], metrics: &mut SolverStepMetrics) {
        let (mut v_a, mut w_a) = velocity(states, self.index_a);
        let (mut v_b, mut w_b) = velocity(states, self.index_b);
        let (m_a, i_a) = inverse_masses(states, self.index_a);
        let (m_b, i_b) = inverse_masses(states, self.index_b);
        let friction = self.friction;

        for point in &mut self.points[..self.point_count] {
            let normal = point.normal;
            let tangent = tangent_of(normal);

            let dv = v_b + cross_sv(w_b, point.r_b) - v_a - cross_sv(w_a, point.r_a);
            let vn = dv.dot(normal);
            let lambda = -point.normal_mass * (vn - point.velocity_bias);
            if lambda.is_finite() {
                let accumulated = (point.normal_impulse + lambda).max(0.0);
                let delta = accumulated - point.normal_impulse;
                point.normal_impulse = accumulated;

                let impulse = delta * normal;
                v_a -= m_a * impulse;
                w_a -= i_a * cross(point.r_a, impulse);
                v_b += m_b * impulse;
                w_b += i_b * cross(point.r_b, impulse);
            } else {
                metrics.discarded_impulses += 1;
                debug!("discarded non-finite normal impulse on {:?}", self.contact);
            }

            let dv = v_b + cross_sv(w_b, point.r_b) - v_a - cross_sv(w_a, point.r_a);
            let vt = dv.dot(tangent);
            let lambda = -point.tangent_mass * vt;
            if lambda.is_finite() {
                let max_friction = friction * point.normal_impulse;
                let accumulated = (point.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let delta = accumulated - point.tangent_impulse;
                point.tangent_impulse = accumulated;

                let impulse = delta * tangent;
                v_a -= m_a * impulse;
                w_a -= i_a * cross(point.r_a, impulse);
                v_b += m_b * impulse;
                w_b += i_b * cross(point.r_b, impulse);
            } else {
                metrics.discarded_impulses += 1;
                debug!("discarded non-finite friction impulse on {:?}", self.contact);
            }
        }

        store_velocity(states, self.index_a, v_a, w_a);
        store_velocity(states, self.index_b, v_b, w_b);
    }

    /// Non-linear Gauss-Seidel penetration correction; returns the deepest separation seen.
    ///
    /// With `movable` set only those two island indices are pushed, everything
    /// else is treated as immovable.
    pub fn solve_position(
        &self,
        states: &mut [MotionState],
        params: &PositionParams,
        movable: Option<(usize, usize)>,
    ) -> f32 {
        let can_move = |index: usize| movable.map_or(true, |(a, b)| index == a || index == b);
        let (mut m_a, mut i_a) = inverse_masses(states, self.index_a);
        let (mut m_b, mut i_b) = inverse_masses(states, self.index_b);
        if !can_move(self.index_a) {
            m_a = 0.0;
            i_a = 0.0;
        }
        if !can_move(self.index_b) {
            m_b = 0.0;
            i_b = 0.0;
        }

        let (mut c_a, mut a_a) = (states[self.index_a].sweep.c, states[self.index_a].sweep.a);
        let (mut c_b, mut a_b) = (states[self.index_b].sweep.c, states[self.index_b].sweep.a);
        let mut min_separation = 0.0_f32;

        for point in self.points() {
            let rot_a = Rotation::from_angle(a_a);
            let rot_b = Rotation::from_angle(a_b);
            let p_a = c_a + rot_a.rotate(point.local_a);
            let p_b = c_b + rot_b.rotate(point.local_b);
            let normal = rot_a.rotate(point.local_normal);
            let separation = (p_b - p_a).dot(normal) + point.base_separation;
            let contact_point = 0.5 * (p_a + p_b);

            let r_a = contact_point - c_a;
            let r_b = contact_point - c_b;
            min_separation = min_separation.min(separation);

            let correction = (params.baumgarte * (separation + params.linear_slop))
                .clamp(-params.max_linear_correction, 0.0);

            let rn_a = cross(r_a, normal);
            let rn_b = cross(r_b, normal);
            let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
            let impulse = if k > 0.0 { -correction / k } else { 0.0 };
            let p = impulse * normal;

            c_a -= m_a * p;
            a_a -= i_a * cross(r_a, p);
            c_b += m_b * p;
            a_b += i_b * cross(r_b, p);
        }

        if can_move(self.index_a) {
            states[self.index_a].sweep.c = c_a;
            states[self.index_a].sweep.a = a_a;
        }
        if can_move(self.index_b) {
            states[self.index_b].sweep.c = c_b;
            states[self.index_b].sweep.a = a_b;
        }
        min_separation
    }
}

#[inline]
pub(crate) fn velocity(states: &[MotionState], index: usize) -> (Vec2, f32) {
    (states[index].linear_velocity, states[index].angular_velocity)
}

#[inline]
pub(crate) fn inverse_masses(states: &[MotionState], index: usize) -> (f32, f32) {
    (states[index].inv_mass, states[index].inv_inertia)
}

#[inline]
pub(crate) fn store_velocity(states: &mut [MotionState], index: usize, linear: Vec2, angular: f32) {
    if states[index].inv_mass > 0.0 || states[index].inv_inertia > 0.0 {
        states[index].linear_velocity = linear;
        states[index].angular_velocity = angular;
    }
}
