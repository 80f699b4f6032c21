use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::types::{MassData, Rotation, Sweep, Transform, Velocity};
use crate::{
    error::{PhysicsError, PhysicsResult},
    utils::{
        allocator::{BodyHandle, ColliderHandle, ContactHandle, JointHandle},
        math::{cross, cross_sv},
    },
};

/// How a body participates in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BodyType {
    /// Never moves; infinite mass.
    Static,
    /// Moves only by its set velocity; infinite mass, unaffected by forces.
    Kinematic,
    /// Fully simulated.
    #[default]
    Dynamic,
}

/// Kinematic state of a body, copied into island solvers by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionState {
    pub body_type: BodyType,
    pub sweep: Sweep,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub force: Vec2,
    pub torque: f32,
    pub inv_mass: f32,
    pub inv_inertia: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
}

impl MotionState {
    /// Immovable stand-in for the world side of single-body joints.
    pub const GROUND: Self = Self {
        body_type: BodyType::Static,
        sweep: Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::ZERO,
            c: Vec2::ZERO,
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        },
        linear_velocity: Vec2::ZERO,
        angular_velocity: 0.0,
        force: Vec2::ZERO,
        torque: 0.0,
        inv_mass: 0.0,
        inv_inertia: 0.0,
        linear_damping: 0.0,
        angular_damping: 0.0,
        gravity_scale: 0.0,
    };

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.sweep.c
    }

    #[inline]
    pub fn angle(&self) -> f32 {
        self.sweep.a
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    /// Body-origin transform at the end of the sweep.
    pub fn transform(&self) -> Transform {
        let rotation = Rotation::from_angle(self.sweep.a);
        Transform {
            position: self.sweep.c - rotation.rotate(self.sweep.local_center),
            rotation,
        }
    }

    /// `v += dt * (g * gravity_scale + F / m)`, `ω += dt * τ / I`, then damping.
    pub fn integrate_velocity(&mut self, dt: f32, gravity: Vec2) {
        if self.body_type != BodyType::Dynamic {
            return;
        }

        self.linear_velocity += dt * (gravity * self.gravity_scale + self.inv_mass * self.force);
        self.angular_velocity += dt * self.inv_inertia * self.torque;

        self.linear_velocity *= (1.0 - dt * self.linear_damping).clamp(0.0, 1.0);
        self.angular_velocity *= (1.0 - dt * self.angular_damping).clamp(0.0, 1.0);
    }

    /// Advances the end pose by the current velocity, clamping runaway motion.
    pub fn integrate_position(&mut self, dt: f32, max_translation: f32, max_rotation: f32) {
        if self.body_type == BodyType::Static {
            return;
        }

        let translation = dt * self.linear_velocity;
        if translation.length_squared() > max_translation * max_translation {
            self.linear_velocity *= max_translation / translation.length();
        }

        let rotation = dt * self.angular_velocity;
        if rotation * rotation > max_rotation * max_rotation {
            self.angular_velocity *= max_rotation / rotation.abs();
        }

        self.sweep.c += dt * self.linear_velocity;
        self.sweep.a += dt * self.angular_velocity;
    }

    /// Applies an impulse at offset `r` from the center of mass.
    #[inline]
    pub fn apply_impulse(&mut self, impulse: Vec2, r: Vec2) {
        self.linear_velocity += self.inv_mass * impulse;
        self.angular_velocity += self.inv_inertia * cross(r, impulse);
    }

    #[inline]
    pub fn apply_angular_impulse(&mut self, impulse: f32) {
        self.angular_velocity += self.inv_inertia * impulse;
    }
}

/// Construction parameters for [`crate::PhysicsWorld::create_body`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyDef {
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub allow_sleep: bool,
    pub awake: bool,
    pub bullet: bool,
    pub fixed_rotation: bool,
    pub enabled: bool,
    pub user_data: u64,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            allow_sleep: true,
            awake: true,
            bullet: false,
            fixed_rotation: false,
            enabled: true,
            user_data: 0,
        }
    }
}

impl BodyDef {
    pub fn new(body_type: BodyType) -> Self {
        Self {
            body_type,
            ..Self::default()
        }
    }

    pub fn dynamic() -> Self {
        Self::new(BodyType::Dynamic)
    }

    pub fn fixed() -> Self {
        Self::new(BodyType::Static)
    }

    pub fn kinematic() -> Self {
        Self::new(BodyType::Kinematic)
    }

    pub fn position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn linear_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn angular_velocity(mut self, velocity: f32) -> Self {
        self.angular_velocity = velocity;
        self
    }

    pub fn damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn allow_sleep(mut self, allow: bool) -> Self {
        self.allow_sleep = allow;
        self
    }

    pub fn awake(mut self, awake: bool) -> Self {
        self.awake = awake;
        self
    }

    pub fn bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }

    pub fn fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }

    pub(crate) fn validate(&self) -> PhysicsResult<()> {
        let finite = self.position.is_finite()
            && self.angle.is_finite()
            && self.linear_velocity.is_finite()
            && self.angular_velocity.is_finite()
            && self.gravity_scale.is_finite();
        if !finite {
            return Err(PhysicsError::InvalidConfig {
                name: "body_def",
                value: f32::NAN,
            });
        }
        for (name, value) in [
            ("linear_damping", self.linear_damping),
            ("angular_damping", self.angular_damping),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(PhysicsError::InvalidConfig { name, value });
            }
        }
        Ok(())
    }
}

/// Core rigid body description storing kinematic state and properties.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub(crate) handle: BodyHandle,
    pub(crate) motion: MotionState,
    pub(crate) transform: Transform,
    mass_data: MassData,
    mass_override: Option<MassData>,
    awake: bool,
    allow_sleep: bool,
    bullet: bool,
    fixed_rotation: bool,
    enabled: bool,
    pub(crate) sleep_time: f32,
    pub(crate) colliders: Vec<ColliderHandle>,
    pub(crate) contacts: Vec<ContactHandle>,
    pub(crate) joints: Vec<JointHandle>,
    pub(crate) island_flag: bool,
    pub(crate) island_index: usize,
    pub user_data: u64,
}

impl RigidBody {
    pub(crate) fn from_def(handle: BodyHandle, def: &BodyDef) -> Self {
        let transform = Transform::new(def.position, def.angle);
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: def.position,
            c: def.position,
            a0: def.angle,
            a: def.angle,
            alpha0: 0.0,
        };
        let dynamic = def.body_type == BodyType::Dynamic;
        let moving = def.body_type != BodyType::Static;

        let mut body = Self {
            handle,
            motion: MotionState {
                body_type: def.body_type,
                sweep,
                linear_velocity: if moving { def.linear_velocity } else { Vec2::ZERO },
                angular_velocity: if moving { def.angular_velocity } else { 0.0 },
                force: Vec2::ZERO,
                torque: 0.0,
                inv_mass: 0.0,
                inv_inertia: 0.0,
                linear_damping: def.linear_damping,
                angular_damping: def.angular_damping,
                gravity_scale: def.gravity_scale,
            },
            transform,
            mass_data: MassData::default(),
            mass_override: None,
            awake: def.awake && moving,
            allow_sleep: def.allow_sleep,
            bullet: def.bullet,
            fixed_rotation: def.fixed_rotation,
            enabled: def.enabled,
            sleep_time: 0.0,
            colliders: Vec::new(),
            contacts: Vec::new(),
            joints: Vec::new(),
            island_flag: false,
            island_index: 0,
            user_data: def.user_data,
        };
        if dynamic {
            body.apply_mass_data(MassData::default());
        }
        body
    }

    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    pub fn body_type(&self) -> BodyType {
        self.motion.body_type
    }

    pub fn is_dynamic(&self) -> bool {
        self.motion.body_type == BodyType::Dynamic
    }

    pub fn is_static(&self) -> bool {
        self.motion.body_type == BodyType::Static
    }

    pub fn is_kinematic(&self) -> bool {
        self.motion.body_type == BodyType::Kinematic
    }

    /// Transform of the body origin.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn position(&self) -> Vec2 {
        self.transform.position
    }

    /// Unwrapped rotation angle, including full revolutions.
    pub fn angle(&self) -> f32 {
        self.motion.sweep.a
    }

    pub fn revolutions(&self) -> i32 {
        self.motion.sweep.revolutions()
    }

    pub fn normalized_angle(&self) -> f32 {
        self.motion.sweep.normalized_angle()
    }

    pub fn world_center(&self) -> Vec2 {
        self.motion.sweep.c
    }

    pub fn local_center(&self) -> Vec2 {
        self.motion.sweep.local_center
    }

    pub fn sweep(&self) -> &Sweep {
        &self.motion.sweep
    }

    pub fn velocity(&self) -> Velocity {
        Velocity {
            linear: self.motion.linear_velocity,
            angular: self.motion.angular_velocity,
        }
    }

    pub fn linear_velocity(&self) -> Vec2 {
        self.motion.linear_velocity
    }

    pub fn angular_velocity(&self) -> f32 {
        self.motion.angular_velocity
    }

    /// Velocity of a world point attached to this body.
    pub fn velocity_at_world_point(&self, point: Vec2) -> Vec2 {
        self.motion.linear_velocity + cross_sv(self.motion.angular_velocity, point - self.motion.sweep.c)
    }

    pub fn force(&self) -> Vec2 {
        self.motion.force
    }

    pub fn torque(&self) -> f32 {
        self.motion.torque
    }

    pub fn mass(&self) -> f32 {
        if self.is_dynamic() {
            self.mass_data.mass
        } else {
            0.0
        }
    }

    /// Rotational inertia about the center of mass.
    pub fn inertia(&self) -> f32 {
        if self.is_dynamic() && !self.fixed_rotation {
            self.mass_data.inertia
        } else {
            0.0
        }
    }

    pub fn inverse_mass(&self) -> f32 {
        self.motion.inv_mass
    }

    pub fn inverse_inertia(&self) -> f32 {
        self.motion.inv_inertia
    }

    pub fn linear_damping(&self) -> f32 {
        self.motion.linear_damping
    }

    pub fn set_linear_damping(&mut self, damping: f32) {
        self.motion.linear_damping = damping.max(0.0);
    }

    pub fn angular_damping(&self) -> f32 {
        self.motion.angular_damping
    }

    pub fn set_angular_damping(&mut self, damping: f32) {
        self.motion.angular_damping = damping.max(0.0);
    }

    pub fn gravity_scale(&self) -> f32 {
        self.motion.gravity_scale
    }

    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.motion.gravity_scale = scale;
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn is_sleeping_allowed(&self) -> bool {
        self.allow_sleep
    }

    pub fn is_bullet(&self) -> bool {
        self.bullet
    }

    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn sleep_time(&self) -> f32 {
        self.sleep_time
    }

    pub fn colliders(&self) -> &[ColliderHandle] {
        &self.colliders
    }

    pub fn joints(&self) -> &[JointHandle] {
        &self.joints
    }

    pub fn contacts(&self) -> &[ContactHandle] {
        &self.contacts
    }

    /// Waking resets the sleep timer; sleeping zeroes velocities and accumulators.
    pub fn set_awake(&mut self, awake: bool) {
        if self.is_static() {
            return;
        }
        if awake {
            if !self.awake {
                self.awake = true;
                self.sleep_time = 0.0;
            }
        } else {
            self.awake = false;
            self.sleep_time = 0.0;
            self.motion.linear_velocity = Vec2::ZERO;
            self.motion.angular_velocity = 0.0;
            self.motion.force = Vec2::ZERO;
            self.motion.torque = 0.0;
        }
    }

    /// Disallowing sleep wakes the body; it then keeps its whole island awake.
    pub fn set_sleeping_allowed(&mut self, allow: bool) {
        self.allow_sleep = allow;
        if !allow {
            self.set_awake(true);
        }
    }

    pub fn set_bullet(&mut self, bullet: bool) {
        self.bullet = bullet;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_fixed_rotation(&mut self, fixed: bool) {
        if self.fixed_rotation == fixed {
            return;
        }
        self.fixed_rotation = fixed;
        self.motion.angular_velocity = 0.0;
        self.update_inverses();
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec2) {
        if self.is_static() {
            return;
        }
        if velocity.length_squared() > 0.0 {
            self.set_awake(true);
        }
        self.motion.linear_velocity = velocity;
    }

    pub fn set_angular_velocity(&mut self, velocity: f32) {
        if self.is_static() {
            return;
        }
        if velocity * velocity > 0.0 {
            self.set_awake(true);
        }
        self.motion.angular_velocity = velocity;
    }

    /// Teleports the body origin; contacts are refreshed on the next step.
    pub fn set_transform(&mut self, position: Vec2, angle: f32) {
        self.transform = Transform::new(position, angle);
        let center = self.transform.apply(self.motion.sweep.local_center);
        let sweep = &mut self.motion.sweep;
        sweep.c = center;
        sweep.c0 = center;
        sweep.a = angle;
        sweep.a0 = angle;
        sweep.alpha0 = 0.0;
        self.set_awake(true);
    }

    /// Accumulates a force at a world point; only dynamic bodies respond.
    pub fn apply_force(&mut self, force: Vec2, world_point: Vec2) {
        if !self.is_dynamic() {
            return;
        }
        self.set_awake(true);
        self.motion.force += force;
        self.motion.torque += cross(world_point - self.motion.sweep.c, force);
    }

    pub fn apply_force_to_center(&mut self, force: Vec2) {
        if !self.is_dynamic() {
            return;
        }
        self.set_awake(true);
        self.motion.force += force;
    }

    pub fn apply_torque(&mut self, torque: f32) {
        if !self.is_dynamic() {
            return;
        }
        self.set_awake(true);
        self.motion.torque += torque;
    }

    /// `Δv = J / m`, `Δω = (p - c) × J / I`.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, world_point: Vec2) {
        if !self.is_dynamic() {
            return;
        }
        self.set_awake(true);
        let r = world_point - self.motion.sweep.c;
        self.motion.apply_impulse(impulse, r);
    }

    pub fn apply_linear_impulse_to_center(&mut self, impulse: Vec2) {
        if !self.is_dynamic() {
            return;
        }
        self.set_awake(true);
        self.motion.linear_velocity += self.motion.inv_mass * impulse;
    }

    pub fn apply_angular_impulse(&mut self, impulse: f32) {
        if !self.is_dynamic() {
            return;
        }
        self.set_awake(true);
        self.motion.apply_angular_impulse(impulse);
    }

    pub(crate) fn clear_forces(&mut self) {
        self.motion.force = Vec2::ZERO;
        self.motion.torque = 0.0;
    }

    /// Integrates forces and gravity into velocity for one step of `dt`.
    pub fn integrate_velocity(&mut self, dt: f32, gravity: Vec2) {
        self.motion.integrate_velocity(dt, gravity);
    }

    /// Integrates velocity into the pose for one step of `dt` and refreshes the transform.
    pub fn integrate_position(&mut self, dt: f32) {
        self.motion.sweep.settle();
        self.motion.integrate_position(dt, f32::INFINITY, f32::INFINITY);
        self.synchronize_transform();
    }

    pub(crate) fn synchronize_transform(&mut self) {
        self.transform = self.motion.transform();
    }

    /// Moves the body to `alpha` of its sweep and collapses the sweep there.
    pub(crate) fn advance(&mut self, alpha: f32) {
        let sweep = &mut self.motion.sweep;
        sweep.advance(alpha);
        sweep.c = sweep.c0;
        sweep.a = sweep.a0;
        self.synchronize_transform();
    }

    /// Overrides the mass computed from colliders. Static and kinematic bodies keep zero inverse mass.
    ///
    /// An `inertia` of zero is accepted and locks rotation: the inverse inertia becomes zero, so
    /// torques and angular impulses have no effect, as with [`BodyDef::fixed_rotation`].
    /// The override survives collider changes until [`PhysicsWorld::clear_mass_override`].
    ///
    /// [`PhysicsWorld::clear_mass_override`]: crate::PhysicsWorld::clear_mass_override
    pub fn set_mass_data(&mut self, data: MassData) -> PhysicsResult<()> {
        if !(data.mass > 0.0 && data.mass.is_finite()) {
            return Err(PhysicsError::InvalidMass { mass: data.mass });
        }
        if !(data.inertia >= 0.0 && data.inertia.is_finite()) {
            return Err(PhysicsError::InvalidInertia {
                inertia: data.inertia,
            });
        }
        if !data.center.is_finite() {
            return Err(PhysicsError::InvalidConfig {
                name: "mass_center",
                value: f32::NAN,
            });
        }
        self.mass_override = Some(data);
        self.apply_mass_data(data);
        Ok(())
    }

    pub(crate) fn clear_mass_override(&mut self, shapes: impl IntoIterator<Item = MassData>) {
        self.mass_override = None;
        self.reset_mass_data(shapes);
    }

    pub fn mass_override(&self) -> Option<MassData> {
        self.mass_override
    }

    /// Aggregates collider mass properties, parallel-axis corrected to the combined center.
    pub(crate) fn reset_mass_data(&mut self, shapes: impl IntoIterator<Item = MassData>) {
        if let Some(data) = self.mass_override {
            self.apply_mass_data(data);
            return;
        }

        let mut mass = 0.0;
        let mut weighted_center = Vec2::ZERO;
        let mut origin_inertia = 0.0;
        for shape in shapes {
            if shape.mass <= 0.0 {
                continue;
            }
            mass += shape.mass;
            weighted_center += shape.mass * shape.center;
            origin_inertia += shape.inertia + shape.mass * shape.center.length_squared();
        }

        let data = if mass > 0.0 {
            let center = weighted_center / mass;
            MassData {
                mass,
                center,
                inertia: (origin_inertia - mass * center.length_squared()).max(0.0),
            }
        } else {
            MassData::default()
        };
        self.apply_mass_data(data);
    }

    fn apply_mass_data(&mut self, data: MassData) {
        let old_center = self.motion.sweep.c;
        if self.is_dynamic() {
            self.mass_data = data;
            self.motion.sweep.local_center = data.center;
        } else {
            self.mass_data = MassData {
                mass: 0.0,
                center: Vec2::ZERO,
                inertia: 0.0,
            };
            self.motion.sweep.local_center = Vec2::ZERO;
        }
        self.update_inverses();

        let center = self.transform.apply(self.motion.sweep.local_center);
        self.motion.sweep.c = center;
        self.motion.sweep.c0 = center;
        let shift = center - old_center;
        self.motion.linear_velocity += cross_sv(self.motion.angular_velocity, shift);
    }

    fn update_inverses(&mut self) {
        if !self.is_dynamic() {
            self.motion.inv_mass = 0.0;
            self.motion.inv_inertia = 0.0;
            return;
        }
        self.motion.inv_mass = 1.0 / self.mass_data.mass;
        self.motion.inv_inertia = if self.fixed_rotation || self.mass_data.inertia <= 0.0 {
            0.0
        } else {
            1.0 / self.mass_data.inertia
        };
    }

    /// Changes the body type; the world flushes contacts around this call.
    pub(crate) fn set_body_type(&mut self, body_type: BodyType) {
        self.motion.body_type = body_type;
        if body_type == BodyType::Static {
            self.motion.linear_velocity = Vec2::ZERO;
            self.motion.angular_velocity = 0.0;
            self.awake = false;
        } else {
            self.set_awake(true);
        }
        self.clear_forces();
        self.sleep_time = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn dynamic_body(def: BodyDef) -> RigidBody {
        RigidBody::from_def(BodyHandle::new(0, 0), &def)
    }

    #[test]
    fn new_dynamic_body_has_unit_mass() {
        let body = dynamic_body(BodyDef::dynamic());
        assert_abs_diff_eq!(body.mass(), 1.0);
        assert_abs_diff_eq!(body.inverse_mass(), 1.0);
        assert_abs_diff_eq!(body.inverse_inertia(), 0.0);
    }

    #[test]
    fn static_and_kinematic_bodies_have_zero_inverse_mass() {
        for def in [BodyDef::fixed(), BodyDef::kinematic()] {
            let mut body = dynamic_body(def);
            body.reset_mass_data([MassData {
                mass: 3.0,
                center: Vec2::ZERO,
                inertia: 1.0,
            }]);
            assert_eq!(body.inverse_mass(), 0.0);
            assert_eq!(body.inverse_inertia(), 0.0);
            body.apply_force_to_center(Vec2::X);
            assert_eq!(body.force(), Vec2::ZERO);
        }
    }

    #[test]
    fn mass_aggregation_uses_parallel_axis() {
        let mut body = dynamic_body(BodyDef::dynamic());
        let disc = MassData {
            mass: 1.0,
            center: Vec2::new(1.0, 0.0),
            inertia: 0.5,
        };
        let other = MassData {
            center: Vec2::new(-1.0, 0.0),
            ..disc
        };
        body.reset_mass_data([disc, other]);
        assert_abs_diff_eq!(body.mass(), 2.0);
        assert_abs_diff_eq!(body.local_center().x, 0.0);
        // 2 * (0.5 + 1 * 1²)
        assert_abs_diff_eq!(body.inertia(), 3.0);
    }

    #[test]
    fn zero_density_collapses_to_unit_mass() {
        let mut body = dynamic_body(BodyDef::dynamic());
        body.reset_mass_data([MassData {
            mass: 0.0,
            center: Vec2::ONE,
            inertia: 0.0,
        }]);
        assert_abs_diff_eq!(body.mass(), 1.0);
    }

    #[test]
    fn invalid_mass_override_is_rejected() {
        let mut body = dynamic_body(BodyDef::dynamic());
        let err = body.set_mass_data(MassData {
            mass: -1.0,
            ..MassData::default()
        });
        assert_eq!(err, Err(PhysicsError::InvalidMass { mass: -1.0 }));
        assert!(body
            .set_mass_data(MassData {
                mass: 1.0,
                center: Vec2::ZERO,
                inertia: f32::NAN,
            })
            .is_err());
    }

    #[test]
    fn impulse_changes_linear_and_angular_velocity() {
        let mut body = dynamic_body(BodyDef::dynamic());
        body.set_mass_data(MassData {
            mass: 2.0,
            center: Vec2::ZERO,
            inertia: 0.5,
        })
        .expect("valid mass");
        body.apply_linear_impulse(Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0));
        assert_abs_diff_eq!(body.linear_velocity().y, 0.5);
        assert_abs_diff_eq!(body.angular_velocity(), 2.0);
    }

    #[test]
    fn zero_inertia_override_locks_rotation() {
        let mut body = dynamic_body(BodyDef::dynamic());
        body.set_mass_data(MassData {
            mass: 2.0,
            center: Vec2::ZERO,
            inertia: 0.0,
        })
        .expect("zero inertia is allowed");
        assert_eq!(body.inverse_inertia(), 0.0);
        body.apply_angular_impulse(4.0);
        body.apply_linear_impulse(Vec2::Y, Vec2::X);
        assert_eq!(body.angular_velocity(), 0.0);
        assert_abs_diff_eq!(body.linear_velocity().y, 0.5);
    }

    #[test]
    fn clearing_the_override_recomputes_from_shapes() {
        let mut body = dynamic_body(BodyDef::dynamic());
        let disc = MassData {
            mass: 0.75,
            center: Vec2::ZERO,
            inertia: 0.1,
        };
        body.reset_mass_data([disc]);
        body.set_mass_data(MassData {
            mass: 5.0,
            center: Vec2::ZERO,
            inertia: 2.0,
        })
        .expect("valid mass");
        body.reset_mass_data([disc]);
        assert_abs_diff_eq!(body.mass(), 5.0);

        body.clear_mass_override([disc]);
        assert_eq!(body.mass_override(), None);
        assert_abs_diff_eq!(body.mass(), 0.75);
        assert_abs_diff_eq!(body.inertia(), 0.1);
    }

    #[test]
    fn sleeping_clears_motion() {
        let mut body = dynamic_body(BodyDef::dynamic().linear_velocity(Vec2::X));
        body.apply_torque(3.0);
        body.set_awake(false);
        assert!(!body.is_awake());
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
        assert_eq!(body.torque(), 0.0);

        body.apply_force(Vec2::Y, Vec2::ZERO);
        assert!(body.is_awake());
    }

    #[test]
    fn integration_applies_gravity_and_damping() {
        let mut body = dynamic_body(BodyDef::dynamic().damping(0.5, 0.0));
        body.integrate_velocity(0.1, Vec2::new(0.0, -10.0));
        // (0 - 1) * (1 - 0.05)
        assert_abs_diff_eq!(body.linear_velocity().y, -0.95, epsilon = 1e-6);
        body.integrate_position(0.1);
        assert_abs_diff_eq!(body.position().y, -0.095, epsilon = 1e-6);
    }

    #[test]
    fn damping_factor_is_clamped() {
        let mut body = dynamic_body(BodyDef::dynamic().linear_velocity(Vec2::X).damping(100.0, 0.0));
        body.integrate_velocity(0.1, Vec2::ZERO);
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
    }
}
