use glam::Vec2;

use crate::{
    core::rigidbody::RigidBody,
    utils::allocator::{Arena, BodyHandle},
};

/// External force source applied to awake dynamic bodies before every step.
pub trait ForceGenerator: Send + Sync {
    fn apply(&self, body: &mut RigidBody, dt: f32);
}

/// Quadratic drag resisting linear motion plus linear drag on spin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragForce {
    pub drag_coefficient: f32,
    pub angular_drag: f32,
}

impl DragForce {
    pub fn new(drag_coefficient: f32) -> Self {
        Self {
            drag_coefficient,
            angular_drag: 0.0,
        }
    }
}

impl ForceGenerator for DragForce {
    fn apply(&self, body: &mut RigidBody, _dt: f32) {
        let velocity = body.linear_velocity();
        let speed = velocity.length();
        if speed > 1e-6 {
            body.apply_force_to_center(-velocity * speed * self.drag_coefficient);
        }
        let spin = body.angular_velocity();
        if spin != 0.0 && self.angular_drag > 0.0 {
            body.apply_torque(-spin * self.angular_drag);
        }
    }
}

/// Damped Hookean spring from a world anchor to a point on the body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringForce {
    pub anchor: Vec2,
    /// Attachment point in the body's local frame.
    pub local_point: Vec2,
    pub rest_length: f32,
    pub spring_constant: f32,
    pub damping: f32,
}

impl ForceGenerator for SpringForce {
    fn apply(&self, body: &mut RigidBody, _dt: f32) {
        let point = body.transform().apply(self.local_point);
        let displacement = point - self.anchor;
        let distance = displacement.length();
        if distance < 1e-6 {
            return;
        }

        let direction = displacement / distance;
        let extension = distance - self.rest_length;
        let speed = body.velocity_at_world_point(point).dot(direction);
        let force = -(self.spring_constant * extension + self.damping * speed) * direction;
        body.apply_force(force, point);
    }
}

/// Force generators registered with the world, each for every body or one body.
#[derive(Default)]
pub struct ForceRegistry {
    forces: Vec<(Option<BodyHandle>, Box<dyn ForceGenerator>)>,
}

impl std::fmt::Debug for ForceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForceRegistry").field("forces", &self.forces.len()).finish()
    }
}

impl ForceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    /// Applies `force` to every awake dynamic body.
    pub fn add_force<F: ForceGenerator + 'static>(&mut self, force: F) {
        self.forces.push((None, Box::new(force)));
    }

    /// Applies `force` to one body while it is awake.
    pub fn add_force_to<F: ForceGenerator + 'static>(&mut self, body: BodyHandle, force: F) {
        self.forces.push((Some(body), Box::new(force)));
    }

    /// Drops generators targeting `body`.
    pub fn remove_body(&mut self, body: BodyHandle) {
        self.forces.retain(|(target, _)| *target != Some(body));
    }

    pub fn clear(&mut self) {
        self.forces.clear();
    }

    pub fn apply_all(&self, bodies: &mut Arena<BodyHandle, RigidBody>, dt: f32) {
        for (target, force) in &self.forces {
            match target {
                Some(handle) => {
                    if let Some(body) = bodies.get_mut(*handle) {
                        if accepts_forces(body) {
                            force.apply(body, dt);
                        }
                    }
                }
                None => {
                    for body in bodies.values_mut().filter(|body| accepts_forces(body)) {
                        force.apply(body, dt);
                    }
                }
            }
        }
    }
}

fn accepts_forces(body: &RigidBody) -> bool {
    body.is_dynamic() && body.is_awake() && body.is_enabled()
}
