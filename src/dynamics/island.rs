//! Island partitioning, per-island solving and sleep bookkeeping.

use log::debug;

use super::{
    contact_solver::{ContactConstraint, PositionParams},
    integrator::Integrator,
    joints::Joint,
    solver::{SolverStepMetrics, TimeStep},
};
use crate::{
    collision::contact::ContactManager,
    config::{SimulationConfig, MAX_MANIFOLD_POINTS},
    core::rigidbody::{BodyType, MotionState, RigidBody},
    events::WorldEvent,
    utils::allocator::{Arena, BodyHandle, ContactHandle, JointHandle},
};

/// Island-local copy of a joint with its endpoint indices.
#[derive(Debug, Clone)]
pub struct IslandJoint {
    pub joint: Joint,
    pub index_a: usize,
    pub index_b: usize,
    /// Error that broke the joint during this step.
    pub broke: Option<f32>,
}

/// Bodies, contacts and joints reachable from one seed body.
///
/// The island owns copies of everything it solves, so islands can be solved
/// on separate threads; results go back to the world in [`Island::write_back`].
/// `states[0]` is the immovable ground used by world-fixed joints, body `i` of
/// `bodies` lives in `states[i + 1]`.
#[derive(Debug, Clone, Default)]
pub struct Island {
    pub(crate) bodies: Vec<BodyHandle>,
    pub(crate) states: Vec<MotionState>,
    pub(crate) sleep_times: Vec<f32>,
    pub(crate) allow_sleep: Vec<bool>,
    pub(crate) contacts: Vec<ContactConstraint>,
    pub(crate) joints: Vec<IslandJoint>,
    pub(crate) metrics: SolverStepMetrics,
    pub(crate) position_solved: bool,
    pub(crate) sleep: bool,
}

impl Island {
    pub(crate) fn new() -> Self {
        Self {
            states: vec![MotionState::GROUND],
            ..Self::default()
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn bodies(&self) -> &[BodyHandle] {
        &self.bodies
    }

    /// Whether the island decided to fall asleep in its last solve.
    pub fn is_sleeping(&self) -> bool {
        self.sleep
    }

    /// Appends a body and returns its island index.
    pub(crate) fn push_body(&mut self, body: &RigidBody) -> usize {
        self.bodies.push(body.handle);
        self.states.push(body.motion);
        self.sleep_times.push(body.sleep_time);
        self.allow_sleep.push(body.is_sleeping_allowed());
        self.states.len() - 1
    }

    /// Full step: velocities, velocity constraints, positions, position constraints, sleep.
    pub fn solve(&mut self, step: &TimeStep, config: &SimulationConfig) {
        let integrator = Integrator::new(config);
        let mut metrics = SolverStepMetrics {
            islands_solved: 1,
            ..SolverStepMetrics::default()
        };

        for state in &mut self.states {
            state.sweep.c0 = state.sweep.c;
            state.sweep.a0 = state.sweep.a;
        }
        integrator.integrate_velocities(&mut self.states, step.dt);

        for contact in &mut self.contacts {
            contact.prepare(&self.states, step, config);
        }
        for entry in &mut self.joints {
            if let Err(error) = entry
                .joint
                .init_velocity(&mut self.states, entry.index_a, entry.index_b, step, config)
            {
                debug!("joint {:?} broke with error {error}", entry.joint.handle());
                entry.broke = Some(error);
            }
        }
        for contact in &self.contacts {
            contact.warm_start(&mut self.states);
        }

        for _ in 0..step.velocity_iterations {
            for entry in self.joints.iter_mut().filter(|entry| entry.joint.is_enabled()) {
                entry
                    .joint
                    .solve_velocity(&mut self.states, entry.index_a, entry.index_b, &mut metrics);
            }
            for contact in &mut self.contacts {
                contact.solve_velocity(&mut self.states, &mut metrics);
            }
        }

        integrator.integrate_positions(&mut self.states, step.dt);

        let params = PositionParams::regular(config);
        self.position_solved = false;
        for _ in 0..step.position_iterations {
            let mut min_separation = 0.0_f32;
            for contact in &self.contacts {
                min_separation = min_separation.min(contact.solve_position(&mut self.states, &params, None));
            }
            let contacts_ok = min_separation >= -3.0 * config.linear_slop;

            let mut joints_ok = true;
            for entry in self.joints.iter().filter(|entry| entry.joint.is_enabled()) {
                let ok = entry
                    .joint
                    .solve_position(&mut self.states, entry.index_a, entry.index_b, config);
                joints_ok = joints_ok && ok;
            }

            if contacts_ok && joints_ok {
                self.position_solved = true;
                break;
            }
        }

        self.update_sleep(step.dt, config);

        metrics.contacts_solved = self.contacts.len();
        metrics.joints_solved = self.joints.iter().filter(|entry| entry.joint.is_enabled()).count();
        for contact in &self.contacts {
            for point in contact.points() {
                metrics.normal_impulse_sum += point.normal_impulse;
                metrics.tangent_impulse_sum += point.tangent_impulse.abs();
            }
        }
        if self.sleep {
            metrics.islands_put_to_sleep = 1;
        }
        self.metrics = metrics;
    }

    fn update_sleep(&mut self, dt: f32, config: &SimulationConfig) {
        self.sleep = false;
        if !config.allow_sleep {
            return;
        }

        let linear_tolerance = config.linear_sleep_tolerance * config.linear_sleep_tolerance;
        let angular_tolerance = config.angular_sleep_tolerance * config.angular_sleep_tolerance;
        let mut min_sleep_time = f32::MAX;

        for (index, state) in self.states[1..].iter().enumerate() {
            if state.body_type == BodyType::Static {
                continue;
            }
            let restless = !self.allow_sleep[index]
                || state.angular_velocity * state.angular_velocity > angular_tolerance
                || state.linear_velocity.length_squared() > linear_tolerance;
            if restless {
                self.sleep_times[index] = 0.0;
                min_sleep_time = 0.0;
            } else {
                self.sleep_times[index] += dt;
                min_sleep_time = min_sleep_time.min(self.sleep_times[index]);
            }
        }

        self.sleep = min_sleep_time >= config.time_to_sleep && self.position_solved;
    }

    /// Sub-step used after a time of impact: only the two TOI bodies are pushed
    /// out of penetration, then the island gets a velocity solve without warm
    /// starting.
    pub fn solve_toi(&mut self, step: &TimeStep, toi_index_a: usize, toi_index_b: usize, config: &SimulationConfig) {
        let params = PositionParams::toi(config);
        for _ in 0..step.position_iterations {
            let mut min_separation = 0.0_f32;
            for contact in &self.contacts {
                min_separation = min_separation.min(contact.solve_position(
                    &mut self.states,
                    &params,
                    Some((toi_index_a, toi_index_b)),
                ));
            }
            if min_separation >= -1.5 * config.linear_slop {
                break;
            }
        }

        // The TOI bodies now start the rest of the step from their corrected pose.
        for index in [toi_index_a, toi_index_b] {
            let sweep = &mut self.states[index].sweep;
            sweep.c0 = sweep.c;
            sweep.a0 = sweep.a;
        }

        for contact in &mut self.contacts {
            contact.prepare(&self.states, step, config);
        }
        let mut metrics = SolverStepMetrics::default();
        for _ in 0..step.velocity_iterations {
            for contact in &mut self.contacts {
                contact.solve_velocity(&mut self.states, &mut metrics);
            }
        }

        Integrator::new(config).integrate_positions(&mut self.states, step.dt);
        metrics.toi_events = 1;
        self.metrics = metrics;
    }

    /// Copies solved body states back into the world.
    pub(crate) fn write_bodies(&self, bodies: &mut Arena<BodyHandle, RigidBody>) {
        for (handle, state) in self.bodies.iter().zip(&self.states[1..]) {
            let Some(body) = bodies.get_mut(*handle) else {
                continue;
            };
            if body.is_static() {
                continue;
            }
            body.motion = *state;
            body.synchronize_transform();
        }
    }

    /// Commits the result of [`Island::solve`]: bodies, sleep state, contact
    /// impulses for warm starting and joint state, in island order.
    pub(crate) fn write_back(
        &mut self,
        bodies: &mut Arena<BodyHandle, RigidBody>,
        contacts: &mut ContactManager,
        joints: &mut Arena<JointHandle, Joint>,
        config: &SimulationConfig,
        events: &mut Vec<WorldEvent>,
    ) {
        self.write_bodies(bodies);
        for (index, handle) in self.bodies.iter().enumerate() {
            let Some(body) = bodies.get_mut(*handle) else {
                continue;
            };
            if body.is_static() {
                continue;
            }
            body.sleep_time = self.sleep_times[index];
            if self.sleep {
                body.set_awake(false);
            }
        }
        if self.sleep {
            debug!("island of {} bodies fell asleep", self.bodies.len());
        }

        for constraint in &self.contacts {
            store_impulses(constraint, contacts);
            if config.solve_events {
                events.push(post_solve_event(constraint));
            }
        }

        for entry in self.joints.drain(..) {
            let handle = entry.joint.handle();
            if let Some(joint) = joints.get_mut(handle) {
                *joint = entry.joint;
            }
            if let Some(error) = entry.broke {
                events.push(WorldEvent::JointBroke { joint: handle, error });
            }
        }
    }
}

fn store_impulses(constraint: &ContactConstraint, contacts: &mut ContactManager) {
    let Some(contact) = contacts.contacts.get_mut(constraint.contact) else {
        return;
    };
    for (point, solved) in contact.manifold.points_mut().iter_mut().zip(constraint.points()) {
        if point.id == solved.id {
            point.normal_impulse = solved.normal_impulse;
            point.tangent_impulse = solved.tangent_impulse;
        }
    }
}

fn post_solve_event(constraint: &ContactConstraint) -> WorldEvent {
    let mut normal_impulses = [0.0; MAX_MANIFOLD_POINTS];
    let mut tangent_impulses = [0.0; MAX_MANIFOLD_POINTS];
    for (index, point) in constraint.points().iter().enumerate() {
        normal_impulses[index] = point.normal_impulse;
        tangent_impulses[index] = point.tangent_impulse;
    }
    WorldEvent::PostSolve {
        contact: constraint.contact,
        normal_impulses,
        tangent_impulses,
        point_count: constraint.points().len(),
    }
}

/// Partitions awake bodies into islands over solvable contacts and enabled joints.
///
/// Seeds are visited in body-slot order. Static bodies join an island as
/// endpoints but never carry the traversal further, and can appear in several
/// islands. Every body reached is woken.
pub fn build_islands(
    bodies: &mut Arena<BodyHandle, RigidBody>,
    contacts: &mut ContactManager,
    joints: &mut Arena<JointHandle, Joint>,
) -> Vec<Island> {
    for body in bodies.values_mut() {
        body.island_flag = false;
    }
    for contact in contacts.contacts.values_mut() {
        contact.island_flag = false;
    }
    for joint in joints.values_mut() {
        joint.island_flag = false;
    }

    let seeds: Vec<BodyHandle> = bodies
        .iter()
        .filter(|(_, body)| body.is_awake() && body.is_enabled() && !body.is_static())
        .map(|(handle, _)| handle)
        .collect();

    let mut islands = Vec::new();
    let mut stack = Vec::new();
    let mut island_contacts: Vec<ContactHandle> = Vec::new();
    let mut island_joints: Vec<JointHandle> = Vec::new();

    for seed in seeds {
        if bodies.get(seed).map_or(true, |body| body.island_flag) {
            continue;
        }

        let mut island = Island::new();
        island_contacts.clear();
        island_joints.clear();
        stack.clear();
        stack.push(seed);
        if let Some(body) = bodies.get_mut(seed) {
            body.island_flag = true;
        }

        while let Some(handle) = stack.pop() {
            let Some(body) = bodies.get_mut(handle) else {
                continue;
            };
            body.set_awake(true);
            body.island_index = island.push_body(body);
            if body.is_static() {
                continue;
            }

            let contact_edges = body.contacts.clone();
            let joint_edges = body.joints.clone();

            for edge in contact_edges {
                let Some(contact) = contacts.contacts.get_mut(edge) else {
                    continue;
                };
                if contact.island_flag || !contact.is_solvable() {
                    continue;
                }
                let other = contact.other_body(handle);
                let Some(other_body) = bodies.get_mut(other) else {
                    continue;
                };
                if !other_body.is_enabled() {
                    continue;
                }
                contact.island_flag = true;
                island_contacts.push(edge);
                if !other_body.island_flag {
                    other_body.island_flag = true;
                    stack.push(other);
                }
            }

            for edge in joint_edges {
                let Some(joint) = joints.get_mut(edge) else {
                    continue;
                };
                if joint.island_flag || !joint.is_enabled() {
                    continue;
                }
                let (body_a, body_b) = joint.bodies();
                let other = match body_a {
                    Some(body_a) if body_a == handle => Some(body_b),
                    Some(body_a) => Some(body_a),
                    None => None,
                };
                if let Some(other) = other {
                    let Some(other_body) = bodies.get_mut(other) else {
                        continue;
                    };
                    if !other_body.is_enabled() {
                        continue;
                    }
                    joint.island_flag = true;
                    island_joints.push(edge);
                    if !other_body.island_flag {
                        other_body.island_flag = true;
                        stack.push(other);
                    }
                } else {
                    joint.island_flag = true;
                    island_joints.push(edge);
                }
            }
        }

        let index_of = |bodies: &Arena<BodyHandle, RigidBody>, handle: BodyHandle| {
            bodies.get(handle).map_or(0, |body| body.island_index)
        };

        // Contacts between movable bodies go first.
        let (mut ordered, with_static): (Vec<ContactHandle>, Vec<ContactHandle>) =
            island_contacts.iter().copied().partition(|handle| {
                contacts.get(*handle).is_some_and(|contact| {
                    let (a, b) = contact.bodies();
                    !bodies.get(a).is_some_and(RigidBody::is_static) && !bodies.get(b).is_some_and(RigidBody::is_static)
                })
            });
        ordered.extend(with_static);

        for handle in ordered {
            if let Some(contact) = contacts.get(handle) {
                let (a, b) = contact.bodies();
                island
                    .contacts
                    .push(ContactConstraint::new(contact, index_of(bodies, a), index_of(bodies, b)));
            }
        }

        for handle in &island_joints {
            if let Some(joint) = joints.get(*handle) {
                let (a, b) = joint.bodies();
                island.joints.push(IslandJoint {
                    joint: joint.clone(),
                    index_a: a.map_or(0, |a| index_of(bodies, a)),
                    index_b: index_of(bodies, b),
                    broke: None,
                });
            }
        }

        // Static bodies may belong to any number of islands.
        for handle in &island.bodies {
            if let Some(body) = bodies.get_mut(*handle) {
                if body.is_static() {
                    body.island_flag = false;
                }
            }
        }

        islands.push(island);
    }

    islands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::contact::{Contact, Manifold, ManifoldPoint},
        core::{rigidbody::BodyDef, types::MaterialPairProperties},
        utils::allocator::ColliderHandle,
    };
    use glam::Vec2;

    fn spawn(bodies: &mut Arena<BodyHandle, RigidBody>, def: BodyDef) -> BodyHandle {
        bodies.insert_with(|handle| RigidBody::from_def(handle, &def))
    }

    fn touch(
        contacts: &mut ContactManager,
        bodies: &mut Arena<BodyHandle, RigidBody>,
        a: BodyHandle,
        b: BodyHandle,
    ) -> ContactHandle {
        let mut manifold = Manifold::new();
        manifold.push(ManifoldPoint::new(Vec2::ZERO, Vec2::Y, -0.001, 7));
        let handle = contacts.contacts.insert_with(|handle| Contact {
            handle,
            collider_a: ColliderHandle::new(a.index(), 0),
            collider_b: ColliderHandle::new(b.index(), 0),
            body_a: a,
            body_b: b,
            manifold,
            material: MaterialPairProperties::default(),
            touching: true,
            is_sensor: false,
            island_flag: false,
            toi_count: 0,
            cached_toi: None,
        });
        for body in [a, b] {
            if let Some(body) = bodies.get_mut(body) {
                body.contacts.push(handle);
            }
        }
        handle
    }

    #[test]
    fn static_bodies_do_not_merge_islands() {
        let mut bodies = Arena::new();
        let mut contacts = ContactManager::new();
        let mut joints = Arena::new();
        let ground = spawn(&mut bodies, BodyDef::fixed());
        let left = spawn(&mut bodies, BodyDef::dynamic().position(Vec2::new(-2.0, 1.0)));
        let right = spawn(&mut bodies, BodyDef::dynamic().position(Vec2::new(2.0, 1.0)));
        touch(&mut contacts, &mut bodies, ground, left);
        touch(&mut contacts, &mut bodies, ground, right);

        let islands = build_islands(&mut bodies, &mut contacts, &mut joints);
        assert_eq!(islands.len(), 2);
        for island in &islands {
            assert_eq!(island.body_count(), 2);
            assert_eq!(island.contact_count(), 1);
            assert!(island.bodies().contains(&ground));
        }
    }

    #[test]
    fn dynamic_chain_forms_one_island_and_wakes_sleepers() {
        let mut bodies = Arena::new();
        let mut contacts = ContactManager::new();
        let mut joints = Arena::new();
        let a = spawn(&mut bodies, BodyDef::dynamic());
        let b = spawn(&mut bodies, BodyDef::dynamic().awake(false));
        let c = spawn(&mut bodies, BodyDef::dynamic().awake(false));
        touch(&mut contacts, &mut bodies, a, b);
        touch(&mut contacts, &mut bodies, b, c);

        let islands = build_islands(&mut bodies, &mut contacts, &mut joints);
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0].body_count(), 3);
        assert!(bodies.get(c).is_some_and(RigidBody::is_awake));
    }

    #[test]
    fn sleeping_islands_are_skipped() {
        let mut bodies = Arena::new();
        let mut contacts = ContactManager::new();
        let mut joints = Arena::new();
        let a = spawn(&mut bodies, BodyDef::dynamic().awake(false));
        let b = spawn(&mut bodies, BodyDef::dynamic().awake(false));
        touch(&mut contacts, &mut bodies, a, b);
        assert!(build_islands(&mut bodies, &mut contacts, &mut joints).is_empty());
    }

    #[test]
    fn resting_island_sleeps_atomically() {
        let config = SimulationConfig::default().with_gravity(Vec2::ZERO);
        let mut bodies = Arena::new();
        let mut contacts = ContactManager::new();
        let mut joints = Arena::new();
        let a = spawn(&mut bodies, BodyDef::dynamic());
        let b = spawn(&mut bodies, BodyDef::dynamic().position(Vec2::new(0.0, 1.0)));
        let contact = touch(&mut contacts, &mut bodies, a, b);
        if let Some(contact) = contacts.contacts.get_mut(contact) {
            contact.manifold.points_mut()[0].separation = 0.0;
        }

        let step = TimeStep::new(config.time_step, 1.0 / config.time_step, 8, 3, true);
        let mut events = Vec::new();
        let mut slept = false;
        for _ in 0..60 {
            let mut islands = build_islands(&mut bodies, &mut contacts, &mut joints);
            if islands.is_empty() {
                slept = true;
                break;
            }
            for island in &mut islands {
                island.solve(&step, &config);
                island.write_back(&mut bodies, &mut contacts, &mut joints, &config, &mut events);
            }
            let awake_a = bodies.get(a).is_some_and(RigidBody::is_awake);
            let awake_b = bodies.get(b).is_some_and(RigidBody::is_awake);
            assert_eq!(awake_a, awake_b);
        }
        assert!(slept);
    }

    #[test]
    fn body_that_refuses_sleep_keeps_island_awake() {
        let config = SimulationConfig::default().with_gravity(Vec2::ZERO);
        let mut bodies = Arena::new();
        let mut contacts = ContactManager::new();
        let mut joints = Arena::new();
        let a = spawn(&mut bodies, BodyDef::dynamic());
        let b = spawn(&mut bodies, BodyDef::dynamic().allow_sleep(false));
        let contact = touch(&mut contacts, &mut bodies, a, b);
        if let Some(contact) = contacts.contacts.get_mut(contact) {
            contact.manifold.points_mut()[0].separation = 0.0;
        }

        let step = TimeStep::new(config.time_step, 1.0 / config.time_step, 8, 3, true);
        let mut events = Vec::new();
        for _ in 0..60 {
            let mut islands = build_islands(&mut bodies, &mut contacts, &mut joints);
            assert_eq!(islands.len(), 1);
            for island in &mut islands {
                island.solve(&step, &config);
                assert!(!island.is_sleeping());
                island.write_back(&mut bodies, &mut contacts, &mut joints, &config, &mut events);
            }
        }
        assert!(bodies.get(a).is_some_and(RigidBody::is_awake));
    }
}
