use std::{collections::HashSet, time::Instant};

use glam::Vec2;
use log::{debug, trace};

use crate::{
    collision::{
        contact::{Contact, ContactManager},
        queries::{Ray, RayHit},
        enabled_proxies,
        shapes::Aabb,
        CollisionBackend, DefaultBackend,
    },
    config::SimulationConfig,
    core::{
        collider::{Collider, ColliderBuilder},
        rigidbody::{BodyDef, BodyType, MotionState, RigidBody},
        types::{MassData, Material},
    },
    dynamics::{
        forces::ForceRegistry,
        island::build_islands,
        joints::{Joint, JointDef},
        solver::{solve_islands, SolverStepMetrics, TimeStep},
        toi::ToiSolver,
    },
    error::{PhysicsError, PhysicsResult},
    events::{ContactFilter, WorldEvent},
    utils::{
        allocator::{Arena, BodyHandle, ColliderHandle, ContactHandle, JointHandle},
        profiling::{StepPhase, StepProfile},
    },
};

/// Central simulation container owning bodies, colliders, joints and contacts.
///
/// Structural changes are rejected with [`PhysicsError::WorldLocked`] while a
/// step is running. Events produced by steps and destroy calls queue up until
/// [`PhysicsWorld::drain_events`].
pub struct PhysicsWorld {
    config: SimulationConfig,
    bodies: Arena<BodyHandle, RigidBody>,
    colliders: Arena<ColliderHandle, Collider>,
    joints: Arena<JointHandle, Joint>,
    contacts: ContactManager,
    backend: Box<dyn CollisionBackend>,
    filter: Option<Box<dyn ContactFilter>>,
    forces: ForceRegistry,
    events: Vec<WorldEvent>,
    profile: StepProfile,
    metrics: SolverStepMetrics,
    frame_budget_ms: Option<f32>,
    inv_dt0: f32,
    locked: bool,
    /// Colliders moved or changed since bounds were last committed to the backend.
    proxies_dirty: bool,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("bodies", &self.bodies.len())
            .field("colliders", &self.colliders.len())
            .field("joints", &self.joints.len())
            .field("contacts", &self.contacts.len())
            .field("locked", &self.locked)
            .finish()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let config = SimulationConfig::default();
        Self::build(config)
    }

    pub fn with_config(config: SimulationConfig) -> PhysicsResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SimulationConfig) -> Self {
        Self {
            backend: Box::new(DefaultBackend::new(&config)),
            config,
            bodies: Arena::new(),
            colliders: Arena::new(),
            joints: Arena::new(),
            contacts: ContactManager::new(),
            filter: None,
            forces: ForceRegistry::new(),
            events: Vec::new(),
            profile: StepProfile::default(),
            metrics: SolverStepMetrics::default(),
            frame_budget_ms: None,
            inv_dt0: 0.0,
            locked: false,
            proxies_dirty: false,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replaces the tuning parameters. The collision backend keeps its own settings.
    pub fn set_config(&mut self, config: SimulationConfig) -> PhysicsResult<()> {
        self.ensure_unlocked()?;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn gravity(&self) -> Vec2 {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) -> PhysicsResult<()> {
        if !gravity.is_finite() {
            return Err(PhysicsError::InvalidConfig {
                name: "gravity",
                value: f32::NAN,
            });
        }
        self.config.gravity = gravity;
        Ok(())
    }

    pub fn set_backend<B>(&mut self, backend: B) -> PhysicsResult<()>
    where
        B: CollisionBackend + 'static,
    {
        self.ensure_unlocked()?;
        self.backend = Box::new(backend);
        self.proxies_dirty = true;
        Ok(())
    }

    /// Installs a veto consulted for every candidate contact on every step.
    pub fn set_contact_filter<F>(&mut self, filter: F)
    where
        F: ContactFilter + 'static,
    {
        self.filter = Some(Box::new(filter));
    }

    pub fn clear_contact_filter(&mut self) {
        self.filter = None;
    }

    /// Logs a warning whenever a step takes longer than `budget_ms`.
    pub fn set_frame_budget(&mut self, budget_ms: Option<f32>) {
        self.frame_budget_ms = budget_ms;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn ensure_unlocked(&self) -> PhysicsResult<()> {
        if self.locked {
            Err(PhysicsError::WorldLocked)
        } else {
            Ok(())
        }
    }

    // ----------------------------------------------------------------------
    // Bodies

    pub fn create_body(&mut self, def: &BodyDef) -> PhysicsResult<BodyHandle> {
        self.ensure_unlocked()?;
        def.validate()?;
        let handle = self.bodies.insert_with(|handle| RigidBody::from_def(handle, def));
        trace!("created body {handle:?}");
        Ok(handle)
    }

    /// Destroys a body together with its joints, contacts, colliders and targeted forces.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> PhysicsResult<()> {
        self.ensure_unlocked()?;
        let (joints, contacts, colliders) = self
            .bodies
            .get(handle)
            .map(|body| (body.joints.clone(), body.contacts.clone(), body.colliders.clone()))
            .ok_or(PhysicsError::InvalidBody(handle))?;

        for joint in joints {
            if self.remove_joint(joint) {
                self.events.push(WorldEvent::JointRemoved { joint });
            }
        }
        for contact in contacts {
            self.contacts.destroy(contact, &mut self.bodies, &mut self.events);
        }
        for collider in colliders {
            self.colliders.remove(collider);
        }
        self.forces.remove_body(handle);
        self.bodies.remove(handle);
        self.proxies_dirty = true;
        trace!("destroyed body {handle:?}");
        Ok(())
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    /// Mutable access for velocities, forces and flags. Teleport with
    /// [`PhysicsWorld::set_transform`] so bounds are refreshed.
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> + '_ {
        self.bodies.iter()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn set_transform(&mut self, handle: BodyHandle, position: Vec2, angle: f32) -> PhysicsResult<()> {
        self.ensure_unlocked()?;
        if !position.is_finite() || !angle.is_finite() {
            return Err(PhysicsError::InvalidConfig {
                name: "transform",
                value: angle,
            });
        }
        let body = self.bodies.get_mut(handle).ok_or(PhysicsError::InvalidBody(handle))?;
        body.set_transform(position, angle);
        let transform = *body.transform();
        for collider in &body.colliders {
            if let Some(collider) = self.colliders.get_mut(*collider) {
                collider.aabb = collider.compute_aabb(&transform, &transform, self.config.aabb_margin);
            }
        }
        self.proxies_dirty = true;
        Ok(())
    }

    /// Changes the motion type, recomputing mass and dropping the body's contacts.
    pub fn set_body_type(&mut self, handle: BodyHandle, body_type: BodyType) -> PhysicsResult<()> {
        self.ensure_unlocked()?;
        let body = self.bodies.get(handle).ok_or(PhysicsError::InvalidBody(handle))?;
        if body.body_type() == body_type {
            return Ok(());
        }

        let contacts = body.contacts.clone();
        for contact in contacts {
            self.contacts.destroy(contact, &mut self.bodies, &mut self.events);
        }

        let shapes = self.collider_mass_data(handle);
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_body_type(body_type);
            body.reset_mass_data(shapes);
            body.set_awake(true);
        }
        self.wake_joined(handle);
        self.proxies_dirty = true;
        Ok(())
    }

    /// Disabled bodies keep their colliders and joints but take no part in the step.
    pub fn set_body_enabled(&mut self, handle: BodyHandle, enabled: bool) -> PhysicsResult<()> {
        self.ensure_unlocked()?;
        let body = self.bodies.get(handle).ok_or(PhysicsError::InvalidBody(handle))?;
        if body.is_enabled() == enabled {
            return Ok(());
        }

        if !enabled {
            let contacts = body.contacts.clone();
            for contact in contacts {
                self.contacts.destroy(contact, &mut self.bodies, &mut self.events);
            }
        }
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_enabled(enabled);
            if enabled {
                body.set_awake(true);
            }
        }
        self.proxies_dirty = true;
        Ok(())
    }

    fn wake_joined(&mut self, handle: BodyHandle) {
        let Some(joints) = self.bodies.get(handle).map(|body| body.joints.clone()) else {
            return;
        };
        for joint in joints {
            let Some((body_a, body_b)) = self.joints.get(joint).map(Joint::bodies) else {
                continue;
            };
            for other in body_a.into_iter().chain([body_b]) {
                if let Some(body) = self.bodies.get_mut(other) {
                    body.set_awake(true);
                }
            }
        }
    }

    // ----------------------------------------------------------------------
    // Colliders

    /// Attaches a collider and recomputes the body's mass from all of its colliders.
    pub fn create_collider(&mut self, body: BodyHandle, builder: ColliderBuilder) -> PhysicsResult<ColliderHandle> {
        self.ensure_unlocked()?;
        if !self.bodies.contains(body) {
            return Err(PhysicsError::InvalidBody(body));
        }
        validate_material(builder.material_ref())?;

        let margin = self.config.aabb_margin;
        let handle = self.colliders.insert_with(|handle| builder.build(handle, body));
        if let (Some(owner), Some(collider)) = (self.bodies.get_mut(body), self.colliders.get_mut(handle)) {
            let transform = *owner.transform();
            collider.aabb = collider.compute_aabb(&transform, &transform, margin);
            owner.colliders.push(handle);
        }
        self.reset_mass(body);
        self.proxies_dirty = true;
        trace!("created collider {handle:?} on body {body:?}");
        Ok(handle)
    }

    pub fn destroy_collider(&mut self, handle: ColliderHandle) -> PhysicsResult<()> {
        self.ensure_unlocked()?;
        let body = self
            .colliders
            .get(handle)
            .map(Collider::body)
            .ok_or(PhysicsError::InvalidCollider(handle))?;

        let doomed: Vec<ContactHandle> = self
            .bodies
            .get(body)
            .map(|owner| {
                owner
                    .contacts
                    .iter()
                    .copied()
                    .filter(|contact| {
                        self.contacts.get(*contact).is_some_and(|contact| {
                            let (a, b) = contact.colliders();
                            a == handle || b == handle
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        for contact in doomed {
            self.contacts.destroy(contact, &mut self.bodies, &mut self.events);
        }

        self.colliders.remove(handle);
        if let Some(owner) = self.bodies.get_mut(body) {
            owner.colliders.retain(|collider| *collider != handle);
        }
        self.reset_mass(body);
        self.proxies_dirty = true;
        Ok(())
    }

    /// Drops a `set_mass_data` override and recomputes mass from the body's colliders.
    pub fn clear_mass_override(&mut self, handle: BodyHandle) -> PhysicsResult<()> {
        self.ensure_unlocked()?;
        let shapes = self.collider_mass_data(handle);
        let body = self.bodies.get_mut(handle).ok_or(PhysicsError::InvalidBody(handle))?;
        body.clear_mass_override(shapes);
        Ok(())
    }

    fn reset_mass(&mut self, handle: BodyHandle) {
        let shapes = self.collider_mass_data(handle);
        if let Some(body) = self.bodies.get_mut(handle) {
            body.reset_mass_data(shapes);
        }
    }

    fn collider_mass_data(&self, handle: BodyHandle) -> Vec<MassData> {
        let Some(body) = self.bodies.get(handle) else {
            return Vec::new();
        };
        body.colliders
            .iter()
            .filter_map(|collider| self.colliders.get(*collider))
            .map(|collider| self.backend.mass_data(collider.shape(), collider.material.density))
            .collect()
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle)
    }

    /// Material, sensor and filter changes apply to contacts created afterwards.
    pub fn collider_mut(&mut self, handle: ColliderHandle) -> Option<&mut Collider> {
        self.colliders.get_mut(handle)
    }

    pub fn colliders(&self) -> impl Iterator<Item = (ColliderHandle, &Collider)> + '_ {
        self.colliders.iter()
    }

    // ----------------------------------------------------------------------
    // Joints

    /// Creates a joint and wakes its bodies.
    pub fn create_joint(&mut self, def: &JointDef) -> PhysicsResult<JointHandle> {
        self.ensure_unlocked()?;
        let state_b = self
            .bodies
            .get(def.body_b)
            .map(|body| body.motion)
            .ok_or(PhysicsError::InvalidBody(def.body_b))?;
        let state_a = match def.body_a {
            Some(body_a) if body_a == def.body_b => return Err(PhysicsError::SelfJoint(body_a)),
            Some(body_a) => self
                .bodies
                .get(body_a)
                .map(|body| body.motion)
                .ok_or(PhysicsError::InvalidBody(body_a))?,
            None => MotionState::GROUND,
        };

        let mut joint = Joint::new(
            JointHandle::new(usize::MAX, 0),
            def,
            &state_a,
            &state_b,
            &self.config,
        )?;
        let handle = self.joints.insert_with(move |handle| {
            joint.handle = handle;
            joint
        });

        for body in def.body_a.into_iter().chain([def.body_b]) {
            if let Some(body) = self.bodies.get_mut(body) {
                body.joints.push(handle);
                body.set_awake(true);
            }
        }

        if !def.collide_connected {
            if let Some(body_a) = def.body_a {
                self.destroy_contacts_between(body_a, def.body_b);
            }
        }
        debug!("created joint {handle:?}");
        Ok(handle)
    }

    /// Destroys a joint and wakes the bodies it connected.
    pub fn destroy_joint(&mut self, handle: JointHandle) -> PhysicsResult<()> {
        self.ensure_unlocked()?;
        if self.remove_joint(handle) {
            Ok(())
        } else {
            Err(PhysicsError::InvalidJoint(handle))
        }
    }

    fn remove_joint(&mut self, handle: JointHandle) -> bool {
        let Some(joint) = self.joints.remove(handle) else {
            return false;
        };
        let (body_a, body_b) = joint.bodies();
        for body in body_a.into_iter().chain([body_b]) {
            if let Some(body) = self.bodies.get_mut(body) {
                body.joints.retain(|edge| *edge != handle);
                body.set_awake(true);
            }
        }
        true
    }

    fn destroy_contacts_between(&mut self, body_a: BodyHandle, body_b: BodyHandle) {
        let doomed: Vec<ContactHandle> = self
            .bodies
            .get(body_a)
            .map(|body| {
                body.contacts
                    .iter()
                    .copied()
                    .filter(|contact| {
                        self.contacts
                            .get(*contact)
                            .is_some_and(|contact| contact.other_body(body_a) == body_b)
                    })
                    .collect()
            })
            .unwrap_or_default();
        for contact in doomed {
            self.contacts.destroy(contact, &mut self.bodies, &mut self.events);
        }
    }

    pub fn joint(&self, handle: JointHandle) -> Option<&Joint> {
        self.joints.get(handle)
    }

    pub fn joint_mut(&mut self, handle: JointHandle) -> Option<&mut Joint> {
        self.joints.get_mut(handle)
    }

    pub fn joints(&self) -> impl Iterator<Item = (JointHandle, &Joint)> + '_ {
        self.joints.iter()
    }

    // ----------------------------------------------------------------------
    // Contacts, forces, events

    pub fn contacts(&self) -> &ContactManager {
        &self.contacts
    }

    pub fn contact(&self, handle: ContactHandle) -> Option<&Contact> {
        self.contacts.get(handle)
    }

    pub fn forces(&self) -> &ForceRegistry {
        &self.forces
    }

    pub fn forces_mut(&mut self) -> &mut ForceRegistry {
        &mut self.forces
    }

    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Timings and population counts of the last step.
    pub fn profile(&self) -> &StepProfile {
        &self.profile
    }

    /// Solver counters of the last step, TOI sub-steps included.
    pub fn metrics(&self) -> &SolverStepMetrics {
        &self.metrics
    }

    // ----------------------------------------------------------------------
    // Queries

    /// Colliders whose current bounds overlap `aabb`, in handle order.
    pub fn query_aabb(&self, aabb: &Aabb) -> Vec<ColliderHandle> {
        let mut hits: Vec<ColliderHandle> = if self.proxies_dirty {
            self.colliders
                .iter()
                .filter(|(_, collider)| collider.aabb().overlaps(aabb))
                .map(|(handle, _)| handle)
                .collect()
        } else {
            self.backend
                .query_aabb(aabb)
                .into_iter()
                .filter(|handle| self.colliders.get(*handle).is_some_and(|c| c.aabb().overlaps(aabb)))
                .collect()
        };
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    /// Every collider the ray enters within `max_distance`, nearest first.
    ///
    /// A non-finite or negative `max_distance` is rejected with [`PhysicsError::InvalidConfig`].
    pub fn ray_cast(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> PhysicsResult<Vec<RayHit>> {
        let ray = Ray::new(origin, direction, max_distance)?;
        let mut hits: Vec<RayHit> = self
            .query_aabb(&ray.aabb())
            .into_iter()
            .filter_map(|handle| {
                let collider = self.colliders.get(handle)?;
                let body = self.bodies.get(collider.body())?;
                if !body.is_enabled() {
                    return None;
                }
                let (distance, normal) = self.backend.ray_cast(&ray, collider.shape(), body.transform())?;
                Some(RayHit {
                    collider: handle,
                    body: collider.body(),
                    point: ray.point_at(distance),
                    normal,
                    distance,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(hits)
    }

    // ----------------------------------------------------------------------
    // Stepping

    /// Advances the simulation by `dt` seconds.
    ///
    /// A zero `dt` still updates contacts but integrates nothing.
    pub fn step(&mut self, dt: f32, velocity_iterations: u32, position_iterations: u32) -> PhysicsResult<()> {
        self.ensure_unlocked()?;
        if !(dt >= 0.0 && dt.is_finite()) {
            return Err(PhysicsError::InvalidConfig { name: "dt", value: dt });
        }

        let started = Instant::now();
        let mut profile = StepProfile::default();
        self.locked = true;
        self.metrics = SolverStepMetrics::default();

        self.forces.apply_all(&mut self.bodies, dt);

        {
            let _phase = profile.time(StepPhase::BroadPhase);
            self.synchronize(false);
        }

        {
            let _phase = profile.time(StepPhase::Collide);
            let jointed = self.jointed_pairs();
            let jointed = |a: BodyHandle, b: BodyHandle| jointed.contains(&ordered(a, b));
            self.contacts.collide(
                &mut self.bodies,
                &self.colliders,
                self.backend.as_ref(),
                self.filter.as_deref(),
                &jointed,
                &self.config,
                &mut self.events,
            );
        }

        if dt > 0.0 {
            let step = TimeStep::new(
                dt,
                self.inv_dt0,
                velocity_iterations,
                position_iterations,
                self.config.warm_starting,
            );

            let island_count = {
                let _phase = profile.time(StepPhase::Solve);
                let mut islands = build_islands(&mut self.bodies, &mut self.contacts, &mut self.joints);
                solve_islands(&mut islands, &step, &self.config);
                for island in &mut islands {
                    island.write_back(
                        &mut self.bodies,
                        &mut self.contacts,
                        &mut self.joints,
                        &self.config,
                        &mut self.events,
                    );
                    self.metrics.merge(&island.metrics);
                }
                islands.len()
            };
            profile.island_count = island_count;

            {
                let _phase = profile.time(StepPhase::BroadPhase);
                self.synchronize(true);
            }

            if self.config.continuous_physics {
                let _phase = profile.time(StepPhase::Toi);
                let jointed = self.jointed_pairs();
                let jointed = |a: BodyHandle, b: BodyHandle| jointed.contains(&ordered(a, b));
                let toi_metrics = ToiSolver {
                    bodies: &mut self.bodies,
                    colliders: &mut self.colliders,
                    contacts: &mut self.contacts,
                    backend: self.backend.as_mut(),
                    filter: self.filter.as_deref(),
                    jointed: &jointed,
                    config: &self.config,
                    events: &mut self.events,
                }
                .solve(dt);
                self.metrics.merge(&toi_metrics);
            }

            self.inv_dt0 = step.inv_dt;
        }

        for body in self.bodies.values_mut() {
            body.clear_forces();
        }
        self.locked = false;

        profile.body_count = self.bodies.len();
        profile.awake_body_count = self.bodies.values().filter(|body| body.is_awake()).count();
        profile.contact_count = self.contacts.len();
        profile.joint_count = self.joints.len();
        profile.toi_events = self.metrics.toi_events;
        profile.finish(started.elapsed(), self.frame_budget_ms);
        self.profile = profile;
        Ok(())
    }

    /// Recomputes collider bounds, commits them to the backend and creates
    /// contacts for new candidate pairs. Swept bounds cover the motion of the
    /// step just solved.
    fn synchronize(&mut self, swept: bool) {
        let margin = self.config.aabb_margin;
        for body in self.bodies.values() {
            let to = *body.transform();
            let from = if swept && body.is_awake() {
                body.motion.sweep.transform_at(0.0)
            } else {
                to
            };
            for handle in &body.colliders {
                if let Some(collider) = self.colliders.get_mut(*handle) {
                    collider.aabb = collider.compute_aabb(&from, &to, margin);
                }
            }
        }

        let proxies = enabled_proxies(&self.bodies, &self.colliders);
        self.backend.sync(&proxies);
        self.proxies_dirty = false;

        let pairs = self.backend.candidate_pairs();
        let jointed = self.jointed_pairs();
        let jointed = |a: BodyHandle, b: BodyHandle| jointed.contains(&ordered(a, b));
        self.contacts
            .add_pairs(&pairs, &mut self.bodies, &self.colliders, &jointed);
    }

    /// Body pairs whose enabled joints forbid them from colliding.
    fn jointed_pairs(&self) -> HashSet<(BodyHandle, BodyHandle)> {
        self.joints
            .values()
            .filter(|joint| joint.is_enabled() && !joint.collide_connected())
            .filter_map(|joint| match joint.bodies() {
                (Some(a), b) => Some(ordered(a, b)),
                (None, _) => None,
            })
            .collect()
    }
}

fn ordered(a: BodyHandle, b: BodyHandle) -> (BodyHandle, BodyHandle) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn validate_material(material: &Material) -> PhysicsResult<()> {
    for (name, value, ok) in [
        ("density", material.density, material.density >= 0.0),
        ("friction", material.friction, material.friction >= 0.0),
        (
            "restitution",
            material.restitution,
            (0.0..=1.0).contains(&material.restitution),
        ),
    ] {
        if !(ok && value.is_finite()) {
            return Err(PhysicsError::InvalidConfig { name, value });
        }
    }
    Ok(())
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PhysicsWorld>();
};
