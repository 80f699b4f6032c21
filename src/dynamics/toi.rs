//! Continuous collision: time-of-impact sub-stepping after the discrete solve.

use log::{trace, warn};

use super::{
    contact_solver::ContactConstraint,
    island::Island,
    solver::{SolverStepMetrics, TimeStep},
};
use crate::{
    collision::{
        ccd::{ToiInput, ToiState},
        contact::ContactManager,
        enabled_proxies, CollisionBackend,
    },
    config::SimulationConfig,
    core::{collider::Collider, rigidbody::RigidBody},
    events::{ContactFilter, WorldEvent},
    utils::allocator::{Arena, BodyHandle, ColliderHandle, ContactHandle},
};

/// Position iterations used to resolve the penetration at a time of impact.
const TOI_POSITION_ITERATIONS: u32 = 20;

/// Alpha at or above which an impact is considered to happen at the step end.
const TOI_ALPHA_LIMIT: f32 = 1.0 - 10.0 * f32::EPSILON;

/// Borrowed world state needed to run the TOI passes of one step.
pub(crate) struct ToiSolver<'a> {
    pub bodies: &'a mut Arena<BodyHandle, RigidBody>,
    pub colliders: &'a mut Arena<ColliderHandle, Collider>,
    pub contacts: &'a mut ContactManager,
    pub backend: &'a mut dyn CollisionBackend,
    pub filter: Option<&'a dyn ContactFilter>,
    pub jointed: &'a dyn Fn(BodyHandle, BodyHandle) -> bool,
    pub config: &'a SimulationConfig,
    pub events: &'a mut Vec<WorldEvent>,
}

impl ToiSolver<'_> {
    /// Repeatedly resolves the earliest impact in the step until none remains
    /// before the step end or a cap is hit.
    pub fn solve(&mut self, dt: f32) -> SolverStepMetrics {
        let mut metrics = SolverStepMetrics::default();
        self.reset();

        let mut passes = 0;
        loop {
            if passes >= self.config.max_toi_passes {
                warn!("TOI pass cap of {} reached; remaining impacts deferred", passes);
                break;
            }

            let Some((contact, alpha)) = self.find_min_contact() else {
                break;
            };
            if alpha >= TOI_ALPHA_LIMIT {
                break;
            }
            passes += 1;

            if let Some(sub_step) = self.resolve(contact, alpha, dt) {
                metrics.merge(&sub_step);
            }
        }

        metrics
    }

    fn reset(&mut self) {
        for body in self.bodies.values_mut() {
            body.island_flag = false;
            if body.is_awake() && !body.is_static() {
                body.motion.sweep.alpha0 = 0.0;
            } else {
                body.motion.sweep.settle();
            }
        }
        for contact in self.contacts.contacts.values_mut() {
            contact.island_flag = false;
            contact.toi_count = 0;
            contact.cached_toi = None;
        }
    }

    /// Earliest impact among eligible contacts, computing and caching missing TOIs.
    fn find_min_contact(&mut self) -> Option<(ContactHandle, f32)> {
        let mut best: Option<(ContactHandle, f32)> = None;

        for (handle, contact) in self.contacts.contacts.iter_mut() {
            if contact.is_sensor || contact.toi_count > self.config.max_sub_steps {
                continue;
            }

            let alpha = match contact.cached_toi {
                Some(alpha) => alpha,
                None => {
                    let (Some(collider_a), Some(collider_b)) =
                        (self.colliders.get(contact.collider_a), self.colliders.get(contact.collider_b))
                    else {
                        continue;
                    };
                    let Some((body_a, body_b)) = self.bodies.get2_mut(contact.body_a, contact.body_b) else {
                        continue;
                    };

                    let active_a = body_a.is_awake() && !body_a.is_static();
                    let active_b = body_b.is_awake() && !body_b.is_static();
                    if !active_a && !active_b {
                        continue;
                    }
                    // Dynamic pairs only get continuous treatment when one of them is a bullet.
                    let continuous_a = body_a.is_bullet() || !body_a.is_dynamic();
                    let continuous_b = body_b.is_bullet() || !body_b.is_dynamic();
                    if !continuous_a && !continuous_b {
                        continue;
                    }

                    let sweep_a = &mut body_a.motion.sweep;
                    let sweep_b = &mut body_b.motion.sweep;
                    let alpha0 = sweep_a.alpha0.max(sweep_b.alpha0);
                    if sweep_a.alpha0 < alpha0 {
                        sweep_a.advance(alpha0);
                    } else if sweep_b.alpha0 < alpha0 {
                        sweep_b.advance(alpha0);
                    }

                    let output = self.backend.time_of_impact(&ToiInput {
                        shape_a: collider_a.shape(),
                        sweep_a: *sweep_a,
                        shape_b: collider_b.shape(),
                        sweep_b: *sweep_b,
                        t_max: 1.0,
                    });
                    // An impact already resolved that does not advance past its
                    // sweep start would only be resolved again at the same alpha.
                    let stalled = contact.toi_count > 0 && output.t <= 0.0;
                    let alpha = if output.state == ToiState::Touching && !stalled {
                        (alpha0 + (1.0 - alpha0) * output.t).min(1.0)
                    } else {
                        1.0
                    };
                    contact.cached_toi = Some(alpha);
                    alpha
                }
            };

            if best.map_or(true, |(_, best)| alpha < best) {
                best = Some((handle, alpha));
            }
        }

        best
    }

    /// Moves the pair to the impact and solves a small island around it.
    /// Returns the sub-step metrics when a sub-step was actually taken.
    fn resolve(&mut self, handle: ContactHandle, alpha: f32, dt: f32) -> Option<SolverStepMetrics> {
        let (body_a, body_b) = self.contacts.get(handle)?.bodies();
        let (backup_a, backup_b) = self.bodies.get2_mut(body_a, body_b).map(|(a, b)| {
            let backups = (a.motion.sweep, b.motion.sweep);
            a.advance(alpha);
            b.advance(alpha);
            backups
        })?;

        let touching = self.refresh(handle);
        if let Some(contact) = self.contacts.contacts.get_mut(handle) {
            contact.cached_toi = None;
            contact.toi_count += 1;
        }

        if !touching {
            // Missed: put both bodies back on their sweeps and leave the
            // contact out of the remaining passes unless its bodies move.
            for (body, backup) in [(body_a, backup_a), (body_b, backup_b)] {
                if let Some(body) = self.bodies.get_mut(body) {
                    body.motion.sweep = backup;
                    body.synchronize_transform();
                }
            }
            if let Some(contact) = self.contacts.contacts.get_mut(handle) {
                contact.cached_toi = Some(1.0);
            }
            return None;
        }

        let mut island = Island::new();
        let mut island_contacts = vec![handle];
        for body in [body_a, body_b] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.set_awake(true);
                body.island_flag = true;
                body.island_index = island.push_body(body);
            }
        }
        if let Some(contact) = self.contacts.contacts.get_mut(handle) {
            contact.island_flag = true;
        }

        for body in [body_a, body_b] {
            self.gather_neighbors(body, alpha, &mut island, &mut island_contacts);
        }

        for handle in &island_contacts {
            if let Some(contact) = self.contacts.get(*handle) {
                let (a, b) = contact.bodies();
                let index_a = self.bodies.get(a).map_or(0, |body| body.island_index);
                let index_b = self.bodies.get(b).map_or(0, |body| body.island_index);
                island.contacts.push(ContactConstraint::new(contact, index_a, index_b));
            }
        }

        let sub_dt = (1.0 - alpha) * dt;
        let sub_step = TimeStep {
            dt: sub_dt,
            inv_dt: if sub_dt > 0.0 { 1.0 / sub_dt } else { 0.0 },
            dt_ratio: 1.0,
            velocity_iterations: self.config.velocity_iterations,
            position_iterations: TOI_POSITION_ITERATIONS,
            warm_starting: false,
        };
        trace!(
            "TOI at alpha {alpha:.4}: {} bodies, {} contacts",
            island.body_count(),
            island.contact_count()
        );
        island.solve_toi(&sub_step, 1, 2, self.config);
        island.write_bodies(self.bodies);

        self.finish_island(&island);
        Some(island.metrics)
    }

    /// Adds static, kinematic and bullet neighbors of `body` that touch it at `alpha`.
    fn gather_neighbors(
        &mut self,
        handle: BodyHandle,
        alpha: f32,
        island: &mut Island,
        island_contacts: &mut Vec<ContactHandle>,
    ) {
        let Some((is_dynamic, is_bullet, edges)) = self
            .bodies
            .get(handle)
            .map(|body| (body.is_dynamic(), body.is_bullet(), body.contacts.clone()))
        else {
            return;
        };
        if !is_dynamic {
            return;
        }

        for edge in edges {
            if island_contacts.len() >= self.config.max_toi_contacts {
                break;
            }
            let Some((skip, other)) = self
                .contacts
                .get(edge)
                .map(|contact| (contact.island_flag || contact.is_sensor, contact.other_body(handle)))
            else {
                continue;
            };
            if skip {
                continue;
            }

            let Some(other_body) = self.bodies.get_mut(other) else {
                continue;
            };
            if other_body.is_dynamic() && !is_bullet && !other_body.is_bullet() {
                continue;
            }

            let backup = other_body.motion.sweep;
            if !other_body.island_flag {
                other_body.advance(alpha);
            }

            if !self.refresh(edge) {
                if let Some(other_body) = self.bodies.get_mut(other) {
                    other_body.motion.sweep = backup;
                    other_body.synchronize_transform();
                }
                continue;
            }

            if let Some(contact) = self.contacts.contacts.get_mut(edge) {
                contact.island_flag = true;
            }
            island_contacts.push(edge);

            if let Some(other_body) = self.bodies.get_mut(other) {
                if other_body.island_flag {
                    continue;
                }
                other_body.island_flag = true;
                if !other_body.is_static() {
                    other_body.set_awake(true);
                }
                other_body.island_index = island.push_body(other_body);
            }
        }
    }

    fn refresh(&mut self, handle: ContactHandle) -> bool {
        self.contacts.refresh(
            handle,
            self.bodies,
            self.colliders,
            self.backend,
            self.filter,
            self.config,
            self.events,
        )
    }

    /// Clears island marks, invalidates cached TOIs around moved bodies and
    /// brings the broad phase up to date with their new bounds.
    fn finish_island(&mut self, island: &Island) {
        for handle in island.bodies() {
            let Some(body) = self.bodies.get_mut(*handle) else {
                continue;
            };
            body.island_flag = false;
            if !body.is_dynamic() {
                continue;
            }

            let from = body.motion.sweep.transform_at(0.0);
            let to = *body.transform();
            for collider in &body.colliders {
                if let Some(collider) = self.colliders.get_mut(*collider) {
                    collider.aabb = collider.compute_aabb(&from, &to, self.config.aabb_margin);
                }
            }
            for edge in &body.contacts {
                if let Some(contact) = self.contacts.contacts.get_mut(*edge) {
                    contact.island_flag = false;
                    contact.cached_toi = None;
                }
            }
        }

        let proxies = enabled_proxies(self.bodies, self.colliders);
        self.backend.sync(&proxies);
        let pairs = self.backend.candidate_pairs();
        self.contacts.add_pairs(&pairs, self.bodies, self.colliders, self.jointed);
    }
}
