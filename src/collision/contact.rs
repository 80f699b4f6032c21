//! Persistent contacts between collider pairs and the manager that keeps them in sync.

use std::collections::BTreeMap;

use glam::Vec2;

use super::CollisionBackend;
use crate::{
    config::{SimulationConfig, MAX_MANIFOLD_POINTS},
    core::{
        collider::Collider,
        rigidbody::{BodyType, RigidBody},
        types::MaterialPairProperties,
    },
    events::{ContactFilter, WorldEvent},
    utils::allocator::{Arena, BodyHandle, ColliderHandle, ContactHandle},
};

/// One contact point between two shapes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManifoldPoint {
    /// World position, midway between the two surfaces.
    pub position: Vec2,
    /// Unit normal pointing from shape A toward shape B.
    pub normal: Vec2,
    /// Signed gap along the normal; negative when penetrating.
    pub separation: f32,
    /// Feature identifier used to match points across steps.
    pub id: u32,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
}

impl ManifoldPoint {
    pub fn new(position: Vec2, normal: Vec2, separation: f32, id: u32) -> Self {
        Self {
            position,
            normal,
            separation,
            id,
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
        }
    }
}

/// Fixed-capacity set of contact points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Manifold {
    points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    point_count: usize,
}

impl Manifold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }

    pub fn len(&self) -> usize {
        self.point_count
    }

    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }

    pub fn clear(&mut self) {
        self.point_count = 0;
    }

    /// Adds a point; once full, a deeper point replaces the shallowest one.
    pub fn push(&mut self, point: ManifoldPoint) {
        if self.point_count < MAX_MANIFOLD_POINTS {
            self.points[self.point_count] = point;
            self.point_count += 1;
            return;
        }

        if let Some(shallowest) = self
            .points
            .iter_mut()
            .max_by(|a, b| a.separation.total_cmp(&b.separation))
        {
            if point.separation < shallowest.separation {
                *shallowest = point;
            }
        }
    }

    /// Keeps at most `max_points`, dropping the least penetrating first.
    pub fn truncate_deepest(&mut self, max_points: usize) {
        let max_points = max_points.min(MAX_MANIFOLD_POINTS);
        if self.point_count <= max_points {
            return;
        }
        self.points[..self.point_count].sort_by(|a, b| a.separation.total_cmp(&b.separation));
        self.point_count = max_points;
    }

    /// Carries accumulated impulses over from `previous` for points with matching ids.
    pub fn merge_impulses(&mut self, previous: &Manifold) {
        for point in self.points_mut() {
            point.normal_impulse = 0.0;
            point.tangent_impulse = 0.0;
            if let Some(old) = previous.points().iter().find(|old| old.id == point.id) {
                point.normal_impulse = old.normal_impulse;
                point.tangent_impulse = old.tangent_impulse;
            }
        }
    }

    pub fn deepest_separation(&self) -> Option<f32> {
        self.points()
            .iter()
            .map(|point| point.separation)
            .min_by(f32::total_cmp)
    }
}

/// Order-independent identity of a collider pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactKey {
    pub collider_a: ColliderHandle,
    pub collider_b: ColliderHandle,
}

impl ContactKey {
    pub fn new(a: ColliderHandle, b: ColliderHandle) -> Self {
        if a <= b {
            Self {
                collider_a: a,
                collider_b: b,
            }
        } else {
            Self {
                collider_a: b,
                collider_b: a,
            }
        }
    }
}

/// Persistent contact between two colliders whose bounds overlap.
#[derive(Debug, Clone)]
pub struct Contact {
    pub(crate) handle: ContactHandle,
    pub(crate) collider_a: ColliderHandle,
    pub(crate) collider_b: ColliderHandle,
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) manifold: Manifold,
    pub(crate) material: MaterialPairProperties,
    pub(crate) touching: bool,
    pub(crate) is_sensor: bool,
    pub(crate) island_flag: bool,
    pub(crate) toi_count: u32,
    pub(crate) cached_toi: Option<f32>,
}

impl Contact {
    pub fn handle(&self) -> ContactHandle {
        self.handle
    }

    pub fn colliders(&self) -> (ColliderHandle, ColliderHandle) {
        (self.collider_a, self.collider_b)
    }

    pub fn bodies(&self) -> (BodyHandle, BodyHandle) {
        (self.body_a, self.body_b)
    }

    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    pub fn is_touching(&self) -> bool {
        self.touching
    }

    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    pub fn friction(&self) -> f32 {
        self.material.friction
    }

    pub fn restitution(&self) -> f32 {
        self.material.restitution
    }

    /// Whether the contact takes part in island building and solving.
    pub(crate) fn is_solvable(&self) -> bool {
        self.touching && !self.is_sensor
    }

    pub(crate) fn other_body(&self, body: BodyHandle) -> BodyHandle {
        if self.body_a == body {
            self.body_b
        } else {
            self.body_a
        }
    }

    /// Recomputes the manifold and touching state; returns the previous touching state.
    #[allow(clippy::too_many_arguments)]
    fn update(
        &mut self,
        collider_a: &Collider,
        collider_b: &Collider,
        body_a: &RigidBody,
        body_b: &RigidBody,
        backend: &dyn CollisionBackend,
        filter: Option<&dyn ContactFilter>,
        max_points: usize,
    ) -> bool {
        let was_touching = self.touching;
        let previous = self.manifold;

        let mut manifold = backend.compute_manifold(
            collider_a.shape(),
            body_a.transform(),
            collider_b.shape(),
            body_b.transform(),
        );

        if filter.is_some_and(|filter| !filter.should_collide(collider_a, collider_b)) {
            manifold.clear();
        }

        if self.is_sensor {
            self.touching = manifold
                .deepest_separation()
                .is_some_and(|separation| separation <= 0.0);
            self.manifold.clear();
        } else {
            manifold.truncate_deepest(max_points);
            manifold.merge_impulses(&previous);
            self.touching = !manifold.is_empty();
            self.manifold = manifold;
        }

        was_touching
    }
}

/// Owns every live contact and keeps body edge lists pointing at them.
#[derive(Debug, Default, Clone)]
pub struct ContactManager {
    pub(crate) contacts: Arena<ContactHandle, Contact>,
    lookup: BTreeMap<ContactKey, ContactHandle>,
}

impl ContactManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn get(&self, handle: ContactHandle) -> Option<&Contact> {
        self.contacts.get(handle)
    }

    pub fn find(&self, a: ColliderHandle, b: ColliderHandle) -> Option<ContactHandle> {
        self.lookup.get(&ContactKey::new(a, b)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContactHandle, &Contact)> + '_ {
        self.contacts.iter()
    }

    /// Creates contacts for new candidate pairs. `jointed` reports body pairs whose
    /// joints forbid collision.
    pub(crate) fn add_pairs(
        &mut self,
        pairs: &[(ColliderHandle, ColliderHandle)],
        bodies: &mut Arena<BodyHandle, RigidBody>,
        colliders: &Arena<ColliderHandle, Collider>,
        jointed: &dyn Fn(BodyHandle, BodyHandle) -> bool,
    ) {
        for &(a, b) in pairs {
            let key = ContactKey::new(a, b);
            if self.lookup.contains_key(&key) {
                continue;
            }
            let (Some(collider_a), Some(collider_b)) =
                (colliders.get(key.collider_a), colliders.get(key.collider_b))
            else {
                continue;
            };
            if !should_collide(collider_a, collider_b, bodies, jointed) {
                continue;
            }

            let body_a = collider_a.body();
            let body_b = collider_b.body();
            let handle = self.contacts.insert_with(|handle| Contact {
                handle,
                collider_a: key.collider_a,
                collider_b: key.collider_b,
                body_a,
                body_b,
                manifold: Manifold::new(),
                material: MaterialPairProperties::from_materials(
                    &collider_a.material,
                    &collider_b.material,
                ),
                touching: false,
                is_sensor: collider_a.is_sensor || collider_b.is_sensor,
                island_flag: false,
                toi_count: 0,
                cached_toi: None,
            });
            self.lookup.insert(key, handle);

            if let Some(body) = bodies.get_mut(body_a) {
                body.contacts.push(handle);
            }
            if let Some(body) = bodies.get_mut(body_b) {
                body.contacts.push(handle);
            }
        }
    }

    /// Narrow-phase update of every contact, destroying pairs whose bounds separated.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn collide(
        &mut self,
        bodies: &mut Arena<BodyHandle, RigidBody>,
        colliders: &Arena<ColliderHandle, Collider>,
        backend: &dyn CollisionBackend,
        filter: Option<&dyn ContactFilter>,
        jointed: &dyn Fn(BodyHandle, BodyHandle) -> bool,
        config: &SimulationConfig,
        events: &mut Vec<WorldEvent>,
    ) {
        let handles: Vec<ContactHandle> = self.contacts.handles().collect();
        for handle in handles {
            let Some((collider_a, collider_b, body_a, body_b)) = self
                .contacts
                .get(handle)
                .map(|c| (c.collider_a, c.collider_b, c.body_a, c.body_b))
            else {
                continue;
            };
            let (Some(collider_a), Some(collider_b)) = (colliders.get(collider_a), colliders.get(collider_b))
            else {
                self.destroy(handle, bodies, events);
                continue;
            };

            if !should_collide(collider_a, collider_b, bodies, jointed) {
                self.destroy(handle, bodies, events);
                continue;
            }

            let (Some(body_a), Some(body_b)) = (bodies.get(body_a), bodies.get(body_b)) else {
                self.destroy(handle, bodies, events);
                continue;
            };

            let active_a = body_a.is_awake() && !body_a.is_static();
            let active_b = body_b.is_awake() && !body_b.is_static();
            if !active_a && !active_b {
                continue;
            }

            if !collider_a.aabb().overlaps(&collider_b.aabb()) {
                self.destroy(handle, bodies, events);
                continue;
            }

            self.refresh(handle, bodies, colliders, backend, filter, config, events);
        }
    }

    /// Re-runs the narrow phase for one contact at the bodies' current transforms,
    /// waking both bodies and emitting begin/end events on a touching change.
    /// Returns whether the contact touches afterwards.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn refresh(
        &mut self,
        handle: ContactHandle,
        bodies: &mut Arena<BodyHandle, RigidBody>,
        colliders: &Arena<ColliderHandle, Collider>,
        backend: &dyn CollisionBackend,
        filter: Option<&dyn ContactFilter>,
        config: &SimulationConfig,
        events: &mut Vec<WorldEvent>,
    ) -> bool {
        let Some(contact) = self.contacts.get_mut(handle) else {
            return false;
        };
        let (Some(collider_a), Some(collider_b)) = (colliders.get(contact.collider_a), colliders.get(contact.collider_b))
        else {
            return false;
        };
        let (Some(body_a), Some(body_b)) = (bodies.get(contact.body_a), bodies.get(contact.body_b)) else {
            return false;
        };

        let was_touching = contact.update(
            collider_a,
            collider_b,
            body_a,
            body_b,
            backend,
            filter,
            config.max_contact_points,
        );
        let touching = contact.touching;

        if touching != was_touching {
            for body in [contact.body_a, contact.body_b] {
                if let Some(body) = bodies.get_mut(body) {
                    body.set_awake(true);
                }
            }
        }

        let (collider_a, collider_b) = (contact.collider_a, contact.collider_b);
        if touching && !was_touching {
            events.push(WorldEvent::ContactBegin {
                contact: handle,
                collider_a,
                collider_b,
            });
        } else if was_touching && !touching {
            events.push(WorldEvent::ContactEnd {
                contact: handle,
                collider_a,
                collider_b,
            });
        }

        if touching && config.solve_events && !contact.is_sensor {
            events.push(WorldEvent::PreSolve {
                contact: handle,
                manifold: contact.manifold,
            });
        }
        touching
    }

    /// Removes a contact, unlinking it from both bodies and ending it if it was touching.
    pub(crate) fn destroy(
        &mut self,
        handle: ContactHandle,
        bodies: &mut Arena<BodyHandle, RigidBody>,
        events: &mut Vec<WorldEvent>,
    ) {
        let Some(contact) = self.contacts.remove(handle) else {
            return;
        };
        self.lookup
            .remove(&ContactKey::new(contact.collider_a, contact.collider_b));

        if contact.touching {
            events.push(WorldEvent::ContactEnd {
                contact: handle,
                collider_a: contact.collider_a,
                collider_b: contact.collider_b,
            });
        }

        for body in [contact.body_a, contact.body_b] {
            if let Some(body) = bodies.get_mut(body) {
                body.contacts.retain(|edge| *edge != handle);
            }
        }
    }
}

/// Pair-level collision gate checked at creation and on every update.
fn should_collide(
    collider_a: &Collider,
    collider_b: &Collider,
    bodies: &Arena<BodyHandle, RigidBody>,
    jointed: &dyn Fn(BodyHandle, BodyHandle) -> bool,
) -> bool {
    if collider_a.body() == collider_b.body() {
        return false;
    }
    if !collider_a.collision_filter.allows(&collider_b.collision_filter) {
        return false;
    }
    let (Some(body_a), Some(body_b)) = (bodies.get(collider_a.body()), bodies.get(collider_b.body()))
    else {
        return false;
    };
    if !body_a.is_enabled() || !body_b.is_enabled() {
        return false;
    }
    if body_a.body_type() != BodyType::Dynamic && body_b.body_type() != BodyType::Dynamic {
        return false;
    }
    !jointed(collider_a.body(), collider_b.body())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(separation: f32, id: u32) -> ManifoldPoint {
        ManifoldPoint::new(Vec2::ZERO, Vec2::Y, separation, id)
    }

    #[test]
    fn truncation_keeps_deepest_points() {
        let mut manifold = Manifold::new();
        manifold.push(point(-0.01, 1));
        manifold.push(point(-0.30, 2));
        manifold.push(point(0.01, 3));
        manifold.push(point(-0.20, 4));
        manifold.truncate_deepest(2);
        let ids: Vec<u32> = manifold.points().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn full_manifold_replaces_shallowest() {
        let mut manifold = Manifold::new();
        for id in 0..MAX_MANIFOLD_POINTS as u32 {
            manifold.push(point(-0.1, id));
        }
        manifold.push(point(0.5, 99));
        assert!(manifold.points().iter().all(|p| p.id != 99));
        manifold.push(point(-0.5, 42));
        assert!(manifold.points().iter().any(|p| p.id == 42));
        assert_eq!(manifold.len(), MAX_MANIFOLD_POINTS);
    }

    #[test]
    fn impulses_follow_point_ids_not_slots() {
        let mut old = Manifold::new();
        let mut a = point(-0.1, 7);
        a.normal_impulse = 3.0;
        a.tangent_impulse = -1.0;
        let mut b = point(-0.1, 9);
        b.normal_impulse = 5.0;
        old.push(a);
        old.push(b);

        let mut fresh = Manifold::new();
        fresh.push(point(-0.05, 9));
        fresh.push(point(-0.05, 11));
        fresh.merge_impulses(&old);

        assert_eq!(fresh.points()[0].normal_impulse, 5.0);
        assert_eq!(fresh.points()[1].normal_impulse, 0.0);
    }

    #[test]
    fn contact_keys_are_order_independent() {
        let a = ColliderHandle::new(3, 0);
        let b = ColliderHandle::new(1, 2);
        assert_eq!(ContactKey::new(a, b), ContactKey::new(b, a));
        assert_eq!(ContactKey::new(a, b).collider_a, b);
    }
}
