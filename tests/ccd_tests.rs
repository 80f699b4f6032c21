mod common;

use common::*;
use impulse2d::*;

/// Thin static wall centered on `x = 5`, 0.1 thick.
fn wall_world(continuous: bool) -> (PhysicsWorld, BodyHandle) {
    let config = SimulationConfig::default()
        .with_gravity(Vec2::ZERO)
        .with_continuous(continuous);
    let mut world = PhysicsWorld::with_config(config).expect("world");
    let wall = boxed(&mut world, BodyDef::fixed().position(Vec2::new(5.0, 0.0)), 0.05, 5.0);
    (world, wall)
}

fn fire(world: &mut PhysicsWorld, speed: f32, bullet: bool) -> BodyHandle {
    circle(
        world,
        BodyDef::dynamic()
            .linear_velocity(Vec2::new(speed, 0.0))
            .bullet(bullet),
        0.1,
    )
}

#[test]
fn fast_circle_tunnels_without_continuous_collision() {
    let (mut world, _) = wall_world(false);
    // 110 m/s covers 1.83 m per step and jumps clean over the wall.
    let projectile = fire(&mut world, 110.0, false);

    run(&mut world, 4);

    assert!(position(&world, projectile).x > 5.0, "expected the projectile to pass through");
}

#[test]
fn fast_circle_stops_at_thin_wall() {
    let (mut world, _) = wall_world(true);
    let projectile = fire(&mut world, 110.0, false);

    let mut events = Vec::new();
    for _ in 0..10 {
        run(&mut world, 1);
        let x = position(&world, projectile).x;
        assert!(x < 4.95, "projectile crossed the wall face, x = {x}");
        events.extend(world.drain_events());
    }

    assert!(
        events.iter().any(|event| matches!(event, WorldEvent::ContactBegin { .. })),
        "the impact should begin a contact"
    );
    let velocity = world.body(projectile).map(RigidBody::linear_velocity).unwrap_or_default();
    assert!(velocity.x <= 1e-3, "projectile still moving into the wall at {}", velocity.x);
}

#[test]
fn toi_sub_steps_are_counted() {
    let (mut world, _) = wall_world(true);
    fire(&mut world, 110.0, false);

    let mut toi_events = 0;
    for _ in 0..4 {
        run(&mut world, 1);
        toi_events += world.metrics().toi_events;
    }
    assert!(toi_events >= 1, "expected at least one time-of-impact sub-step");
}

#[test]
fn bullet_does_not_tunnel_through_thin_dynamic_plank() {
    let config = SimulationConfig::default().with_gravity(Vec2::ZERO);
    let mut world = PhysicsWorld::with_config(config).expect("world");
    let plank = boxed(&mut world, BodyDef::dynamic().position(Vec2::new(5.0, 0.0)), 0.05, 2.0);
    let projectile = fire(&mut world, 110.0, true);

    run(&mut world, 4);

    let plank_x = position(&world, plank).x;
    let projectile_x = position(&world, projectile).x;
    assert!(
        projectile_x < plank_x,
        "bullet at {projectile_x} ended up beyond the plank at {plank_x}"
    );
    assert!(
        world.body(plank).map(RigidBody::linear_velocity).unwrap_or_default().x > 0.0,
        "the plank should be pushed by the bullet"
    );
}

#[test]
fn non_bullet_dynamic_pairs_skip_continuous_collision() {
    let config = SimulationConfig::default().with_gravity(Vec2::ZERO);
    let mut world = PhysicsWorld::with_config(config).expect("world");
    boxed(&mut world, BodyDef::dynamic().position(Vec2::new(5.0, 0.0)), 0.05, 2.0);
    let projectile = fire(&mut world, 110.0, false);

    run(&mut world, 4);

    assert_eq!(world.metrics().toi_events, 0);
    assert!(position(&world, projectile).x > 5.0, "dynamic pairs only get TOI with a bullet");
}

#[test]
fn many_simultaneous_impacts_are_each_resolved_once() {
    let config = SimulationConfig::default()
        .with_gravity(Vec2::ZERO)
        .with_continuous(true);
    let mut world = PhysicsWorld::with_config(config).expect("world");

    let lanes = 12;
    let mut projectiles = Vec::new();
    for lane in 0..lanes {
        let y = lane as f32 * 3.0;
        boxed(&mut world, BodyDef::fixed().position(Vec2::new(5.0, y)), 0.05, 1.0);
        projectiles.push(circle(
            &mut world,
            BodyDef::dynamic()
                .position(Vec2::new(0.0, y))
                .linear_velocity(Vec2::new(110.0, 0.0)),
            0.1,
        ));
    }

    let mut toi_events = 0;
    for _ in 0..4 {
        run(&mut world, 1);
        toi_events += world.metrics().toi_events;
    }

    for (lane, projectile) in projectiles.iter().enumerate() {
        let x = position(&world, *projectile).x;
        assert!(x < 4.95, "projectile in lane {lane} crossed its wall, x = {x}");
    }
    assert!(toi_events >= lanes, "every lane needs its own impact, got {toi_events}");
    assert!(
        toi_events < 2 * lanes,
        "impacts should not be resolved repeatedly, got {toi_events} for {lanes} lanes"
    );
}

#[test]
fn disabled_bodies_stay_out_of_the_broad_phase_after_an_impact() {
    let (mut world, _) = wall_world(true);
    let parked = circle(&mut world, BodyDef::dynamic().position(Vec2::new(-20.0, 0.0)), 0.5);
    world.set_body_enabled(parked, false).expect("disable");
    fire(&mut world, 110.0, false);

    let mut toi_events = 0;
    for _ in 0..4 {
        run(&mut world, 1);
        toi_events += world.metrics().toi_events;
    }
    assert!(toi_events >= 1, "the projectile should have been sub-stepped");

    let around_parked = Aabb::from_center_half_extents(Vec2::new(-20.0, 0.0), Vec2::splat(1.0));
    assert!(world.query_aabb(&around_parked).is_empty());
    assert!(world.contacts().iter().all(|(_, contact)| {
        let (a, b) = contact.bodies();
        a != parked && b != parked
    }));
}
