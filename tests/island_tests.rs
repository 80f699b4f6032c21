mod common;

use common::*;
use impulse2d::*;

#[test]
fn separate_stacks_form_separate_islands() {
    let mut world = PhysicsWorld::new();
    ground(&mut world);
    boxed(&mut world, BodyDef::dynamic().position(Vec2::new(-4.0, 1.0)), 0.5, 0.5);
    boxed(&mut world, BodyDef::dynamic().position(Vec2::new(4.0, 1.0)), 0.5, 0.5);

    run(&mut world, 2);

    assert_eq!(world.profile().island_count, 2, "the static ground must not merge islands");
    assert_eq!(world.metrics().islands_solved, 2);
}

#[test]
fn joints_merge_islands() {
    let mut world = PhysicsWorld::with_config(SimulationConfig::default().with_gravity(Vec2::ZERO)).expect("world");
    let a = circle(&mut world, BodyDef::dynamic().position(Vec2::new(-3.0, 0.0)), 0.5);
    let b = circle(&mut world, BodyDef::dynamic().position(Vec2::new(3.0, 0.0)), 0.5);
    circle(&mut world, BodyDef::dynamic().position(Vec2::new(0.0, 5.0)), 0.5);
    world
        .create_joint(&JointDef::pin(a, b, Vec2::ZERO, Vec2::ZERO))
        .expect("pin");

    run(&mut world, 1);

    assert_eq!(world.profile().island_count, 2);
    assert_eq!(world.metrics().joints_solved, 1);
}

#[test]
fn resting_stack_sleeps_as_a_whole() {
    let mut world = PhysicsWorld::new();
    ground(&mut world);
    let bottom = boxed(&mut world, BodyDef::dynamic().position(Vec2::new(0.0, 1.0)), 0.5, 0.5);
    let top = boxed(&mut world, BodyDef::dynamic().position(Vec2::new(0.0, 2.0)), 0.5, 0.5);

    let mut asleep_at = None;
    for step in 0..600 {
        run(&mut world, 1);
        let bottom_awake = world.body(bottom).is_some_and(RigidBody::is_awake);
        let top_awake = world.body(top).is_some_and(RigidBody::is_awake);
        assert_eq!(bottom_awake, top_awake, "an island must sleep atomically (step {step})");
        if !bottom_awake {
            asleep_at = Some(step);
            break;
        }
    }
    let asleep_at = asleep_at.expect("the stack should fall asleep");
    let time_to_sleep = world.config().time_to_sleep;
    assert!(
        (asleep_at + 1) as f32 * DT >= time_to_sleep - 1e-4,
        "slept after only {} steps",
        asleep_at + 1
    );

    run(&mut world, 1);
    assert_eq!(world.profile().island_count, 0, "sleeping islands are not solved");
    assert_eq!(world.profile().awake_body_count, 0);
}

#[test]
fn impact_wakes_a_sleeping_stack() {
    let mut world = PhysicsWorld::new();
    ground(&mut world);
    let resting = boxed(&mut world, BodyDef::dynamic().position(Vec2::new(0.0, 1.0)), 0.5, 0.5);
    run(&mut world, 300);
    assert!(!world.body(resting).is_some_and(RigidBody::is_awake), "box should be asleep");

    circle(&mut world, BodyDef::dynamic().position(Vec2::new(0.0, 3.0)), 0.25);
    let mut woke = false;
    for _ in 0..90 {
        run(&mut world, 1);
        woke |= world.body(resting).is_some_and(RigidBody::is_awake);
    }
    assert!(woke, "the falling ball should wake the box it lands on");
}

#[test]
fn body_that_refuses_sleep_keeps_its_island_awake() {
    let mut world = PhysicsWorld::new();
    ground(&mut world);
    let sleepy = boxed(&mut world, BodyDef::dynamic().position(Vec2::new(0.0, 1.0)), 0.5, 0.5);
    let restless = boxed(
        &mut world,
        BodyDef::dynamic().position(Vec2::new(0.0, 2.0)).allow_sleep(false),
        0.5,
        0.5,
    );

    run(&mut world, 300);

    assert!(world.body(restless).is_some_and(RigidBody::is_awake));
    assert!(world.body(sleepy).is_some_and(RigidBody::is_awake));
}

#[test]
fn sleeping_can_be_disabled_globally() {
    let mut world = PhysicsWorld::with_config(SimulationConfig::default().with_sleeping(false)).expect("world");
    ground(&mut world);
    let body = boxed(&mut world, BodyDef::dynamic().position(Vec2::new(0.0, 1.0)), 0.5, 0.5);

    run(&mut world, 200);

    assert!(world.body(body).is_some_and(RigidBody::is_awake));
}

#[test]
fn applying_an_impulse_wakes_a_sleeper() {
    let mut world = PhysicsWorld::new();
    ground(&mut world);
    let body = boxed(&mut world, BodyDef::dynamic().position(Vec2::new(0.0, 1.0)), 0.5, 0.5);
    run(&mut world, 300);
    assert!(!world.body(body).is_some_and(RigidBody::is_awake));

    world
        .body_mut(body)
        .expect("body")
        .apply_linear_impulse_to_center(Vec2::new(0.0, 5.0));
    run(&mut world, 1);

    assert!(world.body(body).is_some_and(RigidBody::is_awake));
    assert!(position(&world, body).y > 1.0);
    assert_eq!(world.profile().island_count, 1);
}
