mod common;

use common::*;
use impulse2d::*;
use std::sync::{Arc, Mutex};
use std::thread;

fn scene(parallel: bool) -> (PhysicsWorld, Vec<BodyHandle>) {
    let config = SimulationConfig::default().with_parallel_islands(parallel);
    let mut world = PhysicsWorld::with_config(config).expect("world");
    ground(&mut world);

    let mut bodies = Vec::new();
    for column in 0..6 {
        let x = -10.0 + column as f32 * 4.0;
        for level in 0..3 {
            let y = 1.0 + level as f32 * 1.05;
            bodies.push(boxed(&mut world, BodyDef::dynamic().position(Vec2::new(x, y)), 0.5, 0.5));
        }
        bodies.push(circle(
            &mut world,
            BodyDef::dynamic().position(Vec2::new(x + 0.2, 6.0)),
            0.3,
        ));
    }
    (world, bodies)
}

#[test]
fn test_physics_world_is_sync_and_send() {
    fn assert_sync_send<T: Sync + Send>() {}
    assert_sync_send::<PhysicsWorld>();
    assert_sync_send::<PhysicsEngine>();
}

#[test]
fn test_shared_physics_world_across_threads() {
    let world = Arc::new(Mutex::new(PhysicsWorld::new()));
    {
        let mut world = world.lock().expect("lock");
        circle(&mut world, BodyDef::dynamic().position(Vec2::new(0.0, 5.0)), 0.5);
    }

    let mut handles = vec![];
    for _ in 0..4 {
        let world_clone = Arc::clone(&world);
        let handle = thread::spawn(move || {
            let mut world = world_clone.lock().expect("lock");
            world.step(DT, 8, 3).expect("step");
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("thread");
    }
    let world = world.lock().expect("lock");
    let (_, body) = world.bodies().next().expect("body");
    assert!(body.position().y < 5.0);
}

#[test]
fn parallel_island_solve_matches_sequential() {
    let (mut sequential, bodies) = scene(false);
    let (mut parallel, parallel_bodies) = scene(true);
    assert_eq!(bodies, parallel_bodies);

    for _ in 0..120 {
        run(&mut sequential, 1);
        run(&mut parallel, 1);
        assert_eq!(sequential.profile().island_count, parallel.profile().island_count);
    }

    for handle in &bodies {
        let a = sequential.body(*handle).expect("sequential body");
        let b = parallel.body(*handle).expect("parallel body");
        assert_eq!(a.position(), b.position(), "positions diverged for {handle:?}");
        assert_eq!(a.angle(), b.angle());
        assert_eq!(a.linear_velocity(), b.linear_velocity());
        assert_eq!(a.is_awake(), b.is_awake());
    }
    assert_eq!(sequential.metrics(), parallel.metrics());
}
