#![allow(dead_code)]

use impulse2d::*;

pub const DT: f32 = 1.0 / 60.0;

pub fn run(world: &mut PhysicsWorld, steps: usize) {
    let config = *world.config();
    for _ in 0..steps {
        world
            .step(DT, config.velocity_iterations, config.position_iterations)
            .expect("step should succeed");
    }
}

/// Static box whose top face sits at `y = 0.5`.
pub fn ground(world: &mut PhysicsWorld) -> BodyHandle {
    let ground = world.create_body(&BodyDef::fixed()).expect("ground body");
    world
        .create_collider(ground, ColliderBuilder::cuboid(20.0, 0.5).expect("ground shape"))
        .expect("ground collider");
    ground
}

pub fn circle(world: &mut PhysicsWorld, def: BodyDef, radius: f32) -> BodyHandle {
    let body = world.create_body(&def).expect("circle body");
    world
        .create_collider(body, ColliderBuilder::circle(radius).expect("circle shape"))
        .expect("circle collider");
    body
}

pub fn boxed(world: &mut PhysicsWorld, def: BodyDef, half_width: f32, half_height: f32) -> BodyHandle {
    let body = world.create_body(&def).expect("box body");
    world
        .create_collider(
            body,
            ColliderBuilder::cuboid(half_width, half_height)
                .expect("box shape")
                .friction(0.6),
        )
        .expect("box collider");
    body
}

pub fn position(world: &PhysicsWorld, body: BodyHandle) -> Vec2 {
    world.body(body).expect("body should exist").position()
}
