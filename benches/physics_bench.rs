use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use impulse2d::{collision::NarrowPhase, *};
use std::hint::black_box;

const DT: f32 = 1.0 / 60.0;

fn prepare_pyramid(base: usize, parallel: bool) -> PhysicsWorld {
    let config = SimulationConfig::default().with_parallel_islands(parallel);
    let mut world = PhysicsWorld::with_config(config).expect("world");
    let ground = world.create_body(&BodyDef::fixed()).expect("ground");
    world
        .create_collider(ground, ColliderBuilder::cuboid(100.0, 0.5).expect("shape"))
        .expect("collider");

    for row in 0..base {
        let count = base - row;
        let y = 1.0 + row as f32 * 1.0;
        for column in 0..count {
            let x = (column as f32 - count as f32 * 0.5) * 1.05;
            let body = world
                .create_body(&BodyDef::dynamic().position(Vec2::new(x, y)))
                .expect("box");
            world
                .create_collider(body, ColliderBuilder::cuboid(0.5, 0.5).expect("shape").friction(0.6))
                .expect("collider");
        }
    }
    world
}

fn prepare_scattered(count: usize, parallel: bool) -> PhysicsWorld {
    let config = SimulationConfig::default().with_parallel_islands(parallel);
    let mut world = PhysicsWorld::with_config(config).expect("world");
    let ground = world.create_body(&BodyDef::fixed()).expect("ground");
    world
        .create_collider(ground, ColliderBuilder::cuboid(200.0, 0.5).expect("shape"))
        .expect("collider");

    // Short stacks far apart so every stack is its own island.
    for index in 0..count {
        let x = (index / 4) as f32 * 3.0 - 150.0;
        let y = 1.0 + (index % 4) as f32 * 1.0;
        let body = world
            .create_body(&BodyDef::dynamic().position(Vec2::new(x, y)))
            .expect("circle");
        world
            .create_collider(body, ColliderBuilder::circle(0.5).expect("shape"))
            .expect("collider");
    }
    world
}

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    for &base in &[10usize, 20, 30] {
        group.bench_with_input(BenchmarkId::new("pyramid", base), &base, |b, &base| {
            let mut world = prepare_pyramid(base, false);
            b.iter(|| {
                world.step(black_box(DT), 8, 3).expect("step");
            })
        });
    }
    group.finish();
}

fn bench_island_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("island_solve");
    for &count in &[128usize, 512] {
        group.bench_with_input(
            BenchmarkId::new("sequential", count),
            &count,
            |b, &count| {
                let mut world = prepare_scattered(count, false);
                b.iter(|| {
                    world.step(black_box(DT), 8, 3).expect("step");
                })
            },
        );
        group.bench_with_input(BenchmarkId::new("parallel", count), &count, |b, &count| {
            let mut world = prepare_scattered(count, true);
            b.iter(|| {
                world.step(black_box(DT), 8, 3).expect("step");
            })
        });
    }
    group.finish();
}

fn bench_narrowphase(c: &mut Criterion) {
    let mut group = c.benchmark_group("narrowphase");
    let count = 1000;
    let narrowphase = NarrowPhase::default();
    let square = ColliderShape::cuboid(0.5, 0.5).expect("shape");
    let disc = ColliderShape::circle(0.5).expect("shape");

    let transforms_a: Vec<Transform> = (0..count)
        .map(|i| Transform::new(Vec2::new(i as f32 * 2.0, 0.0), 0.0))
        .collect();
    let transforms_b: Vec<Transform> = (0..count)
        .map(|i| Transform::new(Vec2::new(i as f32 * 2.0 + 0.8, 0.1), 0.3))
        .collect();

    group.bench_function("polygon_polygon", |b| {
        b.iter(|| {
            for i in 0..count {
                black_box(narrowphase.collide(&square, &transforms_a[i], &square, &transforms_b[i]));
            }
        })
    });

    group.bench_function("polygon_circle", |b| {
        b.iter(|| {
            for i in 0..count {
                black_box(narrowphase.collide(&square, &transforms_a[i], &disc, &transforms_b[i]));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_world_step, bench_island_solve, bench_narrowphase);
criterion_main!(benches);
