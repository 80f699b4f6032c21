use impulse2d::*;

fn main() -> PhysicsResult<()> {
    let mut world = PhysicsWorld::new();

    let mut previous = None;
    let mut links = Vec::new();
    for index in 0..10 {
        let x = index as f32 + 0.5;
        let link = world.create_body(&BodyDef::dynamic().position(Vec2::new(x, 10.0)))?;
        world.create_collider(link, ColliderBuilder::cuboid(0.5, 0.1)?.density(2.0))?;
        let joint = match previous {
            None => JointDef::fixed_revolute(link, Vec2::new(0.0, 10.0), Vec2::new(-0.5, 0.0)),
            Some(previous) => JointDef::revolute(previous, link, Vec2::new(0.5, 0.0), Vec2::new(-0.5, 0.0)),
        };
        world.create_joint(&joint)?;
        links.push(link);
        previous = Some(link);
    }

    let ground = world.create_body(&BodyDef::fixed().position(Vec2::new(0.0, -0.5)))?;
    world.create_collider(ground, ColliderBuilder::cuboid(20.0, 0.5)?)?;

    // A heavy ball that the swinging chain will strike.
    let ball = world.create_body(&BodyDef::dynamic().position(Vec2::new(0.0, 0.5)))?;
    world.create_collider(ball, ColliderBuilder::circle(0.5)?.density(4.0))?;

    for frame in 0..600 {
        world.step(1.0 / 60.0, 8, 3)?;
        for event in world.drain_events() {
            if let WorldEvent::ContactBegin { collider_a, collider_b, .. } = event {
                println!("frame {frame}: contact between {collider_a:?} and {collider_b:?}");
            }
        }
    }

    if let Some(tip) = links.last().and_then(|link| world.body(*link)) {
        println!("chain tip at {:?}", tip.position());
    }
    if let Some(ball) = world.body(ball) {
        println!("ball at {:?}", ball.position());
    }
    Ok(())
}
