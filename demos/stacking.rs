use impulse2d::*;

fn main() -> PhysicsResult<()> {
    let mut engine = PhysicsEngine::new(1.0 / 60.0)?;
    let world = engine.world_mut();

    let ground = world.create_body(&BodyDef::fixed())?;
    world.create_collider(ground, ColliderBuilder::cuboid(20.0, 0.5)?)?;

    let mut boxes = Vec::new();
    for level in 0..8 {
        let body = world.create_body(&BodyDef::dynamic().position(Vec2::new(0.0, 1.0 + level as f32)))?;
        world.create_collider(body, ColliderBuilder::cuboid(0.5, 0.5)?.friction(0.6))?;
        boxes.push(body);
    }

    let mut elapsed = 0.0;
    while elapsed < 5.0 {
        engine.step(1.0 / 60.0)?;
        elapsed += 1.0 / 60.0;
    }

    let world = engine.world();
    for (level, body) in boxes.iter().enumerate() {
        if let Some(body) = world.body(*body) {
            println!(
                "box {level}: position {:?}, awake {}",
                body.position(),
                body.is_awake()
            );
        }
    }
    println!("islands in last step: {}", world.profile().island_count);
    Ok(())
}
