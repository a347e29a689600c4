//! Falling spheres demonstration
//!
//! Drops a few spheres and a box onto a ground plane and prints collisions.
//! Run with `RUST_LOG=void_physics=debug` to see the world's own logging.

use void_physics::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    println!("Falling Spheres Demo");
    println!("====================\n");

    let mut world = PhysicsWorld::try_new(PhysicsConfig::default().with_sleeping(true))?;

    let ground_material = Material::new("ground");
    let ball_material = Material::new("ball");
    world.add_contact_material(ContactMaterial::new(&ground_material, &ball_material, 0.2, 0.3))?;

    world.add(
        RigidBody::new(0.0, Shape::Plane)
            .with_rotation(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2))
            .with_material(&ground_material),
    );

    let mut balls = Vec::new();
    for i in 0..3 {
        let mut ball = RigidBody::new(1.0, Shape::sphere(0.5))
            .with_position(Vec3::new(i as f32 * 1.5, 2.0 + i as f32, 0.0))
            .with_material(&ball_material);
        ball.add_event_listener(BodyEventType::Collide, |event: &BodyEvent| {
            println!("  {:?} collided with {:?}", event.target, event.other());
        });
        balls.push(world.add(ball));
    }

    let crate_id = world.add(
        RigidBody::new(2.0, Shape::cuboid(0.5, 0.5, 0.5)).with_position(Vec3::new(-2.0, 1.0, 0.0)),
    );

    let frame_time = 1.0 / 60.0;
    for frame in 0..300 {
        world.advance(frame_time)?;

        for event in world.events().sleep_transitions() {
            println!("  {:?}: {:?}", event.target, event.kind);
        }

        if frame % 60 == 0 {
            println!("t = {:.2}s", world.time());
            for id in balls.iter().chain(std::iter::once(&crate_id)) {
                if let Some(body) = world.body(*id) {
                    println!(
                        "  {:?} at ({:.3}, {:.3}, {:.3}) {:?}",
                        id,
                        body.position.x,
                        body.position.y,
                        body.position.z,
                        body.sleep_state()
                    );
                }
            }
        }
    }

    println!("\nSimulated {} steps", world.step_number());
    Ok(())
}
