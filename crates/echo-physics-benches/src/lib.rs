// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scene builders shared by the echo-physics benchmarks.

use echo_geom::{CollisionShape, Pose};
use echo_math::Vec3;
use echo_physics::{Body, PhysicsConfig, PhysicsError, PhysicsWorld};

/// Ground box plus a `side × side` grid of unit cubes, `layers` high, spaced
/// so that neighbours almost touch.
pub fn cube_grid(side: u32, layers: u32) -> Result<PhysicsWorld, PhysicsError> {
    let world = PhysicsWorld::new(PhysicsConfig::default())?;
    world.add_body(Body::rigid(
        "ground",
        Pose::from_position(Vec3::new(0.0, -0.5, 0.0)),
        CollisionShape::cuboid(Vec3::new(500.0, 0.5, 500.0))?,
    ))?;
    for layer in 0..layers {
        for i in 0..side {
            for j in 0..side {
                #[allow(clippy::cast_precision_loss)]
                let at = Vec3::new(i as f32 * 1.05, 0.5 + layer as f32 * 1.01, j as f32 * 1.05);
                let body = Body::rigid(
                    format!("cube-{layer}-{i}-{j}"),
                    Pose::from_position(at),
                    CollisionShape::cuboid(Vec3::splat(0.5))?,
                );
                body.set_mass(1.0)?;
                world.add_body(body)?;
            }
        }
    }
    Ok(world)
}
