// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! End-to-end scenarios: a cube dropped on a large ground box.

use std::sync::Arc;

use echo_geom::{CollisionShape, Pose};
use echo_math::Vec3;
use echo_physics::{Body, PhysicsConfig, PhysicsWorld};

const DT: f32 = 1.0 / 60.0;
const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

struct Scene {
    world: PhysicsWorld,
    cube: Arc<Body>,
}

fn scene(cube_position: Vec3) -> Scene {
    let world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
    let ground = Body::rigid(
        "ground",
        Pose::from_position(Vec3::new(0.0, -0.5, 0.0)),
        CollisionShape::cuboid(Vec3::new(1000.0, 0.5, 1000.0)).unwrap(),
    );
    let cube = Body::rigid(
        "cube",
        Pose::from_position(cube_position),
        CollisionShape::cuboid(Vec3::splat(0.5)).unwrap(),
    );
    cube.set_mass(10.0).unwrap();
    world.add_body(ground).unwrap();
    world.add_body(Arc::clone(&cube)).unwrap();
    Scene { world, cube }
}

impl Scene {
    fn run(&mut self, steps: usize) {
        for _ in 0..steps {
            self.world.process(DT, GRAVITY).unwrap();
        }
    }
}

#[test]
fn fall_on_plane() {
    let mut scene = scene(Vec3::new(0.0, 5.0, 0.0));
    scene.run(250);
    let y = scene.cube.pose().position().y();
    assert!((y - 0.5).abs() < 0.1, "cube rests at y = {y}");
    assert!(!scene.cube.is_active(), "a resting cube falls asleep");
}

#[test]
fn fall_forever_stops_at_the_world_boundary() {
    let mut scene = scene(Vec3::new(1100.0, 5.0, 0.0));
    scene.run(250);
    let y = scene.cube.pose().position().y();
    assert!(y > -4.0, "cube kept falling to y = {y}");
    assert!(!scene.cube.is_active());
    assert!(scene.cube.is_static());
}

#[test]
fn teleported_sleeping_body_falls_again() {
    let mut scene = scene(Vec3::new(0.0, 0.5, 0.0));
    scene.run(25);
    assert!(!scene.cube.is_active(), "cube should sleep on the ground first");

    let cube = Arc::clone(&scene.cube);
    std::thread::spawn(move || cube.set_pose(Pose::from_position(Vec3::new(25.0, 5.0, 0.0))))
        .join()
        .unwrap();
    scene.run(250);
    let position = scene.cube.pose().position();
    assert!((position.x() - 25.0).abs() < 2.5, "x = {}", position.x());
    assert!((position.y() - 0.5).abs() < 0.1, "y = {}", position.y());
    assert!(!scene.cube.is_active());
}

#[test]
fn momentum_wakes_sleeping_body() {
    let mut scene = scene(Vec3::new(0.0, 0.5, 0.0));
    scene.run(25);
    assert!(!scene.cube.is_active());

    scene.cube.apply_central_momentum(Vec3::new(100.0, 100.0, 0.0));
    scene.world.process(DT, GRAVITY).unwrap();
    assert!(scene.cube.is_active());
    assert!(scene.cube.linear_velocity().x() > 9.0);

    scene.run(500);
    let position = scene.cube.pose().position();
    assert!(position.x() > 15.0, "x = {}", position.x());
    assert!((position.y() - 0.5).abs() < 0.1, "y = {}", position.y());
    assert!(!scene.cube.is_active());
}

#[test]
fn last_manifolds_describe_the_resting_contact() {
    let mut scene = scene(Vec3::new(0.0, 0.5, 0.0));
    scene.run(3);
    let cube_id = scene.cube.object_id().unwrap();
    let manifolds = scene.world.last_updated_manifold_results();
    let manifold = manifolds
        .iter()
        .find(|m| m.body1() == cube_id || m.body2() == cube_id)
        .expect("cube touches the ground");
    assert!(manifold.contact_count() > 0);
    for contact in manifold.contacts() {
        let up = if manifold.body1() == cube_id { 1.0 } else { -1.0 };
        assert!(contact.normal_from_b.y() * up > 0.9);
    }
}

#[test]
fn removed_body_leaves_the_world() {
    let mut scene = scene(Vec3::new(0.0, 0.5, 0.0));
    scene.run(2);
    assert_eq!(scene.world.body_count(), 2);
    scene.world.remove_body(&scene.cube).unwrap();
    scene.run(1);
    assert_eq!(scene.world.body_count(), 1);
    assert_eq!(scene.world.broad_phase().pair_count(), 0);
    assert_eq!(scene.world.narrow_phase().algorithm_count(), 0);
}

#[test]
fn fast_sphere_does_not_tunnel_through_thin_wall() {
    let mut world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
    let wall = Body::rigid(
        "wall",
        Pose::from_position(Vec3::new(5.0, 0.0, 0.0)),
        CollisionShape::cuboid(Vec3::new(0.05, 5.0, 5.0)).unwrap(),
    );
    let ball = Body::rigid("ball", Pose::identity(), CollisionShape::sphere(0.25).unwrap());
    ball.set_mass(1.0).unwrap();
    ball.set_velocity(Vec3::new(300.0, 0.0, 0.0), Vec3::ZERO);
    world.add_body(wall).unwrap();
    world.add_body(Arc::clone(&ball)).unwrap();
    for _ in 0..10 {
        world.process(DT, Vec3::ZERO).unwrap();
    }
    let x = ball.pose().position().x();
    assert!(x < 5.0, "ball crossed the wall and reached x = {x}");
}

#[test]
fn ghost_body_reports_contacts_without_pushing() {
    let mut world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
    let trigger = Body::ghost(
        "trigger",
        Pose::identity(),
        CollisionShape::cuboid(Vec3::splat(2.0)).unwrap(),
    );
    let ball = Body::rigid("ball", Pose::identity(), CollisionShape::sphere(0.5).unwrap());
    ball.set_mass(1.0).unwrap();
    world.add_body(trigger).unwrap();
    world.add_body(Arc::clone(&ball)).unwrap();
    world.process(DT, Vec3::ZERO).unwrap();
    assert!(!world.last_updated_manifold_results().is_empty());
    assert!(ball.linear_velocity().length() < 1e-6);
}

#[test]
fn body_readded_before_a_step_is_tracked_once() {
    let mut scene = scene(Vec3::new(0.0, 0.5, 0.0));
    scene.run(1);
    let old_id = scene.cube.object_id().unwrap();
    scene.world.remove_body(&scene.cube).unwrap();
    scene.world.add_body(Arc::clone(&scene.cube)).unwrap();
    scene.run(1);

    let new_id = scene.cube.object_id().unwrap();
    assert_ne!(old_id, new_id);
    assert_eq!(scene.world.body_count(), 2);
    assert!(scene.world.work_body(old_id).is_none());
    assert!(scene.world.work_body(new_id).is_some());
    let tree = scene.world.broad_phase().published_tree();
    assert_eq!(tree.read().unwrap().len(), 2);
    assert_eq!(scene.world.broad_phase().pair_count(), 1);
}

#[test]
fn capped_iterations_drop_contacts_without_failing_the_step() {
    let mut config = PhysicsConfig::default();
    config.narrow_phase.gjk.max_iterations = 1;
    config.narrow_phase.epa.max_iterations = 1;
    let mut world = PhysicsWorld::new(config).unwrap();
    let shape = CollisionShape::cuboid(Vec3::ONE).unwrap();
    let a = Body::rigid("a", Pose::identity(), shape.clone());
    let b = Body::rigid("b", Pose::from_position(Vec3::new(0.5, 0.25, 0.0)), shape);
    a.set_mass(1.0).unwrap();
    b.set_mass(1.0).unwrap();
    world.add_body(a).unwrap();
    world.add_body(b).unwrap();

    world.process(DT, Vec3::ZERO).unwrap();
    assert_eq!(world.broad_phase().pair_count(), 1);
    let failures = world.narrow_phase().failure_count();
    assert!(failures > 0);
    assert!(world.last_updated_manifold_results().is_empty());
    assert_eq!(world.last_report().manifolds, 0);

    world.process(DT, Vec3::ZERO).unwrap();
    assert!(world.narrow_phase().failure_count() > failures);
    assert!(world.last_updated_manifold_results().is_empty());
}
