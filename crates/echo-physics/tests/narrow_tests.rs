// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! Property tests for penetration queries between rotated boxes.

use echo_geom::{CollisionShape, ConvexObject, Pose};
use echo_math::{Quat, Vec3};
use echo_physics::config::{EpaConfig, GjkConfig};
use echo_physics::narrow::{Epa, Gjk, GjkResult};
use proptest::prelude::*;

fn rotated_box(half: (f32, f32, f32), axis: (f32, f32, f32), angle: f32, at: Vec3) -> ConvexObject {
    let shape = CollisionShape::cuboid(Vec3::new(half.0, half.1, half.2)).unwrap();
    let orientation = Quat::from_axis_angle(Vec3::new(axis.0, axis.1, axis.2), angle);
    shape.to_convex_object(&Pose::new(at, orientation)).unwrap()
}

fn half_extents() -> impl Strategy<Value = (f32, f32, f32)> {
    (0.3f32..1.5, 0.3f32..1.5, 0.3f32..1.5)
}

fn axis() -> impl Strategy<Value = (f32, f32, f32)> {
    (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0)
}

proptest! {
    // Two centrally symmetric shapes separate fastest along a direction
    // that never points from B back toward A. The slack covers the EPA
    // termination tolerance on near ties.
    #[test]
    fn penetration_normal_points_from_a_toward_b(
        half_a in half_extents(),
        half_b in half_extents(),
        axis_a in axis(),
        axis_b in axis(),
        angle_a in -3.1f32..3.1,
        angle_b in -3.1f32..3.1,
        offset in (-1.2f32..1.2, -1.2f32..1.2, -1.2f32..1.2),
    ) {
        let center_a = Vec3::new(0.25, -0.5, 1.0);
        let offset = Vec3::new(offset.0, offset.1, offset.2);
        let a = rotated_box(half_a, axis_a, angle_a, center_a);
        let b = rotated_box(half_b, axis_b, angle_b, center_a + offset);

        let Ok(GjkResult::Collide(simplex)) = Gjk::new(GjkConfig::default()).process(&a, &b, true) else {
            return Ok(());
        };
        let Ok(Some(contact)) = Epa::new(EpaConfig::default()).process(&a, &b, &simplex) else {
            return Ok(());
        };
        prop_assert!(contact.depth >= 0.0, "depth {}", contact.depth);
        prop_assert!((contact.normal.length() - 1.0).abs() < 1e-3);
        let along = contact.normal.dot(&offset);
        let slack = 0.1 * (offset.length() + contact.depth) + 1e-3;
        prop_assert!(
            along >= -slack,
            "normal {:?} points back from B to A (dot {along}, depth {})",
            contact.normal,
            contact.depth
        );
    }
}
