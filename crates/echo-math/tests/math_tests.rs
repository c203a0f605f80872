// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
use core::f32::consts::FRAC_PI_2;

use echo_math::{self as math, Mat3, Mat4, Quat, Vec3};
use proptest::prelude::*;

fn approx_eq(a: f32, b: f32, tol: f32) {
    let diff = (a - b).abs();
    assert!(diff <= tol, "expected {b}, got {a} (diff {diff})");
}

fn approx_eq3(a: Vec3, b: [f32; 3], tol: f32) {
    let a = a.to_array();
    for i in 0..3 {
        approx_eq(a[i], b[i], tol);
    }
}

#[test]
fn vec3_normalize_degenerate_returns_zero() {
    let v = Vec3::new(1e-12, -1e-12, 0.0);
    assert_eq!(v.normalize().to_array(), [0.0, 0.0, 0.0]);
}

#[test]
fn vec3_operators_match_named_methods() {
    let a = Vec3::new(1.0, 2.0, 3.0);
    let b = Vec3::new(-4.0, 0.5, 2.0);
    assert_eq!(a + b, a.add(&b));
    assert_eq!(a - b, a.sub(&b));
    assert_eq!(a * 2.0, a.scale(2.0));
    assert_eq!(2.0 * a, a.scale(2.0));
    assert_eq!(-a, a.scale(-1.0));
    let mut c = a;
    c += b;
    c -= b;
    assert_eq!(c, a);
}

#[test]
fn vec3_lerp_hits_endpoints_and_midpoint() {
    let a = Vec3::new(1.0, -2.0, 4.0);
    let b = Vec3::new(3.0, 2.0, 0.0);
    approx_eq3(a.lerp(&b, 0.0), [1.0, -2.0, 4.0], 1e-6);
    approx_eq3(a.lerp(&b, 1.0), [3.0, 2.0, 0.0], 1e-6);
    approx_eq3(a.lerp(&b, 0.5), [2.0, 0.0, 2.0], 1e-6);
}

#[test]
fn orthonormal_basis_is_orthonormal() {
    for n in [Vec3::UNIT_X, Vec3::UNIT_Y, Vec3::new(1.0, 1.0, 1.0).normalize()] {
        let (t1, t2) = n.orthonormal_basis();
        approx_eq(t1.length(), 1.0, 1e-5);
        approx_eq(t2.length(), 1.0, 1e-5);
        approx_eq(t1.dot(&n), 0.0, 1e-5);
        approx_eq(t2.dot(&n), 0.0, 1e-5);
        approx_eq(t1.dot(&t2), 0.0, 1e-5);
    }
}

#[test]
fn quat_identity_properties() {
    let id = Quat::identity();
    assert_eq!(id.multiply(&id).to_array(), id.to_array());
    assert_eq!(id.to_mat4().to_array(), Mat4::identity().to_array());
    assert_eq!(id.to_mat3().to_array(), Mat3::identity().to_array());
}

#[test]
fn quat_rotate_agrees_with_matrix() {
    let q = Quat::from_axis_angle(Vec3::new(0.3, 1.0, -0.2), 1.1);
    let v = Vec3::new(1.5, -2.0, 0.25);
    let by_quat = q.rotate(&v);
    let by_mat = q.to_mat3().transform(&v);
    approx_eq3(by_quat, by_mat.to_array(), 1e-5);
    approx_eq3(q.inverse_rotate(&by_quat), v.to_array(), 1e-5);
}

#[test]
fn quat_yaw_quarter_turn_maps_z_to_x() {
    let q = Quat::from_axis_angle(Vec3::UNIT_Y, FRAC_PI_2);
    approx_eq3(q.rotate(&Vec3::UNIT_Z), [1.0, 0.0, 0.0], 1e-6);
}

#[test]
fn quat_integrate_quarter_turn() {
    let q = Quat::identity().integrate(&Vec3::new(0.0, 0.0, FRAC_PI_2), 1.0);
    approx_eq3(q.rotate(&Vec3::UNIT_X), [0.0, 1.0, 0.0], 1e-5);
}

#[test]
fn mat3_inverse_of_diagonal() {
    let m = Mat3::from_diagonal(&Vec3::new(2.0, 4.0, 8.0));
    let inv = m.inverse().unwrap_or_else(Mat3::zero);
    approx_eq3(inv.transform(&Vec3::ONE), [0.5, 0.25, 0.125], 1e-6);
    assert!(Mat3::zero().inverse().is_none());
}

#[test]
fn mat4_trs_applies_scale_then_rotation_then_translation() {
    let m = Mat4::from_translation_rotation_scale(
        &Vec3::new(10.0, 0.0, 0.0),
        &Quat::from_axis_angle(Vec3::UNIT_Z, FRAC_PI_2),
        &Vec3::splat(2.0),
    );
    approx_eq3(m.transform_point(&Vec3::UNIT_X), [10.0, 2.0, 0.0], 1e-5);
    approx_eq3(m.transform_direction(&Vec3::UNIT_X), [0.0, 2.0, 0.0], 1e-5);
}

#[test]
fn deg_rad_roundtrip_basic_angles() {
    for deg in [0.0f32, 45.0, 90.0, 180.0, -90.0] {
        approx_eq(math::rad_to_deg(math::deg_to_rad(deg)), deg, 1e-4);
    }
}

#[test]
fn clamp_never_panics_on_inverted_range() {
    assert_eq!(math::clamp(5.0, 1.0, 0.0), 1.0);
    assert_eq!(math::clamp(-1.0, 0.0, 1.0), 0.0);
}

proptest! {
    #[test]
    fn rotation_preserves_length(
        ax in -1.0f32..1.0, ay in -1.0f32..1.0, az in -1.0f32..1.0,
        angle in -6.0f32..6.0,
        vx in -100.0f32..100.0, vy in -100.0f32..100.0, vz in -100.0f32..100.0,
    ) {
        let q = Quat::from_axis_angle(Vec3::new(ax, ay, az), angle);
        let v = Vec3::new(vx, vy, vz);
        let r = q.rotate(&v);
        prop_assert!((r.length() - v.length()).abs() <= 1e-3 * (1.0 + v.length()));
    }

    #[test]
    fn cross_is_orthogonal(
        ax in -10.0f32..10.0, ay in -10.0f32..10.0, az in -10.0f32..10.0,
        bx in -10.0f32..10.0, by in -10.0f32..10.0, bz in -10.0f32..10.0,
    ) {
        let a = Vec3::new(ax, ay, az);
        let b = Vec3::new(bx, by, bz);
        let c = a.cross(&b);
        prop_assert!(c.dot(&a).abs() <= 1e-2);
        prop_assert!(c.dot(&b).abs() <= 1e-2);
    }
}
