// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Float32 math helpers for the Echo physics pipeline: scalar utilities,
//! vectors, quaternions, and 3×3/4×4 matrices.
//!
//! All operations round to `f32`. Matrices are column-major so that
//! `Mat4` values can be handed to renderers without reshuffling.

use std::f32::consts::TAU;

mod mat3;
mod mat4;
mod quat;
mod vec3;

pub use mat3::Mat3;
pub use mat4::Mat4;
pub use quat::Quat;
pub use vec3::Vec3;

/// Global epsilon used by math routines when detecting degenerate values.
pub const EPSILON: f32 = 1e-6;

/// Clamps `value` to the inclusive `[min, max]` range.
///
/// Unlike `f32::clamp` this never panics: an inverted range collapses to
/// `min`.
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.min(max).max(min)
}

/// Returns `1.0` for non-negative values and `-1.0` otherwise.
///
/// Zero maps to `1.0` so callers projecting onto box faces always get a
/// definite side.
pub fn sign(value: f32) -> f32 {
    if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Converts degrees to radians with float32 precision.
pub fn deg_to_rad(value: f32) -> f32 {
    value * (TAU / 360.0)
}

/// Converts radians to degrees with float32 precision.
pub fn rad_to_deg(value: f32) -> f32 {
    value * (360.0 / TAU)
}

/// Linear interpolation between `a` and `b`.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (1.0 - t) * a + t * b
}
