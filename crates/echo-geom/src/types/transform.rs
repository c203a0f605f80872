// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use echo_math::{Mat4, Quat, Vec3};

use crate::types::pose::Pose;

/// Rigid transform with non-uniform scale used for swept bounds and shape
/// placement.
///
/// Conventions:
/// - `translation` in meters (world space).
/// - `rotation` as a unit quaternion (normalized when converting).
/// - `scale` is applied before rotation/translation.
///
/// `to_mat4` constructs `M = T * R * S`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
}

impl Transform {
    /// Identity transform (no translation, no rotation, unit scale).
    pub const fn identity() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::identity(),
            scale: Vec3::ONE,
        }
    }

    /// Creates a transform from components.
    pub const fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Unscaled transform placed at `pose`.
    pub fn from_pose(pose: &Pose) -> Self {
        Self::new(pose.position(), pose.orientation(), Vec3::ONE)
    }

    /// Translation component.
    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    /// Rotation component.
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Scale component.
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Rigid part of the transform.
    pub fn pose(&self) -> Pose {
        Pose::new(self.translation, self.rotation)
    }

    /// Midpoint blend of two transforms: translation and scale are averaged,
    /// rotation uses a normalised linear blend.
    pub fn midpoint(&self, other: &Self) -> Self {
        let q0 = self.rotation.to_array();
        let q1 = other.rotation.to_array();
        let rotation = Quat::new(
            0.5 * (q0[0] + q1[0]),
            0.5 * (q0[1] + q1[1]),
            0.5 * (q0[2] + q1[2]),
            0.5 * (q0[3] + q1[3]),
        )
        .normalize();
        Self {
            translation: self.translation.lerp(&other.translation, 0.5),
            rotation,
            scale: self.scale.lerp(&other.scale, 0.5),
        }
    }

    /// Returns the column-major `Mat4` corresponding to this transform.
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_translation_rotation_scale(&self.translation, &self.rotation, &self.scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
