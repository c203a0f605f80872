// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use echo_math::{Mat4, Quat, Vec3};

/// Rigid pose: position plus unit orientation, no scale.
///
/// Collision and integration code uses `Pose` exclusively; body scale is
/// baked into the shape before it reaches the narrow phase.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pose {
    position: Vec3,
    orientation: Quat,
}

impl Pose {
    /// Identity pose.
    pub const fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::identity(),
        }
    }

    /// Creates a pose; `orientation` is normalised.
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation: orientation.normalize(),
        }
    }

    /// Pose at `position` with identity orientation.
    pub const fn from_position(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::identity(),
        }
    }

    /// World-space position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// World-space orientation.
    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    /// Copy with a new position.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Maps a local point into world space.
    pub fn transform_point(&self, p: &Vec3) -> Vec3 {
        self.position.add(&self.orientation.rotate(p))
    }

    /// Maps a world point into local space.
    pub fn inverse_transform_point(&self, p: &Vec3) -> Vec3 {
        self.orientation.inverse_rotate(&p.sub(&self.position))
    }

    /// Rotates a local direction into world space.
    pub fn rotate(&self, v: &Vec3) -> Vec3 {
        self.orientation.rotate(v)
    }

    /// Rotates a world direction into local space.
    pub fn inverse_rotate(&self, v: &Vec3) -> Vec3 {
        self.orientation.inverse_rotate(v)
    }

    /// `self ∘ child`: places a pose expressed relative to `self` in world space.
    pub fn compose(&self, child: &Self) -> Self {
        Self {
            position: self.transform_point(&child.position),
            orientation: self.orientation.multiply(&child.orientation).normalize(),
        }
    }

    /// Inverse pose.
    pub fn inverse(&self) -> Self {
        let inv = self.orientation.conjugate();
        Self {
            position: inv.rotate(&self.position).scale(-1.0),
            orientation: inv,
        }
    }

    /// Advances the pose by linear and angular velocity over `dt` seconds.
    pub fn integrate(&self, linear_velocity: &Vec3, angular_velocity: &Vec3, dt: f32) -> Self {
        Self {
            position: self.position.add(&linear_velocity.scale(dt)),
            orientation: self.orientation.integrate(angular_velocity, dt),
        }
    }

    /// Interpolates translation only; orientation is taken from `self`.
    ///
    /// Continuous collision sweeps along the translation of a step and treats
    /// the orientation as fixed over the sweep.
    pub fn lerp_translation(&self, to: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(&to.position, t),
            orientation: self.orientation,
        }
    }

    /// Column-major matrix for this pose.
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_translation_rotation_scale(&self.position, &self.orientation, &Vec3::ONE)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}
