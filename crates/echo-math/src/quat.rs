// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use crate::{Mat3, Mat4, Vec3, EPSILON};

/// Quaternion stored as `(x, y, z, w)`.
///
/// * All angles are expressed in radians.
/// * Orientation quaternions are expected to be unit length; integrators
///   renormalise after every update.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quat {
    data: [f32; 4],
}

impl Quat {
    /// Creates a quaternion from components.
    ///
    /// Callers should provide finite components; use
    /// [`Quat::from_axis_angle`] for axis/angle construction.
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { data: [x, y, z, w] }
    }

    /// Returns the quaternion as an array.
    pub fn to_array(self) -> [f32; 4] {
        self.data
    }

    /// Vector part `(x, y, z)`.
    pub fn vector(&self) -> Vec3 {
        Vec3::new(self.data[0], self.data[1], self.data[2])
    }

    /// Scalar part.
    pub fn w(&self) -> f32 {
        self.data[3]
    }

    /// Returns the identity quaternion.
    pub const fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Constructs a quaternion from a rotation axis and angle in radians.
    ///
    /// Returns the identity quaternion when the axis length is ≤ `EPSILON`.
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let len_sq = axis.length_squared();
        if len_sq <= EPSILON * EPSILON {
            return Self::identity();
        }
        let norm_axis = axis.scale(1.0 / len_sq.sqrt());
        let (sin_half, cos_half) = (angle * 0.5).sin_cos();
        let v = norm_axis.scale(sin_half);
        Self::new(v.x(), v.y(), v.z(), cos_half)
    }

    /// Hamilton product of two quaternions (`self * other`).
    ///
    /// The result rotates by `other` first and then by `self` when applied
    /// to a vector.
    pub fn multiply(&self, other: &Self) -> Self {
        let [ax, ay, az, aw] = self.data;
        let [bx, by, bz, bw] = other.data;
        Self::new(
            aw * bx + ax * bw + ay * bz - az * by,
            aw * by - ax * bz + ay * bw + az * bx,
            aw * bz + ax * by - ay * bx + az * bw,
            aw * bw - ax * bx - ay * by - az * bz,
        )
    }

    /// Squared norm.
    pub fn length_squared(&self) -> f32 {
        self.data.iter().map(|c| c * c).sum()
    }

    /// Normalises the quaternion; returns identity when norm is ~0.
    pub fn normalize(&self) -> Self {
        let len = self.length_squared().sqrt();
        if len <= EPSILON {
            return Self::identity();
        }
        let inv = 1.0 / len;
        Self::new(
            self.data[0] * inv,
            self.data[1] * inv,
            self.data[2] * inv,
            self.data[3] * inv,
        )
    }

    /// Conjugate, which is the inverse for unit quaternions.
    pub fn conjugate(&self) -> Self {
        Self::new(-self.data[0], -self.data[1], -self.data[2], self.data[3])
    }

    /// Rotates `v` by this (unit) quaternion.
    pub fn rotate(&self, v: &Vec3) -> Vec3 {
        // v' = v + 2w(q×v) + 2q×(q×v)
        let q = self.vector();
        let t = q.cross(v).scale(2.0);
        v.add(&t.scale(self.data[3])).add(&q.cross(&t))
    }

    /// Rotates `v` by the inverse of this (unit) quaternion.
    pub fn inverse_rotate(&self, v: &Vec3) -> Vec3 {
        self.conjugate().rotate(v)
    }

    /// Converts the quaternion to a column-major rotation matrix.
    pub fn to_mat3(&self) -> Mat3 {
        let q = self.normalize();
        let [x, y, z, w] = q.data;

        let xx = x * x;
        let yy = y * y;
        let zz = z * z;
        let xy = x * y;
        let xz = x * z;
        let yz = y * z;
        let wx = w * x;
        let wy = w * y;
        let wz = w * z;

        Mat3::new([
            1.0 - 2.0 * (yy + zz),
            2.0 * (xy + wz),
            2.0 * (xz - wy),
            2.0 * (xy - wz),
            1.0 - 2.0 * (xx + zz),
            2.0 * (yz + wx),
            2.0 * (xz + wy),
            2.0 * (yz - wx),
            1.0 - 2.0 * (xx + yy),
        ])
    }

    /// Converts the quaternion to a rotation matrix (column-major 4×4).
    pub fn to_mat4(&self) -> Mat4 {
        let r = self.to_mat3().to_array();
        Mat4::new([
            r[0], r[1], r[2], 0.0, //
            r[3], r[4], r[5], 0.0, //
            r[6], r[7], r[8], 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    /// Advances an orientation by angular velocity `omega` over `dt` seconds.
    ///
    /// Uses the exact axis/angle rotation of `omega * dt` so large spins stay
    /// on the unit sphere.
    pub fn integrate(&self, omega: &Vec3, dt: f32) -> Self {
        let speed = omega.length();
        if speed <= EPSILON {
            return *self;
        }
        Self::from_axis_angle(*omega, speed * dt)
            .multiply(self)
            .normalize()
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::identity()
    }
}

/// Converts a 4‑element `[f32; 4]` array `(x, y, z, w)` into a `Quat`.
/// Components are taken verbatim; normalisation is not enforced.
impl From<[f32; 4]> for Quat {
    fn from(value: [f32; 4]) -> Self {
        Self { data: value }
    }
}

impl core::ops::Mul for Quat {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        self.multiply(&rhs)
    }
}
