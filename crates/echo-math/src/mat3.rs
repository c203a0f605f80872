// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use crate::{Vec3, EPSILON};

/// Column‑major 3×3 matrix used for rotations and inertia tensors.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat3 {
    data: [f32; 9],
}

impl Mat3 {
    /// Returns the identity matrix.
    pub const fn identity() -> Self {
        Self {
            data: [
                1.0, 0.0, 0.0, // col 0
                0.0, 1.0, 0.0, // col 1
                0.0, 0.0, 1.0, // col 2
            ],
        }
    }

    /// The zero matrix.
    pub const fn zero() -> Self {
        Self { data: [0.0; 9] }
    }

    /// Creates a matrix from column-major array data.
    pub const fn new(data: [f32; 9]) -> Self {
        Self { data }
    }

    /// Diagonal matrix with `d` on the diagonal.
    pub fn from_diagonal(d: &Vec3) -> Self {
        Self::new([d.x(), 0.0, 0.0, 0.0, d.y(), 0.0, 0.0, 0.0, d.z()])
    }

    /// Builds a matrix from three column vectors.
    pub fn from_columns(c0: &Vec3, c1: &Vec3, c2: &Vec3) -> Self {
        Self::new([
            c0.x(),
            c0.y(),
            c0.z(),
            c1.x(),
            c1.y(),
            c1.z(),
            c2.x(),
            c2.y(),
            c2.z(),
        ])
    }

    /// Returns the matrix as a column‑major array.
    pub fn to_array(self) -> [f32; 9] {
        self.data
    }

    fn at(&self, row: usize, col: usize) -> f32 {
        self.data[col * 3 + row]
    }

    /// Column `idx` as a vector.
    pub fn column(&self, idx: usize) -> Vec3 {
        let c = idx % 3;
        Vec3::new(self.data[c * 3], self.data[c * 3 + 1], self.data[c * 3 + 2])
    }

    /// Transposed copy.
    pub fn transpose(&self) -> Self {
        let mut out = [0.0; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = self.at(row, col);
            }
        }
        Self::new(out)
    }

    /// Multiplies the matrix with another matrix (`self * rhs`).
    pub fn multiply(&self, rhs: &Self) -> Self {
        let mut out = [0.0; 9];
        for row in 0..3 {
            for col in 0..3 {
                let mut sum = 0.0;
                for k in 0..3 {
                    sum += self.at(row, k) * rhs.at(k, col);
                }
                out[col * 3 + row] = sum;
            }
        }
        Self::new(out)
    }

    /// Transforms a vector (`self * v`).
    pub fn transform(&self, v: &Vec3) -> Vec3 {
        let [x, y, z] = v.to_array();
        Vec3::new(
            self.at(0, 0) * x + self.at(0, 1) * y + self.at(0, 2) * z,
            self.at(1, 0) * x + self.at(1, 1) * y + self.at(1, 2) * z,
            self.at(2, 0) * x + self.at(2, 1) * y + self.at(2, 2) * z,
        )
    }

    /// Determinant.
    pub fn determinant(&self) -> f32 {
        let c0 = self.column(0);
        let c1 = self.column(1);
        let c2 = self.column(2);
        c0.dot(&c1.cross(&c2))
    }

    /// Inverse, or `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() <= EPSILON * EPSILON {
            return None;
        }
        let c0 = self.column(0);
        let c1 = self.column(1);
        let c2 = self.column(2);
        // Rows of the inverse are the cross products of the columns.
        let r0 = c1.cross(&c2).scale(1.0 / det);
        let r1 = c2.cross(&c0).scale(1.0 / det);
        let r2 = c0.cross(&c1).scale(1.0 / det);
        Some(Self::from_columns(&r0, &r1, &r2).transpose())
    }
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl core::ops::Mul for Mat3 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        self.multiply(&rhs)
    }
}

impl core::ops::Mul<Vec3> for Mat3 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Self::Output {
        self.transform(&rhs)
    }
}
