// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use echo_math::Vec3;

/// Finite ray expressed as the segment `from -> to`.
///
/// Hit fractions reported against a ray are in `[0, 1]` along the segment.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    from: Vec3,
    to: Vec3,
}

impl Ray {
    /// Creates a ray travelling from `from` to `to`.
    pub const fn new(from: Vec3, to: Vec3) -> Self {
        Self { from, to }
    }

    /// Start point.
    pub fn start(&self) -> Vec3 {
        self.from
    }

    /// End point.
    pub fn end(&self) -> Vec3 {
        self.to
    }

    /// Unnormalised direction `to - from`.
    pub fn direction(&self) -> Vec3 {
        self.to.sub(&self.from)
    }

    /// Segment length.
    pub fn length(&self) -> f32 {
        self.direction().length()
    }

    /// Point at fraction `t` along the segment.
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.from.lerp(&self.to, t)
    }
}
