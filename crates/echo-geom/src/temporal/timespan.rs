// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use crate::types::{aabb::Aabb, pose::Pose, transform::Transform};

/// Start and end transforms bounding one step of motion.
///
/// `swept_aabb` unions the shape's bounds at three sample poses: start,
/// midpoint and end. Pure translations are covered exactly; the midpoint
/// sample catches protrusions of off-centre rotations that a start/end union
/// misses.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Timespan {
    start: Transform,
    end: Transform,
}

impl Timespan {
    /// Creates a new `Timespan` from start and end transforms.
    pub const fn new(start: Transform, end: Transform) -> Self {
        Self { start, end }
    }

    /// Unscaled span between two poses.
    pub fn from_poses(start: &Pose, end: &Pose) -> Self {
        Self::new(Transform::from_pose(start), Transform::from_pose(end))
    }

    /// Returns the start transform.
    pub const fn start(&self) -> Transform {
        self.start
    }

    /// Returns the end transform.
    pub const fn end(&self) -> Transform {
        self.end
    }

    /// Conservative AABB of a shape with local bounds `local` over the span.
    pub fn swept_aabb(&self, local: &Aabb) -> Aabb {
        let a0 = local.transformed(&self.start.to_mat4());
        let a1 = local.transformed(&self.end.to_mat4());
        let am = local.transformed(&self.start.midpoint(&self.end).to_mat4());
        a0.union(&a1).union(&am)
    }
}
