// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![doc = r"Geometry primitives for the Echo physics pipeline.

This crate provides:
- Axis-aligned bounding boxes (`Aabb`), rays, scaled transforms and rigid poses.
- Closed collision-shape variants (`CollisionShape`) and their world-space
  convex counterparts (`ConvexObject`) exposing support mapping for GJK/EPA.
- A dynamic AABB tree with fat leaves and surface-area-heuristic insertion.
- Swept bounds over a motion window (`Timespan`).

Design notes:
- Float32 throughout.
- Pair output from the broad phase is canonical: `(a, b)` with `a < b`, sorted.
- Overlap is inclusive on faces so resting contacts do not churn pairs.
"]

/// Broad-phase trait and the dynamic AABB tree.
pub mod broad;
/// Collision shapes and world-space convex objects.
pub mod shape;
/// Time-aware utilities for swept bounds.
pub mod temporal;
/// Foundational geometric types.
pub mod types;

use thiserror::Error;

pub use broad::aabb_tree::{AabbTree, BroadPhase};
pub use shape::convex::ConvexObject;
pub use shape::{Axis, CollisionShape, ConeOrientation, LocalizedShape, ShapeCategory, ShapeType};
pub use types::aabb::Aabb;
pub use types::pose::Pose;
pub use types::ray::Ray;
pub use types::transform::Transform;

/// Errors raised when geometry is constructed from invalid input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeomError {
    /// A dimension was negative, NaN or infinite.
    #[error("invalid dimension for {shape}: {detail}")]
    InvalidDimension {
        /// Shape family being constructed.
        shape: &'static str,
        /// Human-readable description of the offending value.
        detail: String,
    },
    /// The operation needs a convex shape.
    #[error("shape {0:?} is not convex")]
    NotConvex(ShapeType),
    /// A shape that needs at least one element was given none.
    #[error("{0} requires at least one element")]
    Empty(&'static str),
}
