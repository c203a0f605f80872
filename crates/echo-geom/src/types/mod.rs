// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Core geometry types used by the physics pipeline.
//!
//! - Overlap semantics are inclusive on faces to avoid pair churn on contact
//!   boundaries.
//! - `Pose` is the rigid (unscaled) transform used by collision code;
//!   `Transform` adds non-uniform scale for bounding-volume work.

#[doc = "Axis-aligned bounding boxes (world space)."]
pub mod aabb;
#[doc = "Rigid position + orientation poses."]
pub mod pose;
#[doc = "Line segments used for ray casts."]
pub mod ray;
#[doc = "Rigid transforms with non-uniform scale."]
pub mod transform;
