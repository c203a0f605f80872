// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Broad-phase interfaces and the dynamic AABB tree.
//!
//! Contract (applies to all implementations used here):
//! - Pair identity is canonicalized as `(min_key, max_key)`.
//! - The emitted pair list is strictly sorted lexicographically by that tuple.
//! - Overlap is inclusive on faces (touching boxes are considered overlapping).

#[doc = "Dynamic AABB tree with fat leaves and the `BroadPhase` trait."]
pub mod aabb_tree;
