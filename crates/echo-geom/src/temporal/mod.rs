// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Temporal helpers used by swept queries and continuous collision.

#[doc = "Start/end transforms over a step and swept AABB computation."]
pub mod timespan;
