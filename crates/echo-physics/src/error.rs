// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use echo_geom::GeomError;
use thiserror::Error;

use crate::body::ObjectId;
use crate::config::ConfigError;
use crate::pool::PoolError;

/// Errors surfaced by the physics pipeline.
///
/// Numerical non-convergence never shows up here: GJK/EPA failures drop the
/// affected contact for one step and are only logged.
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// A caller broke an API contract (bad argument, wrong state).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The body was never admitted into this world.
    #[error("unknown body: {0}")]
    UnknownBody(String),
    /// The body has an id but the simulation holds no record for it.
    #[error("no body with id {0}")]
    MissingBody(ObjectId),
    /// A fixed-size pool ran out of slots; pool sizes are too small.
    #[error(transparent)]
    PoolExhausted(#[from] PoolError),
    /// Island elements were merged after being sorted for the step.
    #[error("island set is already sorted; merging is no longer allowed")]
    IslandsSorted,
    /// Startup configuration could not be loaded or is invalid.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    /// Shape construction or conversion failed.
    #[error("geometry: {0}")]
    Geom(#[from] GeomError),
}
