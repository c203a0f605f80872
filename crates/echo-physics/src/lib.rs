// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! echo-physics: rigid-body collision detection and contact resolution.
//!
//! One call to [`PhysicsWorld::process`] advances the simulation by a fixed
//! step:
//!
//! 1. queued body additions and removals are applied;
//! 2. the AABB-tree broad phase refreshes the overlapping pairs;
//! 3. gravity, damping and pending momenta update velocities;
//! 4. the narrow phase (GJK, EPA, continuous collision) builds manifolds;
//! 5. the sequential-impulse solver resolves the contacts;
//! 6. islands of resting bodies fall asleep, contacts wake them up;
//! 7. poses are integrated, clamped by continuous collision for fast bodies.
//!
//! The world is driven from a single thread. Bodies are shared with the
//! application as `Arc<Body>` and other threads reach the world through a
//! [`WorldHandle`].
#![forbid(unsafe_code)]

/// Bodies, the body store and its cross-thread queue.
pub mod body;
/// Broad phase over the dynamic AABB tree.
pub mod broad_phase;
/// Startup configuration.
pub mod config;
mod error;
/// Velocity and transform integration.
pub mod integrate;
/// Island union-find and sleeping.
pub mod island;
/// Persistent contact manifolds.
pub mod manifold;
/// Collision algorithms and their iterative solvers.
pub mod narrow;
/// Overlapping pairs and their keys.
pub mod pair;
/// Fixed-capacity slab pool with generation-checked handles.
pub mod pool;
/// Sequential-impulse contact solver.
pub mod solver;
mod world;

pub use body::{Body, BodyKind, BodyQueue, ObjectId, WorkBody};
pub use broad_phase::BroadPhaseManager;
pub use config::{ConfigError, ConfigService, ConfigStore, FsConfigStore, MemoryConfigStore, PhysicsConfig};
pub use error::PhysicsError;
pub use manifold::{AccumulatedSolvingData, ManifoldContactPoint, ManifoldResult};
pub use narrow::{NumericalFailure, RayHit};
pub use pair::{OverlappingPair, PairKey};
pub use world::{PhysicsWorld, StepReport, WorldHandle};
