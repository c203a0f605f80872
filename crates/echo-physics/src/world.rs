// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The physics world and its cross-thread handle.
//!
//! [`PhysicsWorld`] owns all simulation state and is `Send` but not `Sync`:
//! one thread drives [`PhysicsWorld::process`] and nothing else can touch the
//! state while it runs. Other threads talk to the world through a
//! [`WorldHandle`], which only reaches the body queue and the broad-phase tree
//! published after each step.

use core::cell::Cell;
use core::marker::PhantomData;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError};

use echo_geom::temporal::timespan::Timespan;
use echo_geom::{Pose, Ray};
use echo_math::Vec3;
use tracing::{debug, trace};

use crate::body::{Body, BodyEvent, BodyQueue, BodyStore, ObjectId, WorkBody};
use crate::broad_phase::{BroadPhaseManager, SharedTree};
use crate::config::{ConfigService, ConfigStore, PhysicsConfig};
use crate::error::PhysicsError;
use crate::integrate::{IntegrateTransformManager, IntegrateVelocityManager};
use crate::island::IslandManager;
use crate::manifold::ManifoldResult;
use crate::narrow::{NarrowPhase, RayHit};
use crate::solver::ConstraintSolver;

/// Counters of the last step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Live bodies.
    pub bodies: usize,
    /// Overlapping broad-phase pairs.
    pub pairs: usize,
    /// Manifolds with at least one contact, predictive ones included.
    pub manifolds: usize,
    /// Contact constraints solved.
    pub constraints: usize,
    /// Islands among the active bodies.
    pub islands: usize,
}

/// Cloneable, thread-safe access to a running world.
#[derive(Clone)]
pub struct WorldHandle {
    queue: BodyQueue,
    tree: SharedTree,
}

impl WorldHandle {
    /// Queues `body` for the next step.
    pub fn add_body(&self, body: Arc<Body>) -> Result<(), PhysicsError> {
        self.queue.add_body(body)
    }

    /// Queues the removal of `body` for the next step.
    pub fn remove_body(&self, body: &Arc<Body>) -> Result<(), PhysicsError> {
        self.queue.remove_body(body)
    }

    /// Bodies whose fat box the ray crosses, as of the last step.
    pub fn ray_test(&self, ray: &Ray) -> Vec<ObjectId> {
        self.tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ray_test(ray)
    }

    /// Bodies whose fat box meets the box `body` sweeps from `from` to `to`,
    /// as of the last step. `body` itself is never reported.
    pub fn body_test(&self, body: &Body, from: &Pose, to: &Pose) -> Vec<ObjectId> {
        let swept = Timespan::from_poses(from, to).swept_aabb(&body.shape().local_aabb());
        let mut hits = self
            .tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .query_aabb(&swept);
        if let Some(id) = body.object_id() {
            hits.retain(|hit| *hit != id);
        }
        hits
    }
}

/// Rigid-body world: collision detection, contact solving and sleeping.
pub struct PhysicsWorld {
    config: PhysicsConfig,
    store: BodyStore,
    bodies: BTreeMap<ObjectId, WorkBody>,
    broad_phase: BroadPhaseManager,
    narrow_phase: NarrowPhase,
    solver: ConstraintSolver,
    islands: IslandManager,
    velocity: IntegrateVelocityManager,
    transform: IntegrateTransformManager,
    last_manifolds: Vec<ManifoldResult>,
    last_report: StepReport,
    _single_thread: PhantomData<Cell<()>>,
}

impl PhysicsWorld {
    /// World running with `config`.
    pub fn new(config: PhysicsConfig) -> Result<Self, PhysicsError> {
        config.validate()?;
        let mut store = BodyStore::new();
        let broad_phase = BroadPhaseManager::new(config.broad_phase, store.subscribe());
        Ok(Self {
            narrow_phase: NarrowPhase::new(&config.narrow_phase, &config.pools),
            solver: ConstraintSolver::new(config.solver),
            islands: IslandManager::new(config.island),
            velocity: IntegrateVelocityManager,
            transform: IntegrateTransformManager,
            store,
            bodies: BTreeMap::new(),
            broad_phase,
            last_manifolds: Vec::new(),
            last_report: StepReport::default(),
            _single_thread: PhantomData,
            config,
        })
    }

    /// World configured from the startup settings held by `service`.
    pub fn from_config<S: ConfigStore>(service: &ConfigService<S>) -> Result<Self, PhysicsError> {
        Self::new(service.load_physics()?)
    }

    /// Active settings.
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Handle for other threads.
    pub fn handle(&self) -> WorldHandle {
        WorldHandle {
            queue: self.store.queue(),
            tree: self.broad_phase.published_tree(),
        }
    }

    /// Queues `body` for the next step.
    pub fn add_body(&self, body: Arc<Body>) -> Result<(), PhysicsError> {
        self.store.queue().add_body(body)
    }

    /// Queues the removal of `body` for the next step.
    pub fn remove_body(&self, body: &Arc<Body>) -> Result<(), PhysicsError> {
        self.store.queue().remove_body(body)
    }

    /// Simulation copy of the body with id `id`.
    pub fn work_body(&self, id: ObjectId) -> Option<&WorkBody> {
        self.bodies.get(&id)
    }

    /// Number of bodies in the simulation.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Broad phase (pairs, world boundary, box queries).
    pub fn broad_phase(&self) -> &BroadPhaseManager {
        &self.broad_phase
    }

    /// Narrow phase (pool usage, failure counters).
    pub fn narrow_phase(&self) -> &NarrowPhase {
        &self.narrow_phase
    }

    /// Manifolds of the last step, valid until the next call to
    /// [`PhysicsWorld::process`].
    pub fn last_updated_manifold_results(&self) -> &[ManifoldResult] {
        &self.last_manifolds
    }

    /// Counters of the last step.
    pub fn last_report(&self) -> StepReport {
        self.last_report
    }

    /// Exact ray cast against the current body poses, closest hit first.
    pub fn ray_cast(&mut self, ray: &Ray) -> Result<Vec<RayHit>, PhysicsError> {
        let candidates = self.broad_phase.ray_test(ray);
        self.narrow_phase.ray_test(ray, &candidates, &self.bodies)
    }

    /// Advances the world by exactly `dt` seconds under `gravity`.
    ///
    /// Order: body refresh, broad phase, velocity integration, narrow phase,
    /// contact solve, islands, transform integration.
    pub fn process(&mut self, dt: f32, gravity: Vec3) -> Result<StepReport, PhysicsError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(PhysicsError::InvalidArgument(format!("time step must be > 0, got {dt}")));
        }
        if !gravity.is_finite() {
            return Err(PhysicsError::InvalidArgument(format!("gravity must be finite, got {gravity:?}")));
        }
        self.refresh_bodies();

        let removed = self.broad_phase.synchronize(&mut self.bodies);
        self.narrow_phase.release_pairs(removed);

        self.velocity.integrate(dt, &gravity, &mut self.bodies);

        let mut manifolds = Vec::new();
        self.narrow_phase
            .process_pairs(self.broad_phase.pairs_mut(), &self.bodies, &mut manifolds)?;
        self.narrow_phase.process_predictive_contacts(
            dt,
            &self.bodies,
            &self.broad_phase,
            &mut manifolds,
        )?;

        let solved = self.solver.solve(dt, &mut self.bodies, &mut manifolds);
        self.narrow_phase
            .store_accumulated(self.broad_phase.pair_map(), &manifolds);

        let islands = self
            .islands
            .refresh_body_active_state(&mut self.bodies, &manifolds)?;

        self.transform
            .integrate(dt, &mut self.bodies, &mut self.narrow_phase, &self.broad_phase)?;

        for body in self.store.bodies() {
            if let Some(work) = body.object_id().and_then(|id| self.bodies.get(&id)) {
                work.push_to(body);
            }
        }

        self.last_report = StepReport {
            bodies: self.bodies.len(),
            pairs: self.broad_phase.pair_count(),
            manifolds: manifolds.len(),
            constraints: solved.constraints,
            islands: islands.islands,
        };
        self.last_manifolds = manifolds;
        trace!(report = ?self.last_report, "step done");
        Ok(self.last_report)
    }

    fn refresh_bodies(&mut self) {
        let factor = self.config.narrow_phase.ccd.motion_threshold_factor;
        for event in self.store.refresh() {
            match event {
                BodyEvent::Added { id, body } => {
                    self.bodies.insert(id, WorkBody::new(id, &body, factor));
                }
                BodyEvent::Removed { id, body } => {
                    self.bodies.remove(&id);
                    debug!(body = body.name(), %id, "work body dropped");
                }
            }
        }
        for body in self.store.bodies() {
            if let Some(work) = body.object_id().and_then(|id| self.bodies.get_mut(&id)) {
                work.pull_from(body);
            }
        }
    }
}
