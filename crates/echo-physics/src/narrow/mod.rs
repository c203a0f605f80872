// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Narrow phase: exact contacts for broad-phase pairs, predictive contacts
//! for fast bodies and exact ray casts.
//!
//! Numerical failures (GJK/EPA/CCD running out of iterations, degenerate
//! simplices) never abort a step. The affected contact is dropped and a
//! warning is logged once every `failure_log_interval` failures.

mod algorithm;
mod ccd;
mod epa;
mod gjk;
mod simplex;

use core::fmt;
use std::collections::BTreeMap;

use echo_geom::shape::ShapeKind;
use echo_geom::temporal::timespan::Timespan;
use echo_geom::{Aabb, CollisionShape, ConvexObject, Pose, Ray};
use echo_math::Vec3;
use thiserror::Error;
use tracing::{debug, warn};

pub use algorithm::{select, AlgorithmKind, CollisionAlgorithm, CollisionObject};
pub use ccd::{ContinuousCollision, ContinuousCollisionResult, TemporalObject};
pub use epa::{Epa, EpaContact};
pub use gjk::{Gjk, GjkResult};
pub use simplex::{Simplex, SupportMapping};

use algorithm::DetectionContext;

use crate::body::{BodyKind, ObjectId, WorkBody};
use crate::broad_phase::BroadPhaseManager;
use crate::config::{NarrowPhaseConfig, PoolConfig};
use crate::error::PhysicsError;
use crate::manifold::{DetectedContact, ManifoldResult};
use crate::pair::{OverlappingPair, PairKey};
use crate::pool::Pool;

/// Iterative query that did not produce a usable answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NumericalFailure {
    /// GJK hit its iteration cap.
    #[error("GJK did not converge")]
    Gjk,
    /// EPA hit its iteration cap.
    #[error("EPA did not converge")]
    Epa,
    /// EPA could not build a polytope around the origin.
    #[error("EPA polytope is degenerate")]
    EpaDegenerate,
    /// Continuous collision hit its iteration cap.
    #[error("continuous collision did not converge")]
    Ccd,
}

#[derive(Debug)]
struct FailureLog {
    interval: u64,
    count: u64,
}

impl FailureLog {
    fn record(&mut self, failure: NumericalFailure, subject: impl fmt::Display) {
        self.count += 1;
        if (self.count - 1) % self.interval == 0 {
            warn!(%subject, %failure, occurrences = self.count, "contact dropped for this step");
        }
    }
}

/// Exact intersection of a ray with a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Body hit.
    pub body: ObjectId,
    /// Fraction of the ray (`0..=1`) at the hit.
    pub time_to_hit: f32,
    /// Surface normal of the body at the hit.
    pub normal: Vec3,
    /// Hit point on the body.
    pub point: Vec3,
}

/// Narrow-phase state: pooled algorithms, per-step convex objects and the
/// iterative solvers.
#[derive(Debug)]
pub struct NarrowPhase {
    contact_breaking_threshold: f32,
    gjk: Gjk,
    epa: Epa,
    ccd: ContinuousCollision,
    algorithms: Pool<CollisionAlgorithm>,
    objects: Pool<ConvexObject>,
    failures: FailureLog,
}

fn convex_parts(shape: &CollisionShape, pose: &Pose) -> Result<Vec<ConvexObject>, PhysicsError> {
    match shape.kind() {
        ShapeKind::Compound { children } => children
            .iter()
            .map(|c| Ok(c.shape.to_convex_object(&pose.compose(&c.pose))?))
            .collect(),
        ShapeKind::Heightfield(_) => Ok(Vec::new()),
        _ => Ok(vec![shape.to_convex_object(pose)?]),
    }
}

/// Convex pieces of `shape` at `pose` that may meet something inside the
/// world-space `region`.
fn target_parts(
    shape: &CollisionShape,
    pose: &Pose,
    region: &Aabb,
) -> Result<Vec<ConvexObject>, PhysicsError> {
    if let ShapeKind::Heightfield(heightfield) = shape.kind() {
        let local = region.transformed(&pose.inverse().to_mat4());
        return Ok(heightfield
            .triangles_in_aabb(&local)
            .into_iter()
            .map(|t| ConvexObject::Triangle {
                points: t.map(|p| pose.transform_point(&p)),
            })
            .collect());
    }
    convex_parts(shape, pose)
}

impl NarrowPhase {
    /// Narrow phase sized by `pools`.
    pub fn new(config: &NarrowPhaseConfig, pools: &PoolConfig) -> Self {
        Self {
            contact_breaking_threshold: config.contact_breaking_threshold,
            gjk: Gjk::new(config.gjk),
            epa: Epa::new(config.epa),
            ccd: ContinuousCollision::new(config.ccd),
            algorithms: Pool::new("collision algorithms", pools.algorithm_pool_size),
            objects: Pool::new("convex objects", pools.object_pool_size),
            failures: FailureLog {
                interval: u64::from(config.failure_log_interval.max(1)),
                count: 0,
            },
        }
    }

    /// Numerical failures seen so far.
    pub fn failure_count(&self) -> u64 {
        self.failures.count
    }

    /// Live cached algorithms.
    pub fn algorithm_count(&self) -> usize {
        self.algorithms.len()
    }

    /// Returns the algorithms of pairs the broad phase dropped.
    pub(crate) fn release_pairs(&mut self, removed: Vec<OverlappingPair>) {
        for mut pair in removed {
            pair.release(&mut self.algorithms);
        }
    }

    /// Runs the cached (or newly selected) algorithm of every pair with an
    /// active body and appends the non-empty manifolds to `out`.
    pub(crate) fn process_pairs<'p>(
        &mut self,
        pairs: impl Iterator<Item = &'p mut OverlappingPair>,
        bodies: &BTreeMap<ObjectId, WorkBody>,
        out: &mut Vec<ManifoldResult>,
    ) -> Result<(), PhysicsError> {
        self.objects.clear();
        for pair in pairs {
            let (Some(body1), Some(body2)) = (bodies.get(&pair.body1()), bodies.get(&pair.body2()))
            else {
                continue;
            };
            if !body1.is_active() && !body2.is_active() {
                continue;
            }
            let key = pair.key();
            let handle = match pair.algorithm() {
                Some(handle) if self.algorithms.get(handle).is_some() => handle,
                _ => {
                    let Some((kind, swapped)) = select(body1.shape(), body2.shape()) else {
                        debug!(%key, "no collision algorithm for two concave shapes");
                        continue;
                    };
                    let manifold = ManifoldResult::new(
                        body1.id(),
                        body1.pose(),
                        body2.id(),
                        body2.pose(),
                        self.contact_breaking_threshold,
                    )
                    .with_pair(key);
                    let handle = self
                        .algorithms
                        .alloc(CollisionAlgorithm::new(kind, swapped, manifold))?;
                    pair.set_algorithm(handle);
                    handle
                }
            };
            let Some(algorithm) = self.algorithms.get_mut(handle) else {
                continue;
            };

            let mut ctx = DetectionContext {
                gjk: self.gjk,
                epa: self.epa,
                contact_breaking_threshold: self.contact_breaking_threshold,
                objects: &mut self.objects,
                failures: Vec::new(),
            };
            algorithm.process_collision(
                &CollisionObject {
                    shape: body1.shape(),
                    pose: body1.pose(),
                },
                &CollisionObject {
                    shape: body2.shape(),
                    pose: body2.pose(),
                },
                &mut ctx,
            )?;
            for failure in ctx.failures {
                self.failures.record(failure, key);
            }
            if algorithm.manifold().contact_count() > 0 {
                out.push(algorithm.manifold().clone());
            }
        }
        Ok(())
    }

    /// Copies solver impulses back to the persistent manifolds for warm
    /// starting.
    pub(crate) fn store_accumulated(
        &mut self,
        pairs: &BTreeMap<PairKey, OverlappingPair>,
        manifolds: &[ManifoldResult],
    ) {
        for manifold in manifolds {
            let Some(handle) = manifold
                .pair()
                .and_then(|key| pairs.get(&key))
                .and_then(OverlappingPair::algorithm)
            else {
                continue;
            };
            let Some(algorithm) = self.algorithms.get_mut(handle) else {
                continue;
            };
            let persistent = algorithm.manifold_mut();
            for (index, contact) in manifold.contacts().iter().enumerate() {
                persistent.set_accumulated(index, contact.accumulated);
            }
        }
    }

    /// Adds a speculative contact for every active rigid body moving faster
    /// than its CCD threshold and about to hit something this step.
    pub(crate) fn process_predictive_contacts(
        &mut self,
        dt: f32,
        bodies: &BTreeMap<ObjectId, WorkBody>,
        broad_phase: &BroadPhaseManager,
        out: &mut Vec<ManifoldResult>,
    ) -> Result<(), PhysicsError> {
        for body in bodies.values() {
            if body.kind() != BodyKind::Rigid || body.is_static() || !body.is_active() {
                continue;
            }
            let from = body.pose();
            let to = from.integrate(&body.linear_velocity(), &body.angular_velocity(), dt);
            let motion = to.position().sub(&from.position());
            if motion.length() <= body.ccd_motion_threshold() {
                continue;
            }
            let Some((hit, other)) = self.earliest_hit(body, &to, bodies, broad_phase)? else {
                continue;
            };
            let depth = motion.scale(hit.time_to_hit).dot(&-hit.normal_from_b);
            let mut manifold = ManifoldResult::new(
                body.id(),
                from,
                other.id(),
                other.pose(),
                self.contact_breaking_threshold,
            );
            manifold.add_predictive_contact(&DetectedContact {
                normal_from_b: hit.normal_from_b,
                point_on_b: hit.hit_point_on_b,
                depth,
            });
            debug!(body = %body.id(), other = %other.id(), time_to_hit = hit.time_to_hit, "predictive contact");
            out.push(manifold);
        }
        Ok(())
    }

    /// First non-ghost body that `body` meets while translating from its
    /// current pose to `to`.
    pub(crate) fn earliest_hit<'b>(
        &mut self,
        body: &WorkBody,
        to: &Pose,
        bodies: &'b BTreeMap<ObjectId, WorkBody>,
        broad_phase: &BroadPhaseManager,
    ) -> Result<Option<(ContinuousCollisionResult, &'b WorkBody)>, PhysicsError> {
        let from = body.pose();
        let motion = to.position().sub(&from.position());
        let swept = Timespan::from_poses(&from, to).swept_aabb(&body.shape().local_aabb());
        let moving: Vec<TemporalObject> = convex_parts(body.shape(), &from)?
            .into_iter()
            .map(|o| TemporalObject::new(o, motion))
            .collect();

        let mut earliest: Option<(ContinuousCollisionResult, &'b WorkBody)> = None;
        for candidate in broad_phase.body_test(body.id(), body.shape(), &from, to) {
            let Some(other) = bodies.get(&candidate) else {
                continue;
            };
            if other.kind() == BodyKind::Ghost {
                continue;
            }
            let key = PairKey::new(body.id(), other.id());
            for target in target_parts(other.shape(), &other.pose(), &swept)? {
                let target = TemporalObject::stationary(target);
                for piece in &moving {
                    match self.ccd.time_of_impact(piece, &target) {
                        Ok(Some(hit))
                            if earliest
                                .as_ref()
                                .is_none_or(|(best, _)| hit.time_to_hit < best.time_to_hit) =>
                        {
                            earliest = Some((hit, other));
                        }
                        Ok(_) => {}
                        Err(failure) => self.failures.record(failure, key),
                    }
                }
            }
        }
        Ok(earliest)
    }

    /// Exact ray test against `candidates`, closest hit first.
    pub(crate) fn ray_test(
        &mut self,
        ray: &Ray,
        candidates: &[ObjectId],
        bodies: &BTreeMap<ObjectId, WorkBody>,
    ) -> Result<Vec<RayHit>, PhysicsError> {
        let ray_point = CollisionShape::sphere(0.0)?.to_convex_object(&Pose::from_position(ray.start()))?;
        let ray_point = TemporalObject::new(ray_point, ray.end().sub(&ray.start()));
        let region = Aabb::new(ray.start(), ray.end());

        let mut hits = Vec::new();
        for id in candidates {
            let Some(body) = bodies.get(id) else {
                continue;
            };
            let mut best: Option<ContinuousCollisionResult> = None;
            for target in target_parts(body.shape(), &body.pose(), &region)? {
                match self.ccd.time_of_impact(&ray_point, &TemporalObject::stationary(target)) {
                    Ok(Some(hit)) if best.is_none_or(|b| hit.time_to_hit < b.time_to_hit) => {
                        best = Some(hit);
                    }
                    Ok(_) => {}
                    Err(failure) => self.failures.record(failure, id),
                }
            }
            if let Some(hit) = best {
                hits.push(RayHit {
                    body: *id,
                    time_to_hit: hit.time_to_hit,
                    normal: hit.normal_from_b,
                    point: hit.hit_point_on_b,
                });
            }
        }
        hits.sort_by(|a, b| a.time_to_hit.total_cmp(&b.time_to_hit));
        Ok(hits)
    }
}
