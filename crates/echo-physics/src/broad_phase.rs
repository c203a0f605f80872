// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Broad phase: fat-box AABB tree, persistent overlapping pairs and the
//! world boundary.
//!
//! Body admission and removal reach the broad phase through its own event
//! channel, subscribed on the [`BodyStore`](crate::body::BodyStore). Events
//! are drained at the start of [`BroadPhaseManager::synchronize`], before the
//! tree is touched. A removed body stays referenced by its event until its
//! leaf is detached.
//!
//! After every synchronisation a copy of the tree is published behind an
//! `RwLock`, so other threads can run box-level ray and swept queries while
//! the simulation step is running.

use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, PoisonError, RwLock};

use echo_geom::temporal::timespan::Timespan;
use echo_geom::{AabbTree, BroadPhase, CollisionShape, Pose, Ray};
use tracing::{debug, warn};

use crate::body::{BodyEvent, ObjectId, WorkBody};
use crate::config::BroadPhaseConfig;
use crate::pair::{OverlappingPair, PairKey};

/// Lift above the boundary given to a body that fell out of the world.
const BOUNDARY_CLEARANCE: f32 = 0.01;

/// Tree snapshot shared with query threads.
pub type SharedTree = Arc<RwLock<AabbTree<ObjectId>>>;

/// Owns the AABB tree and the overlapping pairs between steps.
#[derive(Debug)]
pub struct BroadPhaseManager {
    config: BroadPhaseConfig,
    tree: AabbTree<ObjectId>,
    published: SharedTree,
    body_events: Receiver<BodyEvent>,
    pairs: BTreeMap<PairKey, OverlappingPair>,
    min_y_boundary: Option<f32>,
}

impl BroadPhaseManager {
    /// Broad phase fed by `body_events`.
    pub fn new(config: BroadPhaseConfig, body_events: Receiver<BodyEvent>) -> Self {
        Self {
            config,
            tree: AabbTree::new(config.fat_margin),
            published: Arc::new(RwLock::new(AabbTree::new(config.fat_margin))),
            body_events,
            pairs: BTreeMap::new(),
            min_y_boundary: None,
        }
    }

    /// Brings the tree and the pair set up to date with `bodies`.
    ///
    /// Returns the pairs that stopped overlapping; their cached algorithms
    /// must go back to the narrow-phase pool.
    pub(crate) fn synchronize(
        &mut self,
        bodies: &mut BTreeMap<ObjectId, WorkBody>,
    ) -> Vec<OverlappingPair> {
        self.drain_body_events(bodies);
        if self.min_y_boundary.is_none() {
            self.min_y_boundary = self.compute_world_boundary(bodies);
        }
        self.control_boundaries(bodies);
        for body in bodies.values() {
            self.tree.upsert(body.id(), body.aabb());
        }
        let removed = self.refresh_pairs();
        self.published
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clone_from(&self.tree);
        removed
    }

    fn drain_body_events(&mut self, bodies: &BTreeMap<ObjectId, WorkBody>) {
        for event in self.body_events.try_iter() {
            match event {
                BodyEvent::Added { id, .. } => {
                    if let Some(body) = bodies.get(&id) {
                        self.tree.upsert(id, body.aabb());
                    }
                }
                BodyEvent::Removed { id, body } => {
                    if self.tree.remove(id) {
                        debug!(body = body.name(), %id, "leaf detached");
                    }
                    drop(body);
                }
            }
        }
    }

    /// Lowest body bound minus a margin proportional to the scene height.
    /// `None` while the world is empty.
    fn compute_world_boundary(&self, bodies: &BTreeMap<ObjectId, WorkBody>) -> Option<f32> {
        let (min_y, max_y) = bodies.values().map(WorkBody::aabb).fold(None, |acc, aabb| {
            let (lo, hi) = acc.unwrap_or((f32::MAX, f32::MIN));
            Some((lo.min(aabb.min().y()), hi.max(aabb.max().y())))
        })?;
        let boundary = min_y - (max_y - min_y) * self.config.world_boundary_margin_percentage;
        debug!(boundary, "world boundary computed");
        Some(boundary)
    }

    /// Freezes dynamic bodies that fell entirely below the world boundary.
    fn control_boundaries(&self, bodies: &mut BTreeMap<ObjectId, WorkBody>) {
        let Some(boundary) = self.min_y_boundary else {
            return;
        };
        for body in bodies.values_mut().filter(|b| b.is_dynamic()) {
            let aabb = body.aabb();
            if aabb.max().y() >= boundary {
                continue;
            }
            warn!(body = %body.id(), boundary, "body fell below the world boundary and is now static");
            let position = body.pose.position();
            let lifted = boundary + aabb.half_extents().y() + BOUNDARY_CLEARANCE;
            body.pose = body.pose.with_position(position.with_component(1, lifted));
            body.make_static();
        }
    }

    fn refresh_pairs(&mut self) -> Vec<OverlappingPair> {
        let mut current: BTreeMap<PairKey, OverlappingPair> = self
            .tree
            .pairs()
            .into_iter()
            .map(|(a, b)| {
                let key = PairKey::new(a, b);
                let pair = self
                    .pairs
                    .remove(&key)
                    .unwrap_or_else(|| OverlappingPair::new(a, b));
                (key, pair)
            })
            .collect();
        core::mem::swap(&mut self.pairs, &mut current);
        current.into_values().collect()
    }

    /// Current overlapping pairs, ordered by key.
    pub fn pairs(&self) -> impl Iterator<Item = &OverlappingPair> {
        self.pairs.values()
    }

    pub(crate) fn pairs_mut(&mut self) -> impl Iterator<Item = &mut OverlappingPair> {
        self.pairs.values_mut()
    }

    pub(crate) fn pair_map(&self) -> &BTreeMap<PairKey, OverlappingPair> {
        &self.pairs
    }

    /// Number of overlapping pairs.
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// World boundary on the y axis, once computed.
    pub fn world_boundary(&self) -> Option<f32> {
        self.min_y_boundary
    }

    /// Bodies whose fat box the ray crosses, closest first.
    pub fn ray_test(&self, ray: &Ray) -> Vec<ObjectId> {
        self.tree.ray_test(ray)
    }

    /// Bodies whose fat box meets the box swept by `shape` from `from` to
    /// `to`. `body` itself is excluded.
    pub fn body_test(&self, body: ObjectId, shape: &CollisionShape, from: &Pose, to: &Pose) -> Vec<ObjectId> {
        let swept = Timespan::from_poses(from, to).swept_aabb(&shape.local_aabb());
        let mut hits = self.tree.query_aabb(&swept);
        hits.retain(|id| *id != body);
        hits
    }

    /// Handle on the tree copy published after each synchronisation.
    pub fn published_tree(&self) -> SharedTree {
        Arc::clone(&self.published)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use echo_geom::{CollisionShape, Pose};
    use echo_math::Vec3;

    use super::*;
    use crate::body::{Body, BodyStore};
    use crate::config::PhysicsConfig;

    struct Scene {
        store: BodyStore,
        broad: BroadPhaseManager,
        bodies: BTreeMap<ObjectId, WorkBody>,
    }

    impl Scene {
        fn new() -> Self {
            let mut store = BodyStore::new();
            let broad = BroadPhaseManager::new(PhysicsConfig::default().broad_phase, store.subscribe());
            Self {
                store,
                broad,
                bodies: BTreeMap::new(),
            }
        }

        fn add(&mut self, body: &Arc<Body>) {
            self.store.queue().add_body(Arc::clone(body)).unwrap();
        }

        fn step(&mut self) -> Vec<OverlappingPair> {
            for event in self.store.refresh() {
                match event {
                    BodyEvent::Added { id, body } => {
                        self.bodies.insert(id, WorkBody::new(id, &body, 0.4));
                    }
                    BodyEvent::Removed { id, .. } => {
                        self.bodies.remove(&id);
                    }
                }
            }
            self.broad.synchronize(&mut self.bodies)
        }
    }

    fn cube(name: &str, at: Vec3) -> Arc<Body> {
        Body::rigid(name, Pose::from_position(at), CollisionShape::cuboid(Vec3::ONE).unwrap())
    }

    #[test]
    fn empty_and_single_body_worlds_have_no_pairs() {
        let mut scene = Scene::new();
        assert!(scene.step().is_empty());
        assert_eq!(scene.broad.pair_count(), 0);
        assert_eq!(scene.broad.world_boundary(), None);

        let flat = Body::rigid(
            "flat",
            Pose::identity(),
            CollisionShape::cuboid(Vec3::new(1.0, 0.0, 1.0)).unwrap(),
        );
        scene.add(&flat);
        scene.step();
        assert_eq!(scene.broad.pair_count(), 0);
        assert!(scene.broad.world_boundary().is_some());
    }

    #[test]
    fn far_bodies_do_not_pair_until_moved_together() {
        let mut scene = Scene::new();
        let bodies: Vec<_> = (0..6)
            .map(|i| cube(&format!("c{i}"), Vec3::new(i as f32 * 10.0, 0.0, 0.0)))
            .collect();
        for body in &bodies {
            scene.add(body);
        }
        scene.step();
        assert_eq!(scene.broad.pair_count(), 0);

        let first = bodies[0].object_id().unwrap();
        let second = bodies[1].object_id().unwrap();
        scene.bodies.get_mut(&second).unwrap().pose = Pose::from_position(Vec3::new(1.5, 0.0, 0.0));
        scene.step();
        let pairs: Vec<_> = scene.broad.pairs().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].key(), PairKey::new(first, second));
    }

    #[test]
    fn pairs_persist_until_separation() {
        let mut scene = Scene::new();
        let (a, b) = (cube("a", Vec3::ZERO), cube("b", Vec3::new(1.5, 0.0, 0.0)));
        scene.add(&a);
        scene.add(&b);
        assert!(scene.step().is_empty());
        assert_eq!(scene.broad.pair_count(), 1);
        assert!(scene.step().is_empty());

        let id = b.object_id().unwrap();
        scene.bodies.get_mut(&id).unwrap().pose = Pose::from_position(Vec3::new(50.0, 0.0, 0.0));
        let removed = scene.step();
        assert_eq!(removed.len(), 1);
        assert_eq!(scene.broad.pair_count(), 0);
    }

    #[test]
    fn removed_body_leaves_the_tree() {
        let mut scene = Scene::new();
        let (a, b) = (cube("a", Vec3::ZERO), cube("b", Vec3::new(1.5, 0.0, 0.0)));
        scene.add(&a);
        scene.add(&b);
        scene.step();
        scene.store.queue().remove_body(&b).unwrap();
        let removed = scene.step();
        assert_eq!(removed.len(), 1);
        let published = scene.broad.published_tree();
        assert_eq!(published.read().unwrap().len(), 1);
    }

    #[test]
    fn body_test_excludes_the_moving_body() {
        let mut scene = Scene::new();
        let (a, wall) = (cube("a", Vec3::ZERO), cube("wall", Vec3::new(20.0, 0.0, 0.0)));
        scene.add(&a);
        scene.add(&wall);
        scene.step();
        let id = a.object_id().unwrap();
        let shape = CollisionShape::cuboid(Vec3::ONE).unwrap();
        let hits = scene.broad.body_test(
            id,
            &shape,
            &Pose::identity(),
            &Pose::from_position(Vec3::new(30.0, 0.0, 0.0)),
        );
        assert_eq!(hits, vec![wall.object_id().unwrap()]);
    }

    #[test]
    fn body_below_boundary_is_frozen() {
        let mut scene = Scene::new();
        let ground = cube("ground", Vec3::ZERO);
        let faller = cube("faller", Vec3::new(0.0, 4.0, 0.0));
        faller.set_mass(1.0).unwrap();
        scene.add(&ground);
        scene.add(&faller);
        scene.step();
        let id = faller.object_id().unwrap();
        let low = scene.bodies[&ground.object_id().unwrap()].aabb().min().y();
        let high = scene.bodies[&id].aabb().max().y();
        let boundary = scene.broad.world_boundary().unwrap();
        assert!((boundary - (low - (high - low) * 0.5)).abs() < 1e-4);

        let body = scene.bodies.get_mut(&id).unwrap();
        assert!(body.is_dynamic());
        let half_y = body.aabb().half_extents().y();
        body.pose = Pose::from_position(Vec3::new(0.0, boundary - 10.0, 0.0));
        scene.step();
        let body = &scene.bodies[&id];
        assert!(body.is_static());
        let expected = boundary + half_y + BOUNDARY_CLEARANCE;
        assert!((body.pose().position().y() - expected).abs() < 1e-4);
    }
}
