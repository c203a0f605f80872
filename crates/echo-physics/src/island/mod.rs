// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Islands: groups of bodies connected through contacts, put to sleep and
//! woken together.

mod container;

use std::collections::BTreeMap;

use echo_math::Vec3;
use rustc_hash::FxHashMap;
use tracing::debug;

pub use container::{IslandContainer, IslandElement};

use crate::body::{BodyKind, ObjectId, WorkBody};
use crate::config::IslandConfig;
use crate::error::PhysicsError;
use crate::manifold::ManifoldResult;

/// Outcome of one island pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IslandReport {
    /// Islands among the active bodies.
    pub islands: usize,
    /// Sleeping bodies woken by a new contact.
    pub woken: usize,
    /// Bodies put to sleep.
    pub put_to_sleep: usize,
}

/// Builds islands from the step's manifolds and updates body activity.
///
/// An island falls asleep once every body in it stayed under the sleeping
/// thresholds for `steps_before_sleep` consecutive steps while the island
/// rests on something static. A manifold between an active and a sleeping
/// body wakes the sleeper.
#[derive(Debug)]
pub struct IslandManager {
    config: IslandConfig,
    container: IslandContainer,
    resting_steps: FxHashMap<ObjectId, u32>,
}

impl IslandManager {
    /// Manager with the given thresholds.
    pub fn new(config: IslandConfig) -> Self {
        Self {
            config,
            container: IslandContainer::new(),
            resting_steps: FxHashMap::default(),
        }
    }

    /// Island container of the last pass.
    pub fn container(&self) -> &IslandContainer {
        &self.container
    }

    fn is_resting(&self, body: &WorkBody) -> bool {
        body.linear_velocity().length() < self.config.linear_sleeping_threshold
            && body.angular_velocity().length() < self.config.angular_sleeping_threshold
    }

    /// Runs the island pass for one step.
    pub fn refresh_body_active_state(
        &mut self,
        bodies: &mut BTreeMap<ObjectId, WorkBody>,
        manifolds: &[ManifoldResult],
    ) -> Result<IslandReport, PhysicsError> {
        let mut report = IslandReport::default();
        for manifold in manifolds {
            let (Some(b1), Some(b2)) = (bodies.get(&manifold.body1()), bodies.get(&manifold.body2())) else {
                continue;
            };
            let sleeper = match (b1.is_active(), b2.is_active()) {
                (true, false) if b2.is_dynamic() && b1.kind() == BodyKind::Rigid => b2.id(),
                (false, true) if b1.is_dynamic() && b2.kind() == BodyKind::Rigid => b1.id(),
                _ => continue,
            };
            if let Some(body) = bodies.get_mut(&sleeper) {
                body.set_active(true);
                self.resting_steps.remove(&sleeper);
                report.woken += 1;
                debug!(body = %sleeper, "body woken by contact");
            }
        }

        self.resting_steps.retain(|id, _| bodies.contains_key(id));
        self.container.reset(
            bodies
                .values()
                .filter(|b| b.is_dynamic() && b.is_active())
                .map(WorkBody::id),
        );
        for manifold in manifolds {
            let (Some(b1), Some(b2)) = (bodies.get(&manifold.body1()), bodies.get(&manifold.body2())) else {
                continue;
            };
            if b1.kind() == BodyKind::Ghost || b2.kind() == BodyKind::Ghost {
                continue;
            }
            let (in1, in2) = (self.container.contains(b1.id()), self.container.contains(b2.id()));
            match (in1, in2) {
                (true, true) => self.container.merge(b1.id(), b2.id())?,
                (true, false) => self.container.link_to_static(b1.id())?,
                (false, true) => self.container.link_to_static(b2.id())?,
                (false, false) => {}
            }
        }

        for body in bodies.values().filter(|b| b.is_dynamic() && b.is_active()) {
            let resting = self.is_resting(body);
            let steps = self.resting_steps.entry(body.id()).or_insert(0);
            *steps = if resting { steps.saturating_add(1) } else { 0 };
        }

        let elements = self.container.retrieve_sorted_island_elements().to_vec();
        for island in elements.chunk_by(|a, b| a.island_id == b.island_id) {
            report.islands += 1;
            let linked_to_static = island.iter().any(|e| e.linked_to_static);
            let asleep = linked_to_static
                && island.iter().all(|e| {
                    self.resting_steps.get(&e.body).copied().unwrap_or(0) >= self.config.steps_before_sleep
                });
            if !asleep {
                continue;
            }
            for element in island {
                if let Some(body) = bodies.get_mut(&element.body) {
                    body.set_active(false);
                    body.linear_velocity = Vec3::ZERO;
                    body.angular_velocity = Vec3::ZERO;
                    report.put_to_sleep += 1;
                }
                self.resting_steps.remove(&element.body);
            }
            debug!(island = island[0].island_id, bodies = island.len(), "island asleep");
        }
        Ok(report)
    }
}
