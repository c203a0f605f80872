// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Continuous collision: GJK ray cast between two translating convex
//! objects.

use echo_geom::ConvexObject;
use echo_math::Vec3;

use super::simplex::{Simplex, SupportMapping};
use super::NumericalFailure;
use crate::config::CcdConfig;

/// Convex object moving by pure translation over one step.
///
/// Rotation is ignored: the object keeps the orientation it has at `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalObject {
    object: ConvexObject,
    motion: Vec3,
}

impl TemporalObject {
    /// `object` placed at its start position, travelling by `motion`.
    pub fn new(object: ConvexObject, motion: Vec3) -> Self {
        Self { object, motion }
    }

    /// Object that does not move.
    pub fn stationary(object: ConvexObject) -> Self {
        Self::new(object, Vec3::ZERO)
    }

    /// Translation over the whole step.
    pub fn motion(&self) -> Vec3 {
        self.motion
    }

    fn at(&self, t: f32) -> ConvexObject {
        self.object.translated(&self.motion.scale(t))
    }
}

/// First time of impact within the step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuousCollisionResult {
    /// Fraction of the step (`0..=1`) at which the objects touch.
    pub time_to_hit: f32,
    /// Unit normal from B toward A at impact.
    pub normal_from_b: Vec3,
    /// Impact point on B.
    pub hit_point_on_b: Vec3,
}

/// Time-of-impact query.
#[derive(Debug, Clone, Copy)]
pub struct ContinuousCollision {
    config: CcdConfig,
}

impl ContinuousCollision {
    /// Query with the given tolerances.
    pub fn new(config: CcdConfig) -> Self {
        Self { config }
    }

    /// Earliest contact between `a` and `b` along their motions.
    ///
    /// `Ok(None)` when they do not meet during the step or already overlap
    /// at its start.
    pub fn time_of_impact(
        &self,
        a: &TemporalObject,
        b: &TemporalObject,
    ) -> Result<Option<ContinuousCollisionResult>, NumericalFailure> {
        let square_epsilon = f32::EPSILON * f32::EPSILON;
        let relative_motion = a.motion.sub(&b.motion);
        let mut time_to_hit = 0.0_f32;
        let mut object_a = a.at(0.0);
        let mut object_b = b.at(0.0);
        let mut normal = Vec3::ZERO;
        let mut simplex: Option<Simplex> = None;

        let initial = object_a
            .support_point(&-relative_motion, true)
            .sub(&object_b.support_point(&relative_motion, true));
        let mut direction = -initial;

        for _ in 0..self.config.max_iterations {
            let mapping = SupportMapping::new(
                object_a.support_point(&direction, true),
                object_b.support_point(&-direction, true),
            );
            let closest = -direction;
            let closest_dot_new = closest.dot(&mapping.point);

            if closest_dot_new > 0.0 {
                let closest_dot_motion = closest.dot(&relative_motion);
                if closest_dot_motion >= -square_epsilon {
                    return Ok(None);
                }
                time_to_hit -= closest_dot_new / closest_dot_motion;
                if time_to_hit > 1.0 {
                    return Ok(None);
                }
                object_a = a.at(time_to_hit);
                object_b = b.at(time_to_hit);
                normal = closest;
            }

            if let Some(s) = simplex.as_mut() {
                if !s.contains_point(&mapping.point) {
                    s.add_point(mapping);
                }
            }
            let simplex = simplex.get_or_insert_with(|| Simplex::from_point(mapping));
            direction = -simplex.closest_point_to_origin();

            if direction.length_squared() < self.config.termination_tolerance {
                if normal.length_squared() < square_epsilon {
                    return Ok(None);
                }
                let (_, hit_point_on_b) = simplex.closest_points();
                return Ok(Some(ContinuousCollisionResult {
                    time_to_hit,
                    normal_from_b: normal.normalize(),
                    hit_point_on_b,
                }));
            }
        }
        Err(NumericalFailure::Ccd)
    }
}
