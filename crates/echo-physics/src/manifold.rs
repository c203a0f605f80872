// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persistent contact manifolds.
//!
//! Conventions used by every contact in the crate:
//! - `normal_from_b` is a unit vector pointing from body 2 (B) toward body 1 (A).
//! - `depth` is negative while penetrating and positive for speculative gaps.
//! - `point_on_a == point_on_b + normal_from_b * depth`.

use echo_geom::Pose;
use echo_math::Vec3;

use crate::body::ObjectId;
use crate::pair::PairKey;

/// Points kept per manifold.
pub const MAX_PERSISTENT_POINTS: usize = 4;

/// Impulses accumulated by the solver, reused for warm starting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccumulatedSolvingData {
    /// Accumulated normal impulse (`<= 0`).
    pub normal_impulse: f32,
    /// Accumulated friction impulses along the two tangents.
    pub tangent_impulses: [f32; 2],
}

/// Raw contact produced by a detector, before it becomes persistent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedContact {
    /// Unit normal from B toward A.
    pub normal_from_b: Vec3,
    /// Contact point on B's surface.
    pub point_on_b: Vec3,
    /// Signed distance (negative = penetration).
    pub depth: f32,
}

impl DetectedContact {
    /// The same contact seen with A and B exchanged.
    pub fn swapped(&self) -> Self {
        Self {
            normal_from_b: -self.normal_from_b,
            point_on_b: self.point_on_b.add(&self.normal_from_b.scale(self.depth)),
            depth: self.depth,
        }
    }
}

/// One contact of a manifold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManifoldContactPoint {
    /// Unit normal from B toward A.
    pub normal_from_b: Vec3,
    /// World point on A.
    pub point_on_a: Vec3,
    /// World point on B.
    pub point_on_b: Vec3,
    /// `point_on_a` in A's frame.
    pub local_point_on_a: Vec3,
    /// `point_on_b` in B's frame.
    pub local_point_on_b: Vec3,
    /// Signed distance along the normal.
    pub depth: f32,
    /// Speculative contact created by continuous collision.
    pub predictive: bool,
    /// Solver state carried between steps.
    pub accumulated: AccumulatedSolvingData,
}

/// Contacts between two bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifoldResult {
    body1: ObjectId,
    body2: ObjectId,
    pair: Option<PairKey>,
    pose1: Pose,
    pose2: Pose,
    contact_breaking_threshold: f32,
    points: Vec<ManifoldContactPoint>,
}

impl ManifoldResult {
    /// Empty manifold for bodies 1 (A) and 2 (B) at the given poses.
    pub fn new(
        body1: ObjectId,
        pose1: Pose,
        body2: ObjectId,
        pose2: Pose,
        contact_breaking_threshold: f32,
    ) -> Self {
        Self {
            body1,
            body2,
            pair: None,
            pose1,
            pose2,
            contact_breaking_threshold,
            points: Vec::with_capacity(MAX_PERSISTENT_POINTS),
        }
    }

    /// Ties the manifold to the broad-phase pair it belongs to.
    pub fn with_pair(mut self, key: PairKey) -> Self {
        self.pair = Some(key);
        self
    }

    /// Body A.
    pub fn body1(&self) -> ObjectId {
        self.body1
    }

    /// Body B.
    pub fn body2(&self) -> ObjectId {
        self.body2
    }

    /// Owning pair; `None` for manifolds produced by continuous collision.
    pub fn pair(&self) -> Option<PairKey> {
        self.pair
    }

    /// Current contacts.
    pub fn contacts(&self) -> &[ManifoldContactPoint] {
        &self.points
    }

    /// Number of contacts.
    pub fn contact_count(&self) -> usize {
        self.points.len()
    }

    /// Updates the body poses used to map local points to world space.
    pub fn set_poses(&mut self, pose1: Pose, pose2: Pose) {
        self.pose1 = pose1;
        self.pose2 = pose2;
    }

    /// Adds a penetrating or touching contact.
    pub fn add_contact(&mut self, contact: &DetectedContact) {
        self.insert(contact, false);
    }

    /// Adds a speculative contact (positive depth is the remaining gap).
    pub fn add_predictive_contact(&mut self, contact: &DetectedContact) {
        self.insert(contact, true);
    }

    fn insert(&mut self, contact: &DetectedContact, predictive: bool) {
        let point_on_a = contact
            .point_on_b
            .add(&contact.normal_from_b.scale(contact.depth));
        let mut point = ManifoldContactPoint {
            normal_from_b: contact.normal_from_b,
            point_on_a,
            point_on_b: contact.point_on_b,
            local_point_on_a: self.pose1.inverse_transform_point(&point_on_a),
            local_point_on_b: self.pose2.inverse_transform_point(&contact.point_on_b),
            depth: contact.depth,
            predictive,
            accumulated: AccumulatedSolvingData::default(),
        };

        if let Some(index) = self.nearest_point_index(&point.local_point_on_b) {
            point.accumulated = self.points[index].accumulated;
            self.points[index] = point;
        } else if self.points.len() < MAX_PERSISTENT_POINTS {
            self.points.push(point);
        } else {
            let index = self.best_insertion_index(&point);
            self.points[index] = point;
        }
    }

    fn nearest_point_index(&self, local_point_on_b: &Vec3) -> Option<usize> {
        let limit = self.contact_breaking_threshold * self.contact_breaking_threshold;
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.local_point_on_b.distance_squared(local_point_on_b)))
            .filter(|(_, d)| *d < limit)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Slot to overwrite in a full manifold: never the deepest point, and
    /// otherwise the one whose replacement spans the largest area.
    fn best_insertion_index(&self, candidate: &ManifoldContactPoint) -> usize {
        let deepest = self
            .points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.depth < candidate.depth)
            .min_by(|a, b| a.1.depth.total_cmp(&b.1.depth))
            .map(|(i, _)| i);

        let mut best = (0, f32::NEG_INFINITY);
        for replaced in 0..self.points.len() {
            if Some(replaced) == deepest {
                continue;
            }
            let mut quad = [Vec3::ZERO; MAX_PERSISTENT_POINTS];
            for (slot, p) in quad.iter_mut().zip(&self.points) {
                *slot = p.local_point_on_a;
            }
            quad[replaced] = candidate.local_point_on_a;
            let area = quad_area_measure(&quad);
            if area > best.1 {
                best = (replaced, area);
            }
        }
        best.0
    }

    /// Recomputes world points from the local ones and drops contacts that
    /// separated or drifted sideways past the breaking threshold.
    pub fn refresh_contact_points(&mut self) {
        let threshold = self.contact_breaking_threshold;
        let (pose1, pose2) = (self.pose1, self.pose2);
        self.points.retain_mut(|p| {
            p.point_on_a = pose1.transform_point(&p.local_point_on_a);
            p.point_on_b = pose2.transform_point(&p.local_point_on_b);
            p.depth = p.point_on_a.sub(&p.point_on_b).dot(&p.normal_from_b);
            if p.depth > threshold {
                return false;
            }
            let projected = p.point_on_a.sub(&p.normal_from_b.scale(p.depth));
            projected.distance_squared(&p.point_on_b) <= threshold * threshold
        });
    }

    /// Writes solver results back to contact `index`.
    pub fn set_accumulated(&mut self, index: usize, data: AccumulatedSolvingData) {
        if let Some(p) = self.points.get_mut(index) {
            p.accumulated = data;
        }
    }

    /// Drops every contact.
    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// Largest squared cross product of the quad's diagonal pairs.
fn quad_area_measure(p: &[Vec3; MAX_PERSISTENT_POINTS]) -> f32 {
    let a = p[0].sub(&p[1]).cross(&p[2].sub(&p[3])).length_squared();
    let b = p[0].sub(&p[2]).cross(&p[1].sub(&p[3])).length_squared();
    let c = p[0].sub(&p[3]).cross(&p[1].sub(&p[2])).length_squared();
    a.max(b).max(c)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn manifold() -> ManifoldResult {
        ManifoldResult::new(
            ObjectId::new(1),
            Pose::from_position(Vec3::new(0.0, 1.0, 0.0)),
            ObjectId::new(2),
            Pose::identity(),
            0.02,
        )
    }

    fn contact(x: f32, z: f32, depth: f32) -> DetectedContact {
        DetectedContact {
            normal_from_b: Vec3::UNIT_Y,
            point_on_b: Vec3::new(x, 0.0, z),
            depth,
        }
    }

    #[test]
    fn point_on_a_follows_depth() {
        let mut m = manifold();
        m.add_contact(&contact(0.0, 0.0, -0.1));
        let p = m.contacts()[0];
        assert!((p.point_on_a.y() + 0.1).abs() < 1e-6);
        assert!((p.local_point_on_a.y() + 1.1).abs() < 1e-6);
    }

    #[test]
    fn nearby_contact_replaces_and_keeps_impulses() {
        let mut m = manifold();
        m.add_contact(&contact(0.0, 0.0, -0.1));
        m.set_accumulated(
            0,
            AccumulatedSolvingData {
                normal_impulse: -2.0,
                tangent_impulses: [0.5, 0.0],
            },
        );
        m.add_contact(&contact(0.005, 0.0, -0.05));
        assert_eq!(m.contact_count(), 1);
        let p = m.contacts()[0];
        assert!((p.depth + 0.05).abs() < 1e-6);
        assert!((p.accumulated.normal_impulse + 2.0).abs() < 1e-6);
    }

    #[test]
    fn full_manifold_keeps_deepest_and_spreads_out() {
        let mut m = manifold();
        m.add_contact(&contact(-1.0, -1.0, -0.5));
        m.add_contact(&contact(1.0, -1.0, -0.1));
        m.add_contact(&contact(1.0, 1.0, -0.1));
        m.add_contact(&contact(0.1, 0.1, -0.1));
        m.add_contact(&contact(-1.0, 1.0, -0.1));
        assert_eq!(m.contact_count(), MAX_PERSISTENT_POINTS);
        let xs: Vec<_> = m.contacts().iter().map(|p| (p.point_on_b.x(), p.point_on_b.z())).collect();
        assert!(xs.contains(&(-1.0, -1.0)));
        assert!(xs.contains(&(-1.0, 1.0)));
        assert!(!xs.contains(&(0.1, 0.1)));
    }

    #[test]
    fn refresh_drops_separated_points() {
        let mut m = manifold();
        m.add_contact(&contact(0.0, 0.0, -0.01));
        m.set_poses(Pose::from_position(Vec3::new(0.0, 1.5, 0.0)), Pose::identity());
        m.refresh_contact_points();
        assert_eq!(m.contact_count(), 0);
    }

    #[test]
    fn refresh_drops_sliding_points() {
        let mut m = manifold();
        m.add_contact(&contact(0.0, 0.0, -0.01));
        m.set_poses(Pose::from_position(Vec3::new(0.5, 1.0, 0.0)), Pose::identity());
        m.refresh_contact_points();
        assert_eq!(m.contact_count(), 0);
    }

    #[test]
    fn swapped_contact_mirrors_normal() {
        let c = contact(0.0, 0.0, -0.2).swapped();
        assert_eq!(c.normal_from_b.to_array(), [0.0, -1.0, 0.0]);
        assert!((c.point_on_b.y() + 0.2).abs() < 1e-6);
    }
}
