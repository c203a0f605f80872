// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use echo_math::{Mat4, Vec3};

use crate::types::ray::Ray;

/// Axis-aligned bounding box in world coordinates.
///
/// Invariants:
/// - `min` components are less than or equal to `max` components.
/// - Values are `f32` and represent meters in world space.
///
/// Zero-volume boxes (points, flat planes) are valid; the broad phase only
/// ever inflates them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Aabb {
    /// Constructs an AABB from two opposite corners.
    ///
    /// Corners are reordered per axis so the `min <= max` invariant always
    /// holds, even when callers pass them swapped.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(&b),
            max: a.max(&b),
        }
    }

    /// Returns the minimum corner.
    pub fn min(&self) -> Vec3 {
        self.min
    }

    /// Returns the maximum corner.
    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// Builds an AABB centered at `center` with the given half-extents.
    pub fn from_center_half_extents(center: Vec3, half: Vec3) -> Self {
        let half = half.abs();
        Self {
            min: center.sub(&half),
            max: center.add(&half),
        }
    }

    /// Centre of the box.
    pub fn center(&self) -> Vec3 {
        self.min.add(&self.max).scale(0.5)
    }

    /// Half-extents of the box.
    pub fn half_extents(&self) -> Vec3 {
        self.max.sub(&self.min).scale(0.5)
    }

    /// Surface area; the cost metric used by the AABB tree.
    pub fn surface_area(&self) -> f32 {
        let [dx, dy, dz] = self.max.sub(&self.min).to_array();
        2.0 * (dx * dy + dy * dz + dz * dx)
    }

    /// Returns `true` if this AABB overlaps another (inclusive on faces).
    pub fn overlaps(&self, other: &Self) -> bool {
        let a_min = self.min.to_array();
        let a_max = self.max.to_array();
        let b_min = other.min.to_array();
        let b_max = other.max.to_array();
        (0..3).all(|i| a_max[i] >= b_min[i] && a_min[i] <= b_max[i])
    }

    /// Returns `true` when `other` lies entirely within this box.
    pub fn contains(&self, other: &Self) -> bool {
        let a_min = self.min.to_array();
        let a_max = self.max.to_array();
        let b_min = other.min.to_array();
        let b_max = other.max.to_array();
        (0..3).all(|i| a_min[i] <= b_min[i] && a_max[i] >= b_max[i])
    }

    /// Returns `true` when `p` lies inside or on the box.
    pub fn contains_point(&self, p: &Vec3) -> bool {
        let a_min = self.min.to_array();
        let a_max = self.max.to_array();
        let p = p.to_array();
        (0..3).all(|i| a_min[i] <= p[i] && p[i] <= a_max[i])
    }

    /// Returns the union of two AABBs.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(&other.min),
            max: self.max.max(&other.max),
        }
    }

    /// Inflates the box by a uniform margin `m` in all directions.
    pub fn inflate(&self, m: f32) -> Self {
        let delta = Vec3::splat(m);
        Self::new(self.min.sub(&delta), self.max.add(&delta))
    }

    /// Translates the box by `offset`.
    pub fn translate(&self, offset: &Vec3) -> Self {
        Self {
            min: self.min.add(offset),
            max: self.max.add(offset),
        }
    }

    /// Computes the AABB that bounds this box after transformation by `mat`.
    ///
    /// Evaluates the eight corners under the affine transform and builds a new
    /// axis-aligned box containing them.
    pub fn transformed(&self, mat: &Mat4) -> Self {
        let [minx, miny, minz] = self.min.to_array();
        let [maxx, maxy, maxz] = self.max.to_array();
        let corners = [
            Vec3::new(minx, miny, minz),
            Vec3::new(minx, miny, maxz),
            Vec3::new(minx, maxy, minz),
            Vec3::new(minx, maxy, maxz),
            Vec3::new(maxx, miny, minz),
            Vec3::new(maxx, miny, maxz),
            Vec3::new(maxx, maxy, minz),
            Vec3::new(maxx, maxy, maxz),
        ];
        let first = mat.transform_point(&corners[0]);
        corners[1..].iter().fold(
            Self {
                min: first,
                max: first,
            },
            |acc, c| {
                let p = mat.transform_point(c);
                Self {
                    min: acc.min.min(&p),
                    max: acc.max.max(&p),
                }
            },
        )
    }

    /// Builds the minimal AABB that contains all `points`, or `None` when
    /// `points` is empty.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        Some(rest.iter().fold(
            Self {
                min: *first,
                max: *first,
            },
            |acc, p| Self {
                min: acc.min.min(p),
                max: acc.max.max(p),
            },
        ))
    }

    /// Slab test against a segment.
    ///
    /// Returns the entry fraction along `ray` in `[0, 1]` (zero when the
    /// segment starts inside the box), or `None` when the segment misses.
    pub fn ray_intersection(&self, ray: &Ray) -> Option<f32> {
        let from = ray.start().to_array();
        let dir = ray.direction().to_array();
        let b_min = self.min.to_array();
        let b_max = self.max.to_array();
        let mut t_enter = 0.0_f32;
        let mut t_exit = 1.0_f32;
        for i in 0..3 {
            if dir[i].abs() <= f32::EPSILON {
                if from[i] < b_min[i] || from[i] > b_max[i] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir[i];
            let t1 = (b_min[i] - from[i]) * inv;
            let t2 = (b_max[i] - from[i]) * inv;
            t_enter = t_enter.max(t1.min(t2));
            t_exit = t_exit.min(t1.max(t2));
            if t_enter > t_exit {
                return None;
            }
        }
        Some(t_enter)
    }
}
