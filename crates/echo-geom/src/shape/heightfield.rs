// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use echo_math::Vec3;

use crate::types::{aabb::Aabb, ray::Ray};
use crate::GeomError;

/// Regular grid of heights centred on the local origin.
///
/// Vertex `(x, z)` sits at
/// `(x * spacing - half_width, heights[z * x_count + x], z * spacing - half_depth)`.
/// Each grid cell is split into two triangles along the `(x+1, z)`–`(x, z+1)`
/// diagonal. Bounds are symmetric on Y so the shape's centre coincides with
/// the body position.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightfield {
    heights: Vec<f32>,
    x_count: usize,
    z_count: usize,
    spacing: f32,
    local_aabb: Aabb,
}

/// Triangle in the heightfield's local space.
pub type Triangle = [Vec3; 3];

impl Heightfield {
    /// Builds a heightfield of `x_count * z_count` vertices.
    pub fn new(
        heights: Vec<f32>,
        x_count: usize,
        z_count: usize,
        spacing: f32,
    ) -> Result<Self, GeomError> {
        if x_count < 2 || z_count < 2 || heights.len() != x_count * z_count {
            return Err(GeomError::InvalidDimension {
                shape: "heightfield",
                detail: format!(
                    "{} heights for a {x_count}x{z_count} grid (at least 2x2 required)",
                    heights.len()
                ),
            });
        }
        if !(spacing.is_finite() && spacing > 0.0) || heights.iter().any(|h| !h.is_finite()) {
            return Err(GeomError::InvalidDimension {
                shape: "heightfield",
                detail: format!("spacing = {spacing}"),
            });
        }
        let max_abs_y = heights.iter().fold(0.0_f32, |acc, h| acc.max(h.abs()));
        #[allow(clippy::cast_precision_loss)]
        let half = Vec3::new(
            (x_count - 1) as f32 * spacing * 0.5,
            max_abs_y,
            (z_count - 1) as f32 * spacing * 0.5,
        );
        Ok(Self {
            heights,
            x_count,
            z_count,
            spacing,
            local_aabb: Aabb::from_center_half_extents(Vec3::ZERO, half),
        })
    }

    /// Local bounds.
    pub fn local_aabb(&self) -> Aabb {
        self.local_aabb
    }

    /// Vertex at grid coordinate `(x, z)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn vertex(&self, x: usize, z: usize) -> Vec3 {
        let half = self.local_aabb.half_extents();
        Vec3::new(
            x as f32 * self.spacing - half.x(),
            self.heights[z * self.x_count + x],
            z as f32 * self.spacing - half.z(),
        )
    }

    /// Cell index range `[start, end)` covering `[min, max]` on one axis.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn cell_range(&self, min: f32, max: f32, half: f32, count: usize) -> (usize, usize) {
        let cells = (count - 1) as f32;
        let start = ((min + half) / self.spacing).floor().clamp(0.0, cells) as usize;
        let end = ((max + half) / self.spacing).floor() + 1.0;
        (start, end.clamp(0.0, cells) as usize)
    }

    /// Triangles of the cells overlapping `aabb` (local space) whose height
    /// span intersects the box's Y range.
    pub fn triangles_in_aabb(&self, aabb: &Aabb) -> Vec<Triangle> {
        let half = self.local_aabb.half_extents();
        let (x0, x1) = self.cell_range(aabb.min().x(), aabb.max().x(), half.x(), self.x_count);
        let (z0, z1) = self.cell_range(aabb.min().z(), aabb.max().z(), half.z(), self.z_count);
        let (min_y, max_y) = (aabb.min().y(), aabb.max().y());
        let mut out = Vec::new();
        for z in z0..z1 {
            for x in x0..x1 {
                let far_left = self.vertex(x, z);
                let far_right = self.vertex(x + 1, z);
                let near_left = self.vertex(x, z + 1);
                let near_right = self.vertex(x + 1, z + 1);
                for tri in [
                    [far_left, near_left, far_right],
                    [far_right, near_left, near_right],
                ] {
                    let lo = tri.iter().fold(f32::INFINITY, |a, p| a.min(p.y()));
                    let hi = tri.iter().fold(f32::NEG_INFINITY, |a, p| a.max(p.y()));
                    if hi >= min_y && lo <= max_y {
                        out.push(tri);
                    }
                }
            }
        }
        out
    }

    /// Candidate triangles for a local-space segment.
    pub fn triangles_along_segment(&self, ray: &Ray) -> Vec<Triangle> {
        self.triangles_in_aabb(&Aabb::new(ray.start(), ray.end()))
    }
}
