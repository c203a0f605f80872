// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! GJK simplex and the closest-point queries it relies on.
//!
//! Every query takes the origin as the reference point and returns the
//! closest point together with barycentric weights. Weights of vertices
//! outside the closest feature are exactly `0.0`, which is what the simplex
//! uses to drop them.

use echo_math::Vec3;

/// Minkowski-difference vertex with the two support points producing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportMapping {
    /// Support point on object A.
    pub a: Vec3,
    /// Support point on object B.
    pub b: Vec3,
    /// `a - b`.
    pub point: Vec3,
    barycentric: f32,
}

impl SupportMapping {
    /// Pairs two support points.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            a,
            b,
            point: a.sub(&b),
            barycentric: 1.0,
        }
    }
}

/// Up to four Minkowski-difference vertices plus the closest point to the
/// origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Simplex {
    points: [SupportMapping; 4],
    len: usize,
    closest: Vec3,
}

impl Simplex {
    /// Simplex holding a single vertex.
    pub fn from_point(mapping: SupportMapping) -> Self {
        Self {
            points: [mapping; 4],
            len: 1,
            closest: mapping.point,
        }
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when there is no vertex (never after construction).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Vertices in insertion order.
    pub fn mappings(&self) -> &[SupportMapping] {
        &self.points[..self.len]
    }

    /// Minkowski-difference vertex `i`.
    pub fn point(&self, i: usize) -> Vec3 {
        self.points[i].point
    }

    /// Barycentric weight of vertex `i` for the closest point.
    pub fn barycentric(&self, i: usize) -> f32 {
        self.points[i].barycentric
    }

    /// Closest point of the simplex to the origin.
    pub fn closest_point_to_origin(&self) -> Vec3 {
        self.closest
    }

    /// Whether `p` is already one of the vertices.
    pub fn contains_point(&self, p: &Vec3) -> bool {
        self.mappings().iter().any(|m| m.point == *p)
    }

    /// Witness points on A and B matching the closest point.
    pub fn closest_points(&self) -> (Vec3, Vec3) {
        self.mappings()
            .iter()
            .fold((Vec3::ZERO, Vec3::ZERO), |(pa, pb), m| {
                (
                    pa.add(&m.a.scale(m.barycentric)),
                    pb.add(&m.b.scale(m.barycentric)),
                )
            })
    }

    /// Appends a vertex, recomputes the closest point and drops vertices
    /// that no longer support it.
    pub fn add_point(&mut self, mapping: SupportMapping) {
        if self.len < 4 {
            self.points[self.len] = mapping;
            self.len += 1;
        }
        self.reduce();
    }

    fn reduce(&mut self) {
        let (closest, weights) = match self.len {
            1 => (self.points[0].point, [1.0, 0.0, 0.0, 0.0]),
            2 => {
                let (p, [wa, wb]) = closest_on_segment(&self.points[0].point, &self.points[1].point);
                (p, [wa, wb, 0.0, 0.0])
            }
            3 => {
                let (p, [wa, wb, wc]) = closest_on_triangle(
                    &self.points[0].point,
                    &self.points[1].point,
                    &self.points[2].point,
                );
                (p, [wa, wb, wc, 0.0])
            }
            _ => closest_on_tetrahedron(
                &self.points[0].point,
                &self.points[1].point,
                &self.points[2].point,
                &self.points[3].point,
            ),
        };
        self.closest = closest;
        let mut kept = 0;
        for i in 0..self.len {
            // The newest vertex always stays.
            if weights[i] > 0.0 || i + 1 == self.len {
                let mut mapping = self.points[i];
                mapping.barycentric = weights[i];
                self.points[kept] = mapping;
                kept += 1;
            }
        }
        self.len = kept;
    }
}

/// Closest point of segment `ab` to the origin.
pub fn closest_on_segment(a: &Vec3, b: &Vec3) -> (Vec3, [f32; 2]) {
    let ab = b.sub(a);
    let denom = ab.length_squared();
    if denom <= f32::EPSILON {
        return (*a, [1.0, 0.0]);
    }
    let t = -a.dot(&ab) / denom;
    if t <= 0.0 {
        (*a, [1.0, 0.0])
    } else if t >= 1.0 {
        (*b, [0.0, 1.0])
    } else {
        (a.add(&ab.scale(t)), [1.0 - t, t])
    }
}

/// Closest point of triangle `abc` to the origin (Voronoi-region walk).
pub fn closest_on_triangle(a: &Vec3, b: &Vec3, c: &Vec3) -> (Vec3, [f32; 3]) {
    let ab = b.sub(a);
    let ac = c.sub(a);
    let ap = -*a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return (*a, [1.0, 0.0, 0.0]);
    }

    let bp = -*b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return (*b, [0.0, 1.0, 0.0]);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return (a.add(&ab.scale(v)), [1.0 - v, v, 0.0]);
    }

    let cp = -*c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return (*c, [0.0, 0.0, 1.0]);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return (a.add(&ac.scale(w)), [1.0 - w, 0.0, w]);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return (b.add(&c.sub(b).scale(w)), [0.0, 1.0 - w, w]);
    }

    let sum = va + vb + vc;
    if sum.abs() <= f32::EPSILON {
        // Degenerate (flat) triangle: fall back to its best edge.
        let candidates = [
            (closest_on_segment(a, b), [0, 1]),
            (closest_on_segment(a, c), [0, 2]),
            (closest_on_segment(b, c), [1, 2]),
        ];
        let mut best = (*a, [1.0, 0.0, 0.0]);
        let mut best_dist = f32::INFINITY;
        for ((p, w), [i, j]) in candidates {
            let dist = p.length_squared();
            if dist < best_dist {
                best_dist = dist;
                let mut weights = [0.0; 3];
                weights[i] = w[0];
                weights[j] = w[1];
                best = (p, weights);
            }
        }
        return best;
    }
    let denom = 1.0 / sum;
    let v = vb * denom;
    let w = vc * denom;
    (a.add(&ab.scale(v)).add(&ac.scale(w)), [1.0 - v - w, v, w])
}

fn origin_outside_plane(a: &Vec3, b: &Vec3, c: &Vec3, opposite: &Vec3) -> bool {
    let n = b.sub(a).cross(&c.sub(a));
    let sign_origin = (-*a).dot(&n);
    let sign_opposite = opposite.sub(a).dot(&n);
    sign_opposite == 0.0 || sign_origin * sign_opposite < 0.0
}

/// Whether the tetrahedron `abcd` contains the origin (boundary included).
pub fn tetrahedron_contains_origin(a: &Vec3, b: &Vec3, c: &Vec3, d: &Vec3) -> bool {
    let faces = [(a, b, c, d), (a, c, d, b), (a, d, b, c), (b, d, c, a)];
    faces.iter().all(|(p, q, r, s)| {
        let n = q.sub(p).cross(&r.sub(p));
        let sign_origin = (-**p).dot(&n);
        let sign_opposite = s.sub(p).dot(&n);
        sign_opposite != 0.0 && sign_origin * sign_opposite >= 0.0
    })
}

/// Closest point of tetrahedron `abcd` to the origin, `d` being the newest
/// vertex.
///
/// The face `abc` is skipped: the origin lies on the side of `abc` where `d`
/// was found.
pub fn closest_on_tetrahedron(a: &Vec3, b: &Vec3, c: &Vec3, d: &Vec3) -> (Vec3, [f32; 4]) {
    // (face vertex indices, opposite vertex index)
    const FACES: [([usize; 3], usize); 3] = [([0, 1, 3], 2), ([0, 2, 3], 1), ([1, 2, 3], 0)];
    let pts = [*a, *b, *c, *d];
    let mut best: Option<(Vec3, [f32; 4])> = None;
    let mut best_dist = f32::INFINITY;
    for ([i, j, k], opposite) in FACES {
        if !origin_outside_plane(&pts[i], &pts[j], &pts[k], &pts[opposite]) {
            continue;
        }
        let (p, w) = closest_on_triangle(&pts[i], &pts[j], &pts[k]);
        let dist = p.length_squared();
        if dist < best_dist {
            best_dist = dist;
            let mut weights = [0.0; 4];
            weights[i] = w[0];
            weights[j] = w[1];
            weights[k] = w[2];
            best = Some((p, weights));
        }
    }
    best.unwrap_or_else(|| (Vec3::ZERO, [0.25; 4]))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn segment_interior_weights() {
        let (p, w) = closest_on_segment(&Vec3::new(-1.0, 1.0, 0.0), &Vec3::new(3.0, 1.0, 0.0));
        assert!((p.x()).abs() < 1e-6 && (p.y() - 1.0).abs() < 1e-6);
        assert!((w[0] - 0.75).abs() < 1e-6 && (w[1] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn triangle_face_region() {
        let (p, w) = closest_on_triangle(
            &Vec3::new(-1.0, -1.0, 1.0),
            &Vec3::new(1.0, -1.0, 1.0),
            &Vec3::new(0.0, 1.0, 1.0),
        );
        assert!((p.z() - 1.0).abs() < 1e-6 && p.x().abs() < 1e-6);
        assert!((w.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(w.iter().all(|x| *x > 0.0));
    }

    #[test]
    fn triangle_vertex_region_has_exact_zero_weights() {
        let (p, w) = closest_on_triangle(
            &Vec3::new(1.0, 0.0, 0.0),
            &Vec3::new(2.0, 1.0, 0.0),
            &Vec3::new(2.0, -1.0, 0.0),
        );
        assert_eq!(p.to_array(), [1.0, 0.0, 0.0]);
        assert_eq!(w, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn tetrahedron_around_origin() {
        let a = Vec3::new(1.0, 0.0, -1.0);
        let b = Vec3::new(-1.0, 0.0, -1.0);
        let c = Vec3::new(0.0, 1.0, 1.0);
        let d = Vec3::new(0.0, -1.0, 1.0);
        assert!(tetrahedron_contains_origin(&a, &b, &c, &d));
        let (p, _) = closest_on_tetrahedron(&a, &b, &c, &d);
        assert!(p.length() < 1e-6);
        let far = Vec3::new(0.0, -1.0, -5.0);
        assert!(!tetrahedron_contains_origin(&a, &b, &c, &far));
    }

    #[test]
    fn simplex_drops_unused_vertices() {
        let mut simplex = Simplex::from_point(SupportMapping::new(
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::ZERO,
        ));
        simplex.add_point(SupportMapping::new(Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO));
        // Closest point is the new vertex alone.
        assert_eq!(simplex.len(), 1);
        assert_eq!(simplex.closest_point_to_origin().to_array(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn witness_points_follow_weights() {
        let mut simplex = Simplex::from_point(SupportMapping::new(Vec3::new(1.0, -1.0, 0.0), Vec3::ZERO));
        simplex.add_point(SupportMapping::new(Vec3::new(1.0, 1.0, 0.0), Vec3::ZERO));
        assert_eq!(simplex.len(), 2);
        let (pa, pb) = simplex.closest_points();
        assert!((pa.x() - 1.0).abs() < 1e-6 && pa.y().abs() < 1e-6);
        assert!(pb.x().abs() < 1e-6 && pb.y().abs() < 1e-6);
    }
}
