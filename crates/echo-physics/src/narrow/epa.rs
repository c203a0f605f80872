// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Expanding polytope algorithm: penetration depth from a colliding GJK
//! simplex.

use core::f32::consts::TAU;

use echo_geom::ConvexObject;
use echo_math::{Quat, Vec3};

use super::gjk::support;
use super::simplex::{closest_on_triangle, tetrahedron_contains_origin, Simplex, SupportMapping};
use super::NumericalFailure;
use crate::config::EpaConfig;

/// Penetration found by EPA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpaContact {
    /// Unit normal pointing from A toward B.
    pub normal: Vec3,
    /// Penetration depth (`>= 0`).
    pub depth: f32,
    /// Deepest point of A inside B.
    pub point_a: Vec3,
    /// Deepest point of B inside A.
    pub point_b: Vec3,
}

#[derive(Debug, Clone)]
struct Face {
    vertices: [usize; 3],
    normal: Vec3,
    weights: [f32; 3],
    distance: f32,
}

impl Face {
    fn new(points: &[SupportMapping], vertices: [usize; 3]) -> Option<Self> {
        let [a, b, c] = vertices.map(|i| points[i].point);
        let normal = b.sub(&a).cross(&c.sub(&a)).normalize();
        if normal == Vec3::ZERO {
            return None;
        }
        let (closest, weights) = closest_on_triangle(&a, &b, &c);
        Some(Self {
            vertices,
            normal,
            weights,
            distance: closest.length(),
        })
    }
}

struct Polytope {
    points: Vec<SupportMapping>,
    faces: Vec<Face>,
}

impl Polytope {
    /// Builds the four outward-facing faces of a tetrahedron.
    fn from_tetrahedron(tetrahedron: [SupportMapping; 4]) -> Result<Self, NumericalFailure> {
        const FACES: [([usize; 3], usize); 4] =
            [([0, 1, 2], 3), ([0, 3, 1], 2), ([0, 2, 3], 1), ([1, 3, 2], 0)];
        let points = tetrahedron.to_vec();
        let mut faces = Vec::with_capacity(FACES.len());
        for ([i, j, k], opposite) in FACES {
            let a = points[i].point;
            let n = points[j].point.sub(&a).cross(&points[k].point.sub(&a));
            let side = n.dot(&points[opposite].point.sub(&a));
            if side.abs() <= f32::EPSILON {
                return Err(NumericalFailure::EpaDegenerate);
            }
            let vertices = if side > 0.0 { [i, k, j] } else { [i, j, k] };
            faces.push(Face::new(&points, vertices).ok_or(NumericalFailure::EpaDegenerate)?);
        }
        Ok(Self { points, faces })
    }

    fn closest_face(&self) -> Option<&Face> {
        self.faces
            .iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Adds `mapping` to the hull: removes the faces it sees and stitches
    /// the horizon. Returns `false` when the point does not extend the hull.
    fn expand(&mut self, mapping: SupportMapping) -> bool {
        let visible: Vec<usize> = self
            .faces
            .iter()
            .enumerate()
            .filter(|(_, f)| {
                let anchor = self.points[f.vertices[0]].point;
                f.normal.dot(&mapping.point.sub(&anchor)) > f32::EPSILON
            })
            .map(|(i, _)| i)
            .collect();
        if visible.is_empty() {
            return false;
        }

        let mut horizon: Vec<(usize, usize)> = Vec::new();
        for &face in &visible {
            let [a, b, c] = self.faces[face].vertices;
            for edge in [(a, b), (b, c), (c, a)] {
                if let Some(shared) = horizon.iter().position(|e| *e == (edge.1, edge.0)) {
                    horizon.swap_remove(shared);
                } else {
                    horizon.push(edge);
                }
            }
        }

        let new_index = self.points.len();
        self.points.push(mapping);
        let mut new_faces = Vec::with_capacity(horizon.len());
        for (a, b) in horizon {
            if let Some(face) = Face::new(&self.points, [a, b, new_index]) {
                new_faces.push(face);
            } else {
                self.points.pop();
                return false;
            }
        }

        let mut index = 0;
        self.faces.retain(|_| {
            let keep = !visible.contains(&index);
            index += 1;
            keep
        });
        self.faces.extend(new_faces);
        true
    }

    fn contact(&self, face: &Face) -> EpaContact {
        let (point_a, point_b) = face.vertices.iter().zip(face.weights).fold(
            (Vec3::ZERO, Vec3::ZERO),
            |(pa, pb), (&i, w)| {
                (
                    pa.add(&self.points[i].a.scale(w)),
                    pb.add(&self.points[i].b.scale(w)),
                )
            },
        );
        EpaContact {
            normal: face.normal,
            depth: face.distance,
            point_a,
            point_b,
        }
    }
}

/// Expanding polytope algorithm working on outer (margin-inclusive) shapes.
#[derive(Debug, Clone, Copy)]
pub struct Epa {
    config: EpaConfig,
}

impl Epa {
    /// EPA with the given tolerances.
    pub fn new(config: EpaConfig) -> Self {
        Self { config }
    }

    /// Penetration of `a` into `b`, starting from the GJK `simplex` that
    /// encloses the origin.
    ///
    /// `Ok(None)` means the objects only touch in a single point.
    pub fn process(
        &self,
        a: &ConvexObject,
        b: &ConvexObject,
        simplex: &Simplex,
    ) -> Result<Option<EpaContact>, NumericalFailure> {
        let Some(tetrahedron) = initial_tetrahedron(a, b, simplex)? else {
            return Ok(None);
        };
        let mut polytope = Polytope::from_tetrahedron(tetrahedron)?;

        let mut upper_bound = f32::MAX;
        let mut iteration = 0;
        loop {
            let face = polytope
                .closest_face()
                .cloned()
                .ok_or(NumericalFailure::EpaDegenerate)?;
            let mapping = support(a, b, &face.normal, true);
            upper_bound = upper_bound.min(mapping.point.dot(&face.normal));
            if upper_bound <= (1.0 + self.config.termination_tolerance) * face.distance {
                return Ok(Some(polytope.contact(&face)));
            }
            iteration += 1;
            if iteration > self.config.max_iterations {
                return Err(NumericalFailure::Epa);
            }
            if !polytope.expand(mapping) {
                return Ok(Some(polytope.contact(&face)));
            }
        }
    }
}

/// Grows the GJK simplex into a tetrahedron that contains the origin.
///
/// Returns `Ok(None)` for a single-point simplex (touching contact) and
/// [`NumericalFailure::EpaDegenerate`] when no seed encloses the origin.
fn initial_tetrahedron(
    a: &ConvexObject,
    b: &ConvexObject,
    simplex: &Simplex,
) -> Result<Option<[SupportMapping; 4]>, NumericalFailure> {
    let encloses = |[p, q, r, s]: &[SupportMapping; 4]| {
        tetrahedron_contains_origin(&p.point, &q.point, &r.point, &s.point)
    };
    let seed = match *simplex.mappings() {
        [p0, p1] => {
            let line = p1.point.sub(&p0.point).normalize();
            let axis = Vec3::ZERO.with_component(line.min_abs_axis(), 1.0);
            let rotation = Quat::from_axis_angle(line, TAU / 3.0);
            let v1 = line.cross(&axis);
            let v2 = rotation.rotate(&v1);
            let v3 = rotation.rotate(&v2);
            let [s1, s2, s3] = [v1, v2, v3].map(|v| support(a, b, &v, true));
            let first = [p0, s1, s2, s3];
            if encloses(&first) {
                first
            } else {
                [p1, s1, s2, s3]
            }
        }
        [p0, p1, p2] => {
            let normal = p1.point.sub(&p0.point).cross(&p2.point.sub(&p0.point));
            let above = [p0, p1, p2, support(a, b, &normal, true)];
            if encloses(&above) {
                above
            } else {
                [p0, p1, p2, support(a, b, &-normal, true)]
            }
        }
        [p0, p1, p2, p3] => [p0, p1, p2, p3],
        _ => return Ok(None),
    };
    if encloses(&seed) {
        Ok(Some(seed))
    } else {
        Err(NumericalFailure::EpaDegenerate)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use echo_geom::{CollisionShape, Pose};

    use super::super::gjk::{Gjk, GjkResult};
    use super::*;
    use crate::config::GjkConfig;

    fn penetration(a: &ConvexObject, b: &ConvexObject) -> EpaContact {
        let GjkResult::Collide(simplex) = Gjk::new(GjkConfig::default()).process(a, b, true).unwrap()
        else {
            unreachable!("objects overlap");
        };
        Epa::new(EpaConfig::default())
            .process(a, b, &simplex)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn overlapping_boxes() {
        let cube = CollisionShape::cuboid(Vec3::ONE).unwrap();
        let center_a = Vec3::ZERO;
        let center_b = Vec3::new(1.5, 0.3, 0.2);
        let a = cube.to_convex_object(&Pose::from_position(center_a)).unwrap();
        let b = cube.to_convex_object(&Pose::from_position(center_b)).unwrap();
        let contact = penetration(&a, &b);
        assert!(contact.depth > 0.0);
        assert!(contact.normal.dot(&center_b.sub(&center_a)) > 0.0);
        assert!((contact.depth - 0.5).abs() < 0.02, "depth {}", contact.depth);
        assert!((contact.normal.x() - 1.0).abs() < 1e-2);
    }

    #[test]
    fn flat_overlap_is_reported_as_degenerate() {
        let a = ConvexObject::Triangle {
            points: [
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(2.0, -1.0, 0.0),
                Vec3::new(-1.0, 2.0, 0.0),
            ],
        };
        let b = ConvexObject::Triangle {
            points: [Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.0, 0.5, 0.0)],
        };
        let mut simplex = Simplex::from_point(SupportMapping::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::ZERO));
        simplex.add_point(SupportMapping::new(Vec3::new(2.0, -1.0, 0.0), Vec3::ZERO));
        simplex.add_point(SupportMapping::new(Vec3::new(-1.0, 2.0, 0.0), Vec3::ZERO));
        assert_eq!(simplex.len(), 3);
        assert_eq!(
            Epa::new(EpaConfig::default()).process(&a, &b, &simplex),
            Err(NumericalFailure::EpaDegenerate)
        );
    }
}
