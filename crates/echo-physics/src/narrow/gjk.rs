// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use echo_geom::ConvexObject;
use echo_math::Vec3;

use super::simplex::{Simplex, SupportMapping};
use super::NumericalFailure;
use crate::config::GjkConfig;

/// Outcome of a converged GJK run.
#[derive(Debug, Clone, PartialEq)]
pub enum GjkResult {
    /// The objects overlap; the simplex seeds EPA.
    Collide(Simplex),
    /// The objects are apart.
    Separated {
        /// Distance between the two objects.
        distance: f32,
        /// Witness point on A.
        point_a: Vec3,
        /// Witness point on B.
        point_b: Vec3,
        /// Final simplex.
        simplex: Simplex,
    },
}

impl GjkResult {
    /// `true` for [`GjkResult::Collide`].
    pub fn is_collide(&self) -> bool {
        matches!(self, Self::Collide(_))
    }
}

/// Gilbert-Johnson-Keerthi distance query over support mappings.
#[derive(Debug, Clone, Copy)]
pub struct Gjk {
    config: GjkConfig,
}

pub(crate) fn support(a: &ConvexObject, b: &ConvexObject, dir: &Vec3, include_margin: bool) -> SupportMapping {
    SupportMapping::new(
        a.support_point(dir, include_margin),
        b.support_point(&-*dir, include_margin),
    )
}

impl Gjk {
    /// GJK with the given tolerances.
    pub fn new(config: GjkConfig) -> Self {
        Self { config }
    }

    /// Distance query between `a` and `b`.
    ///
    /// With `include_margin == false` only the inner shapes are compared.
    pub fn process(
        &self,
        a: &ConvexObject,
        b: &ConvexObject,
        include_margin: bool,
    ) -> Result<GjkResult, NumericalFailure> {
        let mut simplex = Simplex::from_point(support(a, b, &Vec3::UNIT_X, include_margin));
        let mut direction = -simplex.closest_point_to_origin();
        let mut tolerance_multiplier = 1.0_f32;

        for _ in 0..self.config.max_iterations {
            let mapping = support(a, b, &direction, include_margin);
            let v = simplex.closest_point_to_origin();
            let v_square = v.length_squared();
            let v_dot_w = v.dot(&mapping.point);

            let tolerance = (self.config.minimum_termination_tolerance * tolerance_multiplier)
                .max(self.config.relative_termination_tolerance * v_square);
            if v_square - v_dot_w <= tolerance || simplex.contains_point(&mapping.point) {
                if v_dot_w <= 0.0 {
                    return Ok(GjkResult::Collide(simplex));
                }
                let (point_a, point_b) = simplex.closest_points();
                return Ok(GjkResult::Separated {
                    distance: v_square.sqrt(),
                    point_a,
                    point_b,
                    simplex,
                });
            }

            simplex.add_point(mapping);
            direction = -simplex.closest_point_to_origin();
            tolerance_multiplier += self.config.percentage_increase_of_minimum_tolerance;
        }
        Err(NumericalFailure::Gjk)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use echo_geom::{CollisionShape, Pose};

    use super::*;

    fn gjk() -> Gjk {
        Gjk::new(GjkConfig::default())
    }

    fn object(shape: &CollisionShape, at: Vec3) -> ConvexObject {
        shape.to_convex_object(&Pose::from_position(at)).unwrap()
    }

    #[test]
    fn identical_spheres_collide() {
        let sphere = CollisionShape::sphere(1.0).unwrap();
        let a = object(&sphere, Vec3::new(1.0, 2.0, 3.0));
        let b = object(&sphere, Vec3::new(1.0, 2.0, 3.0));
        assert!(gjk().process(&a, &b, true).unwrap().is_collide());
        assert!(gjk().process(&a, &b, false).unwrap().is_collide());
    }

    #[test]
    fn separated_spheres_report_distance_and_witnesses() {
        let sphere = CollisionShape::sphere(10.0).unwrap();
        let dir = Vec3::new(1.0, 1.0, 1.0).normalize();
        let center_a = Vec3::ZERO;
        let center_b = dir.scale(20.0 + 1.3137);
        let a = object(&sphere, center_a);
        let b = object(&sphere, center_b);

        let GjkResult::Separated {
            distance,
            point_a,
            point_b,
            ..
        } = gjk().process(&a, &b, true).unwrap()
        else {
            unreachable!("spheres are apart");
        };
        assert!((distance - 1.3137).abs() < 0.01, "distance {distance}");
        for p in [point_a, point_b] {
            let off_line = p.sub(&center_a).cross(&dir).length();
            assert!(off_line < 0.01, "witness {p:?} is {off_line} off the centre line");
        }
    }

    #[test]
    fn inner_shapes_ignore_margins() {
        let sphere = CollisionShape::sphere(1.0).unwrap();
        let a = object(&sphere, Vec3::ZERO);
        let b = object(&sphere, Vec3::new(1.5, 0.0, 0.0));
        assert!(gjk().process(&a, &b, true).unwrap().is_collide());
        let GjkResult::Separated { distance, .. } = gjk().process(&a, &b, false).unwrap() else {
            unreachable!("sphere centres are apart");
        };
        assert!((distance - 1.5).abs() < 1e-4);
    }

    #[test]
    fn boxes_apart_and_overlapping() {
        let cube = CollisionShape::cuboid(Vec3::ONE).unwrap();
        let a = object(&cube, Vec3::ZERO);
        let far = object(&cube, Vec3::new(3.0, 0.5, 0.0));
        let GjkResult::Separated { distance, .. } = gjk().process(&a, &far, true).unwrap() else {
            unreachable!("boxes are apart");
        };
        assert!((distance - 1.0).abs() < 1e-3);
        let near = object(&cube, Vec3::new(1.5, 0.3, 0.2));
        assert!(gjk().process(&a, &near, true).unwrap().is_collide());
    }
}
