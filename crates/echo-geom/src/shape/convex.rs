// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use echo_math::{sign, Vec3};

use crate::shape::{Axis, ConeOrientation};
use crate::types::pose::Pose;

/// Convex volume placed in world space.
///
/// Every variant stores its *inner* dimensions plus the margin that separates
/// the inner shape from the real surface. `support_point(dir, false)` maps the
/// inner shape, `support_point(dir, true)` the outer one.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvexObject {
    /// Sphere: the inner shape is its centre and the margin is the radius.
    Sphere {
        /// Radius.
        radius: f32,
        /// World centre.
        center: Vec3,
    },
    /// Oriented box.
    Box {
        /// Inner margin.
        margin: f32,
        /// Inner half-extents.
        half_extents: Vec3,
        /// World pose.
        pose: Pose,
    },
    /// Capsule; the inner shape is a capsule of `radius`.
    Capsule {
        /// Inner margin.
        margin: f32,
        /// Inner radius.
        radius: f32,
        /// Half height of the cylindrical section.
        half_height: f32,
        /// Local axis.
        axis: Axis,
        /// World pose.
        pose: Pose,
    },
    /// Cylinder.
    Cylinder {
        /// Inner margin.
        margin: f32,
        /// Inner radius.
        radius: f32,
        /// Inner half height.
        half_height: f32,
        /// Local axis.
        axis: Axis,
        /// World pose.
        pose: Pose,
    },
    /// Cone positioned on its centre of mass: apex at `3h/4`, base at `-h/4`.
    Cone {
        /// Inner margin.
        margin: f32,
        /// Inner base radius.
        radius: f32,
        /// Inner height.
        height: f32,
        /// Apex direction.
        orientation: ConeOrientation,
        /// World pose.
        pose: Pose,
    },
    /// Convex hull of world-space points.
    Hull {
        /// Inner margin.
        margin: f32,
        /// World-space points.
        points: Vec<Vec3>,
        /// Reference centre.
        center: Vec3,
    },
    /// Triangle of a concave shape; no margin.
    Triangle {
        /// World-space corners.
        points: [Vec3; 3],
    },
}

fn furthest(points: &[Vec3], dir: &Vec3) -> Vec3 {
    points
        .iter()
        .copied()
        .fold((f32::NEG_INFINITY, Vec3::ZERO), |(best, p), q| {
            let d = q.dot(dir);
            if d > best {
                (d, q)
            } else {
                (best, p)
            }
        })
        .1
}

impl ConvexObject {
    /// Distance between the inner shape and the surface.
    pub fn margin(&self) -> f32 {
        match self {
            Self::Sphere { radius, .. } => *radius,
            Self::Box { margin, .. }
            | Self::Capsule { margin, .. }
            | Self::Cylinder { margin, .. }
            | Self::Cone { margin, .. }
            | Self::Hull { margin, .. } => *margin,
            Self::Triangle { .. } => 0.0,
        }
    }

    /// Reference centre of the object.
    pub fn center(&self) -> Vec3 {
        match self {
            Self::Sphere { center, .. } | Self::Hull { center, .. } => *center,
            Self::Box { pose, .. }
            | Self::Capsule { pose, .. }
            | Self::Cylinder { pose, .. }
            | Self::Cone { pose, .. } => pose.position(),
            Self::Triangle { points } => points[0].add(&points[1]).add(&points[2]).scale(1.0 / 3.0),
        }
    }

    /// Furthest point of the object along `dir`.
    ///
    /// `dir` does not need to be normalised. A zero direction returns a point
    /// of the inner shape.
    pub fn support_point(&self, dir: &Vec3, include_margin: bool) -> Vec3 {
        let grow = if include_margin { self.margin() } else { 0.0 };
        match self {
            Self::Sphere { center, radius } => {
                if include_margin {
                    center.add(&dir.normalize().scale(*radius))
                } else {
                    *center
                }
            }
            Self::Box {
                half_extents, pose, ..
            } => {
                let local = pose.inverse_rotate(dir);
                let half = half_extents.add(&Vec3::splat(grow));
                let p = Vec3::new(
                    sign(local.x()) * half.x(),
                    sign(local.y()) * half.y(),
                    sign(local.z()) * half.z(),
                );
                pose.transform_point(&p)
            }
            Self::Capsule {
                radius,
                half_height,
                axis,
                pose,
                ..
            } => {
                let local = pose.inverse_rotate(dir);
                let idx = axis.index();
                let end = Vec3::ZERO.with_component(idx, sign(local[idx]) * half_height);
                let p = end.add(&local.normalize().scale(radius + grow));
                pose.transform_point(&p)
            }
            Self::Cylinder {
                radius,
                half_height,
                axis,
                pose,
                ..
            } => {
                let local = pose.inverse_rotate(dir);
                let idx = axis.index();
                let radial = local.with_component(idx, 0.0).normalize().scale(radius + grow);
                let p = radial.with_component(idx, sign(local[idx]) * (half_height + grow));
                pose.transform_point(&p)
            }
            Self::Cone {
                radius,
                height,
                orientation,
                pose,
                ..
            } => {
                let local = pose.inverse_rotate(dir);
                let idx = orientation.axis().index();
                let s = orientation.sign();
                let apex = Vec3::ZERO.with_component(idx, s * height * 0.75);
                let rim = local
                    .with_component(idx, 0.0)
                    .normalize()
                    .scale(*radius)
                    .with_component(idx, -s * height * 0.25);
                let p = if apex.dot(&local) >= rim.dot(&local) {
                    apex
                } else {
                    rim
                };
                pose.transform_point(&p).add(&dir.normalize().scale(grow))
            }
            Self::Hull { points, .. } => furthest(points, dir).add(&dir.normalize().scale(grow)),
            Self::Triangle { points } => furthest(points, dir),
        }
    }

    /// Copy moved by `offset`; orientation is unchanged.
    pub fn translated(&self, offset: &Vec3) -> Self {
        let shift = |pose: &Pose| pose.with_position(pose.position().add(offset));
        match self {
            Self::Sphere { radius, center } => Self::Sphere {
                radius: *radius,
                center: center.add(offset),
            },
            Self::Box {
                margin,
                half_extents,
                pose,
            } => Self::Box {
                margin: *margin,
                half_extents: *half_extents,
                pose: shift(pose),
            },
            Self::Capsule {
                margin,
                radius,
                half_height,
                axis,
                pose,
            } => Self::Capsule {
                margin: *margin,
                radius: *radius,
                half_height: *half_height,
                axis: *axis,
                pose: shift(pose),
            },
            Self::Cylinder {
                margin,
                radius,
                half_height,
                axis,
                pose,
            } => Self::Cylinder {
                margin: *margin,
                radius: *radius,
                half_height: *half_height,
                axis: *axis,
                pose: shift(pose),
            },
            Self::Cone {
                margin,
                radius,
                height,
                orientation,
                pose,
            } => Self::Cone {
                margin: *margin,
                radius: *radius,
                height: *height,
                orientation: *orientation,
                pose: shift(pose),
            },
            Self::Hull {
                margin,
                points,
                center,
            } => Self::Hull {
                margin: *margin,
                points: points.iter().map(|p| p.add(offset)).collect(),
                center: center.add(offset),
            },
            Self::Triangle { points } => Self::Triangle {
                points: points.map(|p| p.add(offset)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use core::f32::consts::FRAC_PI_2;

    use echo_math::Quat;

    use super::*;

    fn assert_close(got: Vec3, want: [f32; 3]) {
        for (g, w) in got.to_array().iter().zip(want) {
            assert!((g - w).abs() < 1e-4, "got {got:?}, want {want:?}");
        }
    }

    #[test]
    fn sphere_support_with_and_without_margin() {
        let sphere = ConvexObject::Sphere {
            radius: 10.0,
            center: Vec3::ZERO,
        };
        assert_close(sphere.support_point(&Vec3::UNIT_X, false), [0.0, 0.0, 0.0]);
        assert_close(sphere.support_point(&Vec3::UNIT_X, true), [10.0, 0.0, 0.0]);
    }

    #[test]
    fn rotated_box_support() {
        let boxed = ConvexObject::Box {
            margin: 0.04,
            half_extents: Vec3::ONE,
            pose: Pose::new(Vec3::ZERO, Quat::from_axis_angle(Vec3::UNIT_Z, 2.356_194_5)),
        };
        let dir = Vec3::new(1.0, 0.0, -0.1);
        assert_close(boxed.support_point(&dir, false), [1.414_213_6, 0.0, -1.0]);
        assert_close(boxed.support_point(&dir, true), [1.470_782_1, 0.0, -1.04]);
    }

    #[test]
    fn rotated_capsule_support() {
        let capsule = ConvexObject::Capsule {
            margin: 0.04,
            radius: 0.5,
            half_height: 2.5,
            axis: Axis::Y,
            pose: Pose::new(
                Vec3::ONE,
                Quat::from_axis_angle(Vec3::UNIT_Z, 2.356_194_5),
            ),
        };
        assert_close(
            capsule.support_point(&Vec3::UNIT_X, false),
            [3.267_767, 2.767_767, 1.0],
        );
        assert_close(
            capsule.support_point(&Vec3::UNIT_X, true),
            [3.307_767, 2.767_767, 1.0],
        );
    }

    #[test]
    fn cone_apex_and_base() {
        let cone = ConvexObject::Cone {
            margin: 0.04,
            radius: 1.0,
            height: 3.0,
            orientation: ConeOrientation::YPositive,
            pose: Pose::new(
                Vec3::new(0.25, 1.0, 0.0),
                Quat::from_axis_angle(Vec3::new(0.0, 0.0, -1.0), FRAC_PI_2),
            ),
        };
        assert_close(cone.support_point(&Vec3::UNIT_X, false), [2.5, 1.0, 0.0]);
        assert_close(cone.support_point(&Vec3::new(0.0, -1.0, 0.0), false), [-0.5, 0.0, 0.0]);
        assert_close(cone.support_point(&Vec3::new(0.0, 1.0, 0.0), false), [-0.5, 2.0, 0.0]);
    }

    #[test]
    fn translated_box_moves_support() {
        let boxed = ConvexObject::Box {
            margin: 0.04,
            half_extents: Vec3::ONE,
            pose: Pose::identity(),
        };
        let moved = boxed.translated(&Vec3::new(2.0, 0.0, 0.0));
        assert_close(moved.support_point(&Vec3::UNIT_X, true), [3.04, 1.04, 1.04]);
        assert_close(moved.center(), [2.0, 0.0, 0.0]);
    }

    #[test]
    fn cylinder_support_picks_cap_rim() {
        let cylinder = ConvexObject::Cylinder {
            margin: 0.04,
            radius: 0.5,
            half_height: 2.5,
            axis: Axis::Y,
            pose: Pose::new(
                Vec3::ONE,
                Quat::from_axis_angle(Vec3::UNIT_Z, 2.356_194_5),
            ),
        };
        assert_close(
            cylinder.support_point(&Vec3::UNIT_X, false),
            [3.121_320_3, 2.414_213_6, 1.0],
        );
    }
}
