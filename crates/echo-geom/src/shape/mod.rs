// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Collision shapes.
//!
//! A [`CollisionShape`] is the immutable, body-local description of a
//! collider. Convex shapes keep an *inner margin*: the narrow phase runs GJK
//! on the shrunken inner shape and adds the margin back afterwards, which
//! keeps GJK away from the degenerate touching configuration where it
//! converges slowly.
//!
//! Shapes are placed in the world with [`CollisionShape::to_convex_object`],
//! which produces a [`convex::ConvexObject`] exposing support mapping.

/// World-space convex objects used by GJK/EPA.
pub mod convex;
/// Grid heightfield (concave) shape.
pub mod heightfield;

use echo_math::Vec3;

use crate::shape::convex::ConvexObject;
use crate::shape::heightfield::Heightfield;
use crate::types::{aabb::Aabb, pose::Pose};
use crate::GeomError;

/// Margin applied to convex shapes unless the shape is too thin for it.
pub const DEFAULT_INNER_MARGIN: f32 = 0.04;

/// Largest fraction of a shape's smallest half dimension the margin may take.
pub const MAXIMUM_MARGIN_PERCENTAGE: f32 = 0.5;

/// Local axis a capsule or cylinder is aligned with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Axis {
    /// Local X.
    X,
    /// Local Y.
    #[default]
    Y,
    /// Local Z.
    Z,
}

impl Axis {
    /// Component index of the axis.
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

/// Direction a cone's apex points to in local space.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum ConeOrientation {
    /// Apex towards +X.
    XPositive,
    /// Apex towards -X.
    XNegative,
    /// Apex towards +Y.
    #[default]
    YPositive,
    /// Apex towards -Y.
    YNegative,
    /// Apex towards +Z.
    ZPositive,
    /// Apex towards -Z.
    ZNegative,
}

impl ConeOrientation {
    /// Axis the cone is aligned with.
    pub const fn axis(self) -> Axis {
        match self {
            Self::XPositive | Self::XNegative => Axis::X,
            Self::YPositive | Self::YNegative => Axis::Y,
            Self::ZPositive | Self::ZNegative => Axis::Z,
        }
    }

    /// `1.0` when the apex points along the positive axis, `-1.0` otherwise.
    pub const fn sign(self) -> f32 {
        match self {
            Self::XPositive | Self::YPositive | Self::ZPositive => 1.0,
            Self::XNegative | Self::YNegative | Self::ZNegative => -1.0,
        }
    }
}

/// Shape family, used by the collision-algorithm selector.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShapeType {
    /// Sphere.
    Sphere,
    /// Box.
    Box,
    /// Capsule.
    Capsule,
    /// Cylinder.
    Cylinder,
    /// Cone.
    Cone,
    /// Convex hull of a point cloud.
    ConvexHull,
    /// Compound of convex children.
    Compound,
    /// Grid heightfield.
    Heightfield,
}

/// Broad classification of a shape family.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShapeCategory {
    /// Single convex volume.
    Convex,
    /// Union of convex children.
    Compound,
    /// Triangle soup; only collides with convex shapes.
    Concave,
}

impl ShapeType {
    /// Category of this shape family.
    pub const fn category(self) -> ShapeCategory {
        match self {
            Self::Sphere
            | Self::Box
            | Self::Capsule
            | Self::Cylinder
            | Self::Cone
            | Self::ConvexHull => ShapeCategory::Convex,
            Self::Compound => ShapeCategory::Compound,
            Self::Heightfield => ShapeCategory::Concave,
        }
    }
}

/// Child of a compound shape, placed relative to the compound's origin.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalizedShape {
    /// Pose of the child in the compound's local space.
    pub pose: Pose,
    /// Convex child shape.
    pub shape: CollisionShape,
}

/// Geometry of a collision shape.
///
/// Dimensions are the outer (margin-inclusive) size of the shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    /// Sphere of `radius`.
    Sphere {
        /// Radius.
        radius: f32,
    },
    /// Box of `half_extents`.
    Box {
        /// Half-extents along the local axes.
        half_extents: Vec3,
    },
    /// Cylinder of `cylinder_height` capped by two hemispheres of `radius`.
    Capsule {
        /// Hemisphere radius.
        radius: f32,
        /// Height of the cylindrical section.
        cylinder_height: f32,
        /// Local axis of the capsule.
        axis: Axis,
    },
    /// Cylinder.
    Cylinder {
        /// Radius.
        radius: f32,
        /// Full height.
        height: f32,
        /// Local axis of the cylinder.
        axis: Axis,
    },
    /// Cone centred on its centre of mass.
    Cone {
        /// Base radius.
        radius: f32,
        /// Full height.
        height: f32,
        /// Apex direction.
        orientation: ConeOrientation,
    },
    /// Convex hull of local points.
    ConvexHull {
        /// Hull points in local space.
        points: Vec<Vec3>,
    },
    /// Union of convex children.
    Compound {
        /// Children placed in local space.
        children: Vec<LocalizedShape>,
    },
    /// Heightfield grid.
    Heightfield(Heightfield),
}

/// Immutable collision shape with its precomputed inner margin.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionShape {
    kind: ShapeKind,
    margin: f32,
}

fn check_dimension(shape: &'static str, name: &str, value: f32) -> Result<f32, GeomError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(GeomError::InvalidDimension {
            shape,
            detail: format!("{name} = {value}"),
        })
    }
}

fn safe_margin(min_half_dimension: f32) -> f32 {
    DEFAULT_INNER_MARGIN.min(min_half_dimension * MAXIMUM_MARGIN_PERCENTAGE)
}

fn box_inertia(mass: f32, size: &Vec3) -> Vec3 {
    let [w, h, d] = size.to_array();
    Vec3::new(
        mass / 12.0 * (h * h + d * d),
        mass / 12.0 * (w * w + d * d),
        mass / 12.0 * (w * w + h * h),
    )
}

impl CollisionShape {
    /// Sphere of `radius`.
    pub fn sphere(radius: f32) -> Result<Self, GeomError> {
        let radius = check_dimension("sphere", "radius", radius)?;
        Ok(Self {
            kind: ShapeKind::Sphere { radius },
            margin: radius,
        })
    }

    /// Box with outer `half_extents`.
    pub fn cuboid(half_extents: Vec3) -> Result<Self, GeomError> {
        for (i, name) in ["half_extents.x", "half_extents.y", "half_extents.z"]
            .iter()
            .enumerate()
        {
            check_dimension("box", name, half_extents[i])?;
        }
        Ok(Self {
            margin: safe_margin(half_extents.min_component()),
            kind: ShapeKind::Box { half_extents },
        })
    }

    /// Capsule aligned with `axis`.
    pub fn capsule(radius: f32, cylinder_height: f32, axis: Axis) -> Result<Self, GeomError> {
        let radius = check_dimension("capsule", "radius", radius)?;
        let cylinder_height = check_dimension("capsule", "cylinder_height", cylinder_height)?;
        Ok(Self {
            margin: safe_margin(radius),
            kind: ShapeKind::Capsule {
                radius,
                cylinder_height,
                axis,
            },
        })
    }

    /// Cylinder aligned with `axis`.
    pub fn cylinder(radius: f32, height: f32, axis: Axis) -> Result<Self, GeomError> {
        let radius = check_dimension("cylinder", "radius", radius)?;
        let height = check_dimension("cylinder", "height", height)?;
        Ok(Self {
            margin: safe_margin(radius.min(height * 0.5)),
            kind: ShapeKind::Cylinder {
                radius,
                height,
                axis,
            },
        })
    }

    /// Cone whose apex points along `orientation`.
    pub fn cone(radius: f32, height: f32, orientation: ConeOrientation) -> Result<Self, GeomError> {
        let radius = check_dimension("cone", "radius", radius)?;
        let height = check_dimension("cone", "height", height)?;
        Ok(Self {
            margin: safe_margin(radius.min(height * 0.5)),
            kind: ShapeKind::Cone {
                radius,
                height,
                orientation,
            },
        })
    }

    /// Convex hull of `points`. Hulls carry no margin.
    pub fn convex_hull(points: Vec<Vec3>) -> Result<Self, GeomError> {
        if points.is_empty() {
            return Err(GeomError::Empty("convex hull"));
        }
        if let Some(bad) = points.iter().find(|p| !p.is_finite()) {
            return Err(GeomError::InvalidDimension {
                shape: "convex hull",
                detail: format!("point {bad:?}"),
            });
        }
        Ok(Self {
            kind: ShapeKind::ConvexHull { points },
            margin: 0.0,
        })
    }

    /// Compound of convex `children`.
    pub fn compound(children: Vec<LocalizedShape>) -> Result<Self, GeomError> {
        if children.is_empty() {
            return Err(GeomError::Empty("compound"));
        }
        if let Some(child) = children
            .iter()
            .find(|c| c.shape.category() != ShapeCategory::Convex)
        {
            return Err(GeomError::NotConvex(child.shape.shape_type()));
        }
        Ok(Self {
            kind: ShapeKind::Compound { children },
            margin: 0.0,
        })
    }

    /// Heightfield shape.
    pub fn heightfield(heightfield: Heightfield) -> Self {
        Self {
            kind: ShapeKind::Heightfield(heightfield),
            margin: 0.0,
        }
    }

    /// Shape geometry.
    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// Inner margin (distance between inner and outer shape).
    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// Shape family.
    pub fn shape_type(&self) -> ShapeType {
        match &self.kind {
            ShapeKind::Sphere { .. } => ShapeType::Sphere,
            ShapeKind::Box { .. } => ShapeType::Box,
            ShapeKind::Capsule { .. } => ShapeType::Capsule,
            ShapeKind::Cylinder { .. } => ShapeType::Cylinder,
            ShapeKind::Cone { .. } => ShapeType::Cone,
            ShapeKind::ConvexHull { .. } => ShapeType::ConvexHull,
            ShapeKind::Compound { .. } => ShapeType::Compound,
            ShapeKind::Heightfield(_) => ShapeType::Heightfield,
        }
    }

    /// Category of the shape family.
    pub fn category(&self) -> ShapeCategory {
        self.shape_type().category()
    }

    /// Whether the shape is a single convex volume.
    pub fn is_convex(&self) -> bool {
        self.category() == ShapeCategory::Convex
    }

    /// Bounds of the outer shape in local space.
    pub fn local_aabb(&self) -> Aabb {
        match &self.kind {
            ShapeKind::Sphere { radius } => {
                Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(*radius))
            }
            ShapeKind::Box { half_extents } => {
                Aabb::from_center_half_extents(Vec3::ZERO, *half_extents)
            }
            ShapeKind::Capsule {
                radius,
                cylinder_height,
                axis,
            } => {
                let half = Vec3::splat(*radius)
                    .with_component(axis.index(), radius + cylinder_height * 0.5);
                Aabb::from_center_half_extents(Vec3::ZERO, half)
            }
            ShapeKind::Cylinder {
                radius,
                height,
                axis,
            } => {
                let half = Vec3::splat(*radius).with_component(axis.index(), height * 0.5);
                Aabb::from_center_half_extents(Vec3::ZERO, half)
            }
            ShapeKind::Cone {
                radius,
                height,
                orientation,
            } => {
                let idx = orientation.axis().index();
                let sign = orientation.sign();
                let apex = Vec3::ZERO.with_component(idx, sign * height * 0.75);
                let base = Vec3::ZERO.with_component(idx, -sign * height * 0.25);
                let r = Vec3::splat(*radius).with_component(idx, 0.0);
                Aabb::new(apex, base)
                    .union(&Aabb::from_center_half_extents(base, r))
            }
            ShapeKind::ConvexHull { points } => {
                Aabb::from_points(points).unwrap_or_else(|| Aabb::new(Vec3::ZERO, Vec3::ZERO))
            }
            ShapeKind::Compound { children } => children
                .iter()
                .map(|c| c.shape.local_aabb().transformed(&c.pose.to_mat4()))
                .reduce(|a, b| a.union(&b))
                .unwrap_or_else(|| Aabb::new(Vec3::ZERO, Vec3::ZERO)),
            ShapeKind::Heightfield(hf) => hf.local_aabb(),
        }
    }

    /// World-space bounds of the shape placed at `pose`.
    pub fn aabb(&self, pose: &Pose) -> Aabb {
        match &self.kind {
            ShapeKind::Sphere { radius } => {
                Aabb::from_center_half_extents(pose.position(), Vec3::splat(*radius))
            }
            _ => self.local_aabb().transformed(&pose.to_mat4()),
        }
    }

    /// Smallest distance from the centre to the outer surface.
    ///
    /// Scales the continuous-collision motion threshold of a body.
    pub fn min_distance_to_center(&self) -> f32 {
        match &self.kind {
            ShapeKind::Sphere { radius } | ShapeKind::Capsule { radius, .. } => *radius,
            ShapeKind::Box { half_extents } => half_extents.min_component(),
            ShapeKind::Cylinder { radius, height, .. } | ShapeKind::Cone { radius, height, .. } => {
                radius.min(height * 0.5)
            }
            ShapeKind::ConvexHull { .. } | ShapeKind::Compound { .. } => {
                self.local_aabb().half_extents().min_component()
            }
            ShapeKind::Heightfield(_) => 0.0,
        }
    }

    /// Diagonal of the local inertia tensor for a body of `mass`.
    ///
    /// Hulls, compounds, heightfields and capsules use the inertia of their
    /// bounding box.
    pub fn local_inertia(&self, mass: f32) -> Vec3 {
        match &self.kind {
            ShapeKind::Sphere { radius } => Vec3::splat(0.4 * mass * radius * radius),
            ShapeKind::Box { half_extents } => box_inertia(mass, &half_extents.scale(2.0)),
            ShapeKind::Cylinder {
                radius,
                height,
                axis,
            } => {
                let side = mass / 12.0 * (3.0 * radius * radius + height * height);
                Vec3::splat(side).with_component(axis.index(), 0.5 * mass * radius * radius)
            }
            ShapeKind::Cone {
                radius,
                height,
                orientation,
            } => {
                let side = 3.0 * mass / 20.0 * (radius * radius + 4.0 * height * height);
                Vec3::splat(side)
                    .with_component(orientation.axis().index(), 0.3 * mass * radius * radius)
            }
            ShapeKind::Capsule { .. }
            | ShapeKind::ConvexHull { .. }
            | ShapeKind::Compound { .. }
            | ShapeKind::Heightfield(_) => {
                box_inertia(mass, &self.local_aabb().half_extents().scale(2.0))
            }
        }
    }

    /// Uniformly scaled copy.
    ///
    /// Boxes scale their inner part and keep the margin; heightfields only
    /// accept a unit scale.
    pub fn scaled(&self, scale: f32) -> Result<Self, GeomError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(GeomError::InvalidDimension {
                shape: "scale",
                detail: format!("scale = {scale}"),
            });
        }
        match &self.kind {
            ShapeKind::Sphere { radius } => Self::sphere(radius * scale),
            ShapeKind::Box { half_extents } => {
                let inner = half_extents.sub(&Vec3::splat(self.margin));
                let outer = inner.scale(scale).add(&Vec3::splat(self.margin));
                Self::cuboid(outer)
            }
            ShapeKind::Capsule {
                radius,
                cylinder_height,
                axis,
            } => Self::capsule(radius * scale, cylinder_height * scale, *axis),
            ShapeKind::Cylinder {
                radius,
                height,
                axis,
            } => Self::cylinder(radius * scale, height * scale, *axis),
            ShapeKind::Cone {
                radius,
                height,
                orientation,
            } => Self::cone(radius * scale, height * scale, *orientation),
            ShapeKind::ConvexHull { points } => {
                Self::convex_hull(points.iter().map(|p| p.scale(scale)).collect())
            }
            ShapeKind::Compound { children } => {
                let scaled = children
                    .iter()
                    .map(|c| {
                        Ok(LocalizedShape {
                            pose: c.pose.with_position(c.pose.position().scale(scale)),
                            shape: c.shape.scaled(scale)?,
                        })
                    })
                    .collect::<Result<Vec<_>, GeomError>>()?;
                Self::compound(scaled)
            }
            ShapeKind::Heightfield(hf) => {
                if (scale - 1.0).abs() > f32::EPSILON {
                    return Err(GeomError::InvalidDimension {
                        shape: "heightfield",
                        detail: format!("scaling is not supported (scale = {scale})"),
                    });
                }
                Ok(Self::heightfield(hf.clone()))
            }
        }
    }

    /// Places a convex shape at `pose`.
    ///
    /// Compound and concave shapes have no single convex representation and
    /// yield [`GeomError::NotConvex`].
    pub fn to_convex_object(&self, pose: &Pose) -> Result<ConvexObject, GeomError> {
        let margin = self.margin;
        match &self.kind {
            ShapeKind::Sphere { radius } => Ok(ConvexObject::Sphere {
                radius: *radius,
                center: pose.position(),
            }),
            ShapeKind::Box { half_extents } => Ok(ConvexObject::Box {
                margin,
                half_extents: half_extents.sub(&Vec3::splat(margin)),
                pose: *pose,
            }),
            ShapeKind::Capsule {
                radius,
                cylinder_height,
                axis,
            } => Ok(ConvexObject::Capsule {
                margin,
                radius: radius - margin,
                half_height: cylinder_height * 0.5,
                axis: *axis,
                pose: *pose,
            }),
            ShapeKind::Cylinder {
                radius,
                height,
                axis,
            } => Ok(ConvexObject::Cylinder {
                margin,
                radius: radius - margin,
                half_height: height * 0.5 - margin,
                axis: *axis,
                pose: *pose,
            }),
            ShapeKind::Cone {
                radius,
                height,
                orientation,
            } => Ok(ConvexObject::Cone {
                margin,
                radius: radius - margin,
                height: height - 2.0 * margin,
                orientation: *orientation,
                pose: *pose,
            }),
            ShapeKind::ConvexHull { points } => Ok(ConvexObject::Hull {
                margin,
                points: points.iter().map(|p| pose.transform_point(p)).collect(),
                center: pose.position(),
            }),
            ShapeKind::Compound { .. } | ShapeKind::Heightfield(_) => {
                Err(GeomError::NotConvex(self.shape_type()))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn thin_box_margin_is_capped() {
        let shape = CollisionShape::cuboid(Vec3::new(1.0, 0.02, 1.0)).unwrap();
        assert!((shape.margin() - 0.01).abs() < 1e-6);
        let thick = CollisionShape::cuboid(Vec3::splat(1.0)).unwrap();
        assert!((thick.margin() - DEFAULT_INNER_MARGIN).abs() < 1e-6);
    }

    #[test]
    fn scaled_box_keeps_margin() {
        let shape = CollisionShape::cuboid(Vec3::new(2.29, 1.52, 0.2075)).unwrap();
        let scaled = shape.scaled(2.0).unwrap();
        let ShapeKind::Box { half_extents } = scaled.kind() else {
            unreachable!("scaling preserves the shape family");
        };
        let expected = [4.54, 3.0, 0.375];
        for (got, want) in half_extents.to_array().iter().zip(expected) {
            assert!((got - want).abs() < 1e-5, "got {got}, want {want}");
        }
        assert!((scaled.margin() - 0.04).abs() < 1e-6);
    }

    #[test]
    fn compound_rejects_concave_children() {
        let hf = Heightfield::new(vec![0.0; 4], 2, 2, 1.0).unwrap();
        let err = CollisionShape::compound(vec![LocalizedShape {
            pose: Pose::identity(),
            shape: CollisionShape::heightfield(hf),
        }]);
        assert_eq!(err, Err(GeomError::NotConvex(ShapeType::Heightfield)));
    }

    #[test]
    fn negative_radius_is_rejected() {
        assert!(CollisionShape::sphere(-1.0).is_err());
        assert!(CollisionShape::sphere(f32::NAN).is_err());
    }

    #[test]
    fn sphere_inertia_matches_solid_sphere() {
        let shape = CollisionShape::sphere(2.0).unwrap();
        let i = shape.local_inertia(10.0);
        assert!((i.x() - 16.0).abs() < 1e-5);
    }

    #[test]
    fn compound_and_heightfield_have_no_convex_object() {
        let child = LocalizedShape {
            pose: Pose::identity(),
            shape: CollisionShape::sphere(1.0).unwrap(),
        };
        let compound = CollisionShape::compound(vec![child]).unwrap();
        assert!(compound.to_convex_object(&Pose::identity()).is_err());
    }
}
