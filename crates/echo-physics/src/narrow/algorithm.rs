// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Collision algorithms and the selector that picks one per shape pair.

use echo_geom::shape::ShapeKind;
use echo_geom::{CollisionShape, ConvexObject, Pose, ShapeCategory, ShapeType};
use echo_math::Vec3;

use super::epa::Epa;
use super::gjk::{Gjk, GjkResult};
use super::NumericalFailure;
use crate::error::PhysicsError;
use crate::manifold::{DetectedContact, ManifoldResult};
use crate::pool::{Handle, Pool};

/// Detector family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    /// Closed-form sphere/sphere.
    SphereSphere,
    /// Closed-form sphere/box; the sphere is the first object.
    SphereBox,
    /// GJK on inner shapes, EPA on deep penetration.
    ConvexConvex,
    /// Compound against anything: one sub-detection per child.
    CompoundAny,
    /// Concave (heightfield) against a convex shape, triangle by triangle.
    ConcaveAny,
}

/// Picks the detector for a shape pair.
///
/// The boolean is `true` when the detector expects the two objects in the
/// opposite order. Two concave shapes never collide and yield `None`.
pub fn select(shape1: &CollisionShape, shape2: &CollisionShape) -> Option<(AlgorithmKind, bool)> {
    use ShapeCategory::{Compound, Concave};
    let selected = match (shape1.shape_type(), shape2.shape_type()) {
        (ShapeType::Sphere, ShapeType::Sphere) => (AlgorithmKind::SphereSphere, false),
        (ShapeType::Sphere, ShapeType::Box) => (AlgorithmKind::SphereBox, false),
        (ShapeType::Box, ShapeType::Sphere) => (AlgorithmKind::SphereBox, true),
        _ => match (shape1.category(), shape2.category()) {
            (Concave, Concave) => return None,
            (Compound, _) => (AlgorithmKind::CompoundAny, false),
            (_, Compound) => (AlgorithmKind::CompoundAny, true),
            (Concave, _) => (AlgorithmKind::ConcaveAny, false),
            (_, Concave) => (AlgorithmKind::ConcaveAny, true),
            _ => (AlgorithmKind::ConvexConvex, false),
        },
    };
    Some(selected)
}

/// Shape placed in the world, as seen by a detector.
#[derive(Debug, Clone, Copy)]
pub struct CollisionObject<'a> {
    /// Shape.
    pub shape: &'a CollisionShape,
    /// World pose.
    pub pose: Pose,
}

/// Shared state for one narrow-phase step.
pub(crate) struct DetectionContext<'a> {
    pub(crate) gjk: Gjk,
    pub(crate) epa: Epa,
    pub(crate) contact_breaking_threshold: f32,
    pub(crate) objects: &'a mut Pool<ConvexObject>,
    pub(crate) failures: Vec<NumericalFailure>,
}

impl DetectionContext<'_> {
    fn place(&mut self, object: &CollisionObject<'_>) -> Result<Handle<ConvexObject>, PhysicsError> {
        let convex = object.shape.to_convex_object(&object.pose)?;
        Ok(self.objects.alloc(convex)?)
    }
}

/// Detector cached on an overlapping pair, with its persistent manifold.
#[derive(Debug, Clone)]
pub struct CollisionAlgorithm {
    kind: AlgorithmKind,
    swapped: bool,
    manifold: ManifoldResult,
}

impl CollisionAlgorithm {
    /// Algorithm for a pair whose bodies use the given manifold.
    pub fn new(kind: AlgorithmKind, swapped: bool, manifold: ManifoldResult) -> Self {
        Self {
            kind,
            swapped,
            manifold,
        }
    }

    /// Detector family.
    pub fn kind(&self) -> AlgorithmKind {
        self.kind
    }

    /// Whether the detector runs with the objects exchanged.
    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    /// Persistent manifold.
    pub fn manifold(&self) -> &ManifoldResult {
        &self.manifold
    }

    pub(crate) fn manifold_mut(&mut self) -> &mut ManifoldResult {
        &mut self.manifold
    }

    /// Refreshes the persistent contacts and adds the ones found at the
    /// current poses.
    pub(crate) fn process_collision(
        &mut self,
        object1: &CollisionObject<'_>,
        object2: &CollisionObject<'_>,
        ctx: &mut DetectionContext<'_>,
    ) -> Result<(), PhysicsError> {
        self.manifold.set_poses(object1.pose, object2.pose);
        self.manifold.refresh_contact_points();

        let mut contacts = Vec::new();
        detect_ordered(self.kind, self.swapped, object1, object2, ctx, &mut contacts)?;
        for contact in &contacts {
            self.manifold.add_contact(contact);
        }
        Ok(())
    }
}

/// Runs `kind` and reports contacts in the `(object1, object2)` order.
fn detect_ordered(
    kind: AlgorithmKind,
    swapped: bool,
    object1: &CollisionObject<'_>,
    object2: &CollisionObject<'_>,
    ctx: &mut DetectionContext<'_>,
    out: &mut Vec<DetectedContact>,
) -> Result<(), PhysicsError> {
    if swapped {
        let mut found = Vec::new();
        detect(kind, object2, object1, ctx, &mut found)?;
        out.extend(found.iter().map(DetectedContact::swapped));
        Ok(())
    } else {
        detect(kind, object1, object2, ctx, out)
    }
}

fn detect(
    kind: AlgorithmKind,
    a: &CollisionObject<'_>,
    b: &CollisionObject<'_>,
    ctx: &mut DetectionContext<'_>,
    out: &mut Vec<DetectedContact>,
) -> Result<(), PhysicsError> {
    match kind {
        AlgorithmKind::SphereSphere => {
            sphere_sphere(a, b, ctx.contact_breaking_threshold, out);
            Ok(())
        }
        AlgorithmKind::SphereBox => {
            sphere_box(a, b, ctx.contact_breaking_threshold, out);
            Ok(())
        }
        AlgorithmKind::ConvexConvex => {
            let handle_a = ctx.place(a)?;
            let handle_b = ctx.place(b)?;
            convex_convex(handle_a, handle_b, ctx, out);
            Ok(())
        }
        AlgorithmKind::CompoundAny => compound_any(a, b, ctx, out),
        AlgorithmKind::ConcaveAny => concave_any(a, b, ctx, out),
    }
}

fn sphere_radius(shape: &CollisionShape) -> f32 {
    match shape.kind() {
        ShapeKind::Sphere { radius } => *radius,
        _ => shape.min_distance_to_center(),
    }
}

fn sphere_sphere(
    a: &CollisionObject<'_>,
    b: &CollisionObject<'_>,
    threshold: f32,
    out: &mut Vec<DetectedContact>,
) {
    let (radius_a, radius_b) = (sphere_radius(a.shape), sphere_radius(b.shape));
    let center_a = a.pose.position();
    let center_b = b.pose.position();
    let delta = center_a.sub(&center_b);
    let distance = delta.length();
    let radii = radius_a + radius_b;
    if distance - threshold < radii {
        let mut normal = delta.normalize();
        if normal == Vec3::ZERO {
            normal = Vec3::UNIT_Y;
        }
        out.push(DetectedContact {
            normal_from_b: normal,
            point_on_b: center_b.add(&normal.scale(radius_b)),
            depth: distance - radii,
        });
    }
}

fn sphere_box(
    sphere: &CollisionObject<'_>,
    boxed: &CollisionObject<'_>,
    threshold: f32,
    out: &mut Vec<DetectedContact>,
) {
    let ShapeKind::Box { half_extents } = boxed.shape.kind() else {
        return;
    };
    let radius = sphere_radius(sphere.shape);
    let center = boxed.pose.inverse_transform_point(&sphere.pose.position());
    let closest = center.max(&-*half_extents).min(half_extents);
    let outward = center.sub(&closest);
    let distance = outward.length();
    if distance - threshold >= radius {
        return;
    }

    let (closest, normal, depth) = if distance > f32::EPSILON {
        (closest, outward.normalize(), distance - radius)
    } else {
        // Centre inside the box: leave through the nearest face.
        let gaps = half_extents.sub(&center.abs());
        let axis = (0..3)
            .min_by(|i, j| gaps[*i].total_cmp(&gaps[*j]))
            .unwrap_or(0);
        let side = echo_math::sign(center[axis]);
        let on_face = center.with_component(axis, side * half_extents[axis]);
        let normal = Vec3::ZERO.with_component(axis, side);
        (on_face, normal, -(gaps[axis] + radius))
    };
    out.push(DetectedContact {
        normal_from_b: boxed.pose.rotate(&normal),
        point_on_b: boxed.pose.transform_point(&closest),
        depth,
    });
}

fn convex_convex(
    handle_a: Handle<ConvexObject>,
    handle_b: Handle<ConvexObject>,
    ctx: &mut DetectionContext<'_>,
    out: &mut Vec<DetectedContact>,
) {
    let (Some(a), Some(b)) = (ctx.objects.get(handle_a), ctx.objects.get(handle_b)) else {
        return;
    };
    let inner = match ctx.gjk.process(a, b, false) {
        Ok(result) => result,
        Err(failure) => {
            ctx.failures.push(failure);
            return;
        }
    };

    match inner {
        GjkResult::Separated {
            point_a, point_b, ..
        } => {
            let vector_ba = point_a.sub(&point_b);
            let distance = vector_ba.length();
            let margins = a.margin() + b.margin();
            if margins > distance - ctx.contact_breaking_threshold {
                let normal = vector_ba.normalize();
                if normal == Vec3::ZERO {
                    return;
                }
                out.push(DetectedContact {
                    normal_from_b: normal,
                    point_on_b: point_b.add(&normal.scale(b.margin())),
                    depth: distance - margins,
                });
            }
        }
        GjkResult::Collide(_) => {
            let outer = match ctx.gjk.process(a, b, true) {
                Ok(GjkResult::Collide(simplex)) => simplex,
                Ok(GjkResult::Separated { .. }) => return,
                Err(failure) => {
                    ctx.failures.push(failure);
                    return;
                }
            };
            match ctx.epa.process(a, b, &outer) {
                Ok(Some(penetration)) => out.push(DetectedContact {
                    normal_from_b: -penetration.normal,
                    point_on_b: penetration.point_b,
                    depth: -penetration.depth,
                }),
                Ok(None) => {}
                Err(failure) => ctx.failures.push(failure),
            }
        }
    }
}

fn compound_any(
    compound: &CollisionObject<'_>,
    other: &CollisionObject<'_>,
    ctx: &mut DetectionContext<'_>,
    out: &mut Vec<DetectedContact>,
) -> Result<(), PhysicsError> {
    let ShapeKind::Compound { children } = compound.shape.kind() else {
        return Ok(());
    };
    for child in children {
        let placed = CollisionObject {
            shape: &child.shape,
            pose: compound.pose.compose(&child.pose),
        };
        if let Some((kind, swapped)) = select(placed.shape, other.shape) {
            detect_ordered(kind, swapped, &placed, other, ctx, out)?;
        }
    }
    Ok(())
}

fn concave_any(
    concave: &CollisionObject<'_>,
    other: &CollisionObject<'_>,
    ctx: &mut DetectionContext<'_>,
    out: &mut Vec<DetectedContact>,
) -> Result<(), PhysicsError> {
    let ShapeKind::Heightfield(heightfield) = concave.shape.kind() else {
        return Ok(());
    };
    let to_local = concave.pose.inverse().to_mat4();
    let bounds = other
        .shape
        .aabb(&other.pose)
        .transformed(&to_local)
        .inflate(ctx.contact_breaking_threshold);
    let handle_other = ctx.place(other)?;
    for triangle in heightfield.triangles_in_aabb(&bounds) {
        let points = triangle.map(|p| concave.pose.transform_point(&p));
        let handle_triangle = ctx.objects.alloc(ConvexObject::Triangle { points })?;
        convex_convex(handle_triangle, handle_other, ctx, out);
    }
    Ok(())
}
