// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sequential-impulse contact solver.
//!
//! Every contact point becomes one non-penetration constraint along the
//! manifold normal plus two friction constraints along orthogonal tangents.
//! Constraints are relaxed one at a time for a fixed number of iterations,
//! each iteration writing its impulse straight into the body velocities.
//!
//! Sign conventions: the normal points from body 2 toward body 1, the
//! relative velocity is `v2 - v1` at the contact, and normal impulses are
//! accumulated as non-positive values.

use std::collections::BTreeMap;

use echo_math::{Mat3, Vec3};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::body::{BodyKind, ObjectId, WorkBody};
use crate::config::SolverConfig;
use crate::manifold::{AccumulatedSolvingData, ManifoldResult};

#[derive(Debug, Clone, Copy)]
struct SolverBody {
    inv_mass: f32,
    inv_inertia: Mat3,
    linear_factor: Vec3,
    angular_factor: Vec3,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
}

impl SolverBody {
    fn from_work(body: &WorkBody) -> Self {
        let dynamic = body.is_dynamic() && body.is_active();
        Self {
            inv_mass: if dynamic { body.inv_mass } else { 0.0 },
            inv_inertia: if dynamic {
                body.inv_world_inertia
            } else {
                Mat3::zero()
            },
            linear_factor: body.linear_factor,
            angular_factor: body.angular_factor,
            linear_velocity: body.linear_velocity,
            angular_velocity: body.angular_velocity,
        }
    }

    fn velocity_at(&self, r: &Vec3) -> Vec3 {
        self.linear_velocity.add(&self.angular_velocity.cross(r))
    }

    fn apply_impulse(&mut self, impulse: &Vec3, r: &Vec3) {
        self.linear_velocity = self
            .linear_velocity
            .add(&impulse.scale(self.inv_mass).mul_elem(&self.linear_factor));
        self.angular_velocity = self.angular_velocity.add(
            &self
                .inv_inertia
                .transform(&r.cross(impulse))
                .mul_elem(&self.angular_factor),
        );
    }

    fn apply_angular_impulse(&mut self, impulse: &Vec3) {
        self.angular_velocity = self
            .angular_velocity
            .add(&self.inv_inertia.transform(impulse).mul_elem(&self.angular_factor));
    }
}

#[derive(Debug, Clone)]
struct ContactConstraint {
    manifold: usize,
    point: usize,
    body1: usize,
    body2: usize,
    r1: Vec3,
    r2: Vec3,
    normal: Vec3,
    tangents: [Vec3; 2],
    normal_mass: f32,
    tangent_mass: [f32; 2],
    bias: f32,
    friction: f32,
    rolling_friction: f32,
    accumulated: AccumulatedSolvingData,
    rolling_impulse: Vec3,
}

fn effective_mass(b1: &SolverBody, b2: &SolverBody, r1: &Vec3, r2: &Vec3, axis: &Vec3) -> f32 {
    let angular1 = b1.inv_inertia.transform(&r1.cross(axis)).cross(r1);
    let angular2 = b2.inv_inertia.transform(&r2.cross(axis)).cross(r2);
    let denominator = b1.inv_mass + b2.inv_mass + angular1.add(&angular2).dot(axis);
    if denominator > f32::EPSILON {
        1.0 / denominator
    } else {
        0.0
    }
}

/// Statistics of one solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveReport {
    /// Contact constraints built.
    pub constraints: usize,
    /// Bodies that received impulses.
    pub bodies: usize,
}

/// Sequential-impulse solver for contact constraints.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintSolver {
    config: SolverConfig,
}

impl ConstraintSolver {
    /// Solver with the given settings.
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Resolves the contacts of `manifolds` over a step of `dt` seconds.
    ///
    /// Velocities of the involved dynamic bodies are updated in place, and the
    /// final accumulated impulses are written back to each contact point so
    /// the next step can warm start from them.
    pub fn solve(
        &self,
        dt: f32,
        bodies: &mut BTreeMap<ObjectId, WorkBody>,
        manifolds: &mut [ManifoldResult],
    ) -> SolveReport {
        if dt <= 0.0 {
            return SolveReport::default();
        }
        let inv_dt = 1.0 / dt;
        let mut index_of: FxHashMap<ObjectId, usize> = FxHashMap::default();
        let mut solver_bodies: Vec<SolverBody> = Vec::new();
        let mut constraints: Vec<ContactConstraint> = Vec::new();

        for (manifold_index, manifold) in manifolds.iter().enumerate() {
            let (Some(work1), Some(work2)) = (bodies.get(&manifold.body1()), bodies.get(&manifold.body2()))
            else {
                continue;
            };
            if work1.kind() == BodyKind::Ghost || work2.kind() == BodyKind::Ghost {
                continue;
            }
            if !work1.is_dynamic() && !work2.is_dynamic() {
                continue;
            }
            let mut slot = |work: &WorkBody| {
                *index_of.entry(work.id()).or_insert_with(|| {
                    solver_bodies.push(SolverBody::from_work(work));
                    solver_bodies.len() - 1
                })
            };
            let (body1, body2) = (slot(work1), slot(work2));
            let friction = (work1.friction * work2.friction).sqrt();
            let rolling_friction = (work1.rolling_friction * work2.rolling_friction).sqrt();
            let restitution = work1.restitution.max(work2.restitution);

            for (point_index, contact) in manifold.contacts().iter().enumerate() {
                if contact.depth > 0.0 && !contact.predictive {
                    continue;
                }
                let (b1, b2) = (&solver_bodies[body1], &solver_bodies[body2]);
                let normal = contact.normal_from_b;
                let r1 = contact.point_on_b.sub(&work1.pose().position());
                let r2 = contact.point_on_b.sub(&work2.pose().position());
                let relative = b2.velocity_at(&r2).sub(&b1.velocity_at(&r1));
                let normal_velocity = relative.dot(&normal);

                let bias = if contact.predictive {
                    contact.depth * inv_dt
                } else {
                    let depth_bias = self.config.bias_factor * inv_dt * contact.depth;
                    let restitution_bias = if normal_velocity > self.config.restitution_velocity_threshold {
                        -restitution * normal_velocity
                    } else {
                        0.0
                    };
                    depth_bias.min(restitution_bias)
                };

                let tangential = relative.sub(&normal.scale(normal_velocity));
                let t1 = if tangential.length_squared() > f32::EPSILON {
                    tangential.normalize()
                } else {
                    normal.orthonormal_basis().0
                };
                let t2 = normal.cross(&t1);

                let accumulated = if self.config.use_warm_starting && !contact.predictive {
                    contact.accumulated
                } else {
                    AccumulatedSolvingData::default()
                };

                constraints.push(ContactConstraint {
                    manifold: manifold_index,
                    point: point_index,
                    body1,
                    body2,
                    r1,
                    r2,
                    normal,
                    tangents: [t1, t2],
                    normal_mass: effective_mass(b1, b2, &r1, &r2, &normal),
                    tangent_mass: [
                        effective_mass(b1, b2, &r1, &r2, &t1),
                        effective_mass(b1, b2, &r1, &r2, &t2),
                    ],
                    bias,
                    friction,
                    rolling_friction,
                    accumulated,
                    rolling_impulse: Vec3::ZERO,
                });
            }
        }

        for constraint in &constraints {
            let impulse = constraint
                .normal
                .scale(constraint.accumulated.normal_impulse)
                .add(&constraint.tangents[0].scale(constraint.accumulated.tangent_impulses[0]))
                .add(&constraint.tangents[1].scale(constraint.accumulated.tangent_impulses[1]));
            apply_pair(&mut solver_bodies, constraint, &impulse);
        }

        for _ in 0..self.config.iterations {
            for constraint in &mut constraints {
                solve_normal(&mut solver_bodies, constraint);
                solve_friction(&mut solver_bodies, constraint);
                solve_rolling_friction(&mut solver_bodies, constraint);
            }
        }

        for constraint in &constraints {
            manifolds[constraint.manifold].set_accumulated(constraint.point, constraint.accumulated);
        }
        for (id, index) in &index_of {
            let Some(work) = bodies.get_mut(id) else {
                continue;
            };
            if work.is_dynamic() && work.is_active() {
                work.linear_velocity = solver_bodies[*index].linear_velocity;
                work.angular_velocity = solver_bodies[*index].angular_velocity;
            }
        }
        trace!(constraints = constraints.len(), bodies = solver_bodies.len(), "contacts solved");
        SolveReport {
            constraints: constraints.len(),
            bodies: solver_bodies.len(),
        }
    }
}

fn pair_mut(bodies: &mut [SolverBody], first: usize, second: usize) -> Option<(&mut SolverBody, &mut SolverBody)> {
    if first == second {
        return None;
    }
    if first < second {
        let (head, tail) = bodies.split_at_mut(second);
        Some((&mut head[first], &mut tail[0]))
    } else {
        let (head, tail) = bodies.split_at_mut(first);
        Some((&mut tail[0], &mut head[second]))
    }
}

fn apply_pair(bodies: &mut [SolverBody], constraint: &ContactConstraint, impulse: &Vec3) {
    if let Some((b1, b2)) = pair_mut(bodies, constraint.body1, constraint.body2) {
        b1.apply_impulse(&-*impulse, &constraint.r1);
        b2.apply_impulse(impulse, &constraint.r2);
    }
}

fn relative_velocity(bodies: &[SolverBody], constraint: &ContactConstraint) -> Vec3 {
    bodies[constraint.body2]
        .velocity_at(&constraint.r2)
        .sub(&bodies[constraint.body1].velocity_at(&constraint.r1))
}

fn solve_normal(bodies: &mut [SolverBody], constraint: &mut ContactConstraint) {
    let normal_velocity = relative_velocity(bodies, constraint).dot(&constraint.normal);
    let lambda = (-normal_velocity + constraint.bias) * constraint.normal_mass;
    let previous = constraint.accumulated.normal_impulse;
    constraint.accumulated.normal_impulse = (previous + lambda).min(0.0);
    let delta = constraint.accumulated.normal_impulse - previous;
    apply_pair(bodies, constraint, &constraint.normal.scale(delta));
}

/// Friction along both tangents, clamped to the Coulomb cone
/// `|t| <= friction * |normal impulse|`.
fn solve_friction(bodies: &mut [SolverBody], constraint: &mut ContactConstraint) {
    let relative = relative_velocity(bodies, constraint);
    let previous = constraint.accumulated.tangent_impulses;
    let mut candidate = [0.0_f32; 2];
    for (axis, value) in candidate.iter_mut().enumerate() {
        let lambda = -relative.dot(&constraint.tangents[axis]) * constraint.tangent_mass[axis];
        *value = previous[axis] + lambda;
    }
    let limit = constraint.friction * constraint.accumulated.normal_impulse.abs();
    let magnitude = candidate[0].hypot(candidate[1]);
    if magnitude > limit {
        let ratio = if magnitude > f32::EPSILON { limit / magnitude } else { 0.0 };
        candidate = candidate.map(|v| v * ratio);
    }
    constraint.accumulated.tangent_impulses = candidate;
    let impulse = constraint.tangents[0]
        .scale(candidate[0] - previous[0])
        .add(&constraint.tangents[1].scale(candidate[1] - previous[1]));
    apply_pair(bodies, constraint, &impulse);
}

/// Opposes relative spin, limited by `rolling_friction * |normal impulse|`.
fn solve_rolling_friction(bodies: &mut [SolverBody], constraint: &mut ContactConstraint) {
    if constraint.rolling_friction <= 0.0 {
        return;
    }
    let spin = bodies[constraint.body2]
        .angular_velocity
        .sub(&bodies[constraint.body1].angular_velocity);
    let axis = spin.normalize();
    if axis == Vec3::ZERO {
        return;
    }
    let denominator = bodies[constraint.body1]
        .inv_inertia
        .transform(&axis)
        .add(&bodies[constraint.body2].inv_inertia.transform(&axis))
        .dot(&axis);
    if denominator <= f32::EPSILON {
        return;
    }
    let previous = constraint.rolling_impulse;
    let mut candidate = previous.add(&axis.scale(-spin.length() / denominator));
    let limit = constraint.rolling_friction * constraint.accumulated.normal_impulse.abs();
    if candidate.length() > limit {
        candidate = candidate.normalize().scale(limit);
    }
    constraint.rolling_impulse = candidate;
    let delta = candidate.sub(&previous);
    if let Some((b1, b2)) = pair_mut(bodies, constraint.body1, constraint.body2) {
        b1.apply_angular_impulse(&-delta);
        b2.apply_angular_impulse(&delta);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use echo_geom::{CollisionShape, Pose};

    use super::*;
    use crate::body::Body;
    use crate::config::PhysicsConfig;
    use crate::manifold::DetectedContact;

    const GROUND: ObjectId = ObjectId::new(1);
    const CUBE: ObjectId = ObjectId::new(2);

    fn scene(cube_velocity: Vec3) -> BTreeMap<ObjectId, WorkBody> {
        let ground = Body::rigid(
            "ground",
            Pose::from_position(Vec3::new(0.0, -1.0, 0.0)),
            CollisionShape::cuboid(Vec3::new(10.0, 1.0, 10.0)).unwrap(),
        );
        let cube = Body::rigid(
            "cube",
            Pose::from_position(Vec3::new(0.0, 0.5, 0.0)),
            CollisionShape::cuboid(Vec3::splat(0.5)).unwrap(),
        );
        cube.set_mass(1.0).unwrap();
        cube.set_velocity(cube_velocity, Vec3::ZERO);
        let mut bodies = BTreeMap::new();
        bodies.insert(GROUND, WorkBody::new(GROUND, &ground, 0.4));
        bodies.insert(CUBE, WorkBody::new(CUBE, &cube, 0.4));
        bodies
    }

    /// Cube resting on the ground: four corners touching with zero depth.
    fn resting_manifold(bodies: &BTreeMap<ObjectId, WorkBody>, depth: f32) -> ManifoldResult {
        let mut manifold = ManifoldResult::new(CUBE, bodies[&CUBE].pose(), GROUND, bodies[&GROUND].pose(), 0.02);
        for (x, z) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            manifold.add_contact(&DetectedContact {
                normal_from_b: Vec3::UNIT_Y,
                point_on_b: Vec3::new(x, 0.0, z),
                depth,
            });
        }
        manifold
    }

    fn solver() -> ConstraintSolver {
        ConstraintSolver::new(PhysicsConfig::default().solver)
    }

    #[test]
    fn resting_contact_needs_no_impulse() {
        let mut bodies = scene(Vec3::ZERO);
        let mut manifolds = vec![resting_manifold(&bodies, 0.0)];
        let report = solver().solve(1.0 / 60.0, &mut bodies, &mut manifolds);
        assert_eq!(report.constraints, 4);
        for contact in manifolds[0].contacts() {
            assert!(contact.accumulated.normal_impulse.abs() < 1e-6);
            assert!(contact.accumulated.tangent_impulses.iter().all(|t| t.abs() < 1e-6));
        }
        assert!(bodies[&CUBE].linear_velocity().length() < 1e-6);
    }

    #[test]
    fn approaching_body_is_stopped() {
        let mut bodies = scene(Vec3::new(0.0, -2.0, 0.0));
        let mut manifolds = vec![resting_manifold(&bodies, -0.001)];
        solver().solve(1.0 / 60.0, &mut bodies, &mut manifolds);
        let velocity = bodies[&CUBE].linear_velocity();
        assert!(velocity.y() > -0.05, "cube still sinks at {velocity:?}");
        assert!(manifolds[0].contacts().iter().all(|c| c.accumulated.normal_impulse <= 0.0));
        assert!(bodies[&GROUND].linear_velocity().length() < 1e-6);
    }

    #[test]
    fn restitution_bounces_fast_impacts() {
        let mut bodies = scene(Vec3::new(0.0, -5.0, 0.0));
        bodies.get_mut(&CUBE).unwrap().restitution = 0.8;
        let mut manifolds = vec![resting_manifold(&bodies, 0.0)];
        solver().solve(1.0 / 60.0, &mut bodies, &mut manifolds);
        let up = bodies[&CUBE].linear_velocity().y();
        assert!(up > 3.0, "bounce speed {up}");
    }

    #[test]
    fn friction_stays_inside_the_cone() {
        let mut bodies = scene(Vec3::new(4.0, -1.0, 0.0));
        let mut manifolds = vec![resting_manifold(&bodies, 0.0)];
        solver().solve(1.0 / 60.0, &mut bodies, &mut manifolds);
        let friction = (bodies[&CUBE].friction * bodies[&GROUND].friction).sqrt();
        for contact in manifolds[0].contacts() {
            let [t1, t2] = contact.accumulated.tangent_impulses;
            let limit = friction * contact.accumulated.normal_impulse.abs();
            assert!(t1.hypot(t2) <= limit + 1e-5);
        }
        let velocity = bodies[&CUBE].linear_velocity();
        assert!(velocity.x() < 4.0 && velocity.x() >= 0.0);
    }

    #[test]
    fn separated_points_are_skipped() {
        let mut bodies = scene(Vec3::ZERO);
        let mut manifolds = vec![resting_manifold(&bodies, 0.01)];
        let report = solver().solve(1.0 / 60.0, &mut bodies, &mut manifolds);
        assert_eq!(report.constraints, 0);
    }
}
