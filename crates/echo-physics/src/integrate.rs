// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Velocity and transform integration around the contact solve.

use std::collections::BTreeMap;

use echo_math::Vec3;
use tracing::debug;

use crate::body::{ObjectId, WorkBody};
use crate::broad_phase::BroadPhaseManager;
use crate::error::PhysicsError;
use crate::narrow::NarrowPhase;

/// Applies gravity, pending momenta and damping before the solve.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegrateVelocityManager;

impl IntegrateVelocityManager {
    /// Updates the velocities of every active dynamic body for a step of
    /// `dt` seconds. Pending momenta are consumed by every body.
    pub fn integrate(&self, dt: f32, gravity: &Vec3, bodies: &mut BTreeMap<ObjectId, WorkBody>) {
        for body in bodies.values_mut() {
            if body.is_dynamic() && body.is_active() {
                let linear = body
                    .linear_velocity
                    .add(&gravity.scale(dt).mul_elem(&body.linear_factor))
                    .add(&body.total_momentum.scale(body.inv_mass).mul_elem(&body.linear_factor));
                let angular = body.angular_velocity.add(
                    &body
                        .inv_world_inertia
                        .transform(&body.total_torque_momentum)
                        .mul_elem(&body.angular_factor),
                );
                body.linear_velocity = linear.scale((1.0 - body.linear_damping).powf(dt));
                body.angular_velocity = angular.scale((1.0 - body.angular_damping).powf(dt));
            }
            body.total_momentum = Vec3::ZERO;
            body.total_torque_momentum = Vec3::ZERO;
        }
    }
}

/// Moves bodies by their solved velocities after the solve.
///
/// A body moving further than its CCD threshold is swept against the scene
/// first and stopped at the earliest time of impact, so it cannot tunnel
/// through thin geometry even when the solver did not stop it.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegrateTransformManager;

impl IntegrateTransformManager {
    /// Advances the pose of every active dynamic body by `dt` seconds.
    pub fn integrate(
        &self,
        dt: f32,
        bodies: &mut BTreeMap<ObjectId, WorkBody>,
        narrow_phase: &mut NarrowPhase,
        broad_phase: &BroadPhaseManager,
    ) -> Result<(), PhysicsError> {
        let mut targets = Vec::new();
        for body in bodies.values().filter(|b| b.is_dynamic() && b.is_active()) {
            let from = body.pose();
            let mut to = from.integrate(&body.linear_velocity(), &body.angular_velocity(), dt);
            let motion = to.position().sub(&from.position());
            if motion.length() > body.ccd_motion_threshold() {
                if let Some((hit, other)) = narrow_phase.earliest_hit(body, &to, bodies, broad_phase)? {
                    debug!(body = %body.id(), other = %other.id(), time_to_hit = hit.time_to_hit, "motion clamped");
                    to = to.with_position(from.position().lerp(&to.position(), hit.time_to_hit));
                }
            }
            targets.push((body.id(), to));
        }
        for (id, pose) in targets {
            if let Some(body) = bodies.get_mut(&id) {
                body.pose = pose;
                body.refresh_inv_world_inertia();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use echo_geom::{CollisionShape, Pose};

    use super::*;
    use crate::body::Body;

    fn single(mass: f32) -> (ObjectId, BTreeMap<ObjectId, WorkBody>) {
        let body = Body::rigid("b", Pose::identity(), CollisionShape::sphere(0.5).unwrap());
        body.set_mass(mass).unwrap();
        let id = ObjectId::new(1);
        (id, BTreeMap::from([(id, WorkBody::new(id, &body, 0.4))]))
    }

    #[test]
    fn gravity_accelerates_dynamic_bodies() {
        let (id, mut bodies) = single(2.0);
        IntegrateVelocityManager.integrate(0.5, &Vec3::new(0.0, -10.0, 0.0), &mut bodies);
        assert!((bodies[&id].linear_velocity().y() + 5.0).abs() < 1e-6);
    }

    #[test]
    fn static_bodies_ignore_gravity() {
        let (id, mut bodies) = single(0.0);
        IntegrateVelocityManager.integrate(0.5, &Vec3::new(0.0, -10.0, 0.0), &mut bodies);
        assert_eq!(bodies[&id].linear_velocity(), Vec3::ZERO);
    }

    #[test]
    fn momentum_is_divided_by_mass_and_consumed() {
        let (id, mut bodies) = single(2.0);
        bodies.get_mut(&id).unwrap().total_momentum = Vec3::new(4.0, 0.0, 0.0);
        IntegrateVelocityManager.integrate(1.0 / 60.0, &Vec3::ZERO, &mut bodies);
        assert!((bodies[&id].linear_velocity().x() - 2.0).abs() < 1e-6);
        assert_eq!(bodies[&id].total_momentum, Vec3::ZERO);
    }

    #[test]
    fn linear_factor_locks_axes() {
        let (id, mut bodies) = single(1.0);
        bodies.get_mut(&id).unwrap().linear_factor = Vec3::new(1.0, 0.0, 1.0);
        IntegrateVelocityManager.integrate(1.0, &Vec3::new(0.0, -10.0, 0.0), &mut bodies);
        assert_eq!(bodies[&id].linear_velocity(), Vec3::ZERO);
    }

    #[test]
    fn damping_slows_bodies_down() {
        let (id, mut bodies) = single(1.0);
        let body = bodies.get_mut(&id).unwrap();
        body.linear_velocity = Vec3::new(1.0, 0.0, 0.0);
        body.linear_damping = 0.5;
        IntegrateVelocityManager.integrate(1.0, &Vec3::ZERO, &mut bodies);
        assert!((bodies[&id].linear_velocity().x() - 0.5).abs() < 1e-6);
    }
}
