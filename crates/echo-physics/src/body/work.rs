// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use std::sync::Arc;

use echo_geom::{Aabb, CollisionShape, Pose};
use echo_math::{Mat3, Vec3};

use super::{Body, BodyKind, ObjectId};

/// Simulation-side copy of a [`Body`].
///
/// Only the simulation thread touches work bodies, so they carry no locks.
/// [`WorkBody::pull_from`] refreshes the copy before a step and
/// [`WorkBody::push_to`] publishes the results after it.
#[derive(Debug, Clone)]
pub struct WorkBody {
    id: ObjectId,
    kind: BodyKind,
    shape: Arc<CollisionShape>,
    pub(crate) pose: Pose,
    pub(crate) restitution: f32,
    pub(crate) friction: f32,
    pub(crate) rolling_friction: f32,
    pub(crate) ccd_motion_threshold: f32,
    pub(crate) is_static: bool,
    pub(crate) is_active: bool,
    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,
    pub(crate) inv_local_inertia: Vec3,
    pub(crate) inv_world_inertia: Mat3,
    pub(crate) linear_velocity: Vec3,
    pub(crate) angular_velocity: Vec3,
    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) linear_factor: Vec3,
    pub(crate) angular_factor: Vec3,
    pub(crate) total_momentum: Vec3,
    pub(crate) total_torque_momentum: Vec3,
}

fn invert(v: f32) -> f32 {
    if v.abs() > f32::EPSILON {
        1.0 / v
    } else {
        0.0
    }
}

impl WorkBody {
    /// Builds the simulation copy of a freshly admitted body.
    ///
    /// `ccd_motion_threshold_factor` derives the CCD threshold from the shape
    /// when the body carries no explicit one.
    pub fn new(id: ObjectId, body: &Body, ccd_motion_threshold_factor: f32) -> Self {
        let shape = body.shared_shape();
        let default_threshold = shape.min_distance_to_center() * 2.0 * ccd_motion_threshold_factor;
        let mut work = Self {
            id,
            kind: body.kind(),
            shape,
            pose: Pose::identity(),
            restitution: 0.0,
            friction: 0.0,
            rolling_friction: 0.0,
            ccd_motion_threshold: default_threshold,
            is_static: true,
            is_active: false,
            mass: 0.0,
            inv_mass: 0.0,
            inv_local_inertia: Vec3::ZERO,
            inv_world_inertia: Mat3::zero(),
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            linear_damping: 0.0,
            angular_damping: 0.0,
            linear_factor: Vec3::ONE,
            angular_factor: Vec3::ONE,
            total_momentum: Vec3::ZERO,
            total_torque_momentum: Vec3::ZERO,
        };
        {
            let mut state = body.state();
            state.needs_full_refresh = true;
        }
        work.pull_from(body);
        work
    }

    /// Copies application changes into the simulation copy.
    ///
    /// Pose, velocities and activity are only taken over when the application
    /// changed them since the last step; pending momenta are consumed.
    pub(crate) fn pull_from(&mut self, body: &Body) {
        let mut state = body.state();
        if state.needs_full_refresh {
            self.pose = state.pose;
            self.linear_velocity = state.linear_velocity;
            self.angular_velocity = state.angular_velocity;
            self.is_static = state.is_static;
            self.is_active = state.is_active;
            state.needs_full_refresh = false;
        }
        self.restitution = state.restitution;
        self.friction = state.friction;
        self.rolling_friction = state.rolling_friction;
        if let Some(threshold) = state.ccd_motion_threshold {
            self.ccd_motion_threshold = threshold;
        }
        if self.is_static {
            self.mass = 0.0;
            self.inv_mass = 0.0;
            self.inv_local_inertia = Vec3::ZERO;
        } else {
            self.mass = state.mass;
            self.inv_mass = invert(state.mass);
            let inertia = state.local_inertia;
            self.inv_local_inertia = Vec3::new(invert(inertia.x()), invert(inertia.y()), invert(inertia.z()));
        }
        self.linear_damping = state.linear_damping;
        self.angular_damping = state.angular_damping;
        self.linear_factor = state.linear_factor;
        self.angular_factor = state.angular_factor;
        self.total_momentum = state.total_momentum;
        self.total_torque_momentum = state.total_torque_momentum;
        state.total_momentum = Vec3::ZERO;
        state.total_torque_momentum = Vec3::ZERO;
        drop(state);

        if self.kind == BodyKind::Ghost {
            self.is_static = true;
            self.is_active = true;
        }
        let pending = self.total_momentum.length_squared() > f32::EPSILON
            || self.total_torque_momentum.length_squared() > f32::EPSILON;
        if pending && !self.is_static {
            self.is_active = true;
        }
        self.refresh_inv_world_inertia();
    }

    /// Publishes the step results, unless the application overrode the body
    /// in the meantime.
    pub(crate) fn push_to(&self, body: &Body) {
        let mut state = body.state();
        if state.needs_full_refresh {
            return;
        }
        state.pose = self.pose;
        state.linear_velocity = self.linear_velocity;
        state.angular_velocity = self.angular_velocity;
        state.is_active = self.is_active;
        state.is_static = self.is_static;
    }

    /// Recomputes `R · I⁻¹ · Rᵀ` for the current orientation.
    pub(crate) fn refresh_inv_world_inertia(&mut self) {
        let rotation = self.pose.orientation().to_mat3();
        self.inv_world_inertia = rotation
            .multiply(&Mat3::from_diagonal(&self.inv_local_inertia))
            .multiply(&rotation.transpose());
    }

    /// Simulation id.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Body variant.
    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    /// Collision shape.
    pub fn shape(&self) -> &CollisionShape {
        &self.shape
    }

    /// Current pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// World bounds at the current pose.
    pub fn aabb(&self) -> Aabb {
        self.shape.aabb(&self.pose)
    }

    /// `true` for bodies without mass (and ghosts).
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// `false` while sleeping.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Rigid body that can move: not static, not a ghost.
    pub fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Rigid && !self.is_static
    }

    /// Linear velocity.
    pub fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    /// Angular velocity.
    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    /// Inverse mass (0 for static bodies).
    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Distance per step above which continuous collision runs.
    pub fn ccd_motion_threshold(&self) -> f32 {
        self.ccd_motion_threshold
    }

    /// Sets the activity flag. Static bodies stay inactive, ghosts active.
    pub(crate) fn set_active(&mut self, active: bool) {
        match self.kind {
            BodyKind::Ghost => self.is_active = true,
            BodyKind::Rigid => self.is_active = active && !self.is_static,
        }
    }

    /// Turns the body static (used for bodies falling out of the world).
    pub(crate) fn make_static(&mut self) {
        self.is_static = true;
        self.is_active = false;
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inv_local_inertia = Vec3::ZERO;
        self.inv_world_inertia = Mat3::zero();
        self.linear_velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pull_consumes_momentum_and_wakes() {
        let body = Body::rigid("b", Pose::identity(), CollisionShape::sphere(1.0).unwrap());
        body.set_mass(1.0).unwrap();
        let mut work = WorkBody::new(ObjectId::new(1), &body, 0.4);
        work.is_active = false;
        body.apply_central_momentum(Vec3::new(1.0, 0.0, 0.0));
        work.pull_from(&body);
        assert!(work.is_active());
        assert_eq!(work.total_momentum.to_array(), [1.0, 0.0, 0.0]);
        assert_eq!(body.total_momentum().to_array(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn default_ccd_threshold_comes_from_shape() {
        let body = Body::rigid("b", Pose::identity(), CollisionShape::sphere(0.5).unwrap());
        let work = WorkBody::new(ObjectId::new(1), &body, 0.4);
        assert!((work.ccd_motion_threshold() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn manual_pose_overrides_step_result() {
        let body = Body::rigid("b", Pose::identity(), CollisionShape::sphere(1.0).unwrap());
        body.set_mass(1.0).unwrap();
        let mut work = WorkBody::new(ObjectId::new(1), &body, 0.4);
        work.pose = Pose::from_position(Vec3::new(0.0, -1.0, 0.0));
        body.set_pose(Pose::from_position(Vec3::new(0.0, 10.0, 0.0)));
        work.push_to(&body);
        assert!((body.pose().position().y() - 10.0).abs() < 1e-6);
        work.pull_from(&body);
        assert!((work.pose().position().y() - 10.0).abs() < 1e-6);
    }
}
