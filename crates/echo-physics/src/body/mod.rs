// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bodies as seen by the application.
//!
//! A [`Body`] is shared (`Arc<Body>`) between the application and the world.
//! Every mutable property sits behind the body's own mutex, so any thread may
//! read or tweak it. The simulation never integrates the shared record
//! directly: each step it copies the record into a [`WorkBody`], runs the
//! pipeline on that copy and writes the results back.

mod store;
mod work;

use core::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use echo_geom::{CollisionShape, Pose};
use echo_math::Vec3;

use crate::error::PhysicsError;

pub use store::{BodyEvent, BodyQueue, BodyStore};
pub use work::WorkBody;

/// Identity assigned to a body when the simulation adopts it.
///
/// Ids are handed out in admission order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Wraps a raw id.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw id.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Body variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// Moved by forces and contact impulses.
    Rigid,
    /// Detects overlaps and produces manifolds but never receives impulses.
    Ghost,
}

#[derive(Debug, Clone)]
pub(crate) struct BodyState {
    pub(crate) pose: Pose,
    pub(crate) restitution: f32,
    pub(crate) friction: f32,
    pub(crate) rolling_friction: f32,
    pub(crate) ccd_motion_threshold: Option<f32>,
    pub(crate) mass: f32,
    pub(crate) local_inertia: Vec3,
    pub(crate) linear_velocity: Vec3,
    pub(crate) angular_velocity: Vec3,
    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) linear_factor: Vec3,
    pub(crate) angular_factor: Vec3,
    pub(crate) total_momentum: Vec3,
    pub(crate) total_torque_momentum: Vec3,
    pub(crate) is_static: bool,
    pub(crate) is_active: bool,
    pub(crate) needs_full_refresh: bool,
}

/// Rigid or ghost body.
pub struct Body {
    name: String,
    kind: BodyKind,
    shape: Arc<CollisionShape>,
    id: AtomicU32,
    admitted: AtomicBool,
    state: Mutex<BodyState>,
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("id", &self.object_id())
            .finish_non_exhaustive()
    }
}

fn check_unit(what: &str, value: f32) -> Result<f32, PhysicsError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(PhysicsError::InvalidArgument(format!(
            "{what} must be within [0, 1], got {value}"
        )))
    }
}

impl Body {
    fn build(name: String, kind: BodyKind, pose: Pose, shape: CollisionShape) -> Arc<Self> {
        Arc::new(Self {
            name,
            kind,
            shape: Arc::new(shape),
            id: AtomicU32::new(0),
            admitted: AtomicBool::new(false),
            state: Mutex::new(BodyState {
                pose,
                restitution: 0.2,
                friction: 0.5,
                rolling_friction: 0.0,
                ccd_motion_threshold: None,
                mass: 0.0,
                local_inertia: Vec3::ZERO,
                linear_velocity: Vec3::ZERO,
                angular_velocity: Vec3::ZERO,
                linear_damping: 0.0,
                angular_damping: 0.0,
                linear_factor: Vec3::ONE,
                angular_factor: Vec3::ONE,
                total_momentum: Vec3::ZERO,
                total_torque_momentum: Vec3::ZERO,
                is_static: true,
                is_active: false,
                needs_full_refresh: false,
            }),
        })
    }

    /// Static rigid body (mass 0). Give it a mass with [`Body::set_mass`].
    pub fn rigid(name: impl Into<String>, pose: Pose, shape: CollisionShape) -> Arc<Self> {
        Self::build(name.into(), BodyKind::Rigid, pose, shape)
    }

    /// Ghost body.
    pub fn ghost(name: impl Into<String>, pose: Pose, shape: CollisionShape) -> Arc<Self> {
        Self::build(name.into(), BodyKind::Ghost, pose, shape)
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, BodyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Application-given name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Body variant.
    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    /// Immutable collision shape.
    pub fn shape(&self) -> &CollisionShape {
        &self.shape
    }

    pub(crate) fn shared_shape(&self) -> Arc<CollisionShape> {
        Arc::clone(&self.shape)
    }

    /// Id assigned on admission, `None` before the first refresh.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self.id.load(Ordering::Acquire) {
            0 => None,
            raw => Some(ObjectId(raw)),
        }
    }

    pub(crate) fn assign_id(&self, id: ObjectId) {
        self.id.store(id.get(), Ordering::Release);
    }

    /// Marks the body as owned by a world; fails when it already is.
    pub(crate) fn claim(&self) -> bool {
        !self.admitted.swap(true, Ordering::AcqRel)
    }

    /// Releases world ownership; fails when the body was never claimed.
    pub(crate) fn release(&self) -> bool {
        self.admitted.swap(false, Ordering::AcqRel)
    }

    /// Current pose.
    pub fn pose(&self) -> Pose {
        self.state().pose
    }

    /// Teleports the body. A dynamic body is woken up.
    pub fn set_pose(&self, pose: Pose) {
        let mut state = self.state();
        state.pose = pose;
        state.needs_full_refresh = true;
        if !state.is_static {
            state.is_active = true;
        }
    }

    /// Restitution (0 = no bounce, 1 = elastic).
    pub fn restitution(&self) -> f32 {
        self.state().restitution
    }

    /// Sets the restitution.
    pub fn set_restitution(&self, restitution: f32) -> Result<(), PhysicsError> {
        self.state().restitution = check_unit("restitution", restitution)?;
        Ok(())
    }

    /// Friction coefficient.
    pub fn friction(&self) -> f32 {
        self.state().friction
    }

    /// Sets the friction coefficient.
    pub fn set_friction(&self, friction: f32) -> Result<(), PhysicsError> {
        self.state().friction = check_unit("friction", friction)?;
        Ok(())
    }

    /// Rolling friction coefficient.
    pub fn rolling_friction(&self) -> f32 {
        self.state().rolling_friction
    }

    /// Sets the rolling friction coefficient.
    pub fn set_rolling_friction(&self, rolling_friction: f32) -> Result<(), PhysicsError> {
        self.state().rolling_friction = check_unit("rolling friction", rolling_friction)?;
        Ok(())
    }

    /// Explicit CCD motion threshold, if one was set.
    ///
    /// Without one the threshold is derived from the shape when the body is
    /// admitted.
    pub fn ccd_motion_threshold(&self) -> Option<f32> {
        self.state().ccd_motion_threshold
    }

    /// Overrides the distance per step above which CCD runs for this body.
    pub fn set_ccd_motion_threshold(&self, threshold: f32) -> Result<(), PhysicsError> {
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(PhysicsError::InvalidArgument(format!(
                "ccd motion threshold must be >= 0, got {threshold}"
            )));
        }
        self.state().ccd_motion_threshold = Some(threshold);
        Ok(())
    }

    /// Mass; zero for static bodies.
    pub fn mass(&self) -> f32 {
        self.state().mass
    }

    /// Sets the mass. Zero makes the body static.
    pub fn set_mass(&self, mass: f32) -> Result<(), PhysicsError> {
        if self.kind == BodyKind::Ghost {
            return Err(PhysicsError::InvalidArgument(format!(
                "ghost body '{}' has no mass",
                self.name
            )));
        }
        if !(mass.is_finite() && mass >= 0.0) {
            return Err(PhysicsError::InvalidArgument(format!(
                "mass must be >= 0, got {mass}"
            )));
        }
        let mut state = self.state();
        state.mass = mass;
        state.local_inertia = self.shape.local_inertia(mass);
        state.is_static = mass < f32::EPSILON;
        state.is_active = !state.is_static;
        state.needs_full_refresh = true;
        Ok(())
    }

    /// Diagonal of the local inertia tensor.
    pub fn local_inertia(&self) -> Vec3 {
        self.state().local_inertia
    }

    /// Linear velocity after the last step.
    pub fn linear_velocity(&self) -> Vec3 {
        self.state().linear_velocity
    }

    /// Angular velocity after the last step.
    pub fn angular_velocity(&self) -> Vec3 {
        self.state().angular_velocity
    }

    /// Overrides both velocities and wakes the body up.
    pub fn set_velocity(&self, linear: Vec3, angular: Vec3) {
        let mut state = self.state();
        state.linear_velocity = linear;
        state.angular_velocity = angular;
        state.needs_full_refresh = true;
        if !state.is_static {
            state.is_active = true;
        }
    }

    /// Linear and angular damping.
    pub fn damping(&self) -> (f32, f32) {
        let state = self.state();
        (state.linear_damping, state.angular_damping)
    }

    /// Sets damping; both values must lie in `[0, 1]`.
    pub fn set_damping(&self, linear: f32, angular: f32) -> Result<(), PhysicsError> {
        let linear = check_unit("linear damping", linear)?;
        let angular = check_unit("angular damping", angular)?;
        let mut state = self.state();
        state.linear_damping = linear;
        state.angular_damping = angular;
        Ok(())
    }

    /// Per-axis linear motion factor (0 locks the axis).
    pub fn linear_factor(&self) -> Vec3 {
        self.state().linear_factor
    }

    /// Sets the per-axis linear motion factor.
    pub fn set_linear_factor(&self, factor: Vec3) {
        self.state().linear_factor = factor;
    }

    /// Per-axis angular motion factor (0 locks the rotation axis).
    pub fn angular_factor(&self) -> Vec3 {
        self.state().angular_factor
    }

    /// Sets the per-axis angular motion factor.
    pub fn set_angular_factor(&self, factor: Vec3) {
        self.state().angular_factor = factor;
    }

    /// Queues a momentum through the centre of mass for the next step.
    pub fn apply_central_momentum(&self, momentum: Vec3) {
        let mut state = self.state();
        state.total_momentum += momentum;
    }

    /// Queues a momentum applied at `point` (relative to the centre of mass).
    pub fn apply_momentum(&self, momentum: Vec3, point: Vec3) {
        let mut state = self.state();
        state.total_momentum += momentum;
        state.total_torque_momentum += point.cross(&momentum);
    }

    /// Queues an angular momentum for the next step.
    pub fn apply_torque_momentum(&self, torque_momentum: Vec3) {
        let mut state = self.state();
        state.total_torque_momentum += torque_momentum;
    }

    /// Momentum queued and not yet consumed by a step.
    pub fn total_momentum(&self) -> Vec3 {
        self.state().total_momentum
    }

    /// `true` for bodies without mass.
    pub fn is_static(&self) -> bool {
        self.state().is_static
    }

    /// `false` while the body sleeps.
    pub fn is_active(&self) -> bool {
        self.state().is_active
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ball() -> Arc<Body> {
        Body::rigid("ball", Pose::identity(), CollisionShape::sphere(1.0).unwrap())
    }

    #[test]
    fn mass_controls_static_flag() {
        let body = ball();
        assert!(body.is_static());
        body.set_mass(2.0).unwrap();
        assert!(!body.is_static());
        assert!(body.is_active());
        assert!((body.local_inertia().x() - 0.8).abs() < 1e-6);
        assert!(body.set_mass(-1.0).is_err());
    }

    #[test]
    fn ghost_rejects_mass() {
        let ghost = Body::ghost("trigger", Pose::identity(), CollisionShape::sphere(1.0).unwrap());
        assert!(matches!(
            ghost.set_mass(1.0),
            Err(PhysicsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn damping_out_of_range_is_rejected() {
        let body = ball();
        assert!(body.set_damping(1.5, 0.0).is_err());
        body.set_damping(0.1, 0.2).unwrap();
        assert_eq!(body.damping(), (0.1, 0.2));
    }

    #[test]
    fn momentum_accumulates_torque() {
        let body = ball();
        body.apply_momentum(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
        body.apply_central_momentum(Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(body.total_momentum().to_array(), [0.0, 0.0, 2.0]);
        assert_eq!(body.state().total_torque_momentum.to_array(), [0.0, -1.0, 0.0]);
    }

    #[test]
    fn id_is_unset_until_admitted() {
        let body = ball();
        assert_eq!(body.object_id(), None);
        body.assign_id(ObjectId::new(7));
        assert_eq!(body.object_id(), Some(ObjectId::new(7)));
    }
}
