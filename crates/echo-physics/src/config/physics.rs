// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Store key under which [`PhysicsConfig`] is persisted.
pub const PHYSICS_CONFIG_KEY: &str = "physics";

/// Broad-phase settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadPhaseConfig {
    /// Margin added around every leaf box of the AABB tree.
    pub fat_margin: f32,
    /// Extra depth, as a fraction of the initial world height, below which a
    /// falling body is frozen.
    pub world_boundary_margin_percentage: f32,
}

impl Default for BroadPhaseConfig {
    fn default() -> Self {
        Self {
            fat_margin: 0.2,
            world_boundary_margin_percentage: 0.5,
        }
    }
}

/// GJK iteration and termination settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GjkConfig {
    /// Iteration cap; reaching it yields an invalid result.
    pub max_iterations: u32,
    /// Termination tolerance relative to the squared distance.
    pub relative_termination_tolerance: f32,
    /// Absolute lower bound of the termination tolerance.
    pub minimum_termination_tolerance: f32,
    /// Growth of the absolute tolerance per iteration.
    pub percentage_increase_of_minimum_tolerance: f32,
}

impl Default for GjkConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            relative_termination_tolerance: 1e-4,
            minimum_termination_tolerance: 1e-5,
            percentage_increase_of_minimum_tolerance: 0.01,
        }
    }
}

/// EPA iteration and termination settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpaConfig {
    /// Iteration cap.
    pub max_iterations: u32,
    /// Relative gap between upper and lower depth bounds at convergence.
    pub termination_tolerance: f32,
}

impl Default for EpaConfig {
    fn default() -> Self {
        Self {
            max_iterations: 40,
            termination_tolerance: 0.01,
        }
    }
}

/// Continuous collision (conservative advancement) settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CcdConfig {
    /// Advancement iteration cap.
    pub max_iterations: u32,
    /// Squared distance under which the sweep reports a hit.
    pub termination_tolerance: f32,
    /// Motion threshold factor applied to a shape's minimum distance to centre.
    pub motion_threshold_factor: f32,
}

impl Default for CcdConfig {
    fn default() -> Self {
        Self {
            max_iterations: 40,
            termination_tolerance: 1e-4,
            motion_threshold_factor: 0.4,
        }
    }
}

/// Narrow-phase settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrowPhaseConfig {
    /// Separation beyond which contact points are dropped.
    pub contact_breaking_threshold: f32,
    /// Only one warning per this many numerical failures is logged.
    pub failure_log_interval: u32,
    /// GJK settings.
    pub gjk: GjkConfig,
    /// EPA settings.
    pub epa: EpaConfig,
    /// Continuous collision settings.
    pub ccd: CcdConfig,
}

impl Default for NarrowPhaseConfig {
    fn default() -> Self {
        Self {
            contact_breaking_threshold: 0.02,
            failure_log_interval: 100,
            gjk: GjkConfig::default(),
            epa: EpaConfig::default(),
            ccd: CcdConfig::default(),
        }
    }
}

/// Constraint solver settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Gauss–Seidel iterations per step.
    pub iterations: u32,
    /// Baumgarte factor in `[0, 1]` turning penetration into separating velocity.
    pub bias_factor: f32,
    /// Seed the solve with last step's accumulated impulses.
    pub use_warm_starting: bool,
    /// Approach speed under which restitution is ignored.
    pub restitution_velocity_threshold: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            bias_factor: 0.3,
            use_warm_starting: true,
            restitution_velocity_threshold: 1.0,
        }
    }
}

/// Island sleeping settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IslandConfig {
    /// Linear speed under which a body counts as resting.
    pub linear_sleeping_threshold: f32,
    /// Angular speed under which a body counts as resting.
    pub angular_sleeping_threshold: f32,
    /// Consecutive resting steps before an island goes to sleep.
    pub steps_before_sleep: u32,
}

impl Default for IslandConfig {
    fn default() -> Self {
        Self {
            linear_sleeping_threshold: 0.15,
            angular_sleeping_threshold: 0.15,
            steps_before_sleep: 10,
        }
    }
}

/// Fixed pool capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Collision algorithms (one per overlapping pair).
    pub algorithm_pool_size: usize,
    /// Per-step convex objects.
    pub object_pool_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            algorithm_pool_size: 4096,
            object_pool_size: 4096,
        }
    }
}

/// Every tunable of the physics pipeline, read once at world construction.
///
/// Missing sections or fields fall back to their defaults, so a stored
/// document only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Broad-phase settings.
    pub broad_phase: BroadPhaseConfig,
    /// Narrow-phase settings.
    pub narrow_phase: NarrowPhaseConfig,
    /// Solver settings.
    pub solver: SolverConfig,
    /// Island sleeping settings.
    pub island: IslandConfig,
    /// Pool capacities.
    pub pools: PoolConfig,
}

fn ensure(ok: bool, key: &'static str, reason: impl FnOnce() -> String) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: reason(),
        })
    }
}

fn non_negative(key: &'static str, value: f32) -> Result<(), ConfigError> {
    ensure(value.is_finite() && value >= 0.0, key, || {
        format!("{value} must be finite and >= 0")
    })
}

impl PhysicsConfig {
    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("broad_phase.fat_margin", self.broad_phase.fat_margin)?;
        non_negative(
            "broad_phase.world_boundary_margin_percentage",
            self.broad_phase.world_boundary_margin_percentage,
        )?;
        non_negative(
            "narrow_phase.contact_breaking_threshold",
            self.narrow_phase.contact_breaking_threshold,
        )?;
        ensure(
            self.narrow_phase.failure_log_interval > 0,
            "narrow_phase.failure_log_interval",
            || "must be > 0".into(),
        )?;
        let gjk = &self.narrow_phase.gjk;
        ensure(gjk.max_iterations > 0, "narrow_phase.gjk.max_iterations", || {
            "must be > 0".into()
        })?;
        non_negative(
            "narrow_phase.gjk.relative_termination_tolerance",
            gjk.relative_termination_tolerance,
        )?;
        non_negative(
            "narrow_phase.gjk.minimum_termination_tolerance",
            gjk.minimum_termination_tolerance,
        )?;
        non_negative(
            "narrow_phase.gjk.percentage_increase_of_minimum_tolerance",
            gjk.percentage_increase_of_minimum_tolerance,
        )?;
        ensure(
            self.narrow_phase.epa.max_iterations > 0,
            "narrow_phase.epa.max_iterations",
            || "must be > 0".into(),
        )?;
        non_negative(
            "narrow_phase.epa.termination_tolerance",
            self.narrow_phase.epa.termination_tolerance,
        )?;
        let ccd = &self.narrow_phase.ccd;
        ensure(ccd.max_iterations > 0, "narrow_phase.ccd.max_iterations", || {
            "must be > 0".into()
        })?;
        non_negative("narrow_phase.ccd.termination_tolerance", ccd.termination_tolerance)?;
        non_negative(
            "narrow_phase.ccd.motion_threshold_factor",
            ccd.motion_threshold_factor,
        )?;
        ensure(self.solver.iterations > 0, "solver.iterations", || {
            "must be > 0".into()
        })?;
        let bias = self.solver.bias_factor;
        ensure((0.0..=1.0).contains(&bias), "solver.bias_factor", || {
            format!("{bias} must be within [0, 1]")
        })?;
        non_negative(
            "solver.restitution_velocity_threshold",
            self.solver.restitution_velocity_threshold,
        )?;
        non_negative(
            "island.linear_sleeping_threshold",
            self.island.linear_sleeping_threshold,
        )?;
        non_negative(
            "island.angular_sleeping_threshold",
            self.island.angular_sleeping_threshold,
        )?;
        ensure(
            self.pools.algorithm_pool_size > 0,
            "pools.algorithm_pool_size",
            || "must be > 0".into(),
        )?;
        ensure(self.pools.object_pool_size > 0, "pools.object_pool_size", || {
            "must be > 0".into()
        })
    }
}
