// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless driver for the Echo physics world.
//!
//! # Usage
//! ```text
//! echo-physics drop --cubes 8 --steps 600
//! echo-physics config --config-dir ./settings
//! ```
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use echo_geom::{CollisionShape, Pose};
use echo_math::Vec3;
use echo_physics::config::PHYSICS_CONFIG_KEY;
use echo_physics::{Body, ConfigService, FsConfigStore, PhysicsConfig, PhysicsWorld};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Echo physics headless driver")]
struct Args {
    /// Directory holding `physics.json`; defaults are used when omitted.
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drop a column of cubes on a ground box and report where they settle.
    Drop {
        /// Number of stacked cubes.
        #[arg(long, default_value_t = 4)]
        cubes: u32,
        /// Fixed steps to simulate.
        #[arg(long, default_value_t = 600)]
        steps: u32,
        /// Step length in seconds.
        #[arg(long, default_value_t = 1.0 / 60.0)]
        dt: f32,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as JSON.
    Config {
        /// Write the defaults to the config directory first.
        #[arg(long)]
        init: bool,
    },
}

#[derive(Debug, Serialize)]
struct CubeReport {
    name: String,
    position: [f32; 3],
    active: bool,
}

fn load_config(dir: Option<&PathBuf>, init: bool) -> Result<PhysicsConfig> {
    let Some(dir) = dir else {
        return Ok(PhysicsConfig::default());
    };
    let service = ConfigService::new(
        FsConfigStore::with_base(dir).with_context(|| format!("open config dir {}", dir.display()))?,
    );
    if init {
        service.save(PHYSICS_CONFIG_KEY, &PhysicsConfig::default())?;
        info!(dir = %dir.display(), "default configuration written");
    }
    Ok(service.load_physics()?)
}

fn drop_scene(config: PhysicsConfig, cubes: u32, steps: u32, dt: f32) -> Result<Vec<CubeReport>> {
    let mut world = PhysicsWorld::new(config)?;
    world.add_body(Body::rigid(
        "ground",
        Pose::from_position(Vec3::new(0.0, -0.5, 0.0)),
        CollisionShape::cuboid(Vec3::new(50.0, 0.5, 50.0))?,
    ))?;
    let mut bodies = Vec::new();
    for i in 0..cubes {
        #[allow(clippy::cast_precision_loss)]
        let height = 2.0 + i as f32 * 1.5;
        let cube = Body::rigid(
            format!("cube-{i}"),
            Pose::from_position(Vec3::new(0.0, height, 0.0)),
            CollisionShape::cuboid(Vec3::splat(0.5))?,
        );
        cube.set_mass(1.0)?;
        world.add_body(Arc::clone(&cube))?;
        bodies.push(cube);
    }

    let gravity = Vec3::new(0.0, -9.81, 0.0);
    for step in 0..steps {
        let report = world.process(dt, gravity)?;
        if step % 60 == 0 {
            info!(step, pairs = report.pairs, manifolds = report.manifolds, islands = report.islands, "step");
        }
    }
    if world.narrow_phase().failure_count() > 0 {
        info!(failures = world.narrow_phase().failure_count(), "numerical failures during the run");
    }
    Ok(bodies
        .iter()
        .map(|b| CubeReport {
            name: b.name().to_owned(),
            position: b.pose().position().to_array(),
            active: b.is_active(),
        })
        .collect())
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    match args.command {
        Command::Drop {
            cubes,
            steps,
            dt,
            json,
        } => {
            let config = load_config(args.config_dir.as_ref(), false)?;
            let reports = drop_scene(config, cubes, steps, dt)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                let mut table = Table::new();
                table.set_header(vec!["body", "x", "y", "z", "active"]);
                for r in &reports {
                    table.add_row(vec![
                        r.name.clone(),
                        format!("{:.3}", r.position[0]),
                        format!("{:.3}", r.position[1]),
                        format!("{:.3}", r.position[2]),
                        r.active.to_string(),
                    ]);
                }
                println!("{table}");
            }
        }
        Command::Config { init } => {
            let config = load_config(args.config_dir.as_ref(), init)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let written = load_config(Some(&path), true).unwrap();
        assert_eq!(written, PhysicsConfig::default());
        assert!(path.join(format!("{PHYSICS_CONFIG_KEY}.json")).exists());
    }

    #[test]
    fn single_cube_settles_on_the_ground() {
        let reports = drop_scene(PhysicsConfig::default(), 1, 300, 1.0 / 60.0).unwrap();
        assert_eq!(reports.len(), 1);
        assert!((reports[0].position[1] - 0.5).abs() < 0.1);
    }
}
