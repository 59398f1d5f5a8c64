//! Example: scripted drawer opening with shaped reward
//!
//! Run with: RUST_LOG=debug cargo run -p goalshape-env --example open_drawer [task.json]

use anyhow::Result;
use goalshape_env::prelude::*;
use goalshape_env::Pose;
use nalgebra::{Point3, Vector3};
use tracing_subscriber::EnvFilter;

const TASK: &str = r#"{
    "name": "open the top drawer of the cabinet",
    "goal": [["And", ["Open", "wooden_cabinet_1_top_region"], ["Not", ["Contact", "wooden_cabinet_1"]]]],
    "objects": [
        { "name": "wooden_cabinet_1", "contact_geoms": ["wooden_cabinet_1_g0"], "joints": ["wooden_cabinet_1_top_level"] }
    ],
    "sites": [
        { "name": "wooden_cabinet_1_top_region", "parent": "wooden_cabinet_1", "joints": ["wooden_cabinet_1_top_level"] }
    ],
    "definitions": {
        "wooden_cabinet": {
            "articulation": { "default_open_ranges": [-0.16, -0.14], "default_close_ranges": [0.0, 0.01] },
            "sites": { "top_region": { "body": "cabinet_top", "geom_offsets": [[0.0, 0.0, 0.0]] } }
        }
    },
    "gripper": {
        "left_pad": ["gripper0_finger1_pad_collision"],
        "right_pad": ["gripper0_finger2_pad_collision"]
    },
    "reward": { "reward_scale": 1.0 }
}"#;

fn scene() -> SceneSnapshot {
    let mut sim = SceneSnapshot::new();
    sim.set_body("wooden_cabinet_1_main", Pose::at(Point3::new(0.0, -0.2, 0.9)));
    sim.set_body("wooden_cabinet_1_cabinet_top", Pose::at(Point3::new(0.0, -0.2, 1.1)));
    sim.add_geom("wooden_cabinet_1_g0", "wooden_cabinet_1_main", Vector3::new(0.0, 0.0, 0.05));
    sim.add_geom("wooden_cabinet_1_g1", "wooden_cabinet_1_cabinet_top", Vector3::zeros());
    sim.add_geom("gripper0_finger1_pad_collision", "gripper0_left", Vector3::zeros());
    sim.add_geom("gripper0_finger2_pad_collision", "gripper0_right", Vector3::zeros());
    sim.set_site("wooden_cabinet_1_top_region", Pose::at(Point3::new(0.0, -0.2, 1.1)));
    sim.set_joint("wooden_cabinet_1_top_level", 0.0);
    sim
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => TaskConfig::load(path)?,
        None => TaskConfig::from_json_str(TASK)?,
    };

    let mut sim = scene();
    let mut task = GoalTask::new(config, &sim)?;
    let mut monitor = SuccessRateMonitor::new(0.6, 2);

    for episode in 0..8u32 {
        sim = scene();
        task.reset(&sim)?;

        // each episode pulls a little further
        let pull = 0.03 * f64::from(episode + 1);
        for step in 0..10u32 {
            let qpos = -pull * f64::from(step + 1) / 10.0;
            sim.set_joint("wooden_cabinet_1_top_level", qpos);
            sim.set_grip_site(Point3::new(0.0, 0.3 + qpos, 1.1));
            let reward = task.step(&sim)?;
            if reward.success {
                break;
            }
        }

        let summary = task.episode();
        println!(
            "Episode {}: Total Reward = {:.3}, Steps = {}, Success = {}",
            episode + 1,
            summary.total_reward,
            summary.steps,
            summary.succeeded
        );
        monitor.record(summary.succeeded);
        if !monitor.evaluate() {
            println!("Success rate target reached after {} episodes", episode + 1);
            break;
        }
    }

    Ok(())
}
