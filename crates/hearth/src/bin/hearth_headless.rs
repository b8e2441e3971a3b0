//! # HEARTH Headless
//!
//! Runs worlds without any presentation layer.
//!
//! ```bash
//! # Default configuration, 600 frames
//! ./hearth_headless
//!
//! # Custom configuration and frame count, verbose logs
//! RUST_LOG=hearth_core=debug ./hearth_headless hearth.toml --frames 120
//! ```

use std::process::ExitCode;

use hearth::core::scene::{GameObjectDesc, GameObjectHandle, World};
use hearth::gameplay::{self, BakePreviewComponent, MsgApplyDamage, MsgSetTarget, UnitComponent};
use hearth::shared::{Transform, Vec3};
use hearth::{EngineConfig, EngineResult, GameLoop};
use tracing_subscriber::EnvFilter;

/// Frames run when `--frames` is not given.
const DEFAULT_FRAMES: u64 = 600;

/// Units spawned per team.
const UNITS_PER_TEAM: u16 = 8;

struct Args {
    config_path: Option<String>,
    frames: u64,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config_path: None,
        frames: DEFAULT_FRAMES,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--frames" => {
                let value = iter.next().ok_or("--frames needs a value")?;
                args.frames = value.parse().map_err(|e| format!("invalid frame count {value}: {e}"))?;
            }
            _ if args.config_path.is_none() => args.config_path = Some(arg),
            _ => return Err(format!("unexpected argument {arg}")),
        }
    }
    Ok(args)
}

/// Two lines of units facing each other plus the world's bake preview.
fn spawn_skirmish(world: &mut World) -> EngineResult<Vec<GameObjectHandle>> {
    gameplay::register_components(world)?;

    let mut teams: [Vec<GameObjectHandle>; 2] = [Vec::new(), Vec::new()];
    for (team, units) in (0u16..).zip(teams.iter_mut()) {
        let root = world.create_object(GameObjectDesc::new(format!("team{team}")).with_team(team))?;
        for i in 0..UNITS_PER_TEAM {
            let position = Vec3::new(f32::from(i) * 4.0, 0.0, f32::from(team) * 40.0);
            let unit = world.create_object(
                GameObjectDesc::new(format!("unit{i}"))
                    .with_parent(root)
                    .with_team(team)
                    .with_transform(Transform::from_position(position)),
            )?;
            world.create_component(unit, UnitComponent::default())?;
            units.push(unit);
        }
    }

    let preview = world.create_object(GameObjectDesc::new("preview"))?;
    world.create_component(preview, BakePreviewComponent::default())?;

    // Run one frame so the components are initialized before targeting.
    world.set_simulation_enabled(true);
    world.update(0.0);

    let [left, right] = &teams;
    for (&shooter, &target) in left.iter().zip(right).chain(right.iter().zip(left)) {
        world.send_message(
            shooter,
            MsgSetTarget {
                object: target,
                ..MsgSetTarget::default()
            },
        );
    }

    Ok(teams.concat())
}

fn run(args: &Args) -> EngineResult<()> {
    let config = match &args.config_path {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    config.scheduler.build_global_pool()?;

    let mut game_loop = GameLoop::from_config(&config)?;
    let world_index = config.world.index;
    let units = match game_loop.world_mut(world_index) {
        Some(world) => spawn_skirmish(world)?,
        None => Vec::new(),
    };
    tracing::info!(units = units.len(), frames = args.frames, "skirmish ready");

    let frame_rate = u64::from(config.game_loop.target_fps.max(1));
    for frame in 0..args.frames {
        // Every unit takes a hit once per simulated second.
        if frame % frame_rate == 0 {
            if let Some(world) = game_loop.world_mut(world_index) {
                for &unit in &units {
                    world.send_message(unit, MsgApplyDamage { damage: 15 });
                }
            }
        }
        game_loop.run_frames(1);
    }

    if let Some(world) = game_loop.world(world_index) {
        let survivors = units.iter().filter(|&&unit| world.contains_object(unit)).count();
        let stats = world.stats();
        tracing::info!(survivors, objects = stats.objects, components = stats.components, "skirmish over");
    }
    game_loop.stats().log_summary();
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            tracing::error!(%message, "usage: hearth_headless [config.toml] [--frames N]");
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "headless run failed");
            ExitCode::FAILURE
        }
    }
}
