//! Headless driver for the controller core.
//!
//! ```text
//! melee-controller-core sim [--frames N] [--seed S] [--enemies E] [--record PATH]
//! melee-controller-core verify PATH
//! melee-controller-core watch [--frames N]
//! ```
//!
//! Config is read from `config/controller.json` (defaults if missing) and the
//! attack dictionary from the path it names.

use anyhow::{bail, Context, Result};
use bevy::app::{AppExit, ScheduleRunnerPlugin};
use bevy::core::FrameCount;
use bevy::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use melee_core::combat::AttackDictionary;
use melee_core::config::{ControllerConfig, DEFAULT_CONFIG_PATH};
use melee_core::controller::CharacterController;
use melee_core::hotreload::HotReloadPlugin;
use melee_core::logging::{self, LoggingPlugin};
use melee_core::plugin::{ControllerBundle, ControllerDictionary, ControllerPlugin, ControllerRequest};
use melee_core::replay::{self, ReplayRecorder, ReplayRecording};
use melee_core::sim::{HeadlessWorld, InputScript};

struct Args {
    command: String,
    frames: u64,
    seed: u64,
    enemies: u32,
    path: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        command: args.next().unwrap_or_else(|| "sim".into()),
        frames: 1800,
        seed: 7,
        enemies: 6,
        path: None,
    };
    while let Some(arg) = args.next() {
        let mut value = || args.next().with_context(|| format!("{arg} needs a value"));
        match arg.as_str() {
            "--frames" => parsed.frames = value()?.parse()?,
            "--seed" => parsed.seed = value()?.parse()?,
            "--enemies" => parsed.enemies = value()?.parse()?,
            "--record" => parsed.path = Some(value()?),
            other if parsed.path.is_none() && !other.starts_with("--") => parsed.path = Some(other.into()),
            other => bail!("unknown argument {other}"),
        }
    }
    Ok(parsed)
}

fn load_config() -> Result<ControllerConfig> {
    if !Path::new(DEFAULT_CONFIG_PATH).exists() {
        warn!(path = DEFAULT_CONFIG_PATH, "config not found, using defaults");
        return Ok(ControllerConfig::default());
    }
    ControllerConfig::load(DEFAULT_CONFIG_PATH).with_context(|| format!("loading {DEFAULT_CONFIG_PATH}"))
}

fn load_dictionary(config: &ControllerConfig) -> Result<Arc<AttackDictionary>> {
    let dictionary = AttackDictionary::load(&config.attack_dictionary)
        .with_context(|| format!("loading {}", config.attack_dictionary))?;
    Ok(Arc::new(dictionary))
}

fn run_sim(args: &Args) -> Result<()> {
    let config = load_config()?;
    let dictionary = load_dictionary(&config)?;
    let dt = 1.0 / config.tick_rate.max(1) as f32;

    let mut world = HeadlessWorld::new(CharacterController::player(dictionary, &config));
    world.populate(args.enemies, args.seed);

    let mut recorder = ReplayRecorder::new(&format!("sim-{}", args.seed), &config, true);
    for input in InputScript::new(args.seed, dt).take(args.frames as usize) {
        let frame = world.step(input);
        recorder.record(frame, &world.controller);
    }

    let stats = world.stats();
    info!(?stats, digest = %world.controller.state_digest(), "simulation finished");
    println!("{}", serde_json::to_string_pretty(&stats)?);

    if let Some(path) = &args.path {
        recorder.finish().save(path).with_context(|| format!("writing {path}"))?;
        info!(path, "replay saved");
    }
    Ok(())
}

fn run_verify(args: &Args) -> Result<()> {
    let path = args.path.as_deref().context("verify needs a replay path")?;
    let recording = ReplayRecording::load(path).with_context(|| format!("reading {path}"))?;
    let dictionary = load_dictionary(&recording.header.config)?;
    let report = replay::play_back(&recording, dictionary)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_deterministic() {
        bail!("replay diverged at tick {:?}", report.first_divergence);
    }
    Ok(())
}

#[derive(Resource)]
struct FrameLimit(u64);

fn spawn_player(mut commands: Commands, dictionary: Res<ControllerDictionary>, config: Res<ControllerConfig>) {
    commands.spawn(ControllerBundle::player(&dictionary, &config, Transform::default()));
}

fn log_requests(mut requests: EventReader<ControllerRequest>) {
    for request in requests.read() {
        info!(controller = ?request.controller, request = ?request.request, "host request");
    }
}

fn stop_after_limit(frames: Res<FrameCount>, limit: Res<FrameLimit>, mut exit: EventWriter<AppExit>) {
    if u64::from(frames.0) >= limit.0 {
        exit.send(AppExit::Success);
    }
}

fn run_watch(args: &Args) -> Result<()> {
    let config = load_config()?;
    let dictionary = load_dictionary(&config)?;
    let frame_time = Duration::from_secs_f64(1.0 / f64::from(config.tick_rate.max(1)));

    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(frame_time)))
        .add_plugins(LoggingPlugin::default())
        .add_plugins(HotReloadPlugin::default())
        .add_plugins(ControllerPlugin::new(dictionary))
        .insert_resource(FrameLimit(args.frames))
        .add_systems(Startup, spawn_player)
        .add_systems(Update, (log_requests, stop_after_limit))
        .run();
    Ok(())
}

fn main() -> Result<()> {
    logging::init_tracing_default();
    let args = parse_args()?;
    match args.command.as_str() {
        "sim" => run_sim(&args),
        "verify" => run_verify(&args),
        "watch" => run_watch(&args),
        other => bail!("unknown command {other} (expected sim, verify or watch)"),
    }
}
