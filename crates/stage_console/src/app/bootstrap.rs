use std::env;
use std::sync::Arc;
use std::time::Duration;

use stage_engine::{
    EngineConfig, Palette, PlaybackController, StageHandle, StageWorld, DEFAULT_COLLISION_DISTANCE,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::renderer::LogRenderer;

const STEP_DELAY_ENV_VAR: &str = "BLOCKSTAGE_STEP_MS";
const SPEECH_DURATION_ENV_VAR: &str = "BLOCKSTAGE_SPEECH_MS";
const COLLISION_DISTANCE_ENV_VAR: &str = "BLOCKSTAGE_COLLISION_DISTANCE";

pub(crate) struct AppWiring {
    pub(crate) controller: Arc<PlaybackController>,
    pub(crate) palette: Palette,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Block Stage Startup ===");

    let config = resolve_engine_config(|name| env::var(name));
    info!(
        step_ms = config.step_delay.as_millis() as u64,
        speech_ms = config.speech_duration.as_millis() as u64,
        collision_distance = config.collision_distance,
        "engine_config_resolved"
    );
    wire(config)
}

pub(crate) fn wire(config: EngineConfig) -> AppWiring {
    let stage = StageHandle::new(
        StageWorld::new(config.spawn_position),
        Arc::new(LogRenderer::default()),
    );
    let controller = Arc::new(PlaybackController::new(stage, config));
    // The editor starts with one sprite, like a fresh project.
    controller.add_actor(None);

    AppWiring {
        controller,
        palette: Palette::default(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn resolve_engine_config<F>(read_var: F) -> EngineConfig
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    let defaults = EngineConfig::default();
    let step_delay = resolve_millis(&read_var, STEP_DELAY_ENV_VAR, defaults.step_delay);
    let speech_duration =
        resolve_millis(&read_var, SPEECH_DURATION_ENV_VAR, defaults.speech_duration);
    let collision_distance = resolve_env_value(
        &read_var,
        COLLISION_DISTANCE_ENV_VAR,
        DEFAULT_COLLISION_DISTANCE,
        |raw| {
            raw.parse::<f64>()
                .ok()
                .filter(|distance| distance.is_finite() && *distance >= 0.0)
        },
    );

    EngineConfig {
        step_delay,
        speech_duration,
        collision_distance,
        ..defaults
    }
    .normalized()
}

fn resolve_millis<F>(read_var: &F, env_var: &str, fallback: Duration) -> Duration
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    resolve_env_value(read_var, env_var, fallback, |raw| {
        raw.parse::<u64>().ok().map(Duration::from_millis)
    })
}

fn resolve_env_value<F, T, P>(read_var: &F, env_var: &str, fallback: T, parse: P) -> T
where
    F: Fn(&str) -> Result<String, env::VarError>,
    P: Fn(&str) -> Option<T>,
{
    match read_var(env_var) {
        Ok(value) => match parse(value.trim()) {
            Some(parsed) => parsed,
            None => {
                warn!(
                    env_var,
                    value = value.as_str(),
                    "invalid env var value; falling back to default"
                );
                fallback
            }
        },
        Err(env::VarError::NotPresent) => fallback,
        Err(err) => {
            warn!(
                env_var,
                error = %err,
                "unable to read env var; falling back to default"
            );
            fallback
        }
    }
}
