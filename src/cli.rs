use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use sphere_tracer_lib::scene::SceneConfig;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "sphere_tracer")]
#[command(about = "Progressive GPU ray tracer for a random field of spheres")]
pub struct Args {
    /// Window width in pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Window height in pixels
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Smallest radius of a placed sphere
    #[arg(long, default_value_t = 3.0)]
    pub radius_min: f32,

    /// Largest radius of a placed sphere
    #[arg(long, default_value_t = 8.0)]
    pub radius_max: f32,

    /// Placement attempts; overlapping candidates are dropped, not retried
    #[arg(long, short = 'n', default_value_t = 100)]
    pub spheres_max: u32,

    /// Radius of the disk sphere positions are drawn from
    #[arg(long, default_value_t = 100.0)]
    pub placement_radius: f32,

    /// Seed for scene placement and pixel jitter (random when omitted)
    #[arg(long, short = 's')]
    pub seed: Option<u64>,

    /// Equirectangular skybox image; a procedural sky is used when omitted
    #[arg(long)]
    pub skybox: Option<PathBuf>,

    /// Logging level, overridden by RUST_LOG
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

impl Args {
    pub fn scene_config(&self) -> SceneConfig {
        SceneConfig {
            sphere_radius: glam::Vec2::new(self.radius_min, self.radius_max),
            spheres_max: self.spheres_max,
            placement_radius: self.placement_radius,
        }
    }
}

pub fn init_logger(level: LogLevel) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(level).into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
