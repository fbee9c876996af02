//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Default configuration file.
pub const DEFAULT_CONFIG: &str = "sensorhub.json5";

/// Polls attached sensors and publishes readings to a telemetry sink.
#[derive(Parser, Debug, Clone)]
#[command(name = "sensorhub")]
#[command(version)]
pub struct HubArgs {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}
