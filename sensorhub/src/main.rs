//! Sensor hub binary.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use sensorhub::HostHub;
use sensorhub::args::HubArgs;
use sensorhub::config::HubConfig;
use sensorhub::hub::HaltReason;
use sensorhub::link::{HostLink, SntpClock};
use sensorhub_common::LoggingConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = HubArgs::parse();

    let config = HubConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let log_config = LoggingConfig {
        level: args
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone()),
        format: config.logging.format,
    };
    sensorhub_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting sensorhub");
    info!("Loaded configuration from {:?}", args.config);

    let mut hub = HostHub::from_config(&config);
    for desc in hub.dispatcher().registry().iter() {
        info!(
            sensor = %desc.name,
            kind = %desc.kind,
            location = %desc.location,
            active = desc.active,
            "Registered sensor"
        );
    }

    let mut link = HostLink::new(&config.link);
    let mut clock = SntpClock::new(config.time.clone());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    match hub.run(&mut link, &mut clock, shutdown).await {
        HaltReason::Failed(e) => error!(error = %e, "Sensor hub stopped after an error"),
        reason => info!(?reason, "Sensor hub stopped"),
    }

    Ok(())
}
