//! Sensor hub common library
//!
//! Shared types and plumbing for the sensor hub:
//!
//! - [`telemetry`] - Reading data model (`Reading`, `ReadingPayload`, `ReadingValue`, `SensorKind`)
//! - [`serialization`] - JSON/CBOR encoding and decoding of payloads
//! - [`route`] - Publish route builder (`<prefix>/<kind>`)
//! - [`config`] - Zenoh and logging configuration sections
//! - [`session`] - Zenoh session opening
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod route;
pub mod serialization;
pub mod session;
pub mod telemetry;

pub use config::{LogFormat, LoggingConfig, ZenohConfig};
pub use error::{Error, Result};
pub use route::{ROUTE_PREFIX, RouteBuilder};
pub use serialization::{Format, decode, encode};
pub use session::connect;
pub use telemetry::{Reading, ReadingPayload, ReadingValue, SensorKind};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Supports two
/// output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
