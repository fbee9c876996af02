//! Sensor hub.
//!
//! Polls a configured set of sensor units on a fixed schedule, normalizes
//! their values into [`Reading`](sensorhub_common::Reading)s and publishes
//! each one to a telemetry sink (MQTT or Zenoh).
//!
//! - [`registry`] - Typed sensor descriptors, validated at load
//! - [`hardware`] - Board, 1-Wire and I2C access traits, simulated and scripted boards
//! - [`reader`] - Per-kind unit readers
//! - [`dispatcher`] - One acquisition pass over the registry
//! - [`transport`] - MQTT and Zenoh transports
//! - [`session`] - Connected/disconnected publish session
//! - [`hub`] - Bootstrap and cycle loop

pub mod args;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hardware;
pub mod hub;
pub mod indicator;
pub mod link;
pub mod reader;
pub mod registry;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, HubConfig};
pub use dispatcher::Dispatcher;
pub use error::HubError;
pub use hub::{HaltReason, HostHub, Hub, HubState};
pub use registry::{SensorDescriptor, SensorRegistry};
pub use session::{PublishSession, SessionState};
