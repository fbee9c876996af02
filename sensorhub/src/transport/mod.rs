//! Telemetry sink transports.
//!
//! A [`Transport`] moves already-encoded payloads to a route on the remote
//! sink. It knows nothing about readings or encodings; the publish session
//! owns that.

pub mod mqtt;
pub mod recording;
pub mod zenoh;

use std::time::Duration;

use thiserror::Error;

use crate::config::SinkConfig;

pub use self::mqtt::MqttTransport;
pub use self::recording::RecordingTransport;
pub use self::zenoh::ZenohTransport;

/// Transport failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send to '{route}' failed: {message}")]
    Send { route: String, message: String },

    #[error("transport is closed")]
    Closed,

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A connection to a telemetry sink.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Establish the connection. Called only while closed.
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Deliver one payload. A failure leaves the transport closed.
    async fn send(&mut self, route: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Tear the connection down. Never fails.
    async fn close(&mut self);

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// The transport selected by configuration.
pub enum SinkTransport {
    Mqtt(MqttTransport),
    Zenoh(ZenohTransport),
}

impl SinkTransport {
    pub fn from_config(config: &SinkConfig) -> Self {
        match config {
            SinkConfig::Mqtt(mqtt) => Self::Mqtt(MqttTransport::new(mqtt.clone())),
            SinkConfig::Zenoh(zenoh) => Self::Zenoh(ZenohTransport::new(zenoh.clone())),
        }
    }
}

impl Transport for SinkTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        match self {
            Self::Mqtt(t) => t.open().await,
            Self::Zenoh(t) => t.open().await,
        }
    }

    async fn send(&mut self, route: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        match self {
            Self::Mqtt(t) => t.send(route, payload).await,
            Self::Zenoh(t) => t.send(route, payload).await,
        }
    }

    async fn close(&mut self) {
        match self {
            Self::Mqtt(t) => t.close().await,
            Self::Zenoh(t) => t.close().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Mqtt(t) => t.describe(),
            Self::Zenoh(t) => t.describe(),
        }
    }
}
