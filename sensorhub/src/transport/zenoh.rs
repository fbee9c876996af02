//! Zenoh transport.

use tracing::warn;

use super::{Transport, TransportError};
use crate::config::ZenohSinkConfig;

/// Puts payloads on a Zenoh session; the route is the key expression.
pub struct ZenohTransport {
    config: ZenohSinkConfig,
    session: Option<::zenoh::Session>,
}

impl ZenohTransport {
    pub fn new(config: ZenohSinkConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }
}

impl Transport for ZenohTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let session = sensorhub_common::connect(&self.config.zenoh_config(), self.config.timeout())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        self.session = Some(session);
        Ok(())
    }

    async fn send(&mut self, route: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let session = self.session.as_ref().ok_or(TransportError::Closed)?;
        let result = session.put(route, payload).await;
        if let Err(e) = result {
            self.session = None;
            return Err(TransportError::Send {
                route: route.to_string(),
                message: e.to_string(),
            });
        }
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!(error = %e, "Error closing Zenoh session");
            }
        }
    }

    fn describe(&self) -> String {
        format!("zenoh ({})", self.config.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: &str) -> ZenohSinkConfig {
        ZenohSinkConfig {
            mode: mode.to_string(),
            connect: Vec::new(),
            listen: Vec::new(),
            timeout_ms: 500,
        }
    }

    #[tokio::test]
    async fn test_send_while_closed() {
        let mut transport = ZenohTransport::new(config("peer"));
        assert_eq!(
            transport.send("Sensor/LDR", vec![1, 2, 3]).await,
            Err(TransportError::Closed)
        );
    }

    #[tokio::test]
    async fn test_invalid_mode_fails_to_open() {
        let mut transport = ZenohTransport::new(config("satellite"));
        assert!(matches!(
            transport.open().await,
            Err(TransportError::Connect(_))
        ));
        assert!(!transport.is_open());
    }
}
