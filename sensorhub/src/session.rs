//! Publish session: connection state against one telemetry sink.

use thiserror::Error;
use tracing::{debug, info, warn};

use sensorhub_common::{Format, Reading, RouteBuilder, encode};

use crate::transport::{Transport, TransportError};

/// Connection state of a [`PublishSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// Publish failures. None of these are fatal to the hub.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is not connected")]
    NotConnected,

    #[error("failed to encode reading '{id}': {source}")]
    Encode {
        id: String,
        #[source]
        source: sensorhub_common::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Owns the transport and the single piece of cross-cycle state.
///
/// There is no background reconnection; the hub loop calls
/// [`connect`](Self::connect) when it finds the session disconnected.
pub struct PublishSession<T: Transport> {
    transport: T,
    state: SessionState,
    routes: RouteBuilder,
    format: Format,
}

impl<T: Transport> PublishSession<T> {
    /// Create a disconnected session.
    pub fn new(transport: T, routes: RouteBuilder, format: Format) -> Self {
        Self {
            transport,
            state: SessionState::Disconnected,
            routes,
            format,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn routes(&self) -> &RouteBuilder {
        &self.routes
    }

    /// Connect if disconnected. No-op when already connected.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        if self.is_connected() {
            return Ok(());
        }

        let sink = self.transport.describe();
        info!(sink = %sink, "Connecting to telemetry sink");
        match self.transport.open().await {
            Ok(()) => {
                self.state = SessionState::Connected;
                info!(sink = %sink, "Connected to telemetry sink");
                Ok(())
            }
            Err(e) => {
                warn!(sink = %sink, error = %e, "Failed to connect to telemetry sink");
                Err(e.into())
            }
        }
    }

    /// Send one reading on `<prefix>/<kind>`.
    ///
    /// Fails without touching the transport when disconnected. A transport
    /// failure drops the session to [`SessionState::Disconnected`].
    pub async fn publish(&mut self, reading: &Reading) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let route = self.routes.build(&reading.kind);
        let payload = encode(&reading.payload, self.format).map_err(|source| SessionError::Encode {
            id: reading.payload.id.clone(),
            source,
        })?;

        match self.transport.send(&route, payload).await {
            Ok(()) => {
                debug!(route = %route, id = %reading.payload.id, "Published reading");
                Ok(())
            }
            Err(e) => {
                warn!(route = %route, id = %reading.payload.id, error = %e, "Publish failed");
                self.state = SessionState::Disconnected;
                self.transport.close().await;
                Err(e.into())
            }
        }
    }

    /// Tear down the connection. Idempotent.
    pub async fn disconnect(&mut self) {
        if self.state == SessionState::Connected {
            self.transport.close().await;
            self.state = SessionState::Disconnected;
            info!("Disconnected from telemetry sink");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use sensorhub_common::{ReadingPayload, SensorKind, decode};

    fn session(transport: &RecordingTransport) -> PublishSession<RecordingTransport> {
        PublishSession::new(transport.clone(), RouteBuilder::new(), Format::Json)
    }

    fn reading() -> Reading {
        Reading::new(SensorKind::Dht11, "Sensor_DHT11_Temp", 22i64, "°C", "Living Room", true)
    }

    #[tokio::test]
    async fn test_initial_state_is_disconnected() {
        let transport = RecordingTransport::new();
        let session = session(&transport);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(transport.opens(), 0);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let transport = RecordingTransport::new();
        let mut session = session(&transport);

        session.connect().await.unwrap();
        session.connect().await.unwrap();

        assert!(session.is_connected());
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_stays_disconnected() {
        let transport = RecordingTransport::new();
        transport.refuse_open(true);
        let mut session = session(&transport);

        assert!(matches!(
            session.connect().await,
            Err(SessionError::Transport(TransportError::Connect(_)))
        ));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_publish_while_disconnected_makes_no_transport_call() {
        let transport = RecordingTransport::new();
        let mut session = session(&transport);

        assert!(matches!(
            session.publish(&reading()).await,
            Err(SessionError::NotConnected)
        ));
        assert!(transport.sent().is_empty());
        assert_eq!(transport.opens(), 0);
    }

    #[tokio::test]
    async fn test_publish_encodes_payload_on_kind_route() {
        let transport = RecordingTransport::new();
        let mut session = session(&transport);
        session.connect().await.unwrap();

        session.publish(&reading()).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "Sensor/DHT11");
        let payload: ReadingPayload = decode(&sent[0].1, Format::Json).unwrap();
        assert_eq!(payload, reading().payload);
    }

    #[tokio::test]
    async fn test_transport_error_disconnects() {
        let transport = RecordingTransport::new();
        let mut session = session(&transport);
        session.connect().await.unwrap();
        transport.fail_sends(1);

        assert!(matches!(
            session.publish(&reading()).await,
            Err(SessionError::Transport(TransportError::Send { .. }))
        ));
        assert_eq!(session.state(), SessionState::Disconnected);

        // The next connect performs a fresh handshake.
        session.connect().await.unwrap();
        assert_eq!(transport.opens(), 2);
        session.publish(&reading()).await.unwrap();
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let transport = RecordingTransport::new();
        let mut session = session(&transport);

        session.disconnect().await;
        session.connect().await.unwrap();
        session.disconnect().await;
        session.disconnect().await;

        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(transport.closes(), 1);
    }
}
