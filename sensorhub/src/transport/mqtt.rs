//! MQTT transport (rumqttc).

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tracing::{debug, warn};

use super::{Transport, TransportError};
use crate::config::MqttSinkConfig;

/// Capacity of the request channel between client and event loop.
const REQUEST_CAPACITY: usize = 16;

struct Connection {
    client: AsyncClient,
    eventloop: EventLoop,
}

/// Publishes to an MQTT broker with QoS 0.
///
/// The event loop is driven only while connecting or publishing, so no
/// background task is needed.
pub struct MqttTransport {
    config: MqttSinkConfig,
    conn: Option<Connection>,
}

impl MqttTransport {
    pub fn new(config: MqttSinkConfig) -> Self {
        Self { config, conn: None }
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(self.config.keep_alive());
        options.set_clean_session(true);
        options
    }
}

/// Poll until the broker acknowledges the connection.
async fn await_connack(eventloop: &mut EventLoop) -> Result<(), TransportError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(TransportError::Connect(format!("broker refused: {:?}", code))),
                };
            }
            Ok(event) => debug!(?event, "MQTT event while connecting"),
            Err(e) => return Err(TransportError::Connect(e.to_string())),
        }
    }
}

/// Poll until the queued publish has been written to the socket.
async fn await_publish_flushed(eventloop: &mut EventLoop, route: &str) -> Result<(), TransportError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Publish(_))) => return Ok(()),
            Ok(event) => debug!(?event, "MQTT event while publishing"),
            Err(e) => {
                return Err(TransportError::Send {
                    route: route.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
}

impl Transport for MqttTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let (client, mut eventloop) = AsyncClient::new(self.options(), REQUEST_CAPACITY);
        let timeout = self.config.timeout();

        tokio::time::timeout(timeout, await_connack(&mut eventloop))
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;

        self.conn = Some(Connection { client, eventloop });
        Ok(())
    }

    async fn send(&mut self, route: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let timeout = self.config.timeout();
        let Some(conn) = self.conn.as_mut() else {
            return Err(TransportError::Closed);
        };

        let result = async {
            conn.client
                .publish(route, QoS::AtMostOnce, false, payload)
                .await
                .map_err(|e| TransportError::Send {
                    route: route.to_string(),
                    message: e.to_string(),
                })?;
            tokio::time::timeout(timeout, await_publish_flushed(&mut conn.eventloop, route))
                .await
                .map_err(|_| TransportError::Timeout(timeout))?
        }
        .await;

        if result.is_err() {
            // The event loop state is unknown after an error; start over on the next open.
            self.conn = None;
        }
        result
    }

    async fn close(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        if let Err(e) = conn.client.disconnect().await {
            warn!(error = %e, "Failed to queue MQTT disconnect");
            return;
        }
        // Flush the DISCONNECT packet; the broker closing the socket ends the loop.
        let flush = async {
            loop {
                match conn.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        let _ = tokio::time::timeout(self.config.timeout(), flush).await;
    }

    fn describe(&self) -> String {
        format!("mqtt://{}:{}", self.config.host, self.config.port)
    }
}
