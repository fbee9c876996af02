//! Network link and time sync, used once while bootstrapping.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{LinkConfig, TimeConfig};
use crate::indicator::{Indicator, StatusLed};

/// Pause between link probes.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;
const NTP_PACKET_LEN: usize = 48;
/// LI = 0, VN = 3, Mode = 3 (client).
const NTP_CLIENT_REQUEST: u8 = 0x1b;

/// Link and time sync failures.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cannot resolve '{0}'")]
    Resolve(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Brings the network up before the first cycle.
#[allow(async_fn_in_trait)]
pub trait NetworkLink {
    /// Wait for the link, showing progress on the indicator. `false` means
    /// the link never came up.
    async fn connect<L: StatusLed>(&mut self, indicator: &mut Indicator<L>) -> bool;
}

/// Link check for hosts whose OS manages the network.
///
/// Without a probe the link is assumed up. With one, the probe `host:port`
/// is resolved once per second until it succeeds or the timeout elapses.
#[derive(Debug, Clone)]
pub struct HostLink {
    probe: Option<String>,
    timeout: Duration,
}

impl HostLink {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            probe: config.probe.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

async fn resolves(probe: &str) -> bool {
    match tokio::net::lookup_host(probe).await {
        Ok(mut addrs) => addrs.next().is_some(),
        Err(e) => {
            debug!(probe = %probe, error = %e, "Link probe failed");
            false
        }
    }
}

impl NetworkLink for HostLink {
    async fn connect<L: StatusLed>(&mut self, indicator: &mut Indicator<L>) -> bool {
        let Some(probe) = self.probe.as_deref() else {
            indicator.steady_on();
            return true;
        };

        info!(probe = %probe, timeout = ?self.timeout, "Waiting for network link");
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if matches!(tokio::time::timeout(remaining, resolves(probe)).await, Ok(true)) {
                info!(probe = %probe, "Network link up");
                indicator.steady_on();
                return true;
            }

            let next = Instant::now() + PROBE_INTERVAL;
            if next >= deadline {
                break;
            }
            indicator.slow_blink().await;
            indicator.slow_blink().await;
            tokio::time::sleep_until(next).await;
        }

        warn!(probe = %probe, "Network link did not come up");
        false
    }
}

/// Result of one time sync.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockOffset {
    /// Server time, corrected by half the round trip.
    pub server_time: DateTime<Utc>,
    /// `server_time - local time`.
    pub offset: TimeDelta,
    /// 0 when the sync was skipped.
    pub stratum: u8,
}

impl ClockOffset {
    /// Offset reported when time sync is disabled.
    pub fn unsynced() -> Self {
        let now = Utc::now();
        Self {
            server_time: now,
            offset: TimeDelta::zero(),
            stratum: 0,
        }
    }
}

/// One-shot clock synchronization.
#[allow(async_fn_in_trait)]
pub trait TimeSync {
    async fn sync(&mut self) -> Result<ClockOffset, LinkError>;
}

/// SNTP v3 client over UDP.
///
/// The hub never sets the system clock; the measured offset is logged.
#[derive(Debug, Clone)]
pub struct SntpClock {
    config: TimeConfig,
}

impl SntpClock {
    pub fn new(config: TimeConfig) -> Self {
        Self { config }
    }

    async fn request(&self) -> Result<ClockOffset, LinkError> {
        let server = tokio::net::lookup_host(self.config.server.as_str())
            .await
            .map_err(|_| LinkError::Resolve(self.config.server.clone()))?
            .find(|addr| addr.is_ipv4())
            .ok_or_else(|| LinkError::Resolve(self.config.server.clone()))?;

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(server).await?;

        let mut request = [0u8; NTP_PACKET_LEN];
        request[0] = NTP_CLIENT_REQUEST;
        let sent_at = Instant::now();
        socket.send(&request).await?;

        let mut response = [0u8; 64];
        let len = socket.recv(&mut response).await?;
        let rtt = sent_at.elapsed();

        let (stratum, transmit) = parse_response(&response[..len], self.config.max_stratum)?;
        let server_time = transmit + TimeDelta::from_std(rtt / 2).unwrap_or_else(|_| TimeDelta::zero());
        Ok(ClockOffset {
            server_time,
            offset: server_time - Utc::now(),
            stratum,
        })
    }
}

impl TimeSync for SntpClock {
    async fn sync(&mut self) -> Result<ClockOffset, LinkError> {
        if !self.config.enabled {
            debug!("Time sync disabled");
            return Ok(ClockOffset::unsynced());
        }

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let result = tokio::time::timeout(timeout, self.request())
            .await
            .map_err(|_| LinkError::Timeout(timeout))?;

        if let Ok(offset) = &result {
            info!(
                server = %self.config.server,
                stratum = offset.stratum,
                server_time = %offset.server_time,
                offset_ms = offset.offset.num_milliseconds(),
                "Time synchronized"
            );
        }
        result
    }
}

/// Validate an SNTP reply and extract its stratum and transmit timestamp.
pub fn parse_response(
    packet: &[u8],
    max_stratum: u8,
) -> Result<(u8, DateTime<Utc>), LinkError> {
    if packet.len() < NTP_PACKET_LEN {
        return Err(LinkError::InvalidResponse(format!(
            "{} bytes, expected {}",
            packet.len(),
            NTP_PACKET_LEN
        )));
    }

    let stratum = packet[1];
    if stratum == 0 || stratum > max_stratum {
        return Err(LinkError::InvalidResponse(format!(
            "stratum {} (max {})",
            stratum, max_stratum
        )));
    }

    let secs = u64::from(u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]));
    let frac = u64::from(u32::from_be_bytes([packet[44], packet[45], packet[46], packet[47]]));
    let unix_secs = secs
        .checked_sub(NTP_UNIX_OFFSET)
        .ok_or_else(|| LinkError::InvalidResponse("timestamp before 1970".to_string()))?;
    let nanos = ((frac * 1_000_000_000) >> 32) as u32;

    let time = DateTime::from_timestamp(unix_secs as i64, nanos)
        .ok_or_else(|| LinkError::InvalidResponse("timestamp out of range".to_string()))?;
    Ok((stratum, time))
}
