//! Hub loop: bootstrap once, then acquire and publish on a fixed period.

use std::future::Future;

use tokio::time::Instant;
use tracing::{error, info, warn};

use sensorhub_common::RouteBuilder;

use crate::config::{HubConfig, HubSettings};
use crate::dispatcher::Dispatcher;
use crate::error::{HubError, Result};
use crate::hardware::{Board, SimulatedBoard};
use crate::indicator::{FATAL_BLINKS, Indicator, LoggedLed, StatusLed};
use crate::link::{NetworkLink, TimeSync};
use crate::session::{PublishSession, SessionError};
use crate::transport::{SinkTransport, Transport};

/// Lifecycle of one hub run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    Bootstrapping,
    Cycling,
    Halted,
}

/// Why the hub stopped.
#[derive(Debug)]
pub enum HaltReason {
    /// The network link never came up.
    LinkDown,
    /// The shutdown future completed.
    Interrupted,
    /// An error escaped a cycle.
    Failed(HubError),
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The sink could not be reached; nothing was read.
    SinkUnavailable,
    /// Readings were acquired and handed to the session.
    Published {
        readings: usize,
        published: usize,
        failed: usize,
    },
}

/// The sensor hub.
pub struct Hub<B: Board, T: Transport, L: StatusLed> {
    settings: HubSettings,
    dispatcher: Dispatcher<B>,
    session: PublishSession<T>,
    indicator: Indicator<L>,
    state: HubState,
    cycles: u64,
}

/// Hub wired the way the binary runs it.
pub type HostHub = Hub<SimulatedBoard, SinkTransport, LoggedLed>;

impl HostHub {
    /// Build a hub on the simulated board with the configured sink.
    pub fn from_config(config: &HubConfig) -> Self {
        let registry = config.registry();
        let board = SimulatedBoard::new(&config.simulation);
        let dispatcher = Dispatcher::new(board, registry, config.hub.unit_timeout());
        let session = PublishSession::new(
            SinkTransport::from_config(&config.sink),
            RouteBuilder::with_prefix(config.hub.key_prefix.as_str()),
            config.serialization,
        );
        let indicator = Indicator::new(config.hub.status_led_pin.map(LoggedLed::new));

        Hub::new(config.hub.clone(), dispatcher, session, indicator)
    }
}

impl<B: Board, T: Transport, L: StatusLed> Hub<B, T, L> {
    pub fn new(
        settings: HubSettings,
        dispatcher: Dispatcher<B>,
        session: PublishSession<T>,
        indicator: Indicator<L>,
    ) -> Self {
        Self {
            settings,
            dispatcher,
            session,
            indicator,
            state: HubState::Bootstrapping,
            cycles: 0,
        }
    }

    pub fn state(&self) -> HubState {
        self.state
    }

    pub fn session(&self) -> &PublishSession<T> {
        &self.session
    }

    pub fn dispatcher(&self) -> &Dispatcher<B> {
        &self.dispatcher
    }

    pub fn indicator(&self) -> &Indicator<L> {
        &self.indicator
    }

    /// Completed cycles, including ones that found the sink unavailable.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run until the link fails, `shutdown` completes, or an error escapes
    /// a cycle. The session is always released before returning.
    pub async fn run<N, C, F>(&mut self, link: &mut N, clock: &mut C, shutdown: F) -> HaltReason
    where
        N: NetworkLink,
        C: TimeSync,
        F: Future<Output = ()>,
    {
        let reason = tokio::select! {
            _ = shutdown => HaltReason::Interrupted,
            reason = self.drive(link, clock) => reason,
        };
        self.halt(&reason).await;
        reason
    }

    async fn drive<N: NetworkLink, C: TimeSync>(&mut self, link: &mut N, clock: &mut C) -> HaltReason {
        if !self.bootstrap(link, clock).await {
            return HaltReason::LinkDown;
        }

        self.state = HubState::Cycling;
        info!(
            units = self.dispatcher.registry().len(),
            active = self.dispatcher.registry().active().count(),
            interval = ?self.settings.loop_interval(),
            "Starting sensor loop"
        );

        loop {
            let started = Instant::now();
            match self.run_cycle().await {
                Ok(CycleOutcome::SinkUnavailable) => {
                    let backoff = self.settings.reconnect_backoff();
                    info!(backoff = ?backoff, "Sink unavailable, waiting before retry");
                    tokio::time::sleep(backoff).await;
                }
                Ok(CycleOutcome::Published { .. }) => {
                    tokio::time::sleep_until(started + self.settings.loop_interval()).await;
                }
                Err(e) => return HaltReason::Failed(e),
            }
        }
    }

    /// Bring the link up and sync time. `false` if the link failed.
    pub async fn bootstrap<N: NetworkLink, C: TimeSync>(&mut self, link: &mut N, clock: &mut C) -> bool {
        self.state = HubState::Bootstrapping;

        if !link.connect(&mut self.indicator).await {
            error!("Network link failed, halting");
            self.indicator.rapid_blink(FATAL_BLINKS).await;
            self.indicator.off();
            return false;
        }

        // Best effort: a failed sync never blocks the loop.
        if let Err(e) = clock.sync().await {
            warn!(error = %e, "Time sync failed, continuing with local clock");
        }
        true
    }

    /// One pass: reconnect if needed, acquire, publish.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.cycles += 1;

        if !self.session.is_connected() {
            let connected = tokio::select! {
                result = self.session.connect() => result.is_ok(),
                _ = self.indicator.keep_slow_blinking() => false,
            };
            if !connected {
                self.indicator.off();
                return Ok(CycleOutcome::SinkUnavailable);
            }
            self.indicator.steady_on();
        }

        let readings = self.dispatcher.read_all().await;
        if readings.is_empty() {
            info!("No sensor readings to publish");
        }

        let pacing = self.settings.publish_pacing();
        let mut published = 0;
        let mut failed = 0;
        for reading in &readings {
            match self.session.publish(reading).await {
                Ok(()) => {
                    published += 1;
                    tokio::time::sleep(pacing).await;
                }
                Err(SessionError::Encode { id, source }) => {
                    return Err(HubError::Encode { id, source });
                }
                Err(_) => failed += 1,
            }
        }

        if !self.session.is_connected() {
            self.indicator.off();
        }

        info!(
            cycle = self.cycles,
            readings = readings.len(),
            published,
            failed,
            "Cycle complete"
        );
        Ok(CycleOutcome::Published {
            readings: readings.len(),
            published,
            failed,
        })
    }

    async fn halt(&mut self, reason: &HaltReason) {
        match reason {
            HaltReason::Interrupted => info!("Shutdown requested"),
            HaltReason::LinkDown => error!("Halted: network link unavailable"),
            HaltReason::Failed(e) => error!(error = %e, "Halted: unexpected error"),
        }
        self.session.disconnect().await;
        self.indicator.off();
        self.state = HubState::Halted;
    }
}
