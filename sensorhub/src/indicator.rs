//! Optional status LED.
//!
//! Patterns:
//! - steady on: link up or sink connected
//! - slow blink: connect in progress
//! - rapid blink: fatal link failure

use std::time::Duration;

use tracing::trace;

/// On time of every blink.
pub const BLINK_ON: Duration = Duration::from_millis(100);
/// Off time of a rapid blink.
pub const RAPID_OFF: Duration = Duration::from_millis(100);
/// Off time of a slow blink.
pub const SLOW_OFF: Duration = Duration::from_millis(400);
/// Rapid blinks signalled before halting on link failure.
pub const FATAL_BLINKS: usize = 20;

/// A binary output.
pub trait StatusLed {
    fn set(&mut self, on: bool);
}

/// LED stand-in for hosts without GPIO: level changes go to the log.
#[derive(Debug, Clone)]
pub struct LoggedLed {
    pin: u8,
    on: bool,
}

impl LoggedLed {
    pub fn new(pin: u8) -> Self {
        Self { pin, on: false }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl StatusLed for LoggedLed {
    fn set(&mut self, on: bool) {
        if self.on != on {
            trace!(pin = self.pin, on, "Status LED");
        }
        self.on = on;
    }
}

/// Blink patterns over an optional LED. Without an LED every pattern is a
/// no-op that takes no time.
#[derive(Debug)]
pub struct Indicator<L: StatusLed> {
    led: Option<L>,
}

impl<L: StatusLed> Indicator<L> {
    pub fn new(led: Option<L>) -> Self {
        Self { led }
    }

    /// An indicator with no LED attached.
    pub fn absent() -> Self {
        Self { led: None }
    }

    pub fn led(&self) -> Option<&L> {
        self.led.as_ref()
    }

    pub fn steady_on(&mut self) {
        if let Some(led) = self.led.as_mut() {
            led.set(true);
        }
    }

    pub fn off(&mut self) {
        if let Some(led) = self.led.as_mut() {
            led.set(false);
        }
    }

    /// `count` blinks of 100 ms on, 100 ms off. Ends with the LED off.
    pub async fn rapid_blink(&mut self, count: usize) {
        for _ in 0..count {
            self.blink(RAPID_OFF).await;
        }
    }

    /// One slow blink period (100 ms on, 400 ms off). Callers repeat it
    /// while waiting.
    pub async fn slow_blink(&mut self) {
        self.blink(SLOW_OFF).await;
    }

    /// Slow blink until the future is dropped. Pends forever without an LED.
    pub async fn keep_slow_blinking(&mut self) {
        if self.led.is_none() {
            return std::future::pending().await;
        }
        loop {
            self.slow_blink().await;
        }
    }

    async fn blink(&mut self, off: Duration) {
        let Some(led) = self.led.as_mut() else {
            return;
        };
        led.set(true);
        tokio::time::sleep(BLINK_ON).await;
        led.set(false);
        tokio::time::sleep(off).await;
    }
}
