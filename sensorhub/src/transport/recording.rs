//! In-memory transport that records traffic.
//!
//! Clones share state, so a test keeps one handle while the session owns
//! the other.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{Transport, TransportError};

#[derive(Debug, Default)]
struct Record {
    open: bool,
    refuse_open: bool,
    fail_sends: usize,
    opens: usize,
    closes: usize,
    sent: Vec<(String, Vec<u8>)>,
}

/// Transport double for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    record: Arc<Mutex<Record>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every `open` fail until cleared.
    pub fn refuse_open(&self, refuse: bool) {
        self.record().refuse_open = refuse;
    }

    /// Fail the next `count` sends.
    pub fn fail_sends(&self, count: usize) {
        self.record().fail_sends = count;
    }

    /// Payloads delivered so far, with their routes.
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.record().sent.clone()
    }

    /// Number of `open` attempts, successful or not.
    pub fn opens(&self) -> usize {
        self.record().opens
    }

    /// Number of `close` calls that closed an open connection.
    pub fn closes(&self) -> usize {
        self.record().closes
    }

    pub fn is_open(&self) -> bool {
        self.record().open
    }
}

impl Transport for RecordingTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let mut record = self.record();
        record.opens += 1;
        if record.refuse_open {
            return Err(TransportError::Connect("connection refused".to_string()));
        }
        record.open = true;
        Ok(())
    }

    async fn send(&mut self, route: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let mut record = self.record();
        if !record.open {
            return Err(TransportError::Closed);
        }
        if record.fail_sends > 0 {
            record.fail_sends -= 1;
            record.open = false;
            return Err(TransportError::Send {
                route: route.to_string(),
                message: "broken pipe".to_string(),
            });
        }
        record.sent.push((route.to_string(), payload));
        Ok(())
    }

    async fn close(&mut self) {
        let mut record = self.record();
        if record.open {
            record.open = false;
            record.closes += 1;
        }
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}
