//! Diagnostic sinks.
//!
//! The bus reports every failure to a [`DiagnosticSink`] instead of
//! returning it. The default sink forwards to `tracing`.

use parking_lot::Mutex;

use crate::error::{BusError, Severity};

/// Receiver for bus failures
pub trait DiagnosticSink: Send + Sync {
    /// Called once per failure, from inside the drain loop.
    fn report(&self, error: &BusError);
}

/// Logs failures through `tracing` at the error's severity
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, error: &BusError) {
        match error.severity() {
            Severity::Warning => {
                tracing::warn!(kind = error.kind(), channel = %error.channel(), "{}", error)
            }
            Severity::Error => {
                tracing::error!(kind = error.kind(), channel = %error.channel(), "{}", error)
            }
        }
    }
}

/// Keeps every reported failure in memory and also logs it.
///
/// Useful for tooling that wants to show configuration problems after a
/// bootstrap pass, and for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<BusError>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything reported so far
    pub fn reports(&self) -> Vec<BusError> {
        self.reports.lock().clone()
    }

    /// Take and clear the recorded failures
    pub fn drain(&self) -> Vec<BusError> {
        std::mem::take(&mut *self.reports.lock())
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, error: &BusError) {
        TracingSink.report(error);
        self.reports.lock().push(error.clone());
    }
}
