//! Traffic counters for a running instance.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Point-in-time copy of an instance's counters, as persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceMetrics {
    /// Envelopes written to the tool's stdin.
    pub messages_sent: u64,
    /// Envelopes produced from the tool's stdout.
    pub messages_received: u64,
    /// Stderr diagnostics and failed deliveries.
    pub errors: u64,
    /// Mean time from a request to the first output after it, in
    /// milliseconds. Zero until a request has been answered.
    pub latency_ms: u64,
}

/// Lock-free accumulator behind [`InstanceMetrics`].
///
/// Latency is measured from the first request sent while no request is
/// pending to the next output line.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    sent: AtomicU64,
    received: AtomicU64,
    errors: AtomicU64,
    latency_total_ms: AtomicU64,
    latency_samples: AtomicU64,
    pending_since: Mutex<Option<Instant>>,
}

impl MetricsRecorder {
    /// Records a request written to the tool at `now`.
    pub fn record_sent(&self, now: Instant) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.pending_since
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(now);
    }

    /// Records an output envelope observed at `now`.
    pub fn record_received(&self, now: Instant) {
        self.received.fetch_add(1, Ordering::Relaxed);
        let pending = self
            .pending_since
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(since) = pending {
            let elapsed = u64::try_from(now.saturating_duration_since(since).as_millis())
                .unwrap_or(u64::MAX);
            self.latency_total_ms.fetch_add(elapsed, Ordering::Relaxed);
            self.latency_samples.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records an error.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current counters.
    #[must_use]
    pub fn snapshot(&self) -> InstanceMetrics {
        let total = self.latency_total_ms.load(Ordering::Relaxed);
        let samples = self.latency_samples.load(Ordering::Relaxed);
        InstanceMetrics {
            messages_sent: self.sent.load(Ordering::Relaxed),
            messages_received: self.received.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            latency_ms: total.checked_div(samples).unwrap_or_default(),
        }
    }
}
