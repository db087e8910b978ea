//! Request counters feeding [`SystemHealth`](repute_core::types::SystemHealth).
//!
//! Lock-free: every field is an atomic, and the running average is stored as
//! `f64` bits so it can be updated with a compare-and-swap loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Weight of the newest sample in the response-time average.
const EMA_WEIGHT: f64 = 0.1;

#[derive(Debug, Default)]
pub struct ServiceMetrics {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    avg_response_ms_bits: AtomicU64,
}

/// Point-in-time copy of [`ServiceMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_ops: u64,
    pub failed_ops: u64,
    pub average_response_time_ms: f64,
}

impl MetricsSnapshot {
    /// Failed over total; zero before the first request.
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.failed_ops as f64 / self.total_requests as f64
        }
    }

    /// `100 * (1 - error_rate)`.
    pub fn health_score(&self) -> f64 {
        100.0 * (1.0 - self.error_rate())
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished operation.
    ///
    /// The first sample seeds the average; later ones blend in at 10%.
    pub fn record(&self, ok: bool, elapsed: Duration) {
        let first = self.total.fetch_add(1, Ordering::Relaxed) == 0;
        if ok {
            self.successful.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }

        let sample = elapsed.as_secs_f64() * 1000.0;
        let _ = self
            .avg_response_ms_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let old = f64::from_bits(bits);
                let next = if first {
                    sample
                } else {
                    EMA_WEIGHT * sample + (1.0 - EMA_WEIGHT) * old
                };
                Some(next.to_bits())
            });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total.load(Ordering::Relaxed),
            successful_ops: self.successful.load(Ordering::Relaxed),
            failed_ops: self.failed.load(Ordering::Relaxed),
            average_response_time_ms: f64::from_bits(self.avg_response_ms_bits.load(Ordering::Relaxed)),
        }
    }
}
