//! Traffic Stats Accumulator
//!
//! Running uplink/downlink totals for one instance. The embedded engine
//! resets its outbound counter on every query, so each sample is a delta
//! and sampling accumulates by design.

use crate::engine::Direction;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Monotonically non-decreasing traffic totals for one session.
#[derive(Debug, Default)]
pub struct TrafficStats {
    uplink_total: AtomicU64,
    downlink_total: AtomicU64,
}

impl TrafficStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sampled counter delta into the matching total.
    ///
    /// Returns the sample unchanged so callers can surface it.
    pub fn accumulate(&self, direction: Direction, sampled: u64) -> u64 {
        let total = match direction {
            Direction::Uplink => &self.uplink_total,
            Direction::Downlink => &self.downlink_total,
        };
        let updated = total.fetch_add(sampled, Ordering::Relaxed) + sampled;
        debug!(
            direction = direction.as_str(),
            sampled = sampled,
            total = updated,
            "Accumulated traffic sample"
        );
        sampled
    }

    pub fn uplink_total(&self) -> u64 {
        self.uplink_total.load(Ordering::Relaxed)
    }

    pub fn downlink_total(&self) -> u64 {
        self.downlink_total.load(Ordering::Relaxed)
    }

    /// Take the current totals, resetting both to zero.
    ///
    /// Used after a successful persistence cycle so the next cycle only
    /// writes bytes sampled since.
    pub fn drain(&self) -> (u64, u64) {
        (
            self.uplink_total.swap(0, Ordering::Relaxed),
            self.downlink_total.swap(0, Ordering::Relaxed),
        )
    }
}
