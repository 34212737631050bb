//! Shared health counters for the /health endpoint.
//! Updated by the refresher.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Default)]
pub struct HealthState {
    /// True when the last published run was built from synthetic data.
    pub simulated: AtomicBool,
    /// Completed refreshes since startup.
    pub refresh_count: AtomicU64,
    /// Live fetch attempts that ended in a synthetic fallback.
    pub fetch_failures: AtomicU64,
    /// Millisecond timestamp of the last completed refresh (0 = none).
    pub last_refresh_at_ms: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_refresh(&self, simulated: bool, at_ms: u64) {
        self.simulated.store(simulated, Ordering::Relaxed);
        self.last_refresh_at_ms.store(at_ms, Ordering::Relaxed);
        self.refresh_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fetch_failures(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn simulated(&self) -> bool {
        self.simulated.load(Ordering::Relaxed)
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::Relaxed)
    }

    pub fn last_refresh_at_ms(&self) -> u64 {
        self.last_refresh_at_ms.load(Ordering::Relaxed)
    }
}
