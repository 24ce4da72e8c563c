//! Adaptive pacing shared by every mutation a process runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bulkload_core::EngineConfig;

/// Largest exponent used for backoff; larger attempts saturate.
const MAX_BACKOFF_EXPONENT: u32 = 40;

/// Tracks the adaptive inter-batch delay.
///
/// One controller is shared (behind an `Arc`) by all jobs in a process, including jobs running
/// concurrently. The delay grows by a fixed step on every throttled attempt and decays by a
/// fixed step toward the floor on every successful one. Updates are atomic, so concurrent
/// callers never lose an adjustment.
#[derive(Debug)]
pub struct RateController {
    current_ms: AtomicU64,
    floor_ms: u64,
    throttle_step_ms: u64,
    success_step_ms: u64,
    initial_retry_ms: u64,
}

impl RateController {
    /// Create a controller starting at the configured base delay.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            current_ms: AtomicU64::new(config.base_delay_ms.max(config.floor_delay_ms)),
            floor_ms: config.floor_delay_ms,
            throttle_step_ms: config.throttle_step_ms,
            success_step_ms: config.success_step_ms,
            initial_retry_ms: config.initial_retry_delay_ms,
        }
    }

    /// The current inter-batch delay.
    #[must_use]
    pub fn current_delay(&self) -> Duration {
        Duration::from_millis(self.current_ms.load(Ordering::Relaxed))
    }

    /// Decay the delay by one step, never below the floor.
    pub fn record_success(&self) {
        let (step, floor) = (self.success_step_ms, self.floor_ms);
        let _ = self
            .current_ms
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |ms| {
                Some(ms.saturating_sub(step).max(floor))
            });
    }

    /// Grow the delay by one step.
    pub fn record_throttle(&self) {
        let step = self.throttle_step_ms;
        let _ = self
            .current_ms
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |ms| {
                Some(ms.saturating_add(step))
            });
    }

    /// Backoff before retrying after failed attempt `attempt`: `initial * 2^(attempt - 1)`.
    ///
    /// Independent of, and in addition to, [`current_delay`](Self::current_delay). Attempt
    /// numbers start at 1; 0 is treated as 1.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        Duration::from_millis(self.initial_retry_ms.saturating_mul(1u64 << exponent))
    }
}
