//! Engine tunables.
//!
//! Every pacing and batching value the engine uses is supplied here rather than hardcoded.
//! Defaults follow the settings that held up against a throttled document store in practice.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BulkloadError, Result};

/// Pacing, retry and batch-size configuration for the mutation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Adaptive inter-batch delay at process start, in milliseconds (default: 300).
    pub base_delay_ms: u64,

    /// Lowest value the adaptive delay decays to, in milliseconds (default: 300).
    pub floor_delay_ms: u64,

    /// Amount added to the adaptive delay on every throttled attempt (default: 200).
    pub throttle_step_ms: u64,

    /// Amount removed from the adaptive delay on every successful attempt (default: 25).
    pub success_step_ms: u64,

    /// Backoff before the second attempt; doubles per further attempt (default: 1500).
    pub initial_retry_delay_ms: u64,

    /// Total submissions allowed per logical batch, including the first (default: 8).
    pub max_attempts: u32,

    /// Records per insert batch (default: 250).
    pub insert_batch_size: usize,

    /// Identifiers fetched and deleted per delete cycle (default: 500).
    pub delete_batch_size: usize,

    /// Updates per bulk update request (default: 500).
    pub update_batch_size: usize,

    /// Documents read per page by the copy path (default: 100).
    pub copy_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 300,
            floor_delay_ms: 300,
            throttle_step_ms: 200,
            success_step_ms: 25,
            initial_retry_delay_ms: 1500,
            max_attempts: 8,
            insert_batch_size: 250,
            delete_batch_size: 500,
            update_batch_size: 500,
            copy_page_size: 100,
        }
    }
}

impl EngineConfig {
    /// Check that the configuration can drive the engine.
    ///
    /// # Errors
    ///
    /// Returns `BulkloadError::Configuration` for zero batch sizes, zero attempts, a zero
    /// throttle step or initial retry delay, or a floor above the base delay.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(BulkloadError::Configuration(
                "max_attempts must be at least 1".into(),
            ));
        }
        if self.throttle_step_ms == 0 {
            return Err(BulkloadError::Configuration(
                "throttle_step_ms must be positive".into(),
            ));
        }
        if self.initial_retry_delay_ms == 0 {
            return Err(BulkloadError::Configuration(
                "initial_retry_delay_ms must be positive".into(),
            ));
        }
        if self.floor_delay_ms > self.base_delay_ms {
            return Err(BulkloadError::Configuration(format!(
                "floor_delay_ms ({}) exceeds base_delay_ms ({})",
                self.floor_delay_ms, self.base_delay_ms
            )));
        }
        for (name, size) in [
            ("insert_batch_size", self.insert_batch_size),
            ("delete_batch_size", self.delete_batch_size),
            ("update_batch_size", self.update_batch_size),
            ("copy_page_size", self.copy_page_size),
        ] {
            if size == 0 {
                return Err(BulkloadError::Configuration(format!(
                    "{name} must be at least 1"
                )));
            }
        }
        Ok(())
    }

    /// Backoff before the second attempt.
    #[must_use]
    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }
}
