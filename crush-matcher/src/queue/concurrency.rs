//! Batch concurrency limiter
//!
//! Caps how many consumer invocations run at once. Each invocation holds a
//! permit for as long as it is applying its batch.

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ConsumerConfig;

#[derive(Debug, Clone)]
pub struct BatchLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    batches_started: Arc<AtomicU64>,
    batches_waited: Arc<AtomicU64>,
}

impl BatchLimiter {
    pub fn new(config: &ConsumerConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_batches)),
            max_concurrent: config.max_concurrent_batches,
            batches_started: Arc::new(AtomicU64::new(0)),
            batches_waited: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wait for a free slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        if self.semaphore.available_permits() == 0 {
            self.batches_waited.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Batch limiter: waiting for a slot ({} batches in flight)",
                self.max_concurrent
            );
        }

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Batch limiter closed")?;
        self.batches_started.fetch_add(1, Ordering::Relaxed);

        debug!(
            "Batch limiter: acquired slot ({}/{} in flight)",
            self.in_flight(),
            self.max_concurrent
        );
        Ok(permit)
    }

    pub fn in_flight(&self) -> usize {
        self.max_concurrent.saturating_sub(self.semaphore.available_permits())
    }

    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            in_flight: self.in_flight(),
            max_concurrent: self.max_concurrent,
            batches_started: self.batches_started.load(Ordering::Relaxed),
            batches_waited: self.batches_waited.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    pub in_flight: usize,
    pub max_concurrent: usize,
    /// Total slots handed out
    pub batches_started: u64,
    /// Times a batch had to wait for a slot
    pub batches_waited: u64,
}
