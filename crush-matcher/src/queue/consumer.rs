//! Interest queue consumer
//!
//! Drains a [`MessageSource`] batch by batch. Inside a batch, a body that does
//! not deserialize is logged and dropped, while any other failure aborts the
//! batch so the whole batch is delivered again. Reconciliation is idempotent,
//! so the records of a batch that were already applied are safe to replay.

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use sqlx::SqlitePool;

use super::concurrency::{BatchLimiter, LimiterStats};
use super::models::{InterestMessage, QueueRecord};
use super::source::MessageSource;
use crate::config::ConsumerConfig;
use crate::services::interest::{self, InterestOutcome};

/// Outcome counts for one successfully handled batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub records: usize,
    pub malformed: usize,
    pub server_updates: usize,
    pub user_updates: usize,
    pub inserted: usize,
    pub rejected: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: &InterestOutcome) {
        match outcome {
            InterestOutcome::UpdatedServerMatch => self.server_updates += 1,
            InterestOutcome::UpdatedUserMatch => self.user_updates += 1,
            InterestOutcome::Inserted => self.inserted += 1,
            InterestOutcome::Rejected(_) => self.rejected += 1,
        }
    }
}

/// Apply every record of one batch, in order.
///
/// Returns the first handling error with the offending message id attached.
pub async fn process_batch(pool: &SqlitePool, records: &[QueueRecord]) -> Result<BatchReport> {
    let mut report = BatchReport {
        records: records.len(),
        ..BatchReport::default()
    };

    for record in records {
        let message: InterestMessage = match serde_json::from_str(&record.body) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Skipping malformed message {}: {}", record.message_id, e);
                report.malformed += 1;
                continue;
            }
        };

        let event = message
            .to_event()
            .with_context(|| format!("Message {}", record.message_id))?;
        let outcome = interest::apply_interest(pool, &event)
            .await
            .with_context(|| format!("Failed to apply message {}", record.message_id))?;
        report.record(&outcome);
    }

    Ok(report)
}

/// A batch given up on after exhausting its redeliveries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedBatch {
    pub first_message_id: String,
    pub records: usize,
    pub error: String,
}

/// Totals over a whole consumer run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerSummary {
    pub batches: usize,
    pub redeliveries: u32,
    pub totals: BatchReport,
    pub failed: Vec<FailedBatch>,
    /// Limiter counters at the end of the run
    pub limiter: LimiterStats,
}

impl ConsumerSummary {
    fn absorb(&mut self, delivery: Delivery) {
        self.batches += 1;
        self.redeliveries += delivery.redeliveries;
        match delivery.result {
            Ok(report) => {
                self.totals.records += report.records;
                self.totals.malformed += report.malformed;
                self.totals.server_updates += report.server_updates;
                self.totals.user_updates += report.user_updates;
                self.totals.inserted += report.inserted;
                self.totals.rejected += report.rejected;
            }
            Err(failed) => self.failed.push(failed),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Delivery {
    redeliveries: u32,
    result: std::result::Result<BatchReport, FailedBatch>,
}

/// Hand a batch to the handler, redelivering it on failure
async fn deliver(pool: &SqlitePool, batch: &[QueueRecord], max_redeliveries: u32) -> Delivery {
    let first_message_id = batch
        .first()
        .map(|r| r.message_id.clone())
        .unwrap_or_default();
    let mut redeliveries = 0;

    loop {
        match process_batch(pool, batch).await {
            Ok(report) => {
                log::debug!(
                    "Batch {} done: {} records, {} malformed",
                    first_message_id,
                    report.records,
                    report.malformed
                );
                return Delivery {
                    redeliveries,
                    result: Ok(report),
                };
            }
            Err(e) if redeliveries < max_redeliveries => {
                redeliveries += 1;
                log::warn!(
                    "Batch {} failed, redelivering ({}/{}): {:#}",
                    first_message_id,
                    redeliveries,
                    max_redeliveries,
                    e
                );
            }
            Err(e) => {
                log::error!("Batch {} failed, giving up: {:#}", first_message_id, e);
                return Delivery {
                    redeliveries,
                    result: Err(FailedBatch {
                        first_message_id,
                        records: batch.len(),
                        error: format!("{:#}", e),
                    }),
                };
            }
        }
    }
}

/// Runs batches from a source against the ledger
pub struct InterestConsumer {
    pool: SqlitePool,
    limiter: BatchLimiter,
    batch_size: usize,
    max_redeliveries: u32,
}

impl InterestConsumer {
    pub fn new(pool: SqlitePool, config: &ConsumerConfig) -> Self {
        Self {
            pool,
            limiter: BatchLimiter::new(config),
            batch_size: config.batch_size.max(1),
            max_redeliveries: config.max_redeliveries,
        }
    }

    /// Drain `source`. Batches run concurrently up to the limiter's capacity.
    ///
    /// A source read error stops the run after in-flight batches finish.
    pub async fn run(&self, source: &mut dyn MessageSource) -> Result<ConsumerSummary> {
        let mut in_flight = FuturesUnordered::new();
        let mut summary = ConsumerSummary::default();

        let read_result = loop {
            let batch = match source.next_batch(self.batch_size).await {
                Ok(Some(batch)) => batch,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };

            let permit = self.limiter.acquire().await?;
            let pool = self.pool.clone();
            let max_redeliveries = self.max_redeliveries;
            in_flight.push(tokio::spawn(async move {
                let _permit = permit;
                deliver(&pool, &batch, max_redeliveries).await
            }));
        };

        while let Some(joined) = in_flight.next().await {
            summary.absorb(joined.context("Batch task panicked")?);
        }
        read_result.context("Failed to read from message source")?;
        summary.limiter = self.limiter.stats();

        log::info!(
            "Consumed {} records in {} batches ({} malformed, {} rejected, {} failed batches)",
            summary.totals.records,
            summary.batches,
            summary.totals.malformed,
            summary.totals.rejected,
            summary.failed.len()
        );
        Ok(summary)
    }
}
