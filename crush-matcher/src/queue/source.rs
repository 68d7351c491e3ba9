//! Message sources feeding the consumer
//!
//! A source hands out batches of raw records until it is drained. Records are
//! delivered at least once; a failed batch may be handed out again.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use super::models::QueueRecord;

#[async_trait]
pub trait MessageSource: Send {
    /// Up to `max` records, or `None` once the source is drained
    async fn next_batch(&mut self, max: usize) -> Result<Option<Vec<QueueRecord>>>;
}

/// Newline-delimited JSON bodies, one message per line.
///
/// Message ids are the 1-based line numbers, so log lines point back into the
/// input. Blank lines are skipped.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> MessageSource for JsonLinesSource<R> {
    async fn next_batch(&mut self, max: usize) -> Result<Option<Vec<QueueRecord>>> {
        let mut batch = Vec::with_capacity(max);
        while batch.len() < max {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .with_context(|| format!("Failed to read input line {}", self.line_number + 1))?
            else {
                break;
            };
            self.line_number += 1;

            let body = line.trim();
            if body.is_empty() {
                continue;
            }
            batch.push(QueueRecord::new(format!("line-{}", self.line_number), body));
        }

        Ok(if batch.is_empty() { None } else { Some(batch) })
    }
}

/// Records held in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySource {
    records: std::collections::VecDeque<QueueRecord>,
}

#[cfg(test)]
impl MemorySource {
    pub fn new(records: impl IntoIterator<Item = QueueRecord>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
#[async_trait]
impl MessageSource for MemorySource {
    async fn next_batch(&mut self, max: usize) -> Result<Option<Vec<QueueRecord>>> {
        if self.records.is_empty() {
            return Ok(None);
        }
        let take = max.min(self.records.len());
        Ok(Some(self.records.drain(..take).collect()))
    }
}
