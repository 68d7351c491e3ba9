//! Interest queue: wire messages, sources and the batch consumer

pub mod concurrency;
pub mod consumer;
pub mod models;
pub mod source;

pub use concurrency::{BatchLimiter, LimiterStats};
pub use consumer::{BatchReport, ConsumerSummary, FailedBatch, InterestConsumer, process_batch};
pub use models::{InterestMessage, MatchDecision, QueueRecord};
pub use source::{JsonLinesSource, MessageSource};
