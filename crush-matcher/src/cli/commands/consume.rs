//! Queue consumer command

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use std::path::PathBuf;
use tokio::io::BufReader;

use crate::config::Settings;
use crate::queue::{InterestConsumer, JsonLinesSource, MessageSource};
use crate::repository;

#[derive(Args, Debug)]
pub struct ConsumeArgs {
    /// JSON-lines queue file, one message per line ("-" or absent for stdin)
    #[arg(long, short, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Records per batch (overrides consumer.batch_size)
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,
}

pub async fn handle_consume_command(args: ConsumeArgs, mut settings: Settings) -> Result<()> {
    if let Some(size) = args.batch_size {
        settings.consumer.batch_size = size;
    }
    settings.validate()?;

    let mut source: Box<dyn MessageSource> = match &args.input {
        Some(path) if path.as_os_str() != "-" => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open queue file: {}", path.display()))?;
            Box::new(JsonLinesSource::new(BufReader::new(file)))
        }
        _ => Box::new(JsonLinesSource::new(BufReader::new(tokio::io::stdin()))),
    };

    let pool = repository::connect(&settings.database).await?;
    let consumer = InterestConsumer::new(pool, &settings.consumer);
    let summary = consumer.run(source.as_mut()).await?;

    println!(
        "{} records in {} batches: {} server updates, {} user updates, {} inserted, \
         {} rejected, {} malformed",
        summary.totals.records,
        summary.batches,
        summary.totals.server_updates,
        summary.totals.user_updates,
        summary.totals.inserted,
        summary.totals.rejected,
        summary.totals.malformed
    );

    println!(
        "{}",
        format!(
            "limiter: {} batches started, {} waited for a slot (max {} in flight)",
            summary.limiter.batches_started,
            summary.limiter.batches_waited,
            summary.limiter.max_concurrent
        )
        .dimmed()
    );

    if !summary.is_clean() {
        for failed in &summary.failed {
            eprintln!(
                "{} batch starting at {} ({} records): {}",
                "failed:".bright_red(),
                failed.first_message_id,
                failed.records,
                failed.error
            );
        }
        anyhow::bail!("{} batch(es) could not be applied", summary.failed.len());
    }
    Ok(())
}
