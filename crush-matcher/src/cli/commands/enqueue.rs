//! Producer side: turns one decision into a queue line on stdout

use anyhow::{Context, Result};
use clap::Args;

use crate::queue::MatchDecision;
use crate::week;

#[derive(Args, Debug)]
pub struct EnqueueArgs {
    /// User making the decision
    #[arg(long)]
    pub source: String,

    /// User the decision is about
    #[arg(long)]
    pub target: String,

    /// Any day of the match week, YYYY-MM-DD
    #[arg(long, value_name = "DATE")]
    pub week: String,

    /// The source is interested
    #[arg(long)]
    pub interested: bool,
}

impl EnqueueArgs {
    fn to_decision(&self) -> MatchDecision {
        MatchDecision {
            source_email: self.source.trim().to_string(),
            target_email: self.target.trim().to_string(),
            source_interested: self.interested,
            target_interested: false,
            week: self.week.trim().to_string(),
        }
    }
}

pub fn handle_enqueue_command(args: EnqueueArgs) -> Result<()> {
    // Catch a bad date here rather than failing a whole batch downstream
    week::parse_week(&args.week)?;

    let message = args.to_decision().to_message();
    let line = serde_json::to_string(&message).context("Failed to serialize message")?;
    println!("{}", line);
    Ok(())
}
