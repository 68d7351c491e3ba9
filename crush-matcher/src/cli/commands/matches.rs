use anyhow::{Context, Result};
use clap::Args;

use crate::config::Settings;
use crate::repository::{self, matches};
use crate::week;

#[derive(Args, Debug)]
#[command(group(
    clap::ArgGroup::new("filter")
        .required(true)
        .multiple(true)
        .args(["email", "week"])
))]
pub struct MatchesArgs {
    /// User whose ledger rows to print
    pub email: Option<String>,

    /// Only rows for the week containing this day, YYYY-MM-DD
    #[arg(long, value_name = "DATE")]
    pub week: Option<String>,
}

pub async fn handle_matches_command(args: MatchesArgs, settings: &Settings) -> Result<()> {
    let week = args.week.as_deref().map(week::parse_week).transpose()?;
    let pool = repository::connect(&settings.database).await?;

    let rows = match (args.email.as_deref().map(str::trim), week) {
        (Some(email), Some(week)) => matches::list_matches_for_user(&pool, email)
            .await?
            .into_iter()
            .filter(|row| row.week == week)
            .collect::<Vec<_>>(),
        (Some(email), None) => matches::list_matches_for_user(&pool, email).await?,
        (None, Some(week)) => matches::list_week(&pool, week).await?,
        (None, None) => anyhow::bail!("Pass an email, a --week, or both"),
    };

    let json = serde_json::to_string_pretty(&rows).context("Failed to serialize matches")?;
    println!("{}", json);
    Ok(())
}
