//! Weekly batch command

use anyhow::Result;
use clap::Args;
use colored::*;

use crate::config::Settings;
use crate::repository;
use crate::services::generator;
use crate::week;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Any day of the target week, YYYY-MM-DD (defaults to this week)
    #[arg(long, value_name = "DATE")]
    pub week: Option<String>,

    /// Compute and print the pairs without writing them
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn handle_generate_command(args: GenerateArgs, settings: &Settings) -> Result<()> {
    let week = match &args.week {
        Some(date) => week::parse_week(date)?,
        None => week::current_week(),
    };
    let context = settings.matching.to_context()?;
    let pool = repository::connect(&settings.database).await?;

    let report = generator::generate_weekly_matches(&pool, &context, week, args.dry_run).await?;

    println!(
        "Week {}: {} participants, {} skipped, {} feasible pairs, {} matched",
        week.to_string().bright_cyan(),
        report.participants,
        report.skipped.len(),
        report.candidate_pairs,
        report.pairs.len().to_string().bright_green()
    );
    for skipped in &report.skipped {
        println!("  {} {} ({})", "skipped".yellow(), skipped.email, skipped.reason);
    }
    if report.blocking_pairs > 0 {
        println!(
            "  {} {} blocking pair(s) remain",
            "warning:".yellow(),
            report.blocking_pairs
        );
    }

    if args.dry_run {
        for pair in &report.pairs {
            println!("  {} <-> {}", pair.user1, pair.user2);
        }
        println!("{}", "Dry run, nothing written".dimmed());
    } else {
        println!("{} Wrote {} matches", "✓".bright_green(), report.written);
        if report.promoted > 0 {
            println!(
                "  {} already existed as user-initiated matches and were promoted",
                report.promoted
            );
        }
    }
    Ok(())
}
