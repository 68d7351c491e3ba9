use anyhow::Result;
use colored::*;

use crate::config::Settings;
use crate::repository;

pub async fn handle_migrate_command(settings: &Settings) -> Result<()> {
    let pool = repository::connect(&settings.database).await?;
    repository::run_migrations(&pool).await?;
    println!(
        "{} Ledger schema is up to date ({})",
        "✓".bright_green(),
        settings.database.url.cyan()
    );
    Ok(())
}
