//! Command-line interface

pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Settings;
use commands::{consume, enqueue, generate, matches, migrate};

#[derive(Parser, Debug)]
#[command(name = "crush-matcher")]
#[command(about = "Weekly crush matching and interest reconciliation", version)]
pub struct Cli {
    /// Settings file (defaults to <config_dir>/crush-matcher/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ledger database URL, overrides settings and DATABASE_URL
    #[arg(long, global = true, value_name = "URL")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply schema migrations to the ledger
    Migrate,
    /// Run the weekly matching batch
    Generate(generate::GenerateArgs),
    /// Drain a JSON-lines interest queue into the ledger
    Consume(consume::ConsumeArgs),
    /// Print every ledger row involving a user
    Matches(matches::MatchesArgs),
    /// Emit one interest message as a JSON line
    Enqueue(enqueue::EnqueueArgs),
}

impl Cli {
    /// Resolve settings: file, then environment, then command-line overrides
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(url) = &self.database_url {
            settings.database.url = url.clone();
        }
        Ok(settings)
    }

    pub async fn run(self) -> Result<()> {
        let settings = self.settings()?;
        match self.command {
            Commands::Migrate => migrate::handle_migrate_command(&settings).await,
            Commands::Generate(args) => generate::handle_generate_command(args, &settings).await,
            Commands::Consume(args) => consume::handle_consume_command(args, settings).await,
            Commands::Matches(args) => matches::handle_matches_command(args, &settings).await,
            Commands::Enqueue(args) => enqueue::handle_enqueue_command(args),
        }
    }
}
