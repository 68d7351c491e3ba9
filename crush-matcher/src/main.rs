use anyhow::Result;
use clap::Parser;

use crush_matcher::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::debug!("Running {:?}", cli.command);
    cli.run().await
}
