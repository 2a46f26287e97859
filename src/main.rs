mod api;
mod auth;
mod cli;
mod config;
mod downloader;
mod error;
mod fetcher;
mod output;
mod pull;
mod report;
mod resolver;
mod stages;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose() { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    output::print_banner();

    info!("Starting artifact-pull");
    cli.execute().await?;

    Ok(())
}
