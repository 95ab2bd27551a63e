//! civicmap CLI: turn civic announcements into map-ready GeoJSON.
//!
//! Extracts the locations mentioned in an announcement, geocodes them,
//! and stores the message with its feature collection.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
