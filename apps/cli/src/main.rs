//! versefetch CLI: resumable, checkpointed retrieval of verse text.
//!
//! Walks a fixed `(partition, item)` keyspace, fetches and normalizes one
//! record per key, and persists progress so an interrupted run picks up
//! where it stopped.

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
