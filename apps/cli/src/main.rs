//! wikisearch CLI — indexes wiki topics into a local search document store.
//!
//! Reads topics and their latest revision, renders the wiki markup to plain
//! text and submits one document per topic.

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
