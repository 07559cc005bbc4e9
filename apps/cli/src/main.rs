//! MoonScrape CLI — keyword research pipeline.
//!
//! Searches the web for a keyword, distills the result pages into
//! structured text, and refines an LLM summary over several epochs.

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
