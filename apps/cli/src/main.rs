//! ethicsgen CLI: sample CommonCrawl text and turn it into ethical-reasoning
//! training data with a local Ollama model.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
