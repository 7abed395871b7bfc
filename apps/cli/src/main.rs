//! BrandLens CLI: brand visibility in generative-AI answers.
//!
//! Runs prompts repeatedly against a model, logs every run to a JSON-lines
//! file, and reports how often each tracked brand is mentioned.

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
