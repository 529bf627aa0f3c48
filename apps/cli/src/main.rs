//! contentimport CLI: bulk blog content import.
//!
//! Loads a JSON array of blog posts from a file or URL, previews it, and
//! submits it in chunks to the site's import endpoint or a local database.

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
