//! `sonora-search` — the public HTTP search service.

use anyhow::Result;
use clap::Parser;
use sonora_common::config::SearchConfig;
use sonora_search::startup;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sonora-search")]
#[command(about = "Private music library audio-identification and search service")]
#[command(version)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP server port (overrides config file).
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    sonora_common::logging::init("sonora_search=info,tower_http=info");

    let args = Args::parse();
    let mut config = SearchConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.http_port = port;
    }

    let state = startup::build_state(&config).await?;
    startup::serve(&config, state).await?;

    Ok(())
}
