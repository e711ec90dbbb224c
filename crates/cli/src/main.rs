//! shelf entry point.
//!
//! Searches the configured archive, lists the books found and opens the ones
//! the user picks. Logging goes to stderr so stdout stays clean for `--json`.

use std::io::IsTerminal;

use anyhow::{Context, Result};
use clap::Parser;
use shelf_client::{CommandOpener, DryRunOpener, Opener, SearchPipeline};
use shelf_core::{AppConfig, CacheStore};
use tracing_subscriber::EnvFilter;

mod cli;
mod display;

use cli::Args;
use display::StdinPrompt;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();
    let config = AppConfig::load().context("failed to load configuration")?;

    if args.clear_cache {
        let store = CacheStore::open(&config.cache_dir)?;
        let removed = store.clear()?;
        tracing::info!(removed, dir = %config.cache_dir.display(), "cleared cache");
        println!("Removed {removed} cache entries.");
        return Ok(());
    }

    if args.cache_stats {
        let stats = CacheStore::open(&config.cache_dir)?.stats()?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            print!("{}", display::render_stats(&stats));
        }
        return Ok(());
    }

    let query = args.query.as_deref().context("a search query is required")?;

    let opener: Box<dyn Opener> =
        if args.no_open { Box::new(DryRunOpener) } else { Box::new(CommandOpener::new(&config.browser_command)) };
    let interactive = !args.json && std::io::stdin().is_terminal();
    let prompted = args.selection.is_none() && !args.json;

    let pipeline = SearchPipeline::from_config(&config, opener, Box::new(StdinPrompt::new(interactive)))?
        .with_force_refresh(args.refresh);

    let selection = match (&args.selection, args.json) {
        (Some(selection), _) => Some(selection.as_str()),
        (None, true) => Some(""),
        (None, false) => None,
    };

    let outcome = pipeline.search(query, selection).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", display::render_outcome(&outcome, prompted));
    }

    Ok(())
}
