//! tcgwatch - Trading card market price tracker
//!
//! Fetches a card's market price with a headless browser and keeps a
//! capped price history in Azure blob storage.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tcgwatch::commands::{HistoryCommand, PriceCommand, ScrapeCommand};
use tcgwatch::config::{Backend, BrowserKind, Config, OutputFormat};
use tcgwatch::TrackerError;
use tracing::{error, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tcgwatch",
    version,
    about = "Track a trading card's market price",
    long_about = "Scrapes a card's market price from TCGplayer with a headless browser and appends \
                  timestamped snapshots to a capped JSON history in Azure blob storage.",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Card to scrape when no subcommand is given
    name: Option<String>,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Page backend (webdriver, http)
    #[arg(long, global = true)]
    backend: Option<Backend>,

    /// Browser for the WebDriver backend (chrome, firefox)
    #[arg(long, global = true)]
    browser: Option<BrowserKind>,

    /// WebDriver server URL
    #[arg(long, global = true, env = "TCGWATCH_WEBDRIVER_URL")]
    webdriver_url: Option<String>,

    /// Seconds to wait for the price element
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the market price and append it to the card's history (default)
    #[command(alias = "s")]
    Scrape {
        /// Card name
        name: Option<String>,
    },

    /// Fetch the market price without storing it
    #[command(alias = "p")]
    Price {
        /// Card name
        name: Option<String>,
    },

    /// Show the stored price history
    #[command(alias = "h")]
    History {
        /// Card name
        name: Option<String>,

        /// Only show the newest N entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Average the top market prices of a set and append the index
    #[cfg(feature = "pokemontcg")]
    Index {
        /// Set ID (e.g., sv2)
        set_id: Option<String>,

        /// Number of highest prices averaged
        #[arg(long)]
        top: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries results
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            if let Some(err) = e.downcast_ref::<TrackerError>() {
                error!("{} stage failed", err.stage());
            }
            Err(e)
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(browser) = cli.browser {
        config.browser = browser;
    }
    if let Some(url) = cli.webdriver_url {
        config.webdriver_url = url;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }

    let apply_name = |config: &mut Config, name: Option<String>| {
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            config.item_name = name;
        }
    };

    let output = match cli.command {
        None => {
            apply_name(&mut config, cli.name);
            ScrapeCommand::new(config).execute().await?
        }

        Some(Commands::Scrape { name }) => {
            apply_name(&mut config, name);
            ScrapeCommand::new(config).execute().await?
        }

        Some(Commands::Price { name }) => {
            apply_name(&mut config, name);
            PriceCommand::new(config).execute().await?
        }

        Some(Commands::History { name, limit }) => {
            apply_name(&mut config, name);
            HistoryCommand::new(config).execute(limit).await?
        }

        #[cfg(feature = "pokemontcg")]
        Some(Commands::Index { set_id, top }) => {
            use tcgwatch::commands::IndexCommand;

            if let Some(set_id) = set_id {
                config.index.set_id = set_id;
            }
            if let Some(top) = top {
                config.index.top_n = top;
            }
            IndexCommand::new(config).execute().await?
        }
    };

    Ok(output)
}
