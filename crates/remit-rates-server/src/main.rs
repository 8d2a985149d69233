//! remit-rates entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use remit_rates::store::DEFAULT_HISTORY_LIMIT;
use remit_rates::{Orchestrator, ProviderSettings, RateStore, ScraperConfig};
use remit_rates_server::{resolve_addr, resolve_db_path, resolve_shutdown_grace, AppState, RateLimit};

#[derive(Parser)]
#[command(
    name = "remit-rates",
    about = "Scrape, store and serve remittance exchange rates",
    version
)]
struct Cli {
    /// Path to a JSON scraper configuration file.
    /// Also reads from REMIT_RATES_CONFIG.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API (default).
    Serve {
        /// Listen address (host:port). Defaults to 0.0.0.0:$PORT or 0.0.0.0:3000.
        #[arg(long)]
        addr: Option<String>,

        /// SQLite database file. Also reads from REMIT_RATES_DB.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Seconds to wait for in-flight requests on shutdown.
        /// Also reads from REMIT_RATES_SHUTDOWN_GRACE. Defaults to 5.
        #[arg(long)]
        shutdown_grace: Option<u64>,
    },

    /// Scrape every provider once and print the result as JSON.
    Scrape {
        /// Save the scraped quotes to the database.
        #[arg(long)]
        save: bool,

        /// SQLite database file. Also reads from REMIT_RATES_DB.
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Print the latest stored batch of rates.
    Latest {
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Print stored rates for one provider, newest first.
    History {
        /// Provider service name, e.g. TapTapSend.
        service: String,

        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,

        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// List the configured providers.
    Providers,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   remit-rates completions bash > ~/.local/share/bash-completion/completions/remit-rates
    ///   remit-rates completions zsh > ~/.zfunc/_remit-rates
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let command = cli.command.unwrap_or(Commands::Serve {
        addr: None,
        db: None,
        shutdown_grace: None,
    });

    let config_path = cli.config;
    let load_config = || ScraperConfig::resolve(config_path.as_deref());

    match command {
        Commands::Serve {
            addr,
            db,
            shutdown_grace,
        } => {
            let orchestrator = Orchestrator::from_config(&load_config()?)?;
            let store = open_store(db.as_deref())?;
            let rate_limit = RateLimit::from_env();
            tracing::debug!(?rate_limit, "request rate limit");
            let state = Arc::new(AppState::new(orchestrator, store).with_rate_limit(rate_limit));
            let addr = resolve_addr(addr.as_deref());
            let grace = resolve_shutdown_grace(shutdown_grace);
            remit_rates_server::serve(&addr, state, grace).await?;
        }

        Commands::Scrape { save, db } => {
            let orchestrator = Orchestrator::from_config(&load_config()?)?;
            let report = orchestrator.scrape_report().await?;
            if save {
                let store = open_store(db.as_deref())?;
                let saved = store.save_rates(&report.quotes)?;
                tracing::info!(saved, "quotes saved");
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Latest { db } => {
            let store = open_store(db.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&store.latest_rates()?)?);
        }

        Commands::History { service, limit, db } => {
            let store = open_store(db.as_deref())?;
            let rows = store.rates_history(&service, limit)?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }

        Commands::Providers => {
            let config = load_config()?;
            for provider in &config.providers {
                let target = provider.target();
                let kind = match provider {
                    ProviderSettings::TapTapSend(_) => "taptapsend",
                    ProviderSettings::TransfertChapChap(_) => "transfertchapchap",
                };
                println!(
                    "{:<20} {:<18} {:<8} [{}, {}]  {}",
                    target.service,
                    kind,
                    target.pair.to_string(),
                    target.band.min,
                    target.band.max,
                    target.url
                );
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "remit-rates", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn open_store(db: Option<&std::path::Path>) -> anyhow::Result<RateStore> {
    let path = resolve_db_path(db);
    tracing::debug!(path = %path.display(), "opening rate store");
    Ok(RateStore::open(&path)?)
}
