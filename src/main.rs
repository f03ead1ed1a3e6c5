//! news-curator: selection, history commit, roster maintenance and the HTTP API.
//!
//! Store locations come from `CURATOR_*_PATH` (see `store::Paths`), overridable
//! per invocation with `--sources`, `--health` and `--history`.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_curator::api::{create_router, AppState};
use news_curator::backoff::Pacer;
use news_curator::config::oracle::OracleConfig;
use news_curator::health::HealthStore;
use news_curator::history::HistoryStore;
use news_curator::ingest::transport::{HttpTransport, Transport};
use news_curator::maintain::{self, MaintenanceOptions, Pacing};
use news_curator::metrics::Metrics;
use news_curator::oracle::build_oracle;
use news_curator::pipeline;
use news_curator::registry::SourceRegistry;
use news_curator::store::Paths;

#[derive(Parser)]
#[command(name = "news-curator", version, about = "Curated news selection and feed roster upkeep")]
struct Cli {
    /// Source registry TOML
    #[arg(long, global = true)]
    sources: Option<PathBuf>,
    /// Feed health JSON
    #[arg(long, global = true)]
    health: Option<PathBuf>,
    /// Seen-url history file
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, score and print the selection as JSON. History is not modified.
    Select,
    /// Record urls as used. Reads one url per line from stdin when none are given.
    Commit { urls: Vec<String> },
    /// Health-check the roster, evict, repair and discover.
    Maintain {
        /// Simulate only; no files are written.
        #[arg(long)]
        dry_run: bool,
        /// Add live discovered feeds to the roster.
        #[arg(long)]
        auto_add: bool,
        /// Health checks only; no oracle queries.
        #[arg(long)]
        skip_grounding: bool,
        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Serve the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

/// Logs go to stderr so stdout stays machine-readable.
/// `CURATOR_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("news_curator=info,warn"));
    let json = std::env::var("CURATOR_LOG_JSON").is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn resolve_paths(cli: &Cli) -> Paths {
    let mut paths = Paths::from_env();
    if let Some(p) = &cli.sources {
        paths.sources = p.clone();
    }
    if let Some(p) = &cli.health {
        paths.health = p.clone();
    }
    if let Some(p) = &cli.history {
        paths.history = p.clone();
    }
    paths
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value).context("writing json to stdout")?;
    writeln!(out)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let paths = resolve_paths(&cli);

    match cli.command {
        Command::Select => {
            let registry = SourceRegistry::load(&paths.sources)?;
            let history = HistoryStore::load(&paths.history)?;
            let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
            let articles =
                pipeline::select_articles(&registry, &history, transport, &mut Pacer::none(), Utc::now())
                    .await;
            print_json(&articles)?;
        }
        Command::Commit { urls } => {
            let urls = if urls.is_empty() {
                std::io::stdin()
                    .lock()
                    .lines()
                    .map(|l| l.map(|s| s.trim().to_string()))
                    .filter(|l| l.as_ref().map_or(true, |s| !s.is_empty()))
                    .collect::<std::io::Result<Vec<_>>>()
                    .context("reading urls from stdin")?
            } else {
                urls
            };
            let mut history = HistoryStore::load(&paths.history)?;
            let added = pipeline::commit_seen(&mut history, urls)?;
            tracing::info!(added, total = history.len(), "history updated");
        }
        Command::Maintain {
            dry_run,
            auto_add,
            skip_grounding,
            json,
        } => {
            let mut registry = SourceRegistry::load(&paths.sources)?;
            let mut health = HealthStore::load(&paths.health)?;
            let transport = HttpTransport::new()?;
            let oracle = build_oracle(&OracleConfig::load_default()?);
            let mut pacing = Pacing::from_limits(registry.maintenance());
            let options = MaintenanceOptions {
                dry_run,
                auto_add,
                skip_grounding,
            };

            let report = maintain::run_maintenance(
                &mut registry,
                &mut health,
                &transport,
                oracle,
                options,
                &mut pacing,
                Utc::now(),
            )
            .await;
            maintain::commit(&registry, &health, dry_run)?;

            if json {
                print_json(&report)?;
            } else {
                println!("Summary: {}", report.summary());
            }
        }
        Command::Serve { addr } => {
            let registry = SourceRegistry::load(&paths.sources)?;
            let health = HealthStore::load(&paths.health)?;
            let history = HistoryStore::load(&paths.history)?;
            let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
            let metrics = Metrics::init()?;

            let state = AppState::new(registry, health, history, transport);
            let app = create_router(state, Some(&metrics));

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            tracing::info!(%addr, "listening");
            axum::serve(listener, app).await.context("http server")?;
        }
    }
    Ok(())
}
