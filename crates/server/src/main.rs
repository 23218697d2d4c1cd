#![forbid(unsafe_code)]

//! `kataster` serves the cadastral archive and its genealogy over a small
//! JSON HTTP API, and imports the editors' fixture files into the store.

mod api;
mod config;
mod http;
mod time;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{DEFAULT_LOG_FILTER, Overrides, ServerConfig};
use kataster_core::fixtures::FixtureSet;
use kataster_storage::SqliteStore;
use std::net::TcpListener;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kataster")]
#[command(author, version, about = "Cadastral protocols, parcels and genealogy archive")]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path.
    #[arg(long, global = true, env = "KATASTER_DB")]
    db: Option<PathBuf>,

    /// Tracing filter directive, e.g. `info,kataster_storage=debug`.
    #[arg(long, global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve {
        #[arg(long, env = "KATASTER_HOST")]
        host: Option<String>,

        #[arg(short, long, env = "KATASTER_PORT")]
        port: Option<u16>,

        /// SHA-256 (hex) of the bearer token admin routes require.
        #[arg(long, env = "KATASTER_ADMIN_TOKEN_SHA256")]
        admin_token_sha256: Option<String>,
    },
    /// Replace the store contents with the fixture files of a directory.
    Migrate {
        #[arg(long)]
        fixtures: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut overrides = Overrides {
        db_path: cli.db,
        log_filter: cli.log_filter,
        ..Overrides::default()
    };
    if let Commands::Serve {
        host,
        port,
        admin_token_sha256,
    } = &cli.command
    {
        overrides.host = host.clone();
        overrides.port = *port;
        overrides.admin_token_sha256 = admin_token_sha256.clone();
    }
    let config = ServerConfig::load(cli.config.as_deref(), overrides)?;
    init_tracing(config.log_filter.as_deref());

    match cli.command {
        Commands::Serve { .. } => serve(&config),
        Commands::Migrate { fixtures } => migrate(&config, &fixtures),
    }
}

fn init_tracing(explicit: Option<&str>) {
    let env_filter = match explicit {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn serve(config: &ServerConfig) -> Result<()> {
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("open store {}", config.db_path.display()))?;
    let listener = TcpListener::bind(config.bind_addr())
        .with_context(|| format!("bind {}:{}", config.host, config.port))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        admin_auth = config.admin_token_sha256.is_some(),
        "listening"
    );
    let mut state = api::AppState {
        store,
        admin_token_sha256: config.admin_token_sha256.clone(),
    };
    api::run(listener, &mut state)?;
    Ok(())
}

fn migrate(config: &ServerConfig, fixtures_dir: &std::path::Path) -> Result<()> {
    let fixtures = FixtureSet::load_dir(fixtures_dir)
        .with_context(|| format!("load fixtures from {}", fixtures_dir.display()))?;
    let mut store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("open store {}", config.db_path.display()))?;
    let report = store.import_fixtures(&fixtures).context("import fixtures")?;
    tracing::info!(
        protocols = report.protocols,
        parcels = report.parcels,
        plot_links = report.plot_links,
        demography = report.demography,
        persons = report.persons,
        marriages = report.marriages,
        "migration finished"
    );
    Ok(())
}
