//! `gudang` server binary.

use anyhow::Context;
use clap::Parser;
use gudang::http::{serve, AppState};
use gudang::{AppConfig, DbPool};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "gudang")]
#[command(about = "Warehouse and stock inventory REST service")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML); `GUDANG__*` environment variables override it
    #[arg(long, default_value = gudang::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Listen address, overriding the configuration
    #[arg(long)]
    listen: Option<String>,

    /// Verbose output, including the `db.*` tracing spans
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config = AppConfig::load(Some(&cli.config)).context("invalid configuration")?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }

    let pool = DbPool::connect(&config.database).context("could not open the connection pool")?;
    log::info!("database connection pool established ({} connections)", pool.size());

    let state = Arc::new(AppState::new(pool, &config));
    serve(state, &config.server.listen)
        .with_context(|| format!("http server on {} failed", config.server.listen))
}
