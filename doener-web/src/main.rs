//! doener-web: döner review service
//!
//! Resolves the root folder, opens (or creates) the database and serves
//! the JSON API.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use doener_common::config::{prepare_root_folder, resolve_root_folder, TomlConfig};
use doener_common::db::{init_database, settings::load_or_create_signing_secret};
use doener_common::FileUrlResolver;
use tracing::info;
use tracing_subscriber::EnvFilter;

use doener_web::{build_router, AppState};

const DEFAULT_BIND: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5780;

#[derive(Parser, Debug)]
#[command(name = "doener-web", version, about = "Döner review service")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "DOENER_PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(long, env = "DOENER_BIND")]
    bind: Option<String>,

    /// Root folder holding doener.db (overrides DOENER_ROOT_FOLDER)
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Config file (defaults to <config dir>/doener/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default(args.config.as_deref());

    // RUST_LOG wins over the config file's log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_deref().unwrap_or("info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Build identification immediately after tracing init
    info!(
        "Starting döner review service (doener-web) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = prepare_root_folder(&root_folder)
        .with_context(|| format!("Cannot prepare root folder {}", root_folder.display()))?;
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Cannot open database {}", db_path.display()))?;
    info!("✓ Database ready");

    let secret = load_or_create_signing_secret(&pool)
        .await
        .context("Cannot load file signing secret")?;
    match &config.files.base_url {
        Some(base_url) => info!("Serving signed image URLs from {}", base_url),
        None => info!("No storage base URL configured, image URLs use /api/files/"),
    }
    let files = FileUrlResolver::new(
        pool.clone(),
        config.files.base_url.clone(),
        secret,
        config.files.signed_url_ttl_secs,
    );

    let app = build_router(AppState::new(pool, files));

    let bind = args
        .bind
        .or(config.bind_address)
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    let port = args.port.or(config.port).unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind {}", addr))?;
    info!("doener-web listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
