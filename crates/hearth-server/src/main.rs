//! # Hearth Server
//!
//! Serves the Hearth permission API. Records come from PostgreSQL when
//! `database.url` is configured, otherwise from an in-memory store that can be
//! seeded from a JSON fixture.

use anyhow::Context;
use clap::{Parser, Subcommand};
use hearth_api::{AppState, build_router};
use hearth_common::config::AppConfig;
use hearth_db::{MemoryStore, PgStore, RecordStore, fixture::Fixture};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "hearth", version, about = "Permission resolution service for Hearth")]
struct Cli {
    /// Use the in-memory store even if a database URL is configured.
    #[arg(long, env = "HEARTH_MEMORY")]
    memory: bool,

    /// JSON fixture to load into the in-memory store.
    #[arg(long, value_name = "PATH")]
    seed: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,

    /// Print an access token for a user, signed with the configured secret.
    Token {
        user_id: Uuid,

        /// Lifetime in seconds (default: auth.access_token_ttl_secs).
        #[arg(long)]
        ttl: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = hearth_common::config::init()?;

    // Initialize tracing (structured logging)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth=debug,tower_http=debug".into()),
        )
        .with_target(true)
        .init();

    if config.auth.jwt_secret.is_empty() {
        anyhow::bail!("auth.jwt_secret is not set (HEARTH__AUTH__JWT_SECRET)");
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Token { user_id, ttl } => {
            let ttl = ttl.unwrap_or(config.auth.access_token_ttl_secs);
            let token = hearth_api::auth::generate_access_token(user_id, &config.auth.jwt_secret, ttl)?;
            println!("{token}");
            Ok(())
        }
        Command::Serve => serve(config, cli.memory, cli.seed).await,
    }
}

async fn open_store(
    config: &AppConfig,
    memory: bool,
    seed: Option<PathBuf>,
) -> anyhow::Result<Arc<dyn RecordStore>> {
    if let Some(path) = seed {
        let store = Fixture::load(&path)?.into_store().await;
        tracing::info!(fixture = %path.display(), "Using in-memory store");
        return Ok(Arc::new(store));
    }

    match (&config.database.url, memory) {
        (Some(url), false) => {
            let store = PgStore::connect(
                url,
                config.database.max_connections,
                config.database.min_connections,
            )
            .await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        _ => {
            tracing::warn!("No database configured; using an empty in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn serve(config: &AppConfig, memory: bool, seed: Option<PathBuf>) -> anyhow::Result<()> {
    tracing::info!("Starting Hearth v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(config, memory, seed).await?;
    let state = AppState::new(store, config.auth.jwt_secret.clone(), config.limits);
    let router = build_router(state);

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .with_context(|| format!("invalid server.host '{}'", config.server.host))?,
        config.server.port,
    );

    tracing::info!("REST API listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
