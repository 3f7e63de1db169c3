//! Libris - library catalog and lending service

use anyhow::Result;
use axum::ServiceExt;
use axum::extract::Request;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::Config;
use libris_api::{AppState, create_router, normalize_paths};
use libris_auth::{Authenticator, TokenManager, hash_password};
use libris_core::LibraryService;
use libris_db::{Database, NewUser};
use libris_storage::LocalStorage;

/// Libris - library catalog and lending service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "LIBRIS_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "LIBRIS_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting Libris v{}", env!("CARGO_PKG_VERSION"));

    if config.uses_default_secret() {
        warn!("Using the default JWT secret; set auth.jwt_secret before exposing this server");
    }

    // Initialize database
    if let Some(parent) = Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db = Database::new(&format!("sqlite:{}", config.database.path)).await?;

    bootstrap_admin(&db, &config).await?;

    // Initialize cover storage and services
    let covers = Arc::new(LocalStorage::new(&config.storage.covers_path).await?);
    let library = Arc::new(LibraryService::new(db.clone(), covers));
    let tokens = TokenManager::new(
        &config.auth.jwt_secret,
        chrono::Duration::minutes(config.auth.token_ttl_minutes),
    );
    let auth = Authenticator::new(db.clone(), tokens);

    let state = AppState::new(db, library, auth, config.storage.max_upload_bytes);

    let metrics_handle = if config.metrics.enabled {
        Some(Arc::new(PrometheusBuilder::new().install_recorder()?))
    } else {
        None
    };

    let router = create_router(state, metrics_handle).layer(TraceLayer::new_for_http());
    let app = normalize_paths(router);

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Create the configured admin account if the user table is empty
async fn bootstrap_admin(db: &Database, config: &Config) -> Result<()> {
    if db.has_users().await? {
        return Ok(());
    }

    info!("Creating default admin user");
    let password_hash = hash_password(&config.auth.admin_password)?;
    db.insert_user(NewUser {
        name: config.auth.admin_name.clone(),
        email: config.auth.admin_email.clone(),
        password_hash,
        is_admin: true,
    })
    .await?;
    info!("Default admin user created (username: {})", config.auth.admin_name);

    if config.auth.admin_password == "admin" {
        warn!("The admin account uses the default password; change it after first login");
    }
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        "json" => registry.with(fmt::layer().json()).init(),
        _ => registry.with(fmt::layer()).init(),
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
