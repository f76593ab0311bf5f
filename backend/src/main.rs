//! Dashboards Backend
//!
//! Account management and the authorization gate for the dashboards
//! platform.
//!
//! ## Architecture
//!
//! The backend follows a layered architecture:
//! - Routes: HTTP request handling and the authorization gate
//! - Services: Business logic
//! - Repositories: Data access (PostgreSQL, Redis, or in-memory)

use anyhow::{Context, Result};
use dashboard_backend::{
    config::AppConfig,
    db, mailer,
    repositories::{MemoryStore, PgStore, RedisResetTokenStore, Stores},
    routes,
    state::AppState,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = AppConfig::load()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        env = if AppConfig::is_production() { "production" } else { "development" },
        "Starting Dashboards Backend"
    );

    if AppConfig::is_production() {
        validate_production_config(&config)?;
    }

    let stores = connect_stores(&config).await?;
    let mailer = mailer::from_config(&config.mail);
    let state = AppState::new(config.clone(), stores, mailer)?;

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let app = routes::create_router(state).merge(routes::metrics_router(metrics));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!(address = %addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Open the account store and the reset-token store
///
/// A `memory:` database URL keeps everything in process, which is only
/// allowed outside production.
async fn connect_stores(config: &AppConfig) -> Result<Stores> {
    if config.database.is_memory() {
        warn!("Using the in-memory store; all data is lost on restart");
        return Ok(Stores::memory(MemoryStore::new(config.auth.reset_token_ttl())));
    }

    info!("Connecting to database...");
    let pool = db::create_pool(&config.database).await?;
    db::health_check(&pool).await?;

    // Migrations run from a separate job in production
    if !AppConfig::is_production() {
        info!("Running database migrations...");
        db::run_migrations(&pool).await?;
    }

    info!("Connecting to Redis...");
    let client = redis::Client::open(config.redis.url.as_str()).context("Invalid Redis URL")?;
    let conn = ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;
    info!("Redis connection established");

    let reset_tokens = RedisResetTokenStore::new(
        conn,
        config.auth.reset_token_ttl(),
        Duration::from_millis(config.redis.command_timeout_ms),
    );

    Ok(Stores::persistent(PgStore::new(pool), reset_tokens))
}

/// Initialize tracing/logging
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if AppConfig::is_production() {
            "dashboard_backend=info,tower_http=info".into()
        } else {
            "dashboard_backend=debug,tower_http=debug,sqlx=warn".into()
        }
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if AppConfig::is_production() {
        // JSON logging for production (better for log aggregation)
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Refuse to start in production with development settings
fn validate_production_config(config: &AppConfig) -> Result<()> {
    let errors = config.production_errors();

    if config.mail.sendgrid_api_key.is_none() {
        warn!("No SendGrid API key configured; reset e-mails will only be logged");
    }

    if !errors.is_empty() {
        for err in &errors {
            error!("Configuration error: {}", err);
        }
        anyhow::bail!("Invalid production configuration");
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
