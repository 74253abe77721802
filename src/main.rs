//! Waybill shipment tracking service.
//!
//! Main entry point for the Waybill server. Loads configuration, prepares
//! the order store and starts the webhook receiver.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use waybill_api::{AppState, Config};
use waybill_core::{Ingestor, PostgresOrderStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.rust_log);

    info!("Starting Waybill tracking service");

    let server_addr = config.parse_server_addr()?;
    info!(
        database_url = %config.database_url_masked(),
        server_addr = %server_addr,
        max_connections = config.database_max_connections,
        always_acknowledge = config.always_acknowledge,
        carriers = config.carriers.len(),
        "Configuration loaded"
    );

    let db_pool = create_database_pool(&config).await?;
    info!("Database connection pool established");

    let store = PostgresOrderStore::new(db_pool.clone());
    store.ensure_schema().await.context("Failed to create order tables")?;
    info!("Database migrations completed");

    let ingestor = Ingestor::new(
        Arc::new(store),
        config.carrier_resolver(),
        config.diagnostic_sink()?,
        config.ingest_policy(),
    );
    let state = AppState::new(ingestor).with_limits(config.server_limits());

    info!(addr = %server_addr, "Waybill is ready to receive tracking updates");

    // Returns once the shutdown signal has been handled and in-flight
    // requests have drained.
    if let Err(e) = waybill_api::start_server(state, server_addr).await {
        error!(error = %e, "Server failed");
    }

    db_pool.close().await;
    info!("Database connections closed");

    info!("Waybill shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
///
/// `RUST_LOG` wins over the configured level; an unparsable filter falls back
/// to the default.
fn init_tracing(configured: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("info,waybill=debug,tower_http=debug"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(_e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    "Database connection failed, retrying..."
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}
