#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Collector server
//!
//! Wires the reconciliation pipeline to its collaborators: Postgres pool,
//! Redis queue consumer, and the HTTP health surface. Everything shared is
//! constructed once here and passed down explicitly.

mod config;
mod consumer;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;

use collector_core::{create_pool, run_migrations, Dispatcher, PgEntityStore};

use crate::config::Config;
use crate::consumer::QueueConsumer;
use crate::routes::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting collector server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(service_name = %config.service_name, "Configuration loaded");

    // Database pool: built once, handed to every component explicitly
    let pool = create_pool(&config.database_url).await?;
    info!("Database pool created");

    run_migrations(&pool).await?;
    info!("Database migrations applied");

    let redis = consumer::connect(&config.queue_url).await?;

    let store = PgEntityStore::new(pool.clone());
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(store.clone())));

    // Message consumption runs beside the HTTP surface; a consumer crash
    // takes the process down rather than serving healthy while deaf
    let queue_consumer = QueueConsumer::new(redis.clone(), dispatcher, &config);
    let consumer_handle = tokio::spawn(queue_consumer.run());

    let state = AppState {
        pool,
        redis,
        store,
    };
    let app = create_router(state, config.enable_debug_endpoints)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_address.parse()?;
    info!("Starting health server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        result = consumer_handle => {
            result??;
        }
    }

    Ok(())
}
