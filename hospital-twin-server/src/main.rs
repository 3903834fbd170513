//! hospital-twin-server — standalone HTTP/WebSocket server for the hospital
//! unit digital twin.
//!
//! Reads config from env vars:
//!   DATABASE_URL            — Postgres connection string (optional; falls
//!                              back to an in-memory store when unset or
//!                              when built without the `postgres` feature)
//!   CORS_ORIGINS             — comma-separated allowed origins (default: any)
//!   MAX_SIMULATION_SECONDS   — wall-clock bound per run (default: 300)
//!   DEFAULT_SEED             — fallback PRNG seed (default: 42)
//!   BIND_ADDR                — listen address (default: 0.0.0.0:8080)

use std::sync::Arc;

use hospital_twin_core::config::Config;
use hospital_twin_core::store::SimulationStore;
use hospital_twin_core::store_memory::MemoryStore;
use hospital_twin_server::router::build_router;
use hospital_twin_server::state::AppState;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hospital_twin_server=debug".into()),
        )
        .init();

    let config = Config::from_env();
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());

    let store: Arc<dyn SimulationStore> = build_store(&config).await;

    let state = AppState::new(store, config);
    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {bind_addr}: {e}"));
    tracing::info!("hospital-twin-server listening on {bind_addr}");

    axum::serve(listener, app).await.expect("server error");
}

#[cfg(feature = "postgres")]
async fn build_store(config: &Config) -> Arc<dyn SimulationStore> {
    use hospital_twin_core::store_postgres::PostgresSimulationStore;
    use sqlx::postgres::PgPoolOptions;

    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to database");
            let store = PostgresSimulationStore::new(pool);
            store.migrate().await.expect("failed to run migrations");
            tracing::info!("using Postgres event store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, falling back to in-memory event store");
            Arc::new(MemoryStore::new())
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn build_store(_config: &Config) -> Arc<dyn SimulationStore> {
    tracing::info!("using in-memory event store (built without the postgres feature)");
    Arc::new(MemoryStore::new())
}
