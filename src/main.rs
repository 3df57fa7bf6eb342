//! Airwatch - a personal air-quality monitoring service.
//!
//! Binds the HTTP API, starts location resolution (IP fallback only in the
//! service binary; there is no position watch to subscribe to), and serves
//! until stopped.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use airwatch::api::{AppState, router};
use airwatch::config::{Config, DEFAULT_DB_PATH, DEFAULT_PORT};
use airwatch::notify::LogNotifier;
use airwatch::orchestrator::{Monitor, start_location};
use airwatch::providers::AqiClient;
use airwatch::ranking::CityRankingAggregator;
use airwatch::scheduler::AutoRefreshScheduler;
use airwatch::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("airwatch=info".parse()?))
        .init();

    let port: u16 = env::var("AIRWATCH_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let db_url = env::var("AIRWATCH_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

    let config = Config::from_env();
    info!(port, db_url = %db_url, "Starting Airwatch server");

    let storage = Storage::new(&db_url).await?;
    info!("Database initialized");

    let ranking = CityRankingAggregator::new(
        AqiClient::new(&config.aqi_base_url, &config.aqi_token)?,
        config.reference_cities.clone(),
    );

    let monitor = Monitor::new(&config, storage, Box::new(LogNotifier))?;
    let monitor = Arc::new(Mutex::new(monitor));

    // No position watch in the service binary: resolution goes straight to
    // the IP fallback and runs a first cycle when it yields coordinates.
    start_location(monitor.clone(), None, config.idle_timeout).await;

    let scheduler = Arc::new(Mutex::new(AutoRefreshScheduler::new(monitor.clone())));

    let state = AppState {
        monitor,
        scheduler,
        ranking,
    };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Airwatch is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
