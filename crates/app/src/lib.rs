//! Process host for the salon booking core.
//!
//! Loads [`Config`], opens the configured store and wires the booking
//! services. Without `DATABASE_URL` the host runs on the in-memory store.

pub mod config;
pub mod telemetry;

use std::future::Future;

use booking::Booking;
use sqlx::postgres::PgPoolOptions;
use store::{BookingStore, InMemoryStore, PostgresStore, StoreError};
use thiserror::Error;

pub use config::{Config, LogFormat};

/// Errors that stop the host from starting.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to connect to the database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Opens the Postgres store and brings its schema up to date.
pub async fn connect_postgres(url: &str, max_connections: u32) -> Result<PostgresStore, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .map_err(AppError::Connect)?;

    let store = PostgresStore::new(pool);
    store.run_migrations().await?;
    tracing::info!(max_connections, "Connected to Postgres, migrations applied");
    Ok(store)
}

/// Wires the booking services over `store` with the configured tunables.
pub fn build<S: BookingStore + Clone>(store: S, config: &Config) -> Booking<S> {
    let settings = config.booking_settings();
    tracing::info!(
        referral_threshold = settings.referral.threshold,
        otp_ttl_seconds = settings.otp_ttl.num_seconds(),
        default_slot_minutes = settings.default_slot.num_minutes(),
        max_conflict_retries = settings.max_conflict_retries,
        "Booking services configured"
    );
    Booking::new(store, settings)
}

/// Opens the configured store, wires the services and keeps them alive
/// until `shutdown` resolves.
pub async fn run(config: Config, shutdown: impl Future<Output = ()>) -> Result<(), AppError> {
    match config.database_url.as_deref() {
        Some(url) => {
            let store = connect_postgres(url, config.database_max_connections).await?;
            serve(build(store.clone(), &config), shutdown).await;
            store.pool().close().await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, running on the in-memory store");
            serve(build(InMemoryStore::new(), &config), shutdown).await;
        }
    }
    Ok(())
}

async fn serve<S: BookingStore + Clone>(booking: Booking<S>, shutdown: impl Future<Output = ()>) {
    tracing::info!("Booking core ready");
    shutdown.await;
    drop(booking);
    tracing::info!("Booking core shut down");
}
