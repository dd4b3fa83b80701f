//! Logging and metrics bootstrap.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Config, LogFormat};

/// Installs the global tracing subscriber.
///
/// Panics if a global subscriber is already set.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init(),
    }
}

/// Installs the Prometheus recorder and its scrape listener on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn install_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(%addr, "Prometheus metrics listener started");
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!("reservations_created_total", "Reservations booked");
    metrics::describe_counter!(
        "reservation_conflicts_total",
        "Reservation requests rejected for an overlapping slot"
    );
    metrics::describe_counter!(
        "payments_settled_total",
        "Payments settled, labelled by kind"
    );
    metrics::describe_counter!("discounts_redeemed_total", "Discounts redeemed");
    metrics::describe_counter!(
        "referral_rewards_issued_total",
        "Referral bonus discounts issued"
    );
    metrics::describe_counter!(
        "store_commit_conflicts_total",
        "Commits rejected because a record version moved on"
    );
    metrics::describe_histogram!(
        "store_commit_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent applying a unit of work"
    );
}
