//! Prometheus metrics helpers.
//!
//! # Metric Naming Conventions
//!
//! - Prefix: `board_`
//! - Suffix: `_total` for counters
//! - Labels: only `lock` on lock timeouts

use axum::{Router, routing::get};
use metrics::describe_counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Install the Prometheus recorder and register metric descriptions.
///
/// Must be called once at startup before any metrics are recorded. Fails if
/// a recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_board_metrics();
    Ok(handle)
}

/// Serve `/metrics` on `port` in a background task.
///
/// The listener is bound before returning, so a port conflict surfaces here.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });

    Ok(())
}

fn register_board_metrics() {
    // =========================================================================
    // Post table
    // =========================================================================

    describe_counter!("board_posts_created_total", "Posts appended to the table");
    describe_counter!("board_posts_updated_total", "Posts whose content was rewritten");
    describe_counter!("board_posts_hidden_total", "Posts soft-deleted");
    describe_counter!(
        "board_lock_timeouts_total",
        "Lock acquisitions that gave up after the wait bound (label: lock)"
    );

    // =========================================================================
    // Listing cache
    // =========================================================================

    describe_counter!("board_cache_hits_total", "Listings served from cache");
    describe_counter!("board_cache_misses_total", "Listings read from the table");

    // =========================================================================
    // Uploads and drafting
    // =========================================================================

    describe_counter!("board_uploads_total", "Blobs written to the blob store");
    describe_counter!(
        "board_generate_attempts_total",
        "Calls attempted against the text-generation API"
    );
    describe_counter!(
        "board_generate_failures_total",
        "Drafting requests that failed after every attempt"
    );
}
