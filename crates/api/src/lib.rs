//! HTTP API for storefront checkout and M-Pesa payment verification.
//!
//! Customers place orders and submit payment claims; staff verify claims
//! and move orders through fulfillment. Committed events are relayed to the
//! customer notifier by a background outbox worker. Structured logging
//! (tracing) and Prometheus metrics throughout.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod worker;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use event_store::{Catalog, EventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, OutboxParts, create_default_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Catalog + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route("/orders/{id}/events", get(routes::orders::events::<S>))
        .route("/payments", post(routes::payments::submit::<S>))
        .route("/payments/pending", get(routes::payments::pending::<S>))
        .route(
            "/payments/verify/{order_id}",
            put(routes::payments::verify::<S>),
        )
        .route(
            "/products/{id}",
            get(routes::products::get::<S>).put(routes::products::upsert::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
