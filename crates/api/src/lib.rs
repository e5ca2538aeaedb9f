//! HTTP API for the saga orchestrator.
//!
//! Exposes saga, definition, event and cash-out endpoints over a shared
//! [`SagaOrchestrator`], with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{SagaOrchestrator, ServiceClient};
use saga_store::SagaStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, C>(state: Arc<AppState<S, C>>, metrics_handle: PrometheusHandle) -> Router
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/sagas", get(routes::sagas::list::<S, C>))
        .route("/sagas/start", post(routes::sagas::start::<S, C>))
        .route("/sagas/statistics", get(routes::sagas::statistics::<S, C>))
        .route("/sagas/{id}", get(routes::sagas::get::<S, C>))
        .route("/sagas/{id}/status", get(routes::sagas::status::<S, C>))
        .route("/sagas/{id}/retry", post(routes::sagas::retry::<S, C>))
        .route(
            "/definitions",
            get(routes::definitions::list::<S, C>).post(routes::definitions::create::<S, C>),
        )
        .route("/definitions/{id}", get(routes::definitions::get::<S, C>))
        .route("/events", get(routes::events::list::<S, C>))
        .route("/cashout/start", post(routes::cashout::start::<S, C>))
        .route("/cashout/rollback", post(routes::cashout::rollback::<S, C>))
        .route("/cashout/list", get(routes::cashout::list::<S, C>))
        .route("/cashout/status/{id}", get(routes::cashout::status::<S, C>))
        .route(
            "/cashout/{id}/retry/{step_name}",
            post(routes::cashout::retry_step::<S, C>),
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

/// Wraps an orchestrator in the shared handler state.
pub fn create_state<S, C>(orchestrator: Arc<SagaOrchestrator<S, C>>) -> Arc<AppState<S, C>> {
    Arc::new(AppState { orchestrator })
}
