//! Saga orchestrator server entry point.

use std::sync::Arc;

use api::config::Config;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use saga::{HttpServiceClient, SagaOrchestrator, Sweepers, WorkQueue, WorkerPool};
use saga_store::{InMemorySagaStore, PostgresSagaStore, SagaStore};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wires the orchestrator, its background tasks and the HTTP server over `store`.
async fn run<S>(config: Config, store: S, metrics_handle: PrometheusHandle)
where
    S: SagaStore + Clone + 'static,
{
    let client =
        HttpServiceClient::new(config.service_timeout).expect("failed to build HTTP client");
    let (queue, receiver) = WorkQueue::new();
    let orchestrator = Arc::new(SagaOrchestrator::new(store, client, config.registry(), queue));

    orchestrator
        .ensure_cashout_definition()
        .await
        .expect("failed to seed cash-out definition");

    let pool = WorkerPool::spawn(orchestrator.clone(), receiver, config.workers);
    let sweepers = Sweepers::spawn(orchestrator.clone(), config.sweeper_config());

    let app = api::create_app(api::create_state(orchestrator), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, workers = config.workers, "starting saga orchestrator");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    sweepers.shutdown().await;
    pool.shutdown().await;
    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the store and run
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let store = PostgresSagaStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL saga store");
            run(config, store, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, sagas are kept in memory");
            run(config, InMemorySagaStore::new(), metrics_handle).await;
        }
    }
}
