//! Order capture service.
//!
//! Accepts orders over HTTP, stores them in MongoDB / CosmosDB and forwards
//! each stored order to an AMQP 1.0 broker.
//!
//! Startup order:
//!
//! 1. configuration from the environment (`.env` honoured)
//! 2. store dial, fatal on failure
//! 3. sharding bootstrap, failure logged and ignored
//! 4. broker connect if `AMQPURL` is set, failure logged and retried lazily
//! 5. HTTP until Ctrl+C / SIGTERM
//!
//! Run with: `cargo run --bin captureorder`

mod config;

use anyhow::Context;
use capture_order_core::telemetry::Telemetry;
use capture_order_mongodb::MongoOrderStore;
use capture_order_runtime::{
    ConnectionManager, DEFAULT_POOL_LIMIT, DocumentStoreWriter, MetricsExporter, OrderIngestion,
    OrderPublisher, TracingTelemetry,
};
use capture_order_web::{AppState, router};
use config::ServiceConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    let _ = dotenvy::dotenv();

    init_tracing();

    info!("Starting order capture service");
    let config = ServiceConfig::from_env().context("invalid configuration")?;

    let metrics = if config.metrics_enabled {
        let mut exporter = MetricsExporter::new();
        exporter.install().context("metrics exporter")?;
        Some(Arc::new(exporter))
    } else {
        None
    };

    let telemetry: Arc<dyn Telemetry> = Arc::new(TracingTelemetry::new());

    let store = MongoOrderStore::connect(&config.mongo, telemetry.as_ref())
        .await
        .context("can't connect to the order store")?;

    let writer = DocumentStoreWriter::new(
        Arc::new(store.clone()),
        Arc::clone(&telemetry),
        config.mongo.host.clone(),
    )
    .with_team(config.team.clone())
    .with_pool_limit(usize::try_from(config.mongo.pool_limit).unwrap_or(DEFAULT_POOL_LIMIT));
    writer.bootstrap(&config.mongo.shard_spec()).await;

    let manager = match &config.broker {
        Some(broker) => {
            let connector = broker.connector()?;
            let manager = Arc::new(ConnectionManager::new(
                Arc::new(connector),
                Arc::clone(&telemetry),
            ));
            if let Err(e) = manager.connect().await {
                warn!(
                    endpoint = %manager.endpoint(),
                    error = %e,
                    "Broker unreachable at startup, will reconnect on first publish"
                );
            }
            Some(manager)
        }
        None => {
            info!("AMQPURL not set, orders will not be forwarded");
            None
        }
    };

    let publisher = OrderPublisher::new(manager.clone(), Arc::clone(&telemetry), config.team.clone());
    let ingestion = OrderIngestion::new(writer, publisher, telemetry, config.team.clone());

    let mut state = AppState::new(ingestion);
    if let Some(exporter) = metrics {
        state = state.with_metrics(exporter);
    }
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("can't bind {addr}"))?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(manager) = manager {
        manager.close().await;
    }
    store.shutdown().await;

    info!("Server stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
