mod config;
mod db;
mod errors;
mod evaluation;
mod extraction;
mod llm_client;
mod models;
mod queue;
mod routes;
mod state;
mod store;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, seed_job_specs};
use crate::evaluation::client::EvaluationClient;
use crate::evaluation::worker::EvaluationWorker;
use crate::extraction::DocumentExtractor;
use crate::llm_client::{LlmClient, ModelVariant};
use crate::queue::RedisJobQueue;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting evaluator v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (migrations + seed)
    let pool = create_pool(&config.database_url).await?;
    seed_job_specs(&pool).await?;
    let store = Arc::new(PgStore::new(pool.clone()));

    // Initialize Redis job queue
    let queue = Arc::new(
        RedisJobQueue::open(&config.redis_url, &config.queue_name, config.publish_timeout)
            .await
            .context("Failed to connect to Redis")?,
    );
    info!(queue = %config.queue_name, "Job queue initialized");

    // Initialize model clients
    let llm = Arc::new(LlmClient::new(
        config.gemini_api_key.clone(),
        &config.gemini_base_url,
    ));
    let scorer = Arc::new(EvaluationClient::new(
        llm.clone(),
        ModelVariant::list(&config.scoring_models, config.scoring_timeout),
    ));
    let extractor = Arc::new(DocumentExtractor::new(
        llm,
        ModelVariant::list(&config.extraction_models, config.extraction_timeout),
    ));
    info!(
        scoring = ?config.scoring_models,
        extraction = ?config.extraction_models,
        "Model clients initialized"
    );

    // Start the single evaluation worker
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = EvaluationWorker::new(queue.clone(), store.clone(), scorer);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    // Build app state
    let state = AppState {
        store,
        queue,
        extractor,
    };

    // Build router
    let app = build_router(state, config.max_upload_bytes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, waiting for worker");
    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        error!(error = %e, "Evaluation worker panicked");
    }

    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
