pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::repositories::store::{GradingStore, PgGradingStore};
use crate::services::grading::client::GradingClient;
use crate::services::grading::provider::{GradingProvider, OpenAiProvider};
use crate::services::grading::rate_limiter::RateLimiter;
use crate::services::intake::GradingIntake;
use crate::tasks::grading::{self as grading_tasks, GradingPipeline, GradingQueue};

/// Runs the HTTP API together with the grading worker pool until a shutdown signal.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await.context("Failed to connect to database")?;
    db::run_migrations(&db_pool).await.context("Failed to run migrations")?;
    let store: Arc<dyn GradingStore> = Arc::new(PgGradingStore::new(db_pool.clone()));

    let provider = OpenAiProvider::from_settings(&settings)?
        .map(|provider| Arc::new(provider) as Arc<dyn GradingProvider>);
    if provider.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; grading jobs will fail until it is configured");
    }

    let limiter = Arc::new(RateLimiter::per_minute(settings.ai().requests_per_minute));
    let client = GradingClient::new(provider, limiter.clone(), store.clone());
    tracing::info!(
        model = client.model().unwrap_or("none"),
        min_interval_ms = limiter.min_interval().as_millis() as u64,
        "Grading client ready"
    );
    let pipeline = GradingPipeline::new(store.clone(), client);

    let grading = settings.grading().clone();
    let (queue, receiver) = GradingQueue::bounded(grading.queue_capacity);
    let intake = GradingIntake::new(store.clone(), pipeline.clone(), queue, grading.default_mode);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles =
        grading_tasks::spawn_workers(grading.worker_count, receiver, pipeline, shutdown_rx.clone());

    if let Err(err) = grading_tasks::recover_on_startup(
        &intake,
        Duration::from_secs(grading.stale_processing_seconds),
    )
    .await
    {
        tracing::error!(error = %err, "Failed to recover grading queue");
    }
    handles.push(grading_tasks::spawn_maintenance_loop(intake.clone(), &grading, shutdown_rx));

    let state = AppState::new(settings, store, intake);
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        workers = grading.worker_count,
        queue_capacity = grading.queue_capacity,
        "Essay grader listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(core::shutdown::shutdown_signal(shutdown_tx))
        .await;

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    db_pool.close().await;
    tracing::info!("Database pool closed");

    result?;

    Ok(())
}
