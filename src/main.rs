use anyhow::Context;
use selah_lib::infrastructure::connectivity::HttpConnectivityProbe;
use selah_lib::{AppConfig, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    selah_lib::init_logging();

    let config = AppConfig::from_env();
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    let state = AppState::new(config.clone())
        .await
        .context("failed to initialize application state")?;

    match state.reconcile.reconcile_once().await {
        Ok(report) => tracing::info!(
            marked_synced = report.marked_synced.len(),
            requeued = report.requeued.len(),
            pending = report.pending_queue_count,
            "startup reconciliation finished"
        ),
        Err(err) => tracing::error!(error = %err, "startup reconciliation failed"),
    }

    let shutdown = CancellationToken::new();
    let monitor_task = state
        .connectivity
        .spawn(Arc::clone(&state.orchestrator), shutdown.clone());

    let probe = HttpConnectivityProbe::new(
        config.probe_url(),
        Duration::from_secs(config.content.request_timeout),
    )?;
    let probe_task = state.connectivity.spawn_probe(
        Arc::new(probe),
        Duration::from_secs(config.connectivity.probe_interval_secs),
        shutdown.clone(),
    );

    if state.connectivity.is_online() {
        match state.orchestrator.sync_pending_changes().await {
            Ok(outcome) => tracing::info!(outcome = ?outcome, "initial sync finished"),
            Err(err) => tracing::warn!(error = %err, "initial sync failed"),
        }
    }

    tracing::info!("selah offline engine running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    shutdown.cancel();
    let (monitor_result, probe_result) = tokio::join!(monitor_task, probe_task);
    if let Err(err) = monitor_result.and(probe_result) {
        tracing::warn!(error = %err, "background task ended abnormally");
    }
    state.pool.close().await;
    Ok(())
}
