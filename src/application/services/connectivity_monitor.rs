use super::analytics::{AnalyticsLog, CONNECTION_LOST, CONNECTION_RESTORED};
use super::sync_orchestrator::SyncOrchestrator;
use crate::application::ports::connectivity_probe::ConnectivityProbe;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// オンライン状態を保持し、復帰時に同期を起動する
pub struct ConnectivityMonitor {
    online: watch::Sender<bool>,
    analytics: AnalyticsLog,
    reconnect_delay: Duration,
}

impl ConnectivityMonitor {
    pub fn new(initial: bool, analytics: AnalyticsLog, reconnect_delay: Duration) -> Self {
        let (online, _) = watch::channel(initial);
        Self {
            online,
            analytics,
            reconnect_delay,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// 状態が変わったときだけ分析イベントを残す。変化したら true
    pub async fn set_online(&self, online: bool) -> bool {
        let changed = self.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            let name = if online {
                CONNECTION_RESTORED
            } else {
                CONNECTION_LOST
            };
            tracing::info!(target: "offline::connectivity", online, "connectivity changed");
            self.analytics.record(name, json!({})).await;
        }
        changed
    }

    /// オンライン復帰から reconnect_delay 待って同期する。待機中に再び切れたら取りやめる
    pub fn spawn(
        self: &Arc<Self>,
        orchestrator: Arc<SyncOrchestrator>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        let delay = self.reconnect_delay;
        tokio::spawn(async move {
            'outer: loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                if !*rx.borrow_and_update() {
                    continue;
                }

                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break 'outer,
                        _ = tokio::time::sleep(delay) => {
                            match orchestrator.sync_pending_changes().await {
                                Ok(outcome) => tracing::debug!(
                                    target: "offline::connectivity",
                                    outcome = ?outcome,
                                    "reconnect sync finished"
                                ),
                                Err(err) => tracing::warn!(
                                    target: "offline::connectivity",
                                    error = %err,
                                    "reconnect sync failed"
                                ),
                            }
                            break;
                        }
                        changed = rx.changed() => {
                            if changed.is_err() {
                                break 'outer;
                            }
                            if !*rx.borrow_and_update() {
                                tracing::debug!(
                                    target: "offline::connectivity",
                                    "connection dropped during reconnect delay"
                                );
                                break;
                            }
                        }
                    }
                }
            }
            tracing::debug!(target: "offline::connectivity", "connectivity monitor stopped");
        })
    }

    /// プローブを定期的に叩いてオンライン状態を更新する
    pub fn spawn_probe(
        self: &Arc<Self>,
        probe: Arc<dyn ConnectivityProbe>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let reachable = probe.check().await;
                        monitor.set_online(reachable).await;
                    }
                }
            }
        })
    }
}
