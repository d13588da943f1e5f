//! Polls the shared override slot so every open tab converges on the same
//! impersonation state within one interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

use crate::impersonation::{ImpersonationOverlay, ImpersonationOverride};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayWatcherConfig {
    pub poll_interval: Duration,
}

impl Default for OverlayWatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
        }
    }
}

pub struct OverlayWatcher {
    overlay: Arc<ImpersonationOverlay>,
    config: OverlayWatcherConfig,
}

/// Keeps the polling task alive; stop it with [`WatcherHandle::shutdown`].
pub struct WatcherHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "overlay watcher task ended abnormally");
        }
    }
}

impl OverlayWatcher {
    pub fn new(overlay: Arc<ImpersonationOverlay>, config: OverlayWatcherConfig) -> Self {
        Self { overlay, config }
    }

    /// Spawn the poll loop. The receiver starts with the current state and
    /// is notified only when the state actually changes.
    pub fn spawn(self) -> (watch::Receiver<Option<ImpersonationOverride>>, WatcherHandle) {
        let (tx, rx) = watch::channel(self.overlay.current());
        let shutdown = Arc::new(Notify::new());
        let stop = shutdown.clone();
        let overlay = self.overlay;
        let period = self.config.poll_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::debug!(poll_ms = period.as_millis() as u64, "overlay watcher started");

            loop {
                tokio::select! {
                    _ = stop.notified() => break,
                    _ = ticker.tick() => {
                        let next = overlay.current();
                        let changed = tx.send_if_modified(|seen| {
                            if *seen == next {
                                false
                            } else {
                                *seen = next;
                                true
                            }
                        });
                        if changed {
                            tracing::debug!("impersonation state changed");
                        }
                        if tx.is_closed() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("overlay watcher stopped");
        });

        (rx, WatcherHandle { shutdown, task })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use printshop_auth::{Identity, RoleName};
    use printshop_observability::TracingReporter;

    use super::*;
    use crate::storage::SharedTabStorage;
    use crate::testing::admin;

    fn fast() -> OverlayWatcherConfig {
        OverlayWatcherConfig {
            poll_interval: Duration::from_millis(10),
        }
    }

    #[test]
    fn default_interval_is_two_seconds() {
        assert_eq!(OverlayWatcherConfig::default().poll_interval, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn other_tabs_see_begin_and_end() {
        let shared = SharedTabStorage::new();
        let sink = Arc::new(TracingReporter::new());
        let admin_tab = ImpersonationOverlay::new(Arc::new(shared.clone()), sink.clone());
        let other_tab = Arc::new(ImpersonationOverlay::new(Arc::new(shared.clone()), sink));

        let (mut rx, handle) = OverlayWatcher::new(other_tab, fast()).spawn();
        assert!(rx.borrow().is_none());

        let target = Identity {
            role: RoleName::BusinessOwner,
            name: "Acme Co".to_string(),
            email: "owner@acme.test".to_string(),
        };
        admin_tab.begin(&admin(), target, Utc::now()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            rx.borrow().as_ref().map(|o| o.target_identity.name.clone()).as_deref(),
            Some("Acme Co")
        );

        admin_tab.end();
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(rx.borrow().is_none());

        handle.shutdown().await;
    }
}
