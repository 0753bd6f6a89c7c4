//! Event Center (spec §4.5): drains the event bus, persists every event,
//! and forwards the ones that cross a notification threshold to a
//! [`Notifier`]. Persistence is a narrow trait implemented by
//! `engine-storage` rather than a direct dependency, so this crate never
//! needs to know about SQLite.
//!
//! Grounded on the teacher's `AlertManager` (console/file/webhook fan-out,
//! consumed from a queue rather than called synchronously).

use std::time::Duration;

use async_trait::async_trait;
use engine_core::{Event, Severity};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// One severity's cleanup bounds (spec §4.5 periodic cleanup): rows older
/// than `retention_days` OR outside the newest `max_count` are deleted.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub retention_days: i64,
    pub max_count: u32,
}

#[async_trait]
pub trait EventPersister: Send + Sync {
    async fn persist(&self, event: &Event) -> anyhow::Result<()>;

    /// Deletes events for one severity outside its retention policy.
    /// Defaults to a no-op so persisters without a cleanup story (e.g. a
    /// test stub) don't have to implement it.
    async fn cleanup_events(&self, _severity: Severity, _policy: RetentionPolicy) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &Event) -> anyhow::Result<()>;
}

/// Logs notifications via `tracing` rather than an external transport.
/// Real webhook/Slack/Telegram notifiers are out of scope; this stands in
/// as the default so the event center always has somewhere to forward to.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, event: &Event) -> anyhow::Result<()> {
        info!(severity = ?event.severity, title = %event.title, message = %event.message, "notification");
        Ok(())
    }
}

pub struct EventCenter {
    persister: Box<dyn EventPersister>,
    notifier: Box<dyn Notifier>,
    cleanup_interval: Duration,
    retention: Vec<(Severity, RetentionPolicy)>,
}

impl EventCenter {
    pub fn new(persister: Box<dyn EventPersister>, notifier: Box<dyn Notifier>) -> Self {
        Self {
            persister,
            notifier,
            cleanup_interval: Duration::from_secs(3600),
            retention: Vec::new(),
        }
    }

    /// Sets the cleanup tick cadence and the per-severity retention
    /// policies it sweeps (spec §4.5). No entries means cleanup ticks but
    /// deletes nothing.
    pub fn with_retention(mut self, cleanup_interval: Duration, retention: Vec<(Severity, RetentionPolicy)>) -> Self {
        self.cleanup_interval = cleanup_interval;
        self.retention = retention;
        self
    }

    async fn run_cleanup(&self) {
        for (severity, policy) in &self.retention {
            if let Err(e) = self.persister.cleanup_events(*severity, *policy).await {
                warn!(?severity, error = %e, "event cleanup failed");
            }
        }
    }

    /// Drains `rx` until the bus is dropped, interleaved with a periodic
    /// cleanup sweep. Intended to be spawned as its own Tokio task for the
    /// life of the process.
    pub async fn run(self, mut rx: mpsc::Receiver<Event>) {
        let mut cleanup_ticker = tokio::time::interval(self.cleanup_interval);
        cleanup_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        cleanup_ticker.tick().await; // skip the immediate first tick

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = self.persister.persist(&event).await {
                        warn!(error = %e, "failed to persist event");
                    }
                    if event.should_notify() {
                        if let Err(e) = self.notifier.notify(&event).await {
                            warn!(error = %e, "failed to dispatch notification");
                        }
                    }
                }
                _ = cleanup_ticker.tick() => {
                    self.run_cleanup().await;
                }
            }
        }
        info!("event center shutting down, bus closed");
    }
}
