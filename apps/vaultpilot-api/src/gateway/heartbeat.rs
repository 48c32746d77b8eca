//! Heartbeat monitor: pings live connections and evicts silent ones.
//!
//! A single background task per gateway, started on the first connection
//! and cancelled (then awaited) at shutdown. Each cycle:
//!
//! 1. snapshot every tracked connection;
//! 2. if idle time is strictly greater than the timeout, mark it for
//!    eviction without further I/O;
//! 3. otherwise send a `heartbeat` event, bounded by the send timeout, and
//!    mark it for eviction if that fails;
//! 4. unregister everything marked.
//!
//! Heartbeat sends do not count as activity. Only client traffic and other
//! outbound deliveries keep a connection alive.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

use super::connection::ConnectionId;
use super::events::OutboundEvent;
use super::registry::ConnectionRegistry;

/// Timing knobs for the monitor.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    pub timeout: Duration,
    pub send_timeout: Duration,
    pub backoff: Duration,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(60),
            send_timeout: Duration::from_secs(10),
            backoff: Duration::from_secs(5),
        }
    }
}

impl From<&Config> for HeartbeatSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.heartbeat_interval,
            timeout: config.heartbeat_timeout,
            send_timeout: config.heartbeat_send_timeout,
            backoff: config.monitor_backoff,
        }
    }
}

/// Outcome of one monitor cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Connections that received a heartbeat.
    pub pinged: Vec<ConnectionId>,
    /// Connections removed this cycle.
    pub evicted: Vec<ConnectionId>,
}

pub struct HeartbeatMonitor {
    registry: Arc<ConnectionRegistry>,
    settings: HeartbeatSettings,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatMonitor {
    pub fn new(registry: Arc<ConnectionRegistry>, settings: HeartbeatSettings) -> Self {
        Self {
            registry,
            settings,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Start the background task unless it is already running or the
    /// monitor has been shut down. Returns `true` if this call started it.
    ///
    /// The check and the spawn happen under one lock, so concurrent first
    /// connections start exactly one task.
    pub fn ensure_started(self: &Arc<Self>) -> bool {
        let mut task = self.task.lock();
        if self.cancel.is_cancelled() {
            return false;
        }
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let monitor = Arc::clone(self);
        let cancel = self.cancel.clone();
        *task = Some(tokio::spawn(async move { monitor.run(cancel).await }));
        tracing::info!(
            interval_secs = self.settings.interval.as_secs_f64(),
            timeout_secs = self.settings.timeout.as_secs_f64(),
            "heartbeat monitor started"
        );
        true
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel the background task and wait for it to finish. Safe to call
    /// more than once.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    tracing::error!(?err, "heartbeat monitor panicked during shutdown");
                }
            }
            tracing::info!("heartbeat monitor stopped");
        }
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let interval = self.settings.interval;
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Run the cycle as its own task so a panic inside it cannot take
            // the monitor down with it.
            let monitor = Arc::clone(&self);
            let mut cycle = tokio::spawn(async move { monitor.run_cycle(Instant::now()).await });

            let outcome = tokio::select! {
                outcome = &mut cycle => outcome,
                _ = cancel.cancelled() => {
                    cycle.abort();
                    let _ = cycle.await;
                    break;
                }
            };

            match outcome {
                Ok(report) => {
                    tracing::debug!(
                        pinged = report.pinged.len(),
                        evicted = report.evicted.len(),
                        "heartbeat cycle complete"
                    );
                }
                Err(err) => {
                    tracing::error!(?err, "heartbeat cycle failed, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = time::sleep(self.settings.backoff) => {}
                    }
                }
            }
        }
    }

    /// Run one cycle as of `now`.
    pub async fn run_cycle(&self, now: Instant) -> CycleReport {
        let mut report = CycleReport::default();

        for connection in self.registry.snapshot_all() {
            let idle = connection.idle_for(now);
            if idle > self.settings.timeout {
                tracing::warn!(
                    connection_id = %connection.id(),
                    vault_id = %connection.channel(),
                    idle_secs = idle.as_secs_f64(),
                    "connection timed out"
                );
                report.evicted.push(connection.id().clone());
                continue;
            }

            let heartbeat = OutboundEvent::heartbeat(connection.id());
            match connection.send_event(&heartbeat, self.settings.send_timeout).await {
                Ok(()) => report.pinged.push(connection.id().clone()),
                Err(err) => {
                    tracing::warn!(
                        connection_id = %connection.id(),
                        vault_id = %connection.channel(),
                        error = %err,
                        "heartbeat send failed"
                    );
                    report.evicted.push(connection.id().clone());
                }
            }
        }

        for id in &report.evicted {
            if let Some(connection) = self.registry.unregister(id) {
                tracing::info!(
                    connection_id = %id,
                    vault_id = %connection.channel(),
                    connected_at = %connection.created_at(),
                    "evicted connection"
                );
            }
        }

        report
    }
}
