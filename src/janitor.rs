//! Background idle-connection janitor.
//!
//! One dedicated worker per janitor, decoupled from request-serving tasks.
//! Each tick asks the transport to close connections idle past the
//! threshold, so no connection outlives `idle_timeout + sweep_interval`.

use crate::config::PoolConfig;
use crate::error::DispatchError;
use crate::metrics;
use crate::transport::Transport;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

struct JanitorWorker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic idle-connection sweeper with an explicit start/stop lifecycle.
pub struct PoolJanitor {
    transport: Arc<dyn Transport>,
    idle_timeout: Duration,
    sweep_interval: Duration,
    worker: Mutex<Option<JanitorWorker>>,
}

impl PoolJanitor {
    pub fn new(transport: Arc<dyn Transport>, config: &PoolConfig) -> Self {
        Self {
            transport,
            idle_timeout: config.idle_timeout,
            sweep_interval: config.sweep_interval,
            worker: Mutex::new(None),
        }
    }

    /// Spawn the sweep worker.
    ///
    /// The first sweep runs one interval after start (fixed-delay schedule).
    /// Calling start on a running janitor is a no-op.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap();
        if let Some(existing) = worker.as_ref() {
            if !existing.handle.is_finished() {
                warn!("Janitor already running, ignoring start");
                return;
            }
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let transport = Arc::clone(&self.transport);
        let idle_timeout = self.idle_timeout;
        let sweep_interval = self.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + sweep_interval, sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep_once(transport.as_ref(), idle_timeout);
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("Janitor worker exited");
        });

        info!(
            idle_timeout_secs = self.idle_timeout.as_secs(),
            sweep_interval_secs = self.sweep_interval.as_secs(),
            "Janitor started"
        );
        metrics::set_janitor_running(true);

        *worker = Some(JanitorWorker {
            shutdown: shutdown_tx,
            handle,
        });
    }

    /// Stop the sweep worker and wait for it to exit.
    ///
    /// Idempotent, and safe to call while a sweep is in flight: the worker
    /// finishes the current sweep, then exits and releases the timer.
    pub async fn stop(&self) {
        let worker = self.worker.lock().unwrap().take();
        let Some(worker) = worker else {
            return;
        };

        let _ = worker.shutdown.send(true);
        if worker.handle.await.is_err() {
            warn!("Janitor worker panicked during shutdown");
        }

        metrics::set_janitor_running(false);
        info!("Janitor stopped");
    }

    /// Whether the sweep worker is currently alive
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap()
            .as_ref()
            .map_or(false, |w| !w.handle.is_finished())
    }
}

/// Run one sweep; a failure is logged and counted, never fatal to the schedule.
fn sweep_once(transport: &dyn Transport, idle_timeout: Duration) {
    match transport.close_idle_older_than(idle_timeout) {
        Ok(evicted) => {
            metrics::record_sweep(evicted);
            if evicted > 0 {
                debug!(evicted, "Sweep evicted idle connections");
            }
        }
        Err(e) => {
            metrics::record_sweep_failure();
            warn!(error = %e, "Sweep failed, continuing on schedule");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ShardRequest;

    struct NoopTransport;

    impl Transport for NoopTransport {
        fn submit(&self, _request: ShardRequest) {}

        fn close_idle_older_than(&self, _max_idle: Duration) -> Result<usize, DispatchError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn lifecycle_flags_track_worker() {
        let janitor = PoolJanitor::new(Arc::new(NoopTransport), &PoolConfig::default());
        assert!(!janitor.is_running());

        janitor.start();
        assert!(janitor.is_running());

        janitor.stop().await;
        assert!(!janitor.is_running());

        // stop on a stopped janitor is a no-op
        janitor.stop().await;
        assert!(!janitor.is_running());
    }

    #[tokio::test]
    async fn double_start_keeps_a_single_worker() {
        let janitor = PoolJanitor::new(Arc::new(NoopTransport), &PoolConfig::default());
        janitor.start();
        janitor.start();
        assert!(janitor.is_running());
        janitor.stop().await;
        assert!(!janitor.is_running());
    }
}
