use crate::config::KanbanConfig;
use crate::sync::engine::SyncEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Periodic sync driver.
///
/// Each tick funnels into [`SyncEngine::on_tick`], so a tick that lands
/// while a cycle is still running is skipped by the engine's in-flight
/// guard. The first tick fires one full interval after spawning.
#[derive(Debug)]
pub struct SyncScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn spawn(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs_f64(), "sync scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = engine.on_tick().await;
                        debug!(?outcome, "scheduled sync");
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("sync scheduler stopped");
        });

        Self {
            shutdown,
            handle,
            interval,
        }
    }

    /// Spawns with the configured sync interval
    pub fn from_config(engine: Arc<SyncEngine>, config: &KanbanConfig) -> Self {
        Self::spawn(engine, config.sync_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops ticking and waits for the task to finish. A sync that is
    /// already running completes first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
