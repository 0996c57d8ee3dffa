use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::controller::ScanController;

/// Admits at most one scan cycle at a time.
#[derive(Debug, Clone, Default)]
pub struct CycleGate {
    busy: Arc<AtomicBool>,
}

/// Held for the duration of a cycle; releases the gate on drop, including
/// when the cycle panics.
#[derive(Debug)]
pub struct CycleGuard {
    busy: Arc<AtomicBool>,
}

impl CycleGate {
    pub fn try_enter(&self) -> Option<CycleGuard> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(CycleGuard {
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Drives [`ScanController::run_cycle`] on a fixed period.
pub struct ScanScheduler {
    controller: Arc<ScanController>,
    period: Duration,
    gate: CycleGate,
}

impl ScanScheduler {
    pub fn new(controller: Arc<ScanController>, period: Duration) -> Self {
        Self {
            controller,
            period,
            gate: CycleGate::default(),
        }
    }

    /// Runs until `shutdown` flips to true or its sender is dropped, then
    /// waits for an in-flight cycle to finish its batch.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<JoinHandle<()>> = None;

        info!(period_secs = self.period.as_secs(), "scan scheduler started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let Some(guard) = self.gate.try_enter() else {
                        warn!("previous scan cycle still running; skipping tick");
                        continue;
                    };
                    in_flight = Some(self.spawn_cycle(guard, shutdown.clone()));
                }
            }
        }

        if let Some(handle) = in_flight {
            if !handle.is_finished() {
                info!("waiting for in-flight scan cycle");
            }
            if let Err(err) = handle.await {
                warn!(error = %err, "scan cycle task failed");
            }
        }
        info!("scan scheduler stopped");
    }

    fn spawn_cycle(&self, guard: CycleGuard, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let controller = Arc::clone(&self.controller);
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            match controller.run_cycle(&shutdown) {
                Ok(stats) => debug!(matches = stats.matches, "scan cycle finished"),
                Err(err) => warn!(error = %err, "scan cycle aborted; retrying next tick"),
            }
        })
    }
}
