//! Fixed-interval cycle scheduler with an overlap guard
//!
//! Each tick tries to take the single [`CycleGuard`] slot. If the previous
//! cycle still holds it the tick is dropped, so at most one cycle runs at a
//! time no matter how long a cycle takes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Single-slot guard marking a cycle in progress
#[derive(Clone, Debug)]
pub struct CycleGuard {
    slot: Arc<Semaphore>,
}

impl Default for CycleGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleGuard {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Claim the slot, `None` while another cycle holds it
    pub fn try_begin(&self) -> Option<OwnedSemaphorePermit> {
        self.slot.clone().try_acquire_owned().ok()
    }

    pub fn is_running(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// Wait until the running cycle, if any, has finished
    pub async fn wait_idle(&self) {
        if let Ok(permit) = self.slot.acquire().await {
            drop(permit);
        }
    }
}

/// Counters reported when the scheduler stops
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub started: u64,
    pub skipped: u64,
}

pub struct Scheduler {
    period: Duration,
    guard: CycleGuard,
    name: &'static str,
}

impl Scheduler {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            period,
            guard: CycleGuard::new(),
            name,
        }
    }

    pub fn guard(&self) -> &CycleGuard {
        &self.guard
    }

    /// Start `cycle` on every tick until `shutdown` resolves
    ///
    /// Cycles run as spawned tasks. On shutdown the scheduler waits for the
    /// running cycle to finish before returning.
    pub async fn run<F, Fut, S>(&self, mut cycle: F, shutdown: S) -> SchedulerStats
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
        S: Future<Output = ()>,
    {
        let mut stats = SchedulerStats::default();
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(scheduler = self.name, period = ?self.period, "Scheduler started");
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(scheduler = self.name, "Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let Some(permit) = self.guard.try_begin() else {
                        stats.skipped += 1;
                        warn!(scheduler = self.name, "Previous cycle still running, skipping tick");
                        continue;
                    };
                    stats.started += 1;
                    debug!(scheduler = self.name, cycle = stats.started, "Starting cycle");
                    let work = cycle();
                    tokio::spawn(async move {
                        work.await;
                        drop(permit);
                    });
                }
            }
        }

        self.guard.wait_idle().await;
        info!(
            scheduler = self.name,
            started = stats.started,
            skipped = stats.skipped,
            "Scheduler stopped"
        );
        stats
    }
}
