//! Recurring `full` cycles on a fixed interval.
//!
//! One cycle at a time: a tick that arrives while the previous cycle still
//! holds the guard is dropped, never queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ScheduleConfig;
use crate::core::cycle::CycleRunner;
use crate::core::signal_source::SignalSource;

pub struct Scheduler {
    runner: Arc<CycleRunner>,
    source: Arc<SignalSource>,
    interval: Duration,
    start_delay: Duration,
    guard: Arc<Mutex<()>>,
    cycles_started: AtomicU64,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(
        runner: Arc<CycleRunner>,
        source: Arc<SignalSource>,
        config: &ScheduleConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            runner,
            source,
            interval: Duration::from_secs(config.interval_seconds),
            start_delay: Duration::from_secs(config.start_delay_seconds),
            guard: Arc::new(Mutex::new(())),
            cycles_started: AtomicU64::new(0),
            shutdown,
        }
    }

    /// Tick until shutdown, then wait for the in-flight cycle to unwind.
    pub async fn run(&self) {
        info!(
            interval_seconds = self.interval.as_secs(),
            start_delay_seconds = self.start_delay.as_secs(),
            "scheduler started"
        );

        tokio::select! {
            () = self.shutdown.cancelled() => {
                info!("scheduler stopped before first cycle");
                return;
            }
            () = tokio::time::sleep(self.start_delay) => {}
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.try_start();
                }
            }
        }

        // Cycles observe the same token; this returns once they unwind.
        let _ = self.guard.lock().await;
        info!(cycles = self.cycles_started(), "scheduler stopped");
    }

    /// Spawn a cycle unless one is already running.
    pub fn try_start(&self) -> Option<JoinHandle<()>> {
        let permit = match self.guard.clone().try_lock_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("previous cycle still running, tick dropped");
                return None;
            }
        };

        let n = self.cycles_started.fetch_add(1, Ordering::SeqCst) + 1;
        let runner = self.runner.clone();
        let source = self.source.clone();
        let shutdown = self.shutdown.clone();

        Some(tokio::spawn(async move {
            let _permit = permit;
            info!(cycle = n, "scheduled cycle starting");
            match runner.run_full(&source, &shutdown).await {
                Ok(report) => info!(cycle = n, action = %report.action, "scheduled cycle done"),
                Err(failure) => error!(cycle = n, failure = %failure, "scheduled cycle failed"),
            }
        }))
    }

    pub fn cycles_started(&self) -> u64 {
        self.cycles_started.load(Ordering::SeqCst)
    }
}
