//! Single recurring backup schedule

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::models::error::CoordinatorError;
use crate::models::types::{ScheduleInterval, ScheduleStatus};
use crate::services::naming::Clock;
use crate::utils::metrics::get_metrics;

/// Work performed on every fire of the schedule.
#[async_trait::async_trait]
pub trait ScheduledJob: Send + Sync {
    async fn run(&self) -> Result<String, CoordinatorError>;
}

struct ActiveJob {
    interval: ScheduleInterval,
    // Dropping the sender stops the job's loop.
    _stop: oneshot::Sender<()>,
}

#[derive(Default)]
struct ScheduleState {
    active: Option<ActiveJob>,
    generation: u64,
}

/// Holds at most one recurring job. Replacing the schedule stops the previous job first.
pub struct ScheduleController {
    state: Arc<Mutex<ScheduleState>>,
    job: Arc<dyn ScheduledJob>,
    clock: Arc<dyn Clock>,
    running_loops: Arc<AtomicUsize>,
}

impl ScheduleController {
    pub fn new(job: Arc<dyn ScheduledJob>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScheduleState::default())),
            job,
            clock,
            running_loops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Validates `interval` and atomically replaces the active schedule with it.
    pub async fn set_schedule(&self, interval: &str) -> Result<ScheduleInterval, CoordinatorError> {
        let interval: ScheduleInterval = interval.parse()?;

        let mut state = self.state.lock().await;
        if let Some(previous) = state.active.take() {
            info!(previous = %previous.interval, "Stopping previous backup schedule");
        }
        state.generation += 1;

        let (stop_tx, stop_rx) = oneshot::channel();
        let guard = LoopGuard::new(Arc::clone(&self.running_loops));
        tokio::spawn(run_schedule(
            interval,
            state.generation,
            Arc::clone(&self.state),
            Arc::clone(&self.job),
            Arc::clone(&self.clock),
            stop_rx,
            guard,
        ));
        state.active = Some(ActiveJob {
            interval,
            _stop: stop_tx,
        });
        get_metrics().set_schedule_active(true);

        info!(interval = %interval, cron = interval.cron_expression(), "Backup scheduled");
        Ok(interval)
    }

    /// Stops the active schedule, if any.
    pub async fn stop(&self) -> Option<ScheduleInterval> {
        let mut state = self.state.lock().await;
        let previous = state.active.take().map(|job| job.interval);
        state.generation += 1;
        get_metrics().set_schedule_active(false);

        if let Some(interval) = previous {
            info!(interval = %interval, "Backup schedule stopped");
        }
        previous
    }

    pub async fn status(&self) -> Option<ScheduleStatus> {
        let state = self.state.lock().await;
        state.active.as_ref().map(|job| ScheduleStatus {
            interval: job.interval,
            cron: job.interval.cron_expression().to_string(),
            next_run: job.interval.next_fire_after(self.clock.now()),
        })
    }

    /// Number of schedule loops still alive, including ones winding down after a replace.
    pub fn running_loops(&self) -> usize {
        self.running_loops.load(Ordering::SeqCst)
    }
}

struct LoopGuard(Arc<AtomicUsize>);

impl LoopGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn run_schedule(
    interval: ScheduleInterval,
    generation: u64,
    state: Arc<Mutex<ScheduleState>>,
    job: Arc<dyn ScheduledJob>,
    clock: Arc<dyn Clock>,
    mut stop: oneshot::Receiver<()>,
    _guard: LoopGuard,
) {
    loop {
        let now = clock.now();
        let Some(next) = interval.next_fire_after(now) else {
            warn!(interval = %interval, "No next fire time, schedule loop exiting");
            break;
        };
        let delay = (next - now).to_std().unwrap_or_default();
        debug!(interval = %interval, next_run = %next, "Waiting for next scheduled backup");

        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = tokio::time::sleep(delay) => {}
        }

        // Start the run under the lock so a concurrent replace cannot interleave.
        let run = {
            let state = state.lock().await;
            if state.generation != generation {
                break;
            }
            let job = Arc::clone(&job);
            tokio::spawn(async move { job.run().await })
        };

        match run.await {
            Ok(Ok(name)) => info!(interval = %interval, backup = %name, "Scheduled backup finished"),
            Ok(Err(e)) => {
                get_metrics().record_scheduled_failure();
                error!(interval = %interval, error = %e, "Scheduled backup failed");
            }
            Err(e) => {
                get_metrics().record_scheduled_failure();
                error!(interval = %interval, error = %e, "Scheduled backup task panicked");
            }
        }
    }

    debug!(interval = %interval, generation = generation, "Schedule loop exited");
}
