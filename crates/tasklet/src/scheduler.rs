//! Fixed-rate offload: a timer task that produces jobs and hands them off.
//!
//! The timer never runs a job body itself - each tick calls the producer for
//! a fresh job and gives it to the executor, so a slow job cannot starve the
//! next tick. Ticks keep a fixed-rate cadence measured from the schedule
//! origin, which means jobs pile up concurrently when they outlast the
//! period (if the executor allows it).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
pub use tokio_util::sync::CancellationToken;

use crate::executor::Executor;
use crate::task::{Job, TaskError};

/// A running fixed-rate schedule.
///
/// Cancellation stops future ticks only; jobs already handed to the executor
/// keep running. Dropping the handle cancels the schedule.
pub struct Schedule {
    cancel: CancellationToken,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Schedule {
    /// Start a fixed-rate schedule: first tick after `initial_delay`, then
    /// every `period` measured from the first tick.
    ///
    /// A producer error skips that tick and the timer continues. A `Closed`
    /// rejection from the executor ends the schedule, since every later
    /// hand-off would be rejected too.
    pub fn fixed_rate<P>(
        executor: Arc<dyn Executor>,
        mut producer: P,
        initial_delay: Duration,
        period: Duration,
    ) -> Self
    where
        P: FnMut() -> Result<Job, TaskError> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let timer = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(initial_delay) => {}
            }
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let job = match producer() {
                    Ok(job) => job,
                    Err(e) => {
                        tracing::warn!(error = %e, "tick producer failed, skipping tick");
                        continue;
                    }
                };
                if let Err(e) = executor.execute(job) {
                    tracing::warn!(error = %e, "executor rejected tick job, ending schedule");
                    break;
                }
            }
            tracing::debug!("schedule timer exiting");
        });

        Self {
            cancel,
            timer: Mutex::new(Some(timer)),
        }
    }

    /// Stop future ticks. In-flight jobs are not interrupted. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel and wait for the timer task to exit. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let timer = self.timer.lock().await.take();
        if let Some(timer) = timer {
            let _ = timer.await;
        }
    }
}

impl Drop for Schedule {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
