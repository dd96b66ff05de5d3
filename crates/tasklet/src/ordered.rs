//! Bounded concurrency with submission-order execution.
//!
//! Executors assign jobs to workers in whatever order suits them, so handing
//! each task straight to the executor loses submission order the moment the
//! pool has more than one worker. The fix is an indirection: submitted tasks
//! go into a FIFO pending queue, and what the executor receives is a
//! trampoline - a ticket to "run whatever is next", not a ticket to run the
//! task it was created for. Whichever trampoline acquires a permit pops the
//! queue head and executes it, so task bodies start in submission order no
//! matter which worker ran which trampoline.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::Semaphore;

use crate::executor::{Executor, ExecutorError, ExecutorKind};
use crate::task::{Handle, Job, TaskResult, package};

/// Bounds concurrency like [`Limiter`](crate::Limiter), and additionally
/// guarantees that task bodies begin in submission order for a single
/// producer, for any limit.
pub struct OrderedLimiter {
    executor: Arc<dyn Executor>,
    semaphore: Arc<Semaphore>,
    pending: Arc<StdMutex<VecDeque<Job>>>,
    limit: usize,
}

impl OrderedLimiter {
    /// Panics if `limit` is zero.
    pub fn new(executor: Arc<dyn Executor>, limit: usize) -> Self {
        assert!(limit >= 1, "concurrency limit must be at least 1");
        Self {
            executor,
            semaphore: Arc::new(Semaphore::new(limit)),
            pending: Arc::new(StdMutex::new(VecDeque::new())),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn kind(&self) -> ExecutorKind {
        self.executor.kind()
    }

    /// Submit a task; same contract as [`Limiter::submit`](crate::Limiter::submit)
    /// plus the ordering guarantee.
    ///
    /// A failed task is consumed, not requeued; its error reaches the
    /// submitter through the handle.
    pub fn submit<T, Fut>(&self, task: Fut) -> Result<Handle<T>, ExecutorError>
    where
        T: Send + 'static,
        Fut: Future<Output = TaskResult<T>> + Send + 'static,
    {
        let (job, handle) = package(task);

        let semaphore = Arc::clone(&self.semaphore);
        let pending = Arc::clone(&self.pending);
        let trampoline = Job::new(move || async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("admission semaphore closed");
            let next = pending.lock().expect("pending queue poisoned").pop_front();
            match next {
                Some(job) => job.run().await,
                // Exactly one pending job is enqueued per accepted
                // trampoline, so the queue cannot be empty here.
                None => tracing::error!("trampoline found an empty pending queue"),
            }
        });

        // Enqueue and hand off under the queue lock: if the executor rejects
        // the trampoline, the enqueued job is still ours to retract - no
        // worker can have popped it yet.
        {
            let mut queue = self.pending.lock().expect("pending queue poisoned");
            queue.push_back(job);
            if let Err(e) = self.executor.execute(trampoline) {
                queue.pop_back();
                return Err(e);
            }
        }
        Ok(handle)
    }

    /// Close the underlying executor. Every accepted trampoline drains one
    /// pending task first, so no submitted work is abandoned. Idempotent.
    pub async fn close(&self) {
        tracing::debug!(kind = %self.kind(), "closing ordered limiter");
        self.executor.close().await;
    }
}
