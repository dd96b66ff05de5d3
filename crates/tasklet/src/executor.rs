//! Pluggable execution policies for type-erased jobs.
//!
//! Three policies behind one trait:
//! - `SerialExecutor`: one persistent worker, strict submission order
//! - `PooledExecutor`: a fixed set of persistent workers, assignment order
//!   unspecified
//! - `SpawnExecutor`: a fresh lightweight task per job, no queueing
//!
//! Shutdown discipline is shared: `close()` stops accepting, drains every
//! already-accepted job, then releases the workers. Whoever constructs an
//! executor closes it, exactly once, on every exit path - `close()` itself is
//! idempotent so double-close is harmless.

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::task::Job;

/// Caller-chosen execution policy label, carried for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    Serial,
    Pooled(usize),
    TaskPerCall,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorKind::Serial => write!(f, "serial"),
            ExecutorKind::Pooled(size) => write!(f, "pooled({size})"),
            ExecutorKind::TaskPerCall => write!(f, "task-per-call"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutorError {
    /// Submission after `close()` fails fast rather than dropping the job.
    #[error("executor is closed")]
    Closed,
}

/// An execution policy: run type-erased jobs on some set of workers.
#[async_trait]
pub trait Executor: Send + Sync {
    fn kind(&self) -> ExecutorKind;

    /// Hand a job to the executor. Never blocks the caller; the job runs
    /// whenever a worker gets to it.
    fn execute(&self, job: Job) -> Result<(), ExecutorError>;

    /// Stop accepting jobs, let already-accepted jobs finish, then release
    /// all workers. Idempotent.
    async fn close(&self);
}

/// One persistent worker; jobs run strictly one-at-a-time in submission order.
pub struct SerialExecutor {
    tx: StdMutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SerialExecutor {
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.run().await;
            }
            tracing::debug!("serial worker exiting");
        });
        Self {
            tx: StdMutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }
}

impl Default for SerialExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for SerialExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Serial
    }

    fn execute(&self, job: Job) -> Result<(), ExecutorError> {
        let tx = self.tx.lock().expect("sender mutex poisoned");
        match tx.as_ref() {
            Some(tx) => tx.send(job).map_err(|_| ExecutorError::Closed),
            None => Err(ExecutorError::Closed),
        }
    }

    async fn close(&self) {
        // Dropping the sender closes the channel; the worker drains whatever
        // was already accepted, then exits.
        self.tx.lock().expect("sender mutex poisoned").take();
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(kind = %self.kind(), error = %e, "worker terminated abnormally");
            }
        }
    }
}

/// A fixed set of persistent workers pulling from one shared channel.
/// Which worker picks up which job is unspecified.
pub struct PooledExecutor {
    size: usize,
    tx: StdMutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PooledExecutor {
    pub fn new(size: usize) -> Self {
        assert!(size >= 1, "pool size must be at least 1");
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(size);
        for worker_id in 0..size {
            let rx = Arc::clone(&rx);
            workers.push(tokio::spawn(async move {
                loop {
                    // Hold the receiver lock only for the hand-off, never
                    // across job execution.
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else { break };
                    tracing::trace!(worker_id, "job picked up");
                    job.run().await;
                }
                tracing::debug!(worker_id, "pooled worker exiting");
            }));
        }

        Self {
            size,
            tx: StdMutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[async_trait]
impl Executor for PooledExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Pooled(self.size)
    }

    fn execute(&self, job: Job) -> Result<(), ExecutorError> {
        let tx = self.tx.lock().expect("sender mutex poisoned");
        match tx.as_ref() {
            Some(tx) => tx.send(job).map_err(|_| ExecutorError::Closed),
            None => Err(ExecutorError::Closed),
        }
    }

    async fn close(&self) {
        self.tx.lock().expect("sender mutex poisoned").take();
        let workers = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(kind = %self.kind(), error = %e, "worker terminated abnormally");
            }
        }
    }
}

/// One fresh lightweight task per job. No queueing: every accepted job is
/// immediately runnable, so concurrency is bounded only by whatever gate
/// wraps submissions.
pub struct SpawnExecutor {
    tracker: TaskTracker,
}

impl SpawnExecutor {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }
}

impl Default for SpawnExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for SpawnExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::TaskPerCall
    }

    fn execute(&self, job: Job) -> Result<(), ExecutorError> {
        if self.tracker.is_closed() {
            return Err(ExecutorError::Closed);
        }
        self.tracker.spawn(job.run());
        Ok(())
    }

    async fn close(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
