//! Task packaging: type-erased units of work and their completion handles.
//!
//! A `Job` is the unit the executors understand: zero arguments, runs once,
//! produces nothing. `package` couples a typed, fallible future to a `Handle`
//! so the submitter can observe the outcome no matter which worker ends up
//! running the job, or when.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;

pub type TaskResult<T> = Result<T, TaskError>;

/// Task-level failure. Contained at the handle boundary: a failing or
/// panicking task never takes a worker down with it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    /// The unit of work returned an error.
    #[error("task failed: {0}")]
    Failed(String),

    /// The unit of work panicked. The panic was caught at the job boundary.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The executor went away before the task ran.
    #[error("executor dropped before the task ran")]
    Dropped,
}

/// A type-erased, run-once unit of work.
///
/// Consumed exactly once; carries no identity of its own.
pub struct Job(Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>);

impl Job {
    /// Build a job from a closure producing its future. This is the shape a
    /// periodic producer hands out: a fresh unit of work per call.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Job(Box::new(move || f().boxed()))
    }

    /// Run the unit of work to completion, containing panics.
    pub(crate) async fn run(self) {
        let Job(f) = self;
        let result = AssertUnwindSafe(async move { f().await }).catch_unwind().await;
        if let Err(panic) = result {
            tracing::error!(panic = %panic_message(panic.as_ref()), "job panicked");
        }
    }
}

/// Handle to a submitted task, resolved when the task finishes - independent
/// of when a worker was assigned to it.
pub struct Handle<T> {
    rx: oneshot::Receiver<TaskResult<T>>,
}

impl<T> Handle<T> {
    /// Wait for the task to finish and take its outcome.
    pub async fn join(self) -> TaskResult<T> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(TaskError::Dropped),
        }
    }
}

/// Couple a typed future to a completion handle.
///
/// The returned job resolves the handle on every exit path: value, error, or
/// panic. Failures are logged here once; the handle still carries the real
/// error so the caller decides whether it propagates.
pub(crate) fn package<T, Fut>(task: Fut) -> (Job, Handle<T>)
where
    T: Send + 'static,
    Fut: Future<Output = TaskResult<T>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let job = Job(Box::new(move || {
        async move {
            let result = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(TaskError::Panicked(panic_message(panic.as_ref()))),
            };
            if let Err(ref e) = result {
                tracing::warn!(error = %e, "task completed with error");
            }
            // The submitter may have dropped the handle; that is their choice.
            let _ = tx.send(result);
        }
        .boxed()
    }));
    (job, Handle { rx })
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_returns_value() {
        let (job, handle) = package(async { Ok(42) });
        job.run().await;
        assert_eq!(handle.join().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn join_returns_error() {
        let (job, handle) = package::<(), _>(async { Err(TaskError::Failed("oops".into())) });
        job.run().await;
        assert!(matches!(handle.join().await, Err(TaskError::Failed(_))));
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let (job, handle) = package::<(), _>(async { panic!("boom") });
        job.run().await;
        match handle.join().await {
            Err(TaskError::Panicked(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected Panicked, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn dropped_job_resolves_handle() {
        let (job, handle) = package(async { Ok(1) });
        drop(job);
        assert!(matches!(handle.join().await, Err(TaskError::Dropped)));
    }

    #[tokio::test]
    async fn job_new_runs_closure() {
        let (tx, rx) = oneshot::channel();
        let job = Job::new(move || async move {
            let _ = tx.send(7);
        });
        job.run().await;
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn job_panicking_before_future_is_contained() {
        let job = Job::new(|| -> futures::future::BoxFuture<'static, ()> { panic!("eager") });
        // Must not unwind through run().
        job.run().await;
    }
}
