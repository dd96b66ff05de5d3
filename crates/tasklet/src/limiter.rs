//! Semaphore-bounded admission over any executor.
//!
//! Submission is unbounded and returns immediately with a handle; only
//! execution is throttled. The limit is enforced where the task runs, not
//! where it is submitted, so a burst of N submissions against limit L keeps
//! at most L task bodies in flight while the rest wait for a permit.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::executor::{Executor, ExecutorError, ExecutorKind};
use crate::task::{Handle, TaskResult, package};

/// Bounds how many submitted tasks may execute at once.
///
/// The limiter takes over the executor's lifecycle: closing the limiter
/// closes the executor, and nobody else should.
pub struct Limiter {
    executor: Arc<dyn Executor>,
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl Limiter {
    /// Panics if `limit` is zero: a gate that admits nothing is a
    /// construction bug, not a runtime condition.
    pub fn new(executor: Arc<dyn Executor>, limit: usize) -> Self {
        assert!(limit >= 1, "concurrency limit must be at least 1");
        Self {
            executor,
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits not currently held by an executing task. Equals `limit()`
    /// whenever the gate is idle.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn kind(&self) -> ExecutorKind {
        self.executor.kind()
    }

    /// Submit a task. Returns immediately; the task body runs once a permit
    /// and a worker are both available. The permit is released on every exit
    /// path - success, error, or panic - when its guard drops.
    pub fn submit<T, Fut>(&self, task: Fut) -> Result<Handle<T>, ExecutorError>
    where
        T: Send + 'static,
        Fut: Future<Output = TaskResult<T>> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let (job, handle) = package(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("admission semaphore closed");
            task.await
        });
        self.executor.execute(job)?;
        Ok(handle)
    }

    /// Close the underlying executor: stop accepting, drain in-flight work,
    /// release resources. Idempotent; does not cancel running tasks.
    pub async fn close(&self) {
        tracing::debug!(kind = %self.kind(), "closing limiter");
        self.executor.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{SerialExecutor, SpawnExecutor};
    use crate::task::TaskError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn burst_never_exceeds_limit() {
        let limiter = Limiter::new(Arc::new(SpawnExecutor::new()), 3);
        let running = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let running = Arc::clone(&running);
            let high_water = Arc::clone(&high_water);
            let handle = limiter
                .submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    high_water.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
            handles.push(handle);
        }
        for handle in handles {
            handle.join().await.unwrap();
        }
        limiter.close().await;

        assert_eq!(high_water.load(Ordering::SeqCst), 3);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn permits_balance_after_mixed_outcomes() {
        let limiter = Limiter::new(Arc::new(SpawnExecutor::new()), 2);

        let mut handles = Vec::new();
        for n in 0..10 {
            let handle = limiter
                .submit(async move {
                    if n % 2 == 0 {
                        Ok(n)
                    } else {
                        Err(TaskError::Failed(format!("task {n}")))
                    }
                })
                .unwrap();
            handles.push(handle);
        }

        let mut ok = 0;
        let mut failed = 0;
        for handle in handles {
            match handle.join().await {
                Ok(_) => ok += 1,
                Err(TaskError::Failed(_)) => failed += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        limiter.close().await;

        assert_eq!((ok, failed), (5, 5));
        assert_eq!(limiter.available_permits(), limiter.limit());
    }

    #[tokio::test]
    async fn permits_balance_after_panics() {
        let limiter = Limiter::new(Arc::new(SpawnExecutor::new()), 2);

        let mut handles = Vec::new();
        for n in 0..6 {
            let handle = limiter
                .submit(async move {
                    if n == 3 {
                        panic!("task {n}");
                    }
                    Ok(n)
                })
                .unwrap();
            handles.push(handle);
        }
        for handle in handles {
            let _ = handle.join().await;
        }
        limiter.close().await;

        assert_eq!(limiter.available_permits(), limiter.limit());
    }

    #[tokio::test]
    async fn results_come_back_through_handles() {
        let limiter = Limiter::new(Arc::new(SerialExecutor::new()), 1);

        let handle = limiter.submit(async { Ok("hello".to_string()) }).unwrap();
        assert_eq!(handle.join().await.unwrap(), "hello");

        limiter.close().await;
    }

    #[tokio::test]
    async fn submit_after_close_is_rejected() {
        let limiter = Limiter::new(Arc::new(SpawnExecutor::new()), 2);
        limiter.close().await;

        let result = limiter.submit(async { Ok(()) });
        assert!(matches!(result, Err(ExecutorError::Closed)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let limiter = Limiter::new(Arc::new(SerialExecutor::new()), 1);
        limiter.close().await;
        limiter.close().await;
    }

    #[test]
    #[should_panic(expected = "concurrency limit must be at least 1")]
    fn zero_limit_panics() {
        let _ = Limiter::new(Arc::new(SpawnExecutor::new()), 0);
    }
}
