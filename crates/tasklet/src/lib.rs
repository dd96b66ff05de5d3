//! tasklet: bounded-concurrency dispatch for blocking I/O-bound work.

pub mod aggregator;
pub mod directory;
pub mod executor;
pub mod limiter;
pub mod ordered;
pub mod scheduler;
pub mod task;

pub use aggregator::{AggregateError, Aggregator, Course, Employee, Enrollment};
pub use directory::{ClientError, DirectoryClient, HttpDirectoryClient, pretty};
pub use executor::{
    Executor, ExecutorError, ExecutorKind, PooledExecutor, SerialExecutor, SpawnExecutor,
};
pub use limiter::Limiter;
pub use ordered::OrderedLimiter;
pub use scheduler::{CancellationToken, Schedule};
pub use task::{Handle, Job, TaskError, TaskResult};
