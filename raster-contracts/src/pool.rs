//! The worker-pool contract a `Computer`/`Resampler`/`CacheExtractor` actor
//! submits blocking (CPU-bound) work to, and polls for completion of. The
//! scheduler's own loop never blocks on this work; it submits a task, gets a
//! `TaskHandle` back, and later polls the handle from inside
//! `ext_receive_nothing` alongside everything else.

use crate::error::ContractError;

/// A handle to one task submitted to a `WorkerPool`.
///
/// `poll` is non-blocking by contract: it must return `None` promptly if the
/// task hasn't finished, never waiting on the worker thread.
pub trait TaskHandle<T>: Send {
    /// Returns the task's result once it has finished, consuming nothing
    /// until it has (repeated polls before completion all return `None`).
    fn poll(&mut self) -> Option<Result<T, ContractError>>;

    /// True once a previous `poll` call has returned `Some`.
    fn is_finished(&self) -> bool;
}

/// A pool of worker threads (grounded on `rayon`'s global thread pool) that
/// executes closures off the scheduler's single-threaded loop.
pub trait WorkerPool: Send + Sync {
    /// The task handle type this pool hands back from `spawn`.
    type Handle<T: Send + 'static>: TaskHandle<T>;

    /// Submits `job` for execution on a worker thread and returns a handle
    /// the caller polls for completion. Never blocks the calling thread.
    fn spawn<T, F>(&self, job: F) -> Self::Handle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ContractError> + Send + 'static;

    /// Number of tasks currently queued or executing. Used by gates that
    /// size their allowed work against pool saturation.
    fn in_flight(&self) -> usize;
}
