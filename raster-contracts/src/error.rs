//! Errors a contract implementation may surface to the scheduler.

use thiserror::Error;

/// Failures surfaced by a `CacheStore`, `WorkerPool` or `PrimitiveSource`
/// implementation. The scheduler wraps these into its own `SchedulerError`
/// (`raster-core::error`) rather than matching on them directly.
#[derive(Error, Debug, Clone)]
pub enum ContractError {
    #[error("cache I/O error: {0}")]
    CacheIo(String),

    #[error("pool task failed: {0}")]
    PoolTask(String),

    #[error("primitive source exhausted before yielding the requested footprint")]
    PrimitiveExhausted,

    #[error("output sink is full")]
    SinkFull,
}
