//! Error taxonomy for the scheduler, per the five kinds `spec.md` §7 names.
//! Cancellation is never an error; missing cache files are an expected state
//! surfaced as `Option::None`, not a variant here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Raised synchronously from a query submission call: a bad footprint, a
    /// bad band id, or an interpolation mode disallowed for the request.
    /// Never touches scheduler state.
    #[error("invalid query input: {0}")]
    UserInput(String),

    /// A handler panicked or returned an unrecoverable error. The scheduler
    /// thread has terminated; this is the error every subsequent public call
    /// observes.
    #[error("scheduler thread crashed: {0}")]
    SchedulerCrashed(String),

    /// A pool task's completion delivered a failure instead of a result. The
    /// owning pipeline tags its produce-index as failed and cancels the
    /// query; this variant is what reaches the client's output channel.
    #[error("worker pool task failed: {0}")]
    PoolTaskFailed(String),

    /// The weak handle to a client's output channel has been collected, or
    /// an internal mpsc channel has no remaining receiver.
    #[error("output channel is no longer live")]
    ChannelDead,

    /// The on-disk cache store reported an I/O or integrity failure.
    #[error("cache store error: {0}")]
    Cache(String),

    /// A scheduler-internal consistency failure (unresolved non-droppable
    /// address, duplicate registration) that should never happen in
    /// practice and indicates a bug rather than bad input.
    #[error("internal scheduler error: {0}")]
    Internal(String),
}

impl From<raster_contracts::error::ContractError> for SchedulerError {
    fn from(err: raster_contracts::error::ContractError) -> Self {
        use raster_contracts::error::ContractError;
        match err {
            ContractError::CacheIo(msg) => SchedulerError::Cache(msg),
            ContractError::PoolTask(msg) => SchedulerError::PoolTaskFailed(msg),
            ContractError::PrimitiveExhausted => {
                SchedulerError::Internal("primitive source exhausted unexpectedly".to_string())
            }
            ContractError::SinkFull => SchedulerError::ChannelDead,
        }
    }
}

impl From<raster_model::ModelError> for SchedulerError {
    fn from(err: raster_model::ModelError) -> Self {
        SchedulerError::UserInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
