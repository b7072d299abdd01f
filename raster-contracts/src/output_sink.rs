//! The client-facing delivery end of a query: where a `QueriesHandler`
//! deposits produced tiles, in produce-index order, for a caller to consume.
//!
//! Modeled on a weak reference the way the Python original uses a weakref to
//! the caller's output queue: if nothing holds a strong reference to the
//! sink anymore (the caller dropped its handle, e.g. by abandoning an
//! iterator), `is_alive` starts returning `false` and the owning query gets
//! cancelled on the next idle tick rather than producing into the void.

use raster_model::Array;

use crate::error::ContractError;

/// Where one query's output tiles are delivered, and the liveness probe that
/// lets the scheduler notice an abandoned caller.
pub trait OutputSink: Send + Sync {
    /// Delivers the next produced array, in increasing produce-index order.
    /// Returns `Err(ContractError::SinkFull)` if the caller isn't draining
    /// fast enough and backpressure should propagate.
    fn deliver(&self, produce_index: u64, array: Array) -> Result<(), ContractError>;

    /// Surfaces a `PoolTaskFailed` record in place of an array, per
    /// `spec.md` §7: a compute, resample or cache-read task for this query
    /// failed, so the produce-index it would have served never arrives.
    /// The owning query is cancelled immediately after this call.
    fn fail(&self, produce_index: u64, message: &str) -> Result<(), ContractError>;

    /// Whether a caller is still listening. Once this returns `false` the
    /// owning query is cancelled the way a bare `Drop` of the caller's
    /// handle would cancel it; it is not required to go back to `true`.
    fn is_alive(&self) -> bool;

    /// Non-blocking occupancy query, the other half of the "non-blocking put
    /// and a size query" contract in `spec.md` §6. `ProductionGate` derives
    /// `pulled_count = produced_count - queue_size` from this every idle
    /// tick.
    fn queue_size(&self) -> usize;
}
