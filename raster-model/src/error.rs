//! Errors raised while building or validating data-model values.

use thiserror::Error;

/// Errors that can occur while constructing or normalizing model values.
///
/// These are distinct from the scheduler's `SchedulerError` (defined in
/// `raster-core`): a `ModelError` is always the result of malformed input
/// handed to a pure constructor (a footprint off-grid, an invalid band id),
/// never of scheduler state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("footprint is not aligned with the raster grid: {0}")]
    Misaligned(String),

    #[error("invalid band identifier: {0}")]
    InvalidBand(String),

    #[error("interpolation {interpolation:?} is not allowed for a misaligned footprint")]
    InterpolationRequired { interpolation: Option<String> },

    #[error("footprint shape must be non-zero, got {width}x{height}")]
    EmptyShape { width: u32, height: u32 },
}

/// Result alias for model-level fallible constructors.
pub type Result<T> = std::result::Result<T, ModelError>;
