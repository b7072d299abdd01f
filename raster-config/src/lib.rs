//! Configuration loading and tracing bootstrap for the raster tile
//! production scheduler.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CacheIoConfig, LoopTuning, PoolCapacities, PriorityWeights, SchedulerConfig};
pub use error::{ConfigError, Result};
pub use logging::init_tracing;
