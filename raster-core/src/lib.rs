//! The raster tile production scheduler: a single-threaded, message-passing
//! actor system that turns client queries for footprints of a cached/recipe
//! raster into produced tile arrays, subject to backpressure, priority
//! arbitration and cross-query deduplication of compute work.

pub mod actor;
pub mod address;
pub mod codec;
pub mod error;
pub mod global_priorities;
pub mod message;
pub mod pool;
pub mod query_info;
pub mod raster_actors;
pub mod rayon_pool;
pub mod registry;
pub mod scheduler;
pub mod top_level;

pub use actor::{Actor, HandlerResult};
pub use address::Address;
pub use error::{Result, SchedulerError};
pub use message::Message;
pub use query_info::QueryInfos;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use top_level::TopLevel;
