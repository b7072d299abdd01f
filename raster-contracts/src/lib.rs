//! External trait contracts the scheduler (`raster-core`) depends on, per
//! `spec.md` §6. `raster-core` is generic over these traits so the real
//! cache/pool/primitive-source implementations a host data source framework
//! provides never need to be known to the scheduler itself.

pub mod cache_store;
pub mod channel;
pub mod compute_fn;
pub mod error;
pub mod interpolation;
pub mod output_sink;
pub mod pool;
pub mod primitive_source;
pub mod resample_fn;

pub mod prelude {
    pub use super::cache_store::CacheStore;
    pub use super::channel::BoundedChannel;
    pub use super::compute_fn::ComputeFn;
    pub use super::error::ContractError;
    pub use super::interpolation::Interpolation;
    pub use super::output_sink::OutputSink;
    pub use super::pool::{TaskHandle, WorkerPool};
    pub use super::primitive_source::PrimitiveSource;
    pub use super::resample_fn::ResampleFn;
}
