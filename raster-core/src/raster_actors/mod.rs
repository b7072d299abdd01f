//! The per-raster actor pipeline, per `spec.md` §2/§4.2-§4.7. `TopLevel`
//! instantiates one of each into a fresh `Group::Raster(uid)` the first time
//! a raster is queried.

pub mod cache_extractor;
pub mod cache_supervisor;
pub mod compute_accumulator;
pub mod computation_gate;
pub mod computer;
pub mod merger;
pub mod producer;
pub mod production_gate;
pub mod queries_handler;
pub mod reader;
pub mod resampler;
pub mod writer;

pub use cache_extractor::CacheExtractor;
pub use cache_supervisor::CacheSupervisor;
pub use compute_accumulator::ComputeAccumulator;
pub use computation_gate::ComputationGate;
pub use computer::Computer;
pub use merger::Merger;
pub use producer::Producer;
pub use production_gate::ProductionGate;
pub use queries_handler::QueriesHandler;
pub use reader::Reader;
pub use resampler::Resampler;
pub use writer::Writer;
