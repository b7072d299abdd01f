//! `TopLevel`: the global singleton that bootstraps a raster's twelve-actor
//! pipeline into the registry the first time it is needed, and tears the
//! whole group down again on death, per `spec.md` §4.2/§4.9.
//!
//! Raster *descriptors* (the compute/resample kernels, primitive sources and
//! tiling geometry a raster needs) are registered up front via
//! `register_raster`, before the scheduler thread starts — the scheduler
//! loop itself only ever instantiates the actors for a bundle that's already
//! known, matching "on first query" rather than "on first mention of an
//! unknown raster id", which would otherwise be a silent configuration bug.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use raster_contracts::cache_store::CacheStore;
use raster_contracts::compute_fn::ComputeFn;
use raster_contracts::primitive_source::PrimitiveSource;
use raster_contracts::resample_fn::ResampleFn;
use raster_config::config::PoolCapacities;
use raster_model::{RasterDescriptor, RasterUid};

use crate::address::Group;
use crate::global_priorities::{GlobalPrioritiesWatcher, GlobalPrioritiesWatcherActor, SharedPriorities};
use crate::pool::{PoolActor, PoolTickActor, SharedPool};
use crate::raster_actors::{
    CacheExtractor, CacheSupervisor, ComputationGate, ComputeAccumulator, Computer, Merger, Producer,
    ProductionGate, QueriesHandler, Reader, Resampler, Writer,
};
use crate::rayon_pool::RayonPool;
use crate::registry::Registry;

/// Everything needed to stand up one raster's pipeline, supplied once by the
/// host when it registers the raster, independent of any particular query.
struct RasterBundle {
    descriptor: Arc<RasterDescriptor>,
    primitives: HashMap<String, Arc<dyn PrimitiveSource>>,
    compute_fn: Arc<dyn ComputeFn>,
    resample_fn: Arc<dyn ResampleFn>,
}

/// The three named worker pools every raster's pipeline shares. `cacheSupervisor`/
/// `Writer` need none of their own: `CacheStore` calls are treated as
/// synchronous per `spec.md` §6, the same simplification `CacheSupervisor`
/// and `Writer` already document.
struct Pools {
    compute: SharedPool<RayonPool>,
    resample: SharedPool<RayonPool>,
    read: SharedPool<RayonPool>,
}

pub struct TopLevel<C: CacheStore + 'static> {
    cache: Arc<C>,
    priorities: SharedPriorities,
    pools: Pools,
    bundles: HashMap<RasterUid, RasterBundle>,
}

impl<C: CacheStore + 'static> TopLevel<C> {
    pub fn new(cache: Arc<C>, pool_capacities: &PoolCapacities) -> Self {
        let pools = Pools {
            compute: Arc::new(Mutex::new(PoolActor::new(
                "compute",
                RayonPool::new(),
                pool_capacities.capacity_of("compute"),
            ))),
            resample: Arc::new(Mutex::new(PoolActor::new(
                "resample",
                RayonPool::new(),
                pool_capacities.capacity_of("resample"),
            ))),
            read: Arc::new(Mutex::new(PoolActor::new(
                "read",
                RayonPool::new(),
                pool_capacities.capacity_of("read"),
            ))),
        };
        Self {
            cache,
            priorities: Arc::new(Mutex::new(GlobalPrioritiesWatcher::new())),
            pools,
            bundles: HashMap::new(),
        }
    }

    /// Registers a raster's compute/resample kernels and primitive sources.
    /// Must be called before the bundle's raster is ever queried; the
    /// scheduler loop only instantiates actors for bundles already present
    /// here.
    pub fn register_raster(
        &mut self,
        descriptor: Arc<RasterDescriptor>,
        primitives: HashMap<String, Arc<dyn PrimitiveSource>>,
        compute_fn: Arc<dyn ComputeFn>,
        resample_fn: Arc<dyn ResampleFn>,
    ) {
        self.bundles.insert(
            descriptor.uid,
            RasterBundle {
                descriptor,
                primitives,
                compute_fn,
                resample_fn,
            },
        );
    }

    /// Registers the process-wide singletons that live outside any raster
    /// group: `GlobalPrioritiesWatcher` and one keep-alive tick actor per
    /// worker pool. Called once, before the scheduler loop starts.
    pub fn bootstrap_global(&self, registry: &mut Registry) {
        registry.register(
            Group::Global,
            Box::new(GlobalPrioritiesWatcherActor::new(self.priorities.clone())),
        );
        registry.register(
            Group::Pool("compute"),
            Box::new(PoolTickActor::new(self.pools.compute.clone())),
        );
        registry.register(
            Group::Pool("resample"),
            Box::new(PoolTickActor::new(self.pools.resample.clone())),
        );
        registry.register(
            Group::Pool("read"),
            Box::new(PoolTickActor::new(self.pools.read.clone())),
        );
    }

    /// Instantiates `raster`'s twelve-actor pipeline if it isn't already
    /// registered. A no-op if the group already exists, or if `raster` was
    /// never handed to `register_raster` — the latter is a caller bug (a
    /// query submitted against an unknown raster id) surfaced as an
    /// unresolved address by the scheduler rather than a panic here.
    pub fn ensure_raster_group(&self, registry: &mut Registry, raster: RasterUid) {
        if registry.contains(Group::Raster(raster), "QueriesHandler") {
            return;
        }
        let Some(bundle) = self.bundles.get(&raster) else {
            return;
        };
        let group = Group::Raster(raster);

        registry.register(group, Box::new(QueriesHandler::new(raster)));
        registry.register(group, Box::new(ProductionGate::new()));
        registry.register(group, Box::new(CacheSupervisor::new(raster, self.cache.clone())));
        registry.register(group, Box::new(ComputationGate::new()));
        registry.register(
            group,
            Box::new(Computer::new(
                bundle.descriptor.clone(),
                bundle.primitives.clone(),
                bundle.compute_fn.clone(),
                self.priorities.clone(),
                self.pools.compute.clone(),
            )),
        );
        registry.register(group, Box::new(ComputeAccumulator::new(bundle.descriptor.clone())));
        registry.register(group, Box::new(Merger::new()));
        registry.register(group, Box::new(Writer::new(self.cache.clone())));
        registry.register(
            group,
            Box::new(Reader::new(self.cache.clone(), self.pools.read.clone(), self.priorities.clone())),
        );
        registry.register(group, Box::new(CacheExtractor::new(raster, self.cache.clone())));
        registry.register(
            group,
            Box::new(Resampler::new(
                bundle.resample_fn.clone(),
                self.priorities.clone(),
                self.pools.resample.clone(),
            )),
        );
        registry.register(group, Box::new(Producer::new(bundle.descriptor.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_contracts::error::ContractError;
    use raster_contracts::cache_store::CacheKey;
    use raster_model::{BandSchema, Footprint, Grid, MaskKind};
    use std::sync::Mutex as StdMutex;

    struct FakeCache(StdMutex<HashMap<CacheKey, Vec<u8>>>);

    impl CacheStore for FakeCache {
        fn contains(&self, key: &CacheKey) -> Result<bool, ContractError> {
            Ok(self.0.lock().unwrap().contains_key(key))
        }
        fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, ContractError> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }
        fn put(&self, key: &CacheKey, data: &[u8]) -> Result<(), ContractError> {
            self.0.lock().unwrap().insert(key.clone(), data.to_vec());
            Ok(())
        }
        fn remove(&self, key: &CacheKey) -> Result<(), ContractError> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn descriptor() -> Arc<RasterDescriptor> {
        let grid = Grid::new(0.0, 0.0, 1.0, -1.0).unwrap();
        let fp = Footprint::new(grid, 16, 16).unwrap();
        Arc::new(
            RasterDescriptor::new(
                RasterUid(1),
                BandSchema {
                    dtype_name: vec!["f32".into()],
                    nodata: vec![None],
                    mask: vec![MaskKind::None],
                },
                fp,
                fp,
                (16, 16),
                (16, 16),
                (16, 16),
                Vec::new(),
            )
            .unwrap(),
        )
    }

    struct NoopCompute;
    impl ComputeFn for NoopCompute {
        fn compute(
            &self,
            compute_fp: &Footprint,
            _bands: &[u32],
            _primitive_arrays: &HashMap<String, Vec<raster_model::Array>>,
        ) -> Result<raster_model::Array, ContractError> {
            let (cols, rows) = compute_fp.shape();
            Ok(raster_model::Array::filled((rows, cols, 1), 0.0))
        }
    }

    struct NoopResample;
    impl ResampleFn for NoopResample {
        fn resample(
            &self,
            _tiles: &[(Footprint, Arc<raster_model::Array>)],
            produce_fp: &Footprint,
            _bands: &[u32],
            _interpolation: raster_contracts::interpolation::Interpolation,
            _dst_nodata: f64,
        ) -> Result<raster_model::Array, ContractError> {
            let (cols, rows) = produce_fp.shape();
            Ok(raster_model::Array::filled((rows, cols, 1), 0.0))
        }
    }

    #[test]
    fn ensure_raster_group_is_idempotent() {
        let cache = Arc::new(FakeCache(StdMutex::new(HashMap::new())));
        let mut top_level = TopLevel::new(cache, &PoolCapacities::default());
        let descriptor = descriptor();
        top_level.register_raster(descriptor.clone(), HashMap::new(), Arc::new(NoopCompute), Arc::new(NoopResample));

        let mut registry = Registry::new();
        top_level.bootstrap_global(&mut registry);
        top_level.ensure_raster_group(&mut registry, descriptor.uid);
        let len_after_first = registry.len();
        top_level.ensure_raster_group(&mut registry, descriptor.uid);
        assert_eq!(registry.len(), len_after_first);
        assert!(registry.contains(Group::Raster(descriptor.uid), "QueriesHandler"));
    }

    #[test]
    fn unregistered_raster_is_left_alone() {
        let cache = Arc::new(FakeCache(StdMutex::new(HashMap::new())));
        let top_level = TopLevel::new(cache, &PoolCapacities::default());
        let mut registry = Registry::new();
        top_level.ensure_raster_group(&mut registry, RasterUid(99));
        assert!(!registry.contains(Group::Raster(RasterUid(99)), "QueriesHandler"));
    }
}
