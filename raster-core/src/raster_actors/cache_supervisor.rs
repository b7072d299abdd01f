//! `CacheSupervisor`: decides which of a query's cache tiles already exist
//! on disk versus must be computed, per `spec.md` §4.4.

use std::sync::Arc;

use raster_contracts::cache_store::{CacheKey, CacheStore};
use raster_model::RasterUid;

use crate::actor::{Actor, HandlerResult};
use crate::address::Address;
use crate::error::Result as SchedulerResult;
use crate::message::{Body, Message};
use crate::query_info::QueryInfos;

/// Existence checks are plain synchronous `CacheStore::contains` calls —
/// cheap enough (a filesystem stat, or a content-addressed store's own
/// index lookup) to run directly inside the handler rather than through a
/// pool, so unlike the gates this actor keeps no queued per-`qi` state for
/// `CancelThisQuery` to drop.
pub struct CacheSupervisor<C: CacheStore> {
    raster: RasterUid,
    cache: Arc<C>,
}

impl<C: CacheStore> CacheSupervisor<C> {
    pub fn new(raster: RasterUid, cache: Arc<C>) -> Self {
        Self { raster, cache }
    }

    fn handle(&self, qi: Arc<QueryInfos>) -> SchedulerResult<Vec<Message>> {
        let mut missing_cache_fps = Vec::new();
        for cache_fp in &qi.list_of_cache_fp {
            let key = CacheKey::new(self.raster, *cache_fp);
            if !self.cache.contains(&key)? {
                missing_cache_fps.push(*cache_fp);
            }
        }
        if missing_cache_fps.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Message::new(
            Address::bare("ComputationGate"),
            Body::ComputeThoseCacheFiles {
                qi,
                missing_cache_fps,
            },
        )])
    }
}

impl<C: CacheStore + 'static> Actor for CacheSupervisor<C> {
    fn name(&self) -> &'static str {
        "CacheSupervisor"
    }

    fn receive(&mut self, body: Body) -> HandlerResult {
        match body {
            Body::MakeThoseCacheTilesAvailable { qi } => Ok(self.handle(qi)?),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_contracts::error::ContractError;
    use raster_contracts::interpolation::Interpolation;
    use raster_model::{BandId, BandSchema, Footprint, Grid, MaskKind, RasterDescriptor};
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FakeCache(Mutex<HashSet<CacheKey>>);

    impl CacheStore for FakeCache {
        fn contains(&self, key: &CacheKey) -> Result<bool, ContractError> {
            Ok(self.0.lock().unwrap().contains(key))
        }
        fn get(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>, ContractError> {
            unimplemented!()
        }
        fn put(&self, key: &CacheKey, _data: &[u8]) -> Result<(), ContractError> {
            self.0.lock().unwrap().insert(key.clone());
            Ok(())
        }
        fn remove(&self, key: &CacheKey) -> Result<(), ContractError> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn test_raster() -> RasterDescriptor {
        let grid = Grid::new(0.0, 0.0, 1.0, -1.0).unwrap();
        let fp = Footprint::new(grid, 32, 32).unwrap();
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
        .unwrap()
    }

    fn qi_over(raster: &RasterDescriptor) -> Arc<QueryInfos> {
        let produce_fp = Footprint::new(*raster.fp_working.grid(), 16, 16).unwrap();
        Arc::new(
            QueryInfos::new(
                0,
                raster,
                4,
                vec![produce_fp],
                BandId::AllBands,
                None,
                Interpolation::Nearest,
            )
            .unwrap(),
        )
    }

    #[test]
    fn fully_cached_query_emits_nothing() {
        let raster = test_raster();
        let qi = qi_over(&raster);
        let cache = Arc::new(FakeCache(Mutex::new(
            qi.list_of_cache_fp
                .iter()
                .map(|fp| CacheKey::new(raster.uid, *fp))
                .collect(),
        )));
        let supervisor = CacheSupervisor::new(raster.uid, cache);
        let messages = supervisor.handle(qi).unwrap();
        assert!(messages.is_empty());
    }

    #[test]
    fn missing_tiles_are_forwarded_to_the_computation_gate() {
        let raster = test_raster();
        let qi = qi_over(&raster);
        let cache = Arc::new(FakeCache(Mutex::new(HashSet::new())));
        let supervisor = CacheSupervisor::new(raster.uid, cache);
        let messages = supervisor.handle(qi.clone()).unwrap();
        assert_eq!(messages.len(), 1);
        match &messages[0].body {
            Body::ComputeThoseCacheFiles { missing_cache_fps, .. } => {
                assert_eq!(missing_cache_fps.len(), qi.list_of_cache_fp.len());
            }
            _ => panic!("expected ComputeThoseCacheFiles"),
        }
    }
}
