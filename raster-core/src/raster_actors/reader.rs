//! `Reader`: pulls a cache tile's bytes back off `CacheStore` on a worker
//! thread and decodes it, per `spec.md` §4.7/§4.8. Unlike `Computer`, each
//! read serves exactly one `(qi, prod_id, cache_fp)` triple, so this actor
//! does keep per-`qi` bookkeeping — an in-flight read count per query,
//! dropped wholesale on cancellation so a read that finishes after its query
//! died is discarded instead of reaching `CacheExtractor`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use raster_contracts::cache_store::{CacheKey, CacheStore};
use raster_contracts::error::ContractError;
use raster_contracts::pool::WorkerPool;
use raster_model::{Footprint, RasterUid};

use crate::actor::{Actor, HandlerResult};
use crate::address::Address;
use crate::codec;
use crate::error::SchedulerError;
use crate::global_priorities::SharedPriorities;
use crate::message::{Body, Message, TileArray};
use crate::pool::SharedPool;
use crate::query_info::QueryInfos;
use crate::rayon_pool::RayonPool;

pub struct Reader<C: CacheStore> {
    cache: Arc<C>,
    pool: SharedPool<RayonPool>,
    priorities: SharedPriorities,
    /// In-flight read count per query sequence, for observability and so
    /// `cancelled` only needs to carry sequences that actually had reads
    /// outstanding.
    in_flight: HashMap<u64, usize>,
    cancelled: Arc<Mutex<HashSet<u64>>>,
}

impl<C: CacheStore> Reader<C> {
    pub fn new(cache: Arc<C>, pool: SharedPool<RayonPool>, priorities: SharedPriorities) -> Self {
        Self {
            cache,
            pool,
            priorities,
            in_flight: HashMap::new(),
            cancelled: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn in_flight_for(&self, sequence: u64) -> usize {
        self.in_flight.get(&sequence).copied().unwrap_or(0)
    }
}

impl<C: CacheStore + 'static> Reader<C> {
    fn handle_read(
        &mut self,
        raster: RasterUid,
        cache_fp: Footprint,
        qi: Arc<QueryInfos>,
        prod_id: usize,
    ) -> HandlerResult {
        *self.in_flight.entry(qi.sequence).or_insert(0) += 1;

        let priority = self.priorities.lock().priority_key(qi.raster, qi.sequence, qi.min_prod_idx(&cache_fp));
        let cache = self.cache.clone();
        let cancelled = self.cancelled.clone();
        let key = CacheKey::new(raster, cache_fp);
        let sequence = qi.sequence;

        let callback: crate::pool::WaiterCallback<RayonPool> = Box::new(move |pool| {
            let handle = pool.spawn(move || -> Result<raster_model::Array, ContractError> {
                match cache.get(&key) {
                    Ok(Some(bytes)) => codec::decode(&bytes).map_err(|e: SchedulerError| ContractError::CacheIo(e.to_string())),
                    Ok(None) => Err(ContractError::CacheIo(format!(
                        "cache tile missing at read time: {key:?}"
                    ))),
                    Err(err) => Err(err),
                }
            });

            let completion: crate::pool::Completion = Box::new(move |result| {
                if cancelled.lock().contains(&sequence) {
                    return Vec::new();
                }
                match result {
                    Ok(array) => vec![Message::new(
                        Address::bare("CacheExtractor"),
                        Body::CacheTileRead {
                            qi: qi.clone(),
                            prod_id,
                            tile: TileArray {
                                footprint: cache_fp,
                                array: Arc::new(array),
                            },
                        },
                    )],
                    Err(err) => {
                        tracing::warn!(%err, cache_fp = ?cache_fp, "cache tile read failed");
                        vec![Message::new(
                            Address::bare("QueriesHandler"),
                            Body::CancelThisQuery { qi: qi.clone() },
                        )]
                    }
                }
            });
            (Some((handle, completion)), Vec::new())
        });

        self.pool.lock().push_waiter(priority, callback);
        Ok(Vec::new())
    }

    fn handle_cancel(&mut self, qi: Arc<QueryInfos>) -> HandlerResult {
        self.in_flight.remove(&qi.sequence);
        self.cancelled.lock().insert(qi.sequence);
        Ok(Vec::new())
    }
}

impl<C: CacheStore + 'static> Actor for Reader<C> {
    fn name(&self) -> &'static str {
        "Reader"
    }

    fn receive(&mut self, body: Body) -> HandlerResult {
        match body {
            Body::ReadThisCacheFile { raster, cache_fp, qi, prod_id } => {
                self.handle_read(raster, cache_fp, qi, prod_id)
            }
            Body::CancelThisQuery { qi } => self.handle_cancel(qi),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{PoolActor, PoolTickActor};
    use raster_contracts::interpolation::Interpolation;
    use raster_model::{Array, BandId, BandSchema, Grid, MaskKind, RasterDescriptor};
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex as StdMutex;

    struct FakeCache(StdMutex<StdHashMap<CacheKey, Vec<u8>>>);

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

    fn test_raster() -> RasterDescriptor {
        let grid = Grid::new(0.0, 0.0, 1.0, -1.0).unwrap();
        let fp = Footprint::new(grid, 16, 16).unwrap();
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

    #[test]
    fn reads_a_present_tile_and_reports_it_to_cache_extractor() {
        let raster = test_raster();
        let cache_fp = raster.fp_working;
        let array = Array::filled((16, 16, 1), 7.0);
        let cache = Arc::new(FakeCache(StdMutex::new(StdHashMap::new())));
        cache
            .put(&CacheKey::new(raster.uid, cache_fp), &codec::encode(&array))
            .unwrap();

        let shared_pool = Arc::new(Mutex::new(PoolActor::new("read", RayonPool::new(), 4)));
        let priorities = Arc::new(Mutex::new(crate::global_priorities::GlobalPrioritiesWatcher::new()));
        let mut reader = Reader::new(cache, shared_pool.clone(), priorities);

        let produce_fp = Footprint::new(*raster.fp_working.grid(), 16, 16).unwrap();
        let qi = Arc::new(
            QueryInfos::new(0, &raster, 4, vec![produce_fp], BandId::AllBands, None, Interpolation::Nearest).unwrap(),
        );

        reader
            .receive(Body::ReadThisCacheFile {
                raster: raster.uid,
                cache_fp,
                qi,
                prod_id: 0,
            })
            .unwrap();

        let mut tick_actor = PoolTickActor::new(shared_pool);
        let mut result = None;
        for _ in 0..1000 {
            let messages = tick_actor.ext_receive_nothing().unwrap().unwrap();
            if !messages.is_empty() {
                result = Some(messages);
                break;
            }
            std::thread::yield_now();
        }
        let messages = result.expect("read did not complete in time");
        assert_eq!(messages.len(), 1);
        match &messages[0].body {
            Body::CacheTileRead { tile, .. } => assert_eq!(tile.array.data[0], 7.0),
            other => panic!("expected CacheTileRead, got {}", other.title()),
        }
    }
}
