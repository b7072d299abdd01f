//! `CacheExtractor`: collects every cache tile a produce footprint needs,
//! reading what's already on disk immediately and waiting on `Writer` for
//! whatever is still being computed, per `spec.md` §4.7.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use raster_contracts::cache_store::{CacheKey, CacheStore};
use raster_model::{Footprint, RasterUid};

use crate::actor::{Actor, HandlerResult};
use crate::address::Address;
use crate::message::{Body, Message, TileArray};
use crate::query_info::QueryInfos;

struct PendingProduce {
    qi: Arc<QueryInfos>,
    produce_fp: Footprint,
    missing: HashSet<Footprint>,
    tiles: Vec<TileArray>,
}

pub struct CacheExtractor<C: CacheStore> {
    raster: RasterUid,
    cache: Arc<C>,
    /// Keyed by `(qi.sequence, prod_id)`: one produce footprint's worth of
    /// cache tiles still being assembled.
    pending: HashMap<(u64, usize), PendingProduce>,
    /// Cache tiles not yet on disk, and who is waiting on each one.
    waiting_on: HashMap<Footprint, Vec<(u64, usize)>>,
}

impl<C: CacheStore> CacheExtractor<C> {
    pub fn new(raster: RasterUid, cache: Arc<C>) -> Self {
        Self {
            raster,
            cache,
            pending: HashMap::new(),
            waiting_on: HashMap::new(),
        }
    }

    fn handle_assemble(
        &mut self,
        qi: Arc<QueryInfos>,
        prod_id: usize,
        produce_fp: Footprint,
        cache_fps: Vec<Footprint>,
    ) -> HandlerResult {
        let key = (qi.sequence, prod_id);
        let mut messages = Vec::new();

        let missing: HashSet<Footprint> = cache_fps.iter().copied().collect();
        self.pending.insert(
            key,
            PendingProduce {
                qi: qi.clone(),
                produce_fp,
                missing,
                tiles: Vec::new(),
            },
        );

        for cache_fp in cache_fps {
            let cache_key = CacheKey::new(self.raster, cache_fp);
            if self.cache.contains(&cache_key)? {
                messages.push(Message::new(
                    Address::bare("Reader"),
                    Body::ReadThisCacheFile {
                        raster: self.raster,
                        cache_fp,
                        qi: qi.clone(),
                        prod_id,
                    },
                ));
            } else {
                self.waiting_on.entry(cache_fp).or_default().push(key);
            }
        }
        Ok(messages)
    }

    fn handle_cache_tile_read(&mut self, qi: Arc<QueryInfos>, prod_id: usize, tile: TileArray) -> HandlerResult {
        let key = (qi.sequence, prod_id);
        let Some(record) = self.pending.get_mut(&key) else {
            return Ok(Vec::new());
        };
        record.missing.remove(&tile.footprint);
        record.tiles.push(tile);
        if !record.missing.is_empty() {
            return Ok(Vec::new());
        }
        let record = self.pending.remove(&key).unwrap();
        Ok(vec![Message::new(
            Address::bare("Resampler"),
            Body::ResampleThisArray {
                qi: record.qi,
                prod_id,
                produce_fp: record.produce_fp,
                tiles: record.tiles,
            },
        )])
    }

    fn handle_cache_tile_written(&mut self, raster: RasterUid, cache_fp: Footprint) -> HandlerResult {
        if raster != self.raster {
            return Ok(Vec::new());
        }
        let Some(waiters) = self.waiting_on.remove(&cache_fp) else {
            return Ok(Vec::new());
        };
        let mut messages = Vec::new();
        for key in waiters {
            let Some(record) = self.pending.get(&key) else {
                // Query finished or was cancelled while the tile was computing.
                continue;
            };
            messages.push(Message::new(
                Address::bare("Reader"),
                Body::ReadThisCacheFile {
                    raster: self.raster,
                    cache_fp,
                    qi: record.qi.clone(),
                    prod_id: key.1,
                },
            ));
        }
        Ok(messages)
    }
}

impl<C: CacheStore + 'static> Actor for CacheExtractor<C> {
    fn name(&self) -> &'static str {
        "CacheExtractor"
    }

    fn receive(&mut self, body: Body) -> HandlerResult {
        match body {
            Body::AssembleCacheTiles { qi, prod_id, produce_fp, cache_fps } => {
                self.handle_assemble(qi, prod_id, produce_fp, cache_fps)
            }
            Body::CacheTileRead { qi, prod_id, tile } => self.handle_cache_tile_read(qi, prod_id, tile),
            Body::CacheTileWritten { raster, cache_fp } => self.handle_cache_tile_written(raster, cache_fp),
            Body::CancelThisQuery { qi } => {
                self.pending.retain(|(sequence, _), _| *sequence != qi.sequence);
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_contracts::error::ContractError;
    use raster_contracts::interpolation::Interpolation;
    use raster_model::{Array, BandId, BandSchema, Grid, MaskKind, RasterDescriptor};
    use std::sync::Mutex;

    struct FakeCache(Mutex<HashMap<CacheKey, Vec<u8>>>);

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

    fn raster() -> RasterDescriptor {
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
            QueryInfos::new(0, raster, 4, vec![produce_fp], BandId::AllBands, None, Interpolation::Nearest).unwrap(),
        )
    }

    #[test]
    fn already_cached_tiles_are_read_immediately() {
        let raster = raster();
        let qi = qi_over(&raster);
        let produce_fp = qi.list_of_produce_fp[0];
        let cache_fps = qi.list_of_cache_fp.clone();
        let cache = Arc::new(FakeCache(Mutex::new(HashMap::new())));
        for cache_fp in &cache_fps {
            cache
                .put(&CacheKey::new(raster.uid, *cache_fp), &[0u8; 4])
                .unwrap();
        }
        let mut extractor = CacheExtractor::new(raster.uid, cache);
        let messages = extractor
            .receive(Body::AssembleCacheTiles {
                qi,
                prod_id: 0,
                produce_fp,
                cache_fps: cache_fps.clone(),
            })
            .unwrap();
        assert_eq!(messages.len(), cache_fps.len());
    }

    #[test]
    fn resamples_once_every_tile_has_arrived() {
        let raster = raster();
        let qi = qi_over(&raster);
        let produce_fp = qi.list_of_produce_fp[0];
        let cache_fps = qi.list_of_cache_fp.clone();
        let cache = Arc::new(FakeCache(Mutex::new(HashMap::new())));
        let mut extractor = CacheExtractor::new(raster.uid, cache);
        extractor
            .receive(Body::AssembleCacheTiles {
                qi: qi.clone(),
                prod_id: 0,
                produce_fp,
                cache_fps: cache_fps.clone(),
            })
            .unwrap();

        let mut last = Vec::new();
        for cache_fp in &cache_fps {
            last = extractor
                .receive(Body::CacheTileRead {
                    qi: qi.clone(),
                    prod_id: 0,
                    tile: TileArray {
                        footprint: *cache_fp,
                        array: Arc::new(Array::filled((16, 16, 1), 1.0)),
                    },
                })
                .unwrap();
        }
        assert_eq!(last.len(), 1);
        match &last[0].body {
            Body::ResampleThisArray { tiles, .. } => assert_eq!(tiles.len(), cache_fps.len()),
            other => panic!("expected ResampleThisArray, got {}", other.title()),
        }
    }
}
