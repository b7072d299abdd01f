//! `Writer`: persists a merged cache tile through `CacheStore`, per
//! `spec.md` §4.7. `CacheStore::put` is specified as atomic (write-temp,
//! fsync, rename), so unlike the compute/resample path this needs no worker
//! pool of its own — the call is expected to return promptly.

use std::sync::Arc;

use raster_contracts::cache_store::{CacheKey, CacheStore};
use raster_model::{Array, Footprint, RasterUid};

use crate::actor::{Actor, HandlerResult};
use crate::address::Address;
use crate::codec;
use crate::message::{Body, Message};

pub struct Writer<C: CacheStore> {
    cache: Arc<C>,
}

impl<C: CacheStore> Writer<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    fn handle(&self, raster: RasterUid, cache_fp: Footprint, array: Arc<Array>) -> HandlerResult {
        let key = CacheKey::new(raster, cache_fp);
        self.cache.put(&key, &codec::encode(&array))?;
        Ok(vec![Message::new(
            Address::bare("CacheExtractor"),
            Body::CacheTileWritten { raster, cache_fp },
        )])
    }
}

impl<C: CacheStore + 'static> Actor for Writer<C> {
    fn name(&self) -> &'static str {
        "Writer"
    }

    fn receive(&mut self, body: Body) -> HandlerResult {
        match body {
            Body::WriteCacheTile { raster, cache_fp, array } => self.handle(raster, cache_fp, array),
            _ => Ok(Vec::new()),
        }
    }
}
