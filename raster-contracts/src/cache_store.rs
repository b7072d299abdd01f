//! The on-disk, content-addressed cache a `CacheSupervisor` reads from and
//! writes to. The scheduler never touches a filesystem path directly; it
//! only ever asks a `CacheStore` whether a key is present, for its bytes, or
//! to atomically persist new bytes under a key.

use raster_model::Footprint;
use raster_model::RasterUid;

use crate::error::ContractError;

/// The key under which one cache tile's bytes are stored: the raster it
/// belongs to plus the cache-grid footprint it covers. `RasterUid` alone
/// isn't enough since a single raster's cache can hold many tiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub raster: RasterUid,
    pub cache_fp: Footprint,
}

impl CacheKey {
    pub fn new(raster: RasterUid, cache_fp: Footprint) -> Self {
        Self { raster, cache_fp }
    }
}

/// A content-addressed store for computed cache tiles.
///
/// Implementations are expected to persist atomically (write-temp, fsync,
/// rename) so a reader never observes a partially-written tile; `put` is
/// specified as all-or-nothing from the caller's point of view.
pub trait CacheStore: Send + Sync {
    /// Returns `true` if a tile is already present without reading its body.
    fn contains(&self, key: &CacheKey) -> Result<bool, ContractError>;

    /// Reads a tile's bytes, or `Ok(None)` if it isn't present.
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, ContractError>;

    /// Atomically persists `data` under `key`, overwriting any existing
    /// entry. Returning `Ok(())` is a promise the bytes are durable.
    fn put(&self, key: &CacheKey, data: &[u8]) -> Result<(), ContractError>;

    /// Drops a tile from the store. Missing keys are not an error.
    fn remove(&self, key: &CacheKey) -> Result<(), ContractError>;
}
