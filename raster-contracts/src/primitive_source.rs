//! The contract a `Producer`/`Reader` pulls raw pixel data through. A
//! "primitive" is whatever upstream raster (file-backed, remote, or another
//! scheduler's output) a `RasterDescriptor` lists as one of its inputs.

use raster_model::{Array, BandId, Footprint};

use crate::error::ContractError;

/// Something capable of producing pixel data for a footprint, blocking the
/// calling (worker-pool) thread while it does I/O or decoding. Implementors
/// are never asked to resample or reproject; a `Resampler` actor handles
/// mismatches between what a primitive naturally returns and what a query
/// asked for.
pub trait PrimitiveSource: Send + Sync {
    /// Reads the given bands over `fp`, which must already be on this
    /// source's native grid. Returns one array per requested band, in the
    /// order `bands` was given.
    fn read(&self, fp: &Footprint, bands: &[BandId]) -> Result<Vec<Array>, ContractError>;

    /// The native footprint and grid this source is defined over, so a
    /// `Resampler` can decide whether reprojection is needed at all.
    fn native_footprint(&self) -> Footprint;
}
