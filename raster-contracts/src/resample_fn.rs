//! The resampling kernel `Resampler` drives. Per `spec.md` §1/§6 the actual
//! interpolation arithmetic is out of scope and assumed available as a pure
//! function; this trait is that function's shape.

use std::sync::Arc;

use raster_model::{Array, Footprint};

use crate::error::ContractError;
use crate::interpolation::Interpolation;

/// Composes a produce-footprint array out of the cache tiles covering it.
/// Implementations run on a worker-pool thread.
pub trait ResampleFn: Send + Sync {
    /// `tiles` pairs each covering cache footprint with its array; `Resampler`
    /// guarantees every tile the produce footprint needs is present before
    /// calling this. Implementations spread source nodata into
    /// `dst_nodata` and must never interpolate across a nodata pixel.
    fn resample(
        &self,
        tiles: &[(Footprint, Arc<Array>)],
        produce_fp: &Footprint,
        bands: &[u32],
        interpolation: Interpolation,
        dst_nodata: f64,
    ) -> Result<Array, ContractError>;
}
