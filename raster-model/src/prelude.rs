//! Convenience re-exports for downstream crates.

pub use crate::array::Array;
pub use crate::band::BandId;
pub use crate::error::{ModelError, Result as ModelResult};
pub use crate::footprint::{Footprint, Grid, TileSpan};
pub use crate::raster::{BandSchema, MaskKind, RasterDescriptor, RasterUid};
