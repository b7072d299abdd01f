//! The per-raster compute kernel a `Computer` actor submits to a worker
//! pool. Per `spec.md` §1, the actual pixel arithmetic a recipe raster uses
//! to turn primitive arrays into a computed tile is out of scope here and
//! assumed available as a pure function; this trait is that function's
//! shape.

use std::collections::HashMap;

use raster_model::{Array, Footprint};

use crate::error::ContractError;

/// Computes one compute-tile array from the primitive arrays that feed it.
/// Implementations run on a worker-pool thread and must not touch any
/// scheduler state; everything they need arrives as arguments.
pub trait ComputeFn: Send + Sync {
    /// `primitive_arrays` carries, per primitive name, the arrays read over
    /// that primitive's `to_collect_of_compute_fp` footprint, in band order.
    fn compute(
        &self,
        compute_fp: &Footprint,
        bands: &[u32],
        primitive_arrays: &HashMap<String, Vec<Array>>,
    ) -> Result<Array, ContractError>;
}
