//! `QueryInfos` (`qi`): the immutable snapshot of one client request, per
//! `spec.md` §3. Equality/hashing cover only the request's parameters (not
//! its submission sequence or destination channel) so that two clients
//! asking for the same thing coalesce in `GlobalPrioritiesWatcher`.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use raster_contracts::interpolation::Interpolation;
use raster_model::{BandId, Footprint, RasterDescriptor, RasterUid};

use crate::error::{Result, SchedulerError};

/// Present iff at least one of this query's cache tiles is missing on disk.
/// Carries the subset of `list_of_cache_fp` that must be computed, so
/// `CacheSupervisor` hands `ComputationGate` exactly the work it found
/// missing rather than the gate re-deriving it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheComputation {
    pub list_of_cache_fp: Vec<Footprint>,
}

/// One client request, fully normalized and validated at construction time
/// (band selector, nodata fallback chain, interpolation) so that everything
/// downstream can assume well-formed parameters.
#[derive(Debug, Clone)]
pub struct QueryInfos {
    /// Submission order within this raster's `QueriesHandler`. Used only for
    /// tie-breaking priority keys, never for equality.
    pub sequence: u64,
    pub raster: RasterUid,
    pub list_of_produce_fp: Vec<Footprint>,
    pub list_of_cache_fp: Vec<Footprint>,
    /// Parallel to `list_of_cache_fp`: the smallest produce-index that
    /// depends on each cache tile. Monotone non-decreasing (invariant 3/7).
    pub min_prod_idx_per_cache_fp: Vec<usize>,
    pub band_ids: Vec<u32>,
    pub is_flat: bool,
    pub dst_nodata: f64,
    pub interpolation: Interpolation,
    pub max_queue_size: usize,
    pub cache_computation: Option<CacheComputation>,
    /// `cache_fp -> min_prod_idx_per_cache_fp[i]`, precomputed so
    /// `ComputationGate` can look up a tile's urgency without a linear scan
    /// of `list_of_cache_fp` on every admission check.
    min_prod_idx_by_cache_fp: HashMap<Footprint, usize>,
}

impl QueryInfos {
    /// Builds and validates a query against a raster descriptor, reproducing
    /// the normalization order `AProxyRaster::get_data` uses: bands first
    /// (fixing flat-vs-stacked shape), then the nodata fallback chain
    /// (explicit value, else the raster's own nodata, else zero), then
    /// interpolation validated against the resampling kernel set — and, only
    /// once interpolation is known, the none/misaligned check.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sequence: u64,
        raster: &RasterDescriptor,
        max_queue_size: usize,
        produce_fps: Vec<Footprint>,
        band_selector: BandId,
        dst_nodata: Option<f64>,
        interpolation: Interpolation,
    ) -> Result<Self> {
        if max_queue_size == 0 {
            return Err(SchedulerError::UserInput(
                "max_queue_size must be greater than zero".to_string(),
            ));
        }
        if produce_fps.is_empty() {
            return Err(SchedulerError::UserInput(
                "a query must request at least one produce footprint".to_string(),
            ));
        }

        let (band_ids, is_flat) = band_selector.normalize(
            raster.band_schema.band_count(),
            raster.band_schema.shared_band_id(),
        )?;

        let dst_nodata = dst_nodata
            .or_else(|| raster.band_schema.nodata_of(1))
            .unwrap_or(0.0);

        if interpolation.is_none() {
            for fp in &produce_fps {
                if !fp.on_same_grid(&raster.fp_working) {
                    return Err(SchedulerError::UserInput(format!(
                        "produce footprint not aligned with the raster grid and \
                         interpolation=none forbids resampling: {fp:?}"
                    )));
                }
            }
        }

        let mut cache_fp_order: Vec<Footprint> = Vec::new();
        let mut min_prod_idx: HashMap<Footprint, usize> = HashMap::new();
        for (prod_id, produce_fp) in produce_fps.iter().enumerate() {
            for cache_fp in raster.cache_fps_of_produce_fp(produce_fp) {
                min_prod_idx.entry(cache_fp.clone()).or_insert_with(|| {
                    cache_fp_order.push(cache_fp.clone());
                    prod_id
                });
            }
        }
        // `min_prod_idx_per_cache_fp` must be monotone non-decreasing evaluated
        // in `list_of_cache_fp` order; since each cache tile's minimum is the
        // first produce index that touches it and produce indices are visited
        // in increasing order above, the order of first-touch already satisfies
        // this (no cache tile inserted later can have a smaller minimum).
        let min_prod_idx_per_cache_fp: Vec<usize> = cache_fp_order
            .iter()
            .map(|fp| min_prod_idx[fp])
            .collect();

        // Actual on-disk existence is checked later by `CacheSupervisor`; at
        // construction time this just carries the full candidate set, which
        // `CacheSupervisor` narrows down to the tiles actually missing.
        let cache_computation = if cache_fp_order.is_empty() {
            None
        } else {
            Some(CacheComputation {
                list_of_cache_fp: cache_fp_order.clone(),
            })
        };

        let min_prod_idx_by_cache_fp = cache_fp_order
            .iter()
            .copied()
            .zip(min_prod_idx_per_cache_fp.iter().copied())
            .collect();

        Ok(Self {
            sequence,
            raster: raster.uid,
            list_of_produce_fp: produce_fps,
            list_of_cache_fp: cache_fp_order,
            min_prod_idx_per_cache_fp,
            band_ids,
            is_flat,
            dst_nodata,
            interpolation,
            max_queue_size,
            cache_computation,
            min_prod_idx_by_cache_fp,
        })
    }

    pub fn produce_count(&self) -> usize {
        self.list_of_produce_fp.len()
    }

    /// The smallest produce-index that depends on `cache_fp`. Panics if
    /// `cache_fp` isn't one of this query's own cache tiles, which would be
    /// a caller bug (every caller derives `cache_fp` from `list_of_cache_fp`
    /// or `qi.cache_computation` in the first place).
    pub fn min_prod_idx(&self, cache_fp: &Footprint) -> usize {
        self.min_prod_idx_by_cache_fp[cache_fp]
    }
}

impl PartialEq for QueryInfos {
    fn eq(&self, other: &Self) -> bool {
        self.raster == other.raster
            && self.list_of_produce_fp == other.list_of_produce_fp
            && self.band_ids == other.band_ids
            && self.is_flat == other.is_flat
            && self.dst_nodata.to_bits() == other.dst_nodata.to_bits()
            && self.interpolation == other.interpolation
            && self.max_queue_size == other.max_queue_size
    }
}

impl Eq for QueryInfos {}

impl Hash for QueryInfos {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raster.hash(state);
        self.list_of_produce_fp.hash(state);
        self.band_ids.hash(state);
        self.is_flat.hash(state);
        self.dst_nodata.to_bits().hash(state);
        self.interpolation.hash(state);
        self.max_queue_size.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_model::{BandSchema, Footprint, Grid, MaskKind};

    fn test_raster() -> RasterDescriptor {
        let grid = Grid::new(0.0, 0.0, 1.0, -1.0).unwrap();
        let fp = Footprint::new(grid, 256, 256).unwrap();
        RasterDescriptor::new(
            RasterUid(1),
            BandSchema {
                dtype_name: vec!["f32".to_string()],
                nodata: vec![Some(-9999.0)],
                mask: vec![MaskKind::None],
            },
            fp,
            fp,
            (64, 64),
            (32, 32),
            (16, 16),
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn nodata_falls_back_to_raster_nodata_then_zero() {
        let raster = test_raster();
        let grid = *raster.fp_working.grid();
        let produce_fp = Footprint::new(grid, 32, 32).unwrap();
        let qi = QueryInfos::new(
            0,
            &raster,
            4,
            vec![produce_fp],
            BandId::AllBands,
            None,
            Interpolation::Nearest,
        )
        .unwrap();
        assert_eq!(qi.dst_nodata, -9999.0);
    }

    #[test]
    fn identical_parameters_hash_and_compare_equal() {
        let raster = test_raster();
        let grid = *raster.fp_working.grid();
        let produce_fp = Footprint::new(grid, 32, 32).unwrap();
        let qi_a = QueryInfos::new(
            0,
            &raster,
            4,
            vec![produce_fp.clone()],
            BandId::AllBands,
            None,
            Interpolation::Nearest,
        )
        .unwrap();
        let qi_b = QueryInfos::new(
            1,
            &raster,
            4,
            vec![produce_fp],
            BandId::AllBands,
            None,
            Interpolation::Nearest,
        )
        .unwrap();
        assert_eq!(qi_a, qi_b);
        assert_ne!(qi_a.sequence, qi_b.sequence);
    }

    #[test]
    fn none_interpolation_rejects_misaligned_footprint() {
        let raster = test_raster();
        let misaligned_grid = Grid::new(0.5, 0.5, 1.0, -1.0).unwrap();
        let produce_fp = Footprint::new(misaligned_grid, 32, 32).unwrap();
        let err = QueryInfos::new(
            0,
            &raster,
            4,
            vec![produce_fp],
            BandId::AllBands,
            None,
            Interpolation::None,
        )
        .unwrap_err();
        assert!(matches!(err, SchedulerError::UserInput(_)));
    }
}
