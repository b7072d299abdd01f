//! Immutable raster descriptors and the pure tile-partitioning functions the
//! scheduler drives everything else from (`spec.md` §3).

use std::collections::HashMap;

use crate::error::{ModelError, Result};
use crate::footprint::{Footprint, Grid};

/// Identifies a raster within a scheduler. Mirrors the `id(self)`-style
/// numeric raster identity the original Python implementation addresses
/// actor groups by (`/Raster{uid}/...`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RasterUid(pub u64);

/// Per-band mask strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaskKind {
    None,
    PerDataset,
    PerBand,
}

/// Per-band dtype, nodata and mask-kind schema.
#[derive(Clone, Debug, PartialEq)]
pub struct BandSchema {
    pub dtype_name: Vec<String>,
    pub nodata: Vec<Option<f64>>,
    pub mask: Vec<MaskKind>,
}

impl BandSchema {
    pub fn band_count(&self) -> u32 {
        self.dtype_name.len() as u32
    }

    /// First band index (1-based) whose mask kind is `PerDataset`, if any —
    /// the "shared mask band" referenced by `BandId::SharedMask`.
    pub fn shared_band_id(&self) -> Option<u32> {
        self.mask
            .iter()
            .position(|k| *k == MaskKind::PerDataset)
            .map(|i| (i + 1) as u32)
    }

    pub fn nodata_of(&self, band: u32) -> Option<f64> {
        self.nodata.get((band - 1) as usize).copied().flatten()
    }
}

/// Immutable descriptor of one raster source: band schema, stored footprint,
/// an optional stored-to-working translation, and the three tile grids the
/// scheduler partitions work into.
#[derive(Clone, Debug)]
pub struct RasterDescriptor {
    pub uid: RasterUid,
    pub band_schema: BandSchema,
    pub fp_stored: Footprint,
    /// Working-space footprint. Equal to `fp_stored` unless a
    /// stored-to-working transform is configured.
    pub fp_working: Footprint,
    /// Names of upstream rasters whose arrays feed `compute`.
    pub primitives: Vec<String>,
    produce_tile: (u32, u32),
    cache_tile: (u32, u32),
    compute_tile: (u32, u32),
}

impl RasterDescriptor {
    pub fn new(
        uid: RasterUid,
        band_schema: BandSchema,
        fp_stored: Footprint,
        fp_working: Footprint,
        produce_tile: (u32, u32),
        cache_tile: (u32, u32),
        compute_tile: (u32, u32),
        primitives: Vec<String>,
    ) -> Result<Self> {
        if produce_tile.0 == 0 || produce_tile.1 == 0 {
            return Err(ModelError::EmptyShape {
                width: produce_tile.0,
                height: produce_tile.1,
            });
        }
        if cache_tile.0 == 0 || cache_tile.1 == 0 {
            return Err(ModelError::EmptyShape {
                width: cache_tile.0,
                height: cache_tile.1,
            });
        }
        if compute_tile.0 == 0 || compute_tile.1 == 0 {
            return Err(ModelError::EmptyShape {
                width: compute_tile.0,
                height: compute_tile.1,
            });
        }
        Ok(Self {
            uid,
            band_schema,
            fp_stored,
            fp_working,
            primitives,
            produce_tile,
            cache_tile,
            compute_tile,
        })
    }

    fn grid(&self) -> &Grid {
        self.fp_working.grid()
    }

    fn tile_at(&self, tile_shape: (u32, u32), tx: i64, ty: i64) -> Footprint {
        let (ox, oy) = self.grid().origin();
        let (pw, ph) = self.grid().pixel_size();
        let x = ox + pw * (tx as f64) * f64::from(tile_shape.0);
        let y = oy + ph * (ty as f64) * f64::from(tile_shape.1);
        let grid = Grid::new(x, y, pw, ph).expect("nonzero pixel size inherited from working grid");
        Footprint::new(grid, tile_shape.0, tile_shape.1)
            .expect("nonzero tile shape validated at construction")
    }

    /// Tiles of `tile_shape`, indexed in this raster's own working grid
    /// (not `fp`'s), that cover `fp`. `fp` may come from a different grid
    /// partition of the same raster (e.g. a produce footprint being
    /// decomposed into cache tiles) so indices must always be computed
    /// relative to the raster's working origin, never to `fp`'s own corner.
    fn tiles_covering(&self, fp: &Footprint, tile_shape: (u32, u32)) -> Vec<Footprint> {
        let (ox, oy) = self.grid().origin();
        let (pw, ph) = self.grid().pixel_size();
        let (fx, fy) = fp.tl();
        let (fw, fh) = fp.shape();

        let px0 = (fx - ox) / pw;
        let py0 = (fy - oy) / ph;
        let px1 = px0 + f64::from(fw);
        let py1 = py0 + f64::from(fh);

        let x0 = (px0 / f64::from(tile_shape.0)).floor() as i64;
        let x1 = ((px1 - 1.0) / f64::from(tile_shape.0)).floor() as i64 + 1;
        let y0 = (py0 / f64::from(tile_shape.1)).floor() as i64;
        let y1 = ((py1 - 1.0) / f64::from(tile_shape.1)).floor() as i64 + 1;

        let mut out = Vec::with_capacity(((x1 - x0).max(0) * (y1 - y0).max(0)) as usize);
        for ty in y0..y1 {
            for tx in x0..x1 {
                out.push(self.tile_at(tile_shape, tx, ty));
            }
        }
        out
    }

    /// The cache tiles a produce footprint needs.
    pub fn cache_fps_of_produce_fp(&self, produce_fp: &Footprint) -> Vec<Footprint> {
        self.tiles_covering(produce_fp, self.cache_tile)
    }

    /// The compute tiles that together make up one cache tile.
    pub fn compute_fps_of_cache_fp(&self, cache_fp: &Footprint) -> Vec<Footprint> {
        self.tiles_covering(cache_fp, self.compute_tile)
    }

    /// The cache tile(s) a compute tile contributes to. Usually exactly one:
    /// compute tiles are sized so they nest inside a single cache tile, but a
    /// compute tile straddling a cache-tile boundary (a valid but unusual
    /// raster configuration) legitimately contributes to more than one.
    pub fn cache_fps_of_compute_fp(&self, compute_fp: &Footprint) -> Vec<Footprint> {
        self.tiles_covering(compute_fp, self.cache_tile)
    }

    /// Per-primitive footprint needed to compute `compute_fp`. Assumes (as
    /// `spec.md` §1 permits — primitive remap arithmetic is out of scope)
    /// that every primitive shares the working grid, so the footprint
    /// requested from each primitive is `compute_fp` itself.
    pub fn to_collect_of_compute_fp(&self, compute_fp: &Footprint) -> HashMap<String, Footprint> {
        self.primitives
            .iter()
            .map(|name| (name.clone(), *compute_fp))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> RasterDescriptor {
        let grid = Grid::new(0.0, 0.0, 1.0, -1.0).unwrap();
        let fp = Footprint::new(grid, 40, 40).unwrap();
        RasterDescriptor::new(
            RasterUid(1),
            BandSchema {
                dtype_name: vec!["u8".into()],
                nodata: vec![Some(0.0)],
                mask: vec![MaskKind::None],
            },
            fp,
            fp,
            (10, 10),
            (20, 20),
            (10, 10),
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn produce_fp_maps_to_expected_cache_tile_count() {
        let raster = descriptor();
        let grid = Grid::new(0.0, 0.0, 1.0, -1.0).unwrap();
        let produce_fp = Footprint::new(grid, 30, 30).unwrap();
        let cache_fps = raster.cache_fps_of_produce_fp(&produce_fp);
        // 30x30 px over 20x20 cache tiles -> spans tiles 0..2 each axis = 4 tiles
        assert_eq!(cache_fps.len(), 4);
    }

    #[test]
    fn cache_fp_decomposes_into_compute_tiles() {
        let raster = descriptor();
        let cache_fp = raster.tile_at((20, 20), 0, 0);
        let compute_fps = raster.compute_fps_of_cache_fp(&cache_fp);
        assert_eq!(compute_fps.len(), 4); // 20x20 / 10x10
    }

    #[test]
    fn compute_fp_maps_back_to_single_cache_tile() {
        let raster = descriptor();
        let cache_fp = raster.tile_at((20, 20), 1, 0);
        let compute_fps = raster.compute_fps_of_cache_fp(&cache_fp);
        for compute_fp in &compute_fps {
            let back = raster.cache_fps_of_compute_fp(compute_fp);
            assert_eq!(back, vec![cache_fp]);
        }
    }
}
