//! Axis-aligned raster windows.
//!
//! Real resampling/geometry arithmetic is out of scope for this crate (see
//! `spec.md` §1); what's implemented here is the minimum grid algebra the
//! scheduler needs to partition a raster into produce/cache/compute tiles and
//! to decide whether two footprints share a grid (and can therefore be read
//! without a remap) or need `Resampler` to interpolate between them.

use std::hash::{Hash, Hasher};

use crate::error::{ModelError, Result};

/// An affine grid: pixel `(0, 0)`'s top-left corner in world space, plus the
/// signed pixel size along each axis. Exact-equality hashing is implemented
/// via `f64::to_bits` so that two grids built from identical arithmetic
/// compare and hash equal, per `spec.md` §3's "hashable by exact equality of
/// their normalized parameters".
#[derive(Clone, Copy, Debug)]
pub struct Grid {
    origin_x: f64,
    origin_y: f64,
    pixel_width: f64,
    pixel_height: f64,
}

impl Grid {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Result<Self> {
        if pixel_width == 0.0 || pixel_height == 0.0 {
            return Err(ModelError::EmptyShape { width: 0, height: 0 });
        }
        Ok(Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        })
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.origin_x, self.origin_y)
    }

    pub fn pixel_size(&self) -> (f64, f64) {
        (self.pixel_width, self.pixel_height)
    }

    /// True iff `other` is a pure-translation, integer-pixel-multiple of this
    /// grid: same pixel size, and its origin lands exactly on one of this
    /// grid's pixel corners. Footprints on the same grid never require
    /// interpolation between each other.
    pub fn is_aligned_with(&self, other: &Grid) -> bool {
        if self.pixel_width != other.pixel_width || self.pixel_height != other.pixel_height {
            return false;
        }
        let dx = (other.origin_x - self.origin_x) / self.pixel_width;
        let dy = (other.origin_y - self.origin_y) / self.pixel_height;
        is_close_to_integer(dx) && is_close_to_integer(dy)
    }

    fn bit_key(&self) -> (u64, u64, u64, u64) {
        (
            self.origin_x.to_bits(),
            self.origin_y.to_bits(),
            self.pixel_width.to_bits(),
            self.pixel_height.to_bits(),
        )
    }
}

fn is_close_to_integer(v: f64) -> bool {
    (v - v.round()).abs() < 1e-6
}

impl PartialEq for Grid {
    fn eq(&self, other: &Self) -> bool {
        self.bit_key() == other.bit_key()
    }
}
impl Eq for Grid {}
impl Hash for Grid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bit_key().hash(state);
    }
}

/// An axis-aligned raster window: an affine grid plus an integer pixel shape.
///
/// Two footprints share identity iff their grid and shape coincide
/// (`spec.md` §3); `Footprint` derives its `Eq`/`Hash` from exactly that pair
/// so it can be used as a `HashMap`/`HashSet` key for cache/compute tile
/// deduplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Footprint {
    grid: Grid,
    width: u32,
    height: u32,
}

impl Footprint {
    pub fn new(grid: Grid, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ModelError::EmptyShape { width, height });
        }
        Ok(Self {
            grid,
            width,
            height,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn shape(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn tl(&self) -> (f64, f64) {
        self.grid.origin()
    }

    /// Bottom-right corner of the footprint, in world space.
    pub fn br(&self) -> (f64, f64) {
        let (ox, oy) = self.grid.origin();
        let (pw, ph) = self.grid.pixel_size();
        (
            ox + pw * f64::from(self.width),
            oy + ph * f64::from(self.height),
        )
    }

    /// True iff reading `self` in terms of `other`'s grid requires no
    /// resampling: `other`'s grid must be pixel-aligned with `self`'s and
    /// `self` must fall on whole-pixel boundaries of `other`.
    pub fn on_same_grid(&self, other: &Footprint) -> bool {
        self.grid.is_aligned_with(&other.grid)
    }

    /// Move this footprint so its top-left corner is `(x, y)`, keeping grid
    /// spacing and shape. Used when deriving a produce footprint's covering
    /// cache/compute tiles.
    pub fn move_to(&self, x: f64, y: f64) -> Self {
        let (pw, ph) = self.grid.pixel_size();
        Self {
            grid: Grid {
                origin_x: x,
                origin_y: y,
                pixel_width: pw,
                pixel_height: ph,
            },
            width: self.width,
            height: self.height,
        }
    }

    /// Tile indices `[x0, x1) x [y0, y1)` this footprint spans when laid over
    /// a grid of `tile_width x tile_height`-pixel tiles rooted at `origin`,
    /// the grid's own origin. Pure integer tiling arithmetic; the geometric
    /// precision (non-square pixels, rotation) that a full GIS stack would
    /// add is explicitly out of scope (`spec.md` §1).
    pub fn tile_span(&self, tile_width: u32, tile_height: u32) -> TileSpan {
        let (ox, oy) = self.grid.origin();
        let (pw, ph) = self.grid.pixel_size();
        let px0 = (self.tl().0 - ox) / pw;
        let py0 = (self.tl().1 - oy) / ph;
        let px1 = px0 + f64::from(self.width);
        let py1 = py0 + f64::from(self.height);

        let x0 = (px0 / f64::from(tile_width)).floor() as i64;
        let x1 = ((px1 - 1.0) / f64::from(tile_width)).floor() as i64 + 1;
        let y0 = (py0 / f64::from(tile_height)).floor() as i64;
        let y1 = ((py1 - 1.0) / f64::from(tile_height)).floor() as i64 + 1;
        TileSpan { x0, x1, y0, y1 }
    }
}

/// Half-open `[x0, x1) x [y0, y1)` range of tile indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileSpan {
    pub x0: i64,
    pub x1: i64,
    pub y0: i64,
    pub y1: i64,
}

impl TileSpan {
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        (self.y0..self.y1).flat_map(move |y| (self.x0..self.x1).map(move |x| (x, y)))
    }

    pub fn count(&self) -> usize {
        ((self.x1 - self.x0).max(0) * (self.y1 - self.y0).max(0)) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(ox: f64, oy: f64, p: f64) -> Grid {
        Grid::new(ox, oy, p, -p).unwrap()
    }

    #[test]
    fn identical_footprints_are_equal_and_hash_equal() {
        let a = Footprint::new(grid(0.0, 100.0, 10.0), 5, 5).unwrap();
        let b = Footprint::new(grid(0.0, 100.0, 10.0), 5, 5).unwrap();
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn differing_shape_breaks_identity() {
        let a = Footprint::new(grid(0.0, 100.0, 10.0), 5, 5).unwrap();
        let b = Footprint::new(grid(0.0, 100.0, 10.0), 6, 5).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn aligned_grids_detected() {
        let a = Footprint::new(grid(0.0, 100.0, 10.0), 10, 10).unwrap();
        let b = Footprint::new(grid(20.0, 80.0, 10.0), 2, 2).unwrap();
        assert!(a.on_same_grid(&b));

        let c = Footprint::new(grid(5.0, 100.0, 10.0), 2, 2).unwrap();
        assert!(!a.on_same_grid(&c));
    }

    #[test]
    fn tile_span_covers_exact_multiple() {
        let fp = Footprint::new(grid(0.0, 100.0, 10.0), 20, 20).unwrap();
        let span = fp.tile_span(10, 10);
        assert_eq!(span.count(), 4);
        assert_eq!(span.iter().count(), 4);
    }
}
