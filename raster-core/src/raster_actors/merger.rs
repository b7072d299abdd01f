//! `Merger`: blits a cache tile's compute-tile pieces into one contiguous
//! array and hands it to `Writer`, per `spec.md` §4.7.

use std::sync::Arc;

use raster_model::{Array, Footprint, RasterUid};

use crate::actor::{Actor, HandlerResult};
use crate::address::Address;
use crate::message::{Body, Message, TileArray};

pub struct Merger;

impl Merger {
    pub fn new() -> Self {
        Self
    }

    fn assemble(&self, cache_fp: &Footprint, parts: &[TileArray]) -> Array {
        let (rows, cols) = (cache_fp.shape().1, cache_fp.shape().0);
        let bands = parts.first().map_or(1, |p| p.array.shape.2);
        let mut out = Array::filled((rows, cols, bands), 0.0);

        let (cache_ox, cache_oy) = cache_fp.tl();
        let (pw, ph) = cache_fp.grid().pixel_size();

        for part in parts {
            let (part_ox, part_oy) = part.footprint.tl();
            let col_off = ((part_ox - cache_ox) / pw).round() as i64;
            let row_off = ((part_oy - cache_oy) / ph).round() as i64;
            let (part_cols, part_rows) = part.footprint.shape();

            for r in 0..part_rows as i64 {
                let dst_row = row_off + r;
                if dst_row < 0 || dst_row >= rows as i64 {
                    continue;
                }
                for c in 0..part_cols as i64 {
                    let dst_col = col_off + c;
                    if dst_col < 0 || dst_col >= cols as i64 {
                        continue;
                    }
                    for b in 0..bands {
                        let src_idx = (r as u32 * part_cols + c as u32) * part.array.shape.2 + b.min(part.array.shape.2 - 1);
                        let dst_idx = (dst_row as u32 * cols + dst_col as u32) * bands + b;
                        out.data[dst_idx as usize] = part.array.data[src_idx as usize];
                    }
                }
            }
        }
        out
    }

    fn handle(&self, raster: RasterUid, cache_fp: Footprint, parts: Vec<TileArray>) -> HandlerResult {
        let array = self.assemble(&cache_fp, &parts);
        Ok(vec![Message::new(
            Address::bare("Writer"),
            Body::WriteCacheTile {
                raster,
                cache_fp,
                array: Arc::new(array),
            },
        )])
    }
}

impl Default for Merger {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for Merger {
    fn name(&self) -> &'static str {
        "Merger"
    }

    fn receive(&mut self, body: Body) -> HandlerResult {
        match body {
            Body::ScheduleOneMerge { raster, cache_fp, parts } => self.handle(raster, cache_fp, parts),
            _ => Ok(Vec::new()),
        }
    }
}
