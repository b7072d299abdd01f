//! `ComputeAccumulator`: waits for every compute tile a cache tile decomposes
//! into, then hands the completed set to `Merger`, per `spec.md` §4.7.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use raster_model::{Footprint, RasterDescriptor};

use crate::actor::{Actor, HandlerResult};
use crate::address::Address;
use crate::message::{Body, Message, TileArray};

struct Record {
    missing: HashSet<Footprint>,
    parts: Vec<TileArray>,
}

/// Keyed by cache tile rather than by `qi`: the same cache tile can be
/// needed by several concurrent queries, and this accumulator only cares
/// about the compute tiles that feed it, never about who asked for it.
pub struct ComputeAccumulator {
    raster: Arc<RasterDescriptor>,
    records: HashMap<Footprint, Record>,
}

impl ComputeAccumulator {
    pub fn new(raster: Arc<RasterDescriptor>) -> Self {
        Self {
            raster,
            records: HashMap::new(),
        }
    }

    fn handle_done_one_compute(
        &mut self,
        compute_fp: Footprint,
        array: Arc<raster_model::Array>,
    ) -> HandlerResult {
        let mut messages = Vec::new();
        for cache_fp in self.raster.cache_fps_of_compute_fp(&compute_fp) {
            if !self.records.contains_key(&cache_fp) {
                let missing = self.raster.compute_fps_of_cache_fp(&cache_fp).into_iter().collect();
                self.records.insert(
                    cache_fp,
                    Record {
                        missing,
                        parts: Vec::new(),
                    },
                );
            }
            let record = self.records.get_mut(&cache_fp).unwrap();
            if !record.missing.remove(&compute_fp) {
                // Already accounted for (a compute tile feeding two cache
                // tiles reports once per cache tile via the outer loop, not
                // once per compute tile).
                continue;
            }
            record.parts.push(TileArray {
                footprint: compute_fp,
                array: array.clone(),
            });
            if record.missing.is_empty() {
                let record = self.records.remove(&cache_fp).unwrap();
                messages.push(Message::new(
                    Address::bare("Merger"),
                    Body::ScheduleOneMerge {
                        raster: self.raster.uid,
                        cache_fp,
                        parts: record.parts,
                    },
                ));
            }
        }
        Ok(messages)
    }
}

impl Actor for ComputeAccumulator {
    fn name(&self) -> &'static str {
        "ComputeAccumulator"
    }

    fn receive(&mut self, body: Body) -> HandlerResult {
        match body {
            Body::DoneOneCompute { compute_fp, array, .. } => self.handle_done_one_compute(compute_fp, array),
            // Keyed by cache tile, shared across every query, same as
            // `Computer`: nothing here is `qi`-scoped for cancellation to drop.
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_model::{Array, BandSchema, Grid, MaskKind, RasterUid};

    fn raster() -> Arc<RasterDescriptor> {
        let grid = Grid::new(0.0, 0.0, 1.0, -1.0).unwrap();
        let fp = Footprint::new(grid, 40, 40).unwrap();
        Arc::new(
            RasterDescriptor::new(
                RasterUid(1),
                BandSchema {
                    dtype_name: vec!["f32".into()],
                    nodata: vec![None],
                    mask: vec![MaskKind::None],
                },
                fp,
                fp,
                (20, 20),
                (20, 20),
                (10, 10),
                Vec::new(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn merges_only_once_every_compute_tile_has_reported() {
        let raster = raster();
        let cache_fp = Footprint::new(Grid::new(0.0, 0.0, 1.0, -1.0).unwrap(), 20, 20).unwrap();
        let compute_fps = raster.compute_fps_of_cache_fp(&cache_fp);
        assert_eq!(compute_fps.len(), 4);

        let mut accumulator = ComputeAccumulator::new(raster);
        let mut emitted = Vec::new();
        for (i, compute_fp) in compute_fps.iter().enumerate() {
            let array = Arc::new(Array::filled((10, 10, 1), i as f32));
            let messages = accumulator
                .receive(Body::DoneOneCompute {
                    raster: RasterUid(1),
                    compute_fp: *compute_fp,
                    array,
                })
                .unwrap();
            emitted.extend(messages);
        }
        assert_eq!(emitted.len(), 1);
        match &emitted[0].body {
            Body::ScheduleOneMerge { parts, .. } => assert_eq!(parts.len(), 4),
            _ => panic!("expected ScheduleOneMerge"),
        }
    }
}
