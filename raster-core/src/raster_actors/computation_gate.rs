//! `ComputationGate`: mirrors `ProductionGate` but gates compute-tile
//! admission, using the monotone `min_prod_idx_per_cache_fp` mapping to
//! decide when a cache tile is needed "soon enough" to compute, per
//! `spec.md` §4.5.

use std::collections::HashMap;
use std::sync::Arc;

use raster_model::Footprint;

use crate::actor::{Actor, HandlerResult};
use crate::address::Address;
use crate::message::{Body, Message};
use crate::query_info::QueryInfos;

struct Record {
    pulled_count: usize,
    allowed_count: usize,
    missing_cache_fps: Vec<Footprint>,
}

#[derive(Default)]
pub struct ComputationGate {
    records: HashMap<u64, Record>,
}

impl ComputationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweeps forward from `allowed_count` admitting cache tiles whose
    /// `min_prod_idx` is still within `pulled_count + max_queue_size`,
    /// stopping at the first tile that isn't — correct because the mapping
    /// is monotone non-decreasing along `list_of_cache_fp` (invariant 3/7).
    fn admit(qi: &Arc<QueryInfos>, record: &mut Record) -> Vec<Message> {
        let max_allowed = record.pulled_count + qi.max_queue_size;
        let mut messages = Vec::new();
        while record.allowed_count < record.missing_cache_fps.len() {
            let cache_fp = record.missing_cache_fps[record.allowed_count];
            let prod_idx = qi.min_prod_idx(&cache_fp);
            if prod_idx > max_allowed {
                break;
            }
            messages.push(Message::new(
                Address::bare("Computer"),
                Body::ComputeThisArray {
                    qi: qi.clone(),
                    cache_fp,
                },
            ));
            record.allowed_count += 1;
        }
        messages
    }
}

impl Actor for ComputationGate {
    fn name(&self) -> &'static str {
        "ComputationGate"
    }

    fn receive(&mut self, body: Body) -> HandlerResult {
        match body {
            Body::ComputeThoseCacheFiles {
                qi,
                missing_cache_fps,
            } => {
                // A race where `output_queue_update` arrives before this
                // message already left a record behind with a real
                // `pulled_count`; keep it rather than resetting to zero.
                let pulled_count = self.records.get(&qi.sequence).map_or(0, |r| r.pulled_count);
                let mut record = Record {
                    pulled_count,
                    allowed_count: 0,
                    missing_cache_fps,
                };
                let messages = Self::admit(&qi, &mut record);
                self.records.insert(qi.sequence, record);
                Ok(messages)
            }
            Body::OutputQueueUpdate { qi, pulled_count } => {
                // Lazily create the record if this races ahead of
                // `compute_those_cache_files`; it starts with nothing to
                // admit and catches up once that message arrives.
                let mut record = self.records.remove(&qi.sequence).unwrap_or(Record {
                    pulled_count: 0,
                    allowed_count: 0,
                    missing_cache_fps: Vec::new(),
                });
                record.pulled_count = pulled_count;
                let messages = Self::admit(&qi, &mut record);
                self.records.insert(qi.sequence, record);
                Ok(messages)
            }
            Body::CancelThisQuery { qi } => {
                self.records.remove(&qi.sequence);
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_contracts::interpolation::Interpolation;
    use raster_model::{BandId, BandSchema, Grid, MaskKind, RasterDescriptor, RasterUid};

    fn raster_with_many_cache_tiles() -> RasterDescriptor {
        let grid = Grid::new(0.0, 0.0, 1.0, -1.0).unwrap();
        let fp = Footprint::new(grid, 64, 64).unwrap();
        RasterDescriptor::new(
            RasterUid(1),
            BandSchema {
                dtype_name: vec!["f32".into()],
                nodata: vec![None],
                mask: vec![MaskKind::None],
            },
            fp,
            fp,
            (16, 16),
            (16, 16),
            (16, 16),
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn admits_only_tiles_within_the_pulled_window() {
        let raster = raster_with_many_cache_tiles();
        // 4 produce footprints, each its own 16x16 cache tile, one-to-one.
        let produce_fps = (0..4)
            .map(|i| Footprint::new(Grid::new(i as f64 * 16.0, 0.0, 1.0, -1.0).unwrap(), 16, 16).unwrap())
            .collect::<Vec<_>>();
        let qi = QueryInfos::new(
            0,
            &raster,
            2,
            produce_fps,
            BandId::AllBands,
            None,
            Interpolation::Nearest,
        )
        .unwrap();
        let missing = qi.list_of_cache_fp.clone();

        let mut gate = ComputationGate::new();
        let messages = gate
            .receive(Body::ComputeThoseCacheFiles {
                qi: Arc::new(qi),
                missing_cache_fps: missing,
            })
            .unwrap();
        // max_queue_size=2 -> only cache tiles whose min_prod_idx <= 2 admitted.
        assert_eq!(messages.len(), 3);
    }
}
