//! `ProductionGate`: converts output-channel backpressure into an admission
//! policy over produce-index work, per `spec.md` §4.3.

use std::collections::HashMap;
use std::sync::Arc;

use crate::actor::{Actor, HandlerResult};
use crate::address::Address;
use crate::message::{Body, Message};
use crate::query_info::QueryInfos;

struct Record {
    pulled_count: usize,
    allowed_count: usize,
}

#[derive(Default)]
pub struct ProductionGate {
    records: HashMap<u64, Record>,
}

impl ProductionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits every produce-index still within `pulled_count +
    /// max_queue_size` that hasn't already been admitted, in order.
    fn admit(&mut self, qi: Arc<QueryInfos>) -> Vec<Message> {
        let produce_count = qi.produce_count();
        let record = self.records.entry(qi.sequence).or_insert(Record {
            pulled_count: 0,
            allowed_count: 0,
        });
        let max_allowed = record.pulled_count + qi.max_queue_size;

        let mut messages = Vec::new();
        while record.allowed_count < produce_count && record.allowed_count < max_allowed {
            messages.push(Message::new(
                Address::bare("Producer"),
                Body::ProduceThisArray {
                    qi: qi.clone(),
                    prod_id: record.allowed_count,
                },
            ));
            record.allowed_count += 1;
        }
        messages
    }
}

impl Actor for ProductionGate {
    fn name(&self) -> &'static str {
        "ProductionGate"
    }

    fn receive(&mut self, body: Body) -> HandlerResult {
        match body {
            Body::MakeThoseArrays { qi } => Ok(self.admit(qi)),
            Body::OutputQueueUpdate { qi, pulled_count } => {
                self.records
                    .entry(qi.sequence)
                    .or_insert(Record {
                        pulled_count: 0,
                        allowed_count: 0,
                    })
                    .pulled_count = pulled_count;
                Ok(self.admit(qi))
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
    use raster_model::{BandId, BandSchema, Footprint, Grid, MaskKind, RasterDescriptor, RasterUid};

    fn qi(max_queue_size: usize, produce_count: usize) -> Arc<QueryInfos> {
        let grid = Grid::new(0.0, 0.0, 1.0, -1.0).unwrap();
        let fp = Footprint::new(grid, 64, 64).unwrap();
        let raster = RasterDescriptor::new(
            RasterUid(1),
            BandSchema {
                dtype_name: vec!["f32".into()],
                nodata: vec![None],
                mask: vec![MaskKind::None],
            },
            fp,
            fp,
            (8, 8),
            (8, 8),
            (8, 8),
            Vec::new(),
        )
        .unwrap();
        let produce_fps = (0..produce_count)
            .map(|i| Footprint::new(Grid::new(i as f64 * 8.0, 0.0, 1.0, -1.0).unwrap(), 8, 8).unwrap())
            .collect();
        Arc::new(
            QueryInfos::new(
                0,
                &raster,
                max_queue_size,
                produce_fps,
                BandId::AllBands,
                None,
                Interpolation::Nearest,
            )
            .unwrap(),
        )
    }

    #[test]
    fn admits_only_up_to_max_queue_size_initially() {
        let mut gate = ProductionGate::new();
        let qi = qi(2, 3);
        let messages = gate.admit(qi);
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn output_queue_update_unlocks_more_admissions() {
        let mut gate = ProductionGate::new();
        let qi = qi(1, 3);
        assert_eq!(gate.admit(qi.clone()).len(), 1);
        assert_eq!(
            gate.receive(Body::OutputQueueUpdate {
                qi: qi.clone(),
                pulled_count: 1,
            })
            .unwrap()
            .len(),
            1
        );
    }

    #[test]
    fn cancellation_drops_the_record() {
        let mut gate = ProductionGate::new();
        let qi = qi(1, 3);
        gate.admit(qi.clone());
        gate.receive(Body::CancelThisQuery { qi: qi.clone() }).unwrap();
        assert!(!gate.records.contains_key(&qi.sequence));
    }
}
