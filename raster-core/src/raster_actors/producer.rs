//! `Producer`: the per-produce-index entry point, deriving the cache tiles a
//! produce footprint needs and handing them to `CacheExtractor`, per
//! `spec.md` §4.7.

use std::sync::Arc;

use raster_model::RasterDescriptor;

use crate::actor::{Actor, HandlerResult};
use crate::address::Address;
use crate::message::{Body, Message};
use crate::query_info::QueryInfos;

pub struct Producer {
    raster: Arc<RasterDescriptor>,
}

impl Producer {
    pub fn new(raster: Arc<RasterDescriptor>) -> Self {
        Self { raster }
    }

    fn handle(&self, qi: Arc<QueryInfos>, prod_id: usize) -> HandlerResult {
        let produce_fp = qi.list_of_produce_fp[prod_id];
        let cache_fps = self.raster.cache_fps_of_produce_fp(&produce_fp);
        Ok(vec![Message::new(
            Address::bare("CacheExtractor"),
            Body::AssembleCacheTiles {
                qi,
                prod_id,
                produce_fp,
                cache_fps,
            },
        )])
    }
}

impl Actor for Producer {
    fn name(&self) -> &'static str {
        "Producer"
    }

    fn receive(&mut self, body: Body) -> HandlerResult {
        match body {
            Body::ProduceThisArray { qi, prod_id } => self.handle(qi, prod_id),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_contracts::interpolation::Interpolation;
    use raster_model::{BandId, BandSchema, Footprint, Grid, MaskKind, RasterUid};

    #[test]
    fn derives_the_covering_cache_tiles_for_a_produce_index() {
        let grid = Grid::new(0.0, 0.0, 1.0, -1.0).unwrap();
        let fp = Footprint::new(grid, 32, 32).unwrap();
        let raster = Arc::new(
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
            .unwrap(),
        );
        let produce_fp = Footprint::new(grid, 16, 16).unwrap();
        let qi = Arc::new(
            QueryInfos::new(0, &raster, 4, vec![produce_fp], BandId::AllBands, None, Interpolation::Nearest).unwrap(),
        );

        let mut producer = Producer::new(raster);
        let messages = producer.receive(Body::ProduceThisArray { qi, prod_id: 0 }).unwrap();
        assert_eq!(messages.len(), 1);
        match &messages[0].body {
            Body::AssembleCacheTiles { cache_fps, .. } => assert_eq!(cache_fps.len(), 1),
            other => panic!("expected AssembleCacheTiles, got {}", other.title()),
        }
    }
}
