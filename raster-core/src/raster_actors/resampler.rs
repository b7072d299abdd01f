//! `Resampler`: composes a produce-footprint array from its covering cache
//! tiles on the resample pool, per `spec.md` §4.7/§4.8. Stateless across
//! calls — each `(qi, prod_id)` is resampled independently, so unlike
//! `Computer` there is nothing here for `CancelThisQuery` to drop.

use std::sync::Arc;

use raster_contracts::resample_fn::ResampleFn;
use raster_model::Footprint;

use crate::actor::{Actor, HandlerResult};
use crate::address::Address;
use crate::global_priorities::SharedPriorities;
use crate::message::{Body, Message, TileArray};
use crate::pool::SharedPool;
use crate::query_info::QueryInfos;
use crate::rayon_pool::RayonPool;

pub struct Resampler {
    resample_fn: Arc<dyn ResampleFn>,
    priorities: SharedPriorities,
    pool: SharedPool<RayonPool>,
}

impl Resampler {
    pub fn new(resample_fn: Arc<dyn ResampleFn>, priorities: SharedPriorities, pool: SharedPool<RayonPool>) -> Self {
        Self {
            resample_fn,
            priorities,
            pool,
        }
    }

    fn handle(
        &self,
        qi: Arc<QueryInfos>,
        prod_id: usize,
        produce_fp: Footprint,
        tiles: Vec<TileArray>,
    ) -> HandlerResult {
        let priority = self.priorities.lock().priority_key(qi.raster, qi.sequence, prod_id);
        let resample_fn = self.resample_fn.clone();
        let bands = qi.band_ids.clone();
        let interpolation = qi.interpolation;
        let dst_nodata = qi.dst_nodata;
        let qi_for_completion = qi.clone();

        let callback: crate::pool::WaiterCallback<RayonPool> = Box::new(move |pool| {
            use raster_contracts::pool::WorkerPool;
            let pairs: Vec<(Footprint, Arc<raster_model::Array>)> =
                tiles.into_iter().map(|t| (t.footprint, t.array)).collect();
            let handle = pool.spawn(move || resample_fn.resample(&pairs, &produce_fp, &bands, interpolation, dst_nodata));

            let completion: crate::pool::Completion = Box::new(move |result| match result {
                Ok(array) => vec![Message::new(
                    Address::bare("QueriesHandler"),
                    Body::MadeThisArray {
                        qi: qi_for_completion,
                        prod_id,
                        array: Arc::new(array),
                    },
                )],
                Err(err) => {
                    tracing::warn!(%err, prod_id, "resample task failed");
                    vec![Message::new(
                        Address::bare("QueriesHandler"),
                        Body::CancelThisQuery { qi: qi_for_completion },
                    )]
                }
            });
            (Some((handle, completion)), Vec::new())
        });

        self.pool.lock().push_waiter(priority, callback);
        Ok(Vec::new())
    }
}

impl Actor for Resampler {
    fn name(&self) -> &'static str {
        "Resampler"
    }

    fn receive(&mut self, body: Body) -> HandlerResult {
        match body {
            Body::ResampleThisArray { qi, prod_id, produce_fp, tiles } => self.handle(qi, prod_id, produce_fp, tiles),
            _ => Ok(Vec::new()),
        }
    }
}
