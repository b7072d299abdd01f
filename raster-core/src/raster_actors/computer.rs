//! `Computer`: pulls primitive data, deduplicates compute work across every
//! query of a raster, and submits compute tasks to the compute pool, per
//! `spec.md` §4.6.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use raster_contracts::compute_fn::ComputeFn;
use raster_contracts::primitive_source::PrimitiveSource;
use raster_model::{Array, Footprint, RasterDescriptor};

use crate::actor::{Actor, HandlerResult};
use crate::address::Address;
use crate::error::SchedulerError;
use crate::global_priorities::SharedPriorities;
use crate::message::{Body, Message};
use crate::pool::SharedPool;
use crate::query_info::QueryInfos;
use crate::rayon_pool::RayonPool;

/// Per-compute-tile dedup state, shared across every query of a raster —
/// `spec.md` invariant 4: submitted to a pool at most once, transitions are
/// a prefix of `stand_by -> working -> computed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeStatus {
    StandBy,
    Working,
    Computed,
}

type StatusMap = Arc<Mutex<HashMap<Footprint, ComputeStatus>>>;

/// Queries that deduped against a tile already `Working` when they arrived,
/// parked here so a compute failure can cancel them too instead of leaving
/// them to hang with no delivery and no failure record.
type WaiterMap = Arc<Mutex<HashMap<Footprint, Vec<Arc<QueryInfos>>>>>;

pub struct Computer {
    raster: Arc<RasterDescriptor>,
    primitives: HashMap<String, Arc<dyn PrimitiveSource>>,
    compute_fn: Arc<dyn ComputeFn>,
    priorities: SharedPriorities,
    pool: SharedPool<RayonPool>,
    status: StatusMap,
    waiters: WaiterMap,
}

impl Computer {
    pub fn new(
        raster: Arc<RasterDescriptor>,
        primitives: HashMap<String, Arc<dyn PrimitiveSource>>,
        compute_fn: Arc<dyn ComputeFn>,
        priorities: SharedPriorities,
        pool: SharedPool<RayonPool>,
    ) -> Self {
        Self {
            raster,
            primitives,
            compute_fn,
            priorities,
            pool,
            status: Arc::new(Mutex::new(HashMap::new())),
            waiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Reads every primitive's array set for `compute_fp` up front. The
    /// original streams these through a bounded, prefilled per-primitive
    /// channel so a primitive backed by another live scheduler can produce
    /// them asynchronously; a `PrimitiveSource` here is specified as a
    /// synchronous, already-blocking read (`spec.md` §6), so the channel
    /// collapses to this one eager read with nothing left to stream.
    fn collect_primitive_arrays(
        &self,
        compute_fp: &Footprint,
        bands: &[u32],
    ) -> crate::error::Result<HashMap<String, Vec<Array>>> {
        use raster_model::BandId;
        let to_collect = self.raster.to_collect_of_compute_fp(compute_fp);
        let band_selectors: Vec<BandId> = bands.iter().map(|b| BandId::Band(*b)).collect();
        let mut out = HashMap::with_capacity(to_collect.len());
        for (name, fp) in to_collect {
            let source = self.primitives.get(&name).ok_or_else(|| {
                SchedulerError::Internal(format!("no primitive source registered for `{name}`"))
            })?;
            let arrays = source.read(&fp, &band_selectors)?;
            out.insert(name, arrays);
        }
        Ok(out)
    }

    fn handle_compute_this_array(&self, qi: Arc<QueryInfos>, cache_fp: Footprint) -> HandlerResult {
        for compute_fp in self.raster.compute_fps_of_cache_fp(&cache_fp) {
            let primitive_arrays = self.collect_primitive_arrays(&compute_fp, &qi.band_ids)?;
            let priority = self
                .priorities
                .lock()
                .priority_key(qi.raster, qi.sequence, qi.min_prod_idx(&cache_fp));

            let compute_fn = self.compute_fn.clone();
            let status = self.status.clone();
            let waiters = self.waiters.clone();
            let bands = qi.band_ids.clone();
            let qi_for_callback = qi.clone();
            let submit_compute_fp = compute_fp;

            let callback: crate::pool::WaiterCallback<RayonPool> = Box::new(move |pool| {
                let mut guard = status.lock();
                let current = *guard.entry(submit_compute_fp).or_insert(ComputeStatus::StandBy);
                if current != ComputeStatus::StandBy {
                    // Another waiter for the same tile already claimed it;
                    // the primitive arrays collected above are simply
                    // dropped here, mirroring the original's "pull and
                    // discard" no-op path. Park this query so a failure on
                    // the claiming attempt can cancel it too.
                    drop(guard);
                    waiters.lock().entry(submit_compute_fp).or_default().push(qi_for_callback.clone());
                    return (None, Vec::new());
                }
                guard.insert(submit_compute_fp, ComputeStatus::Working);
                drop(guard);

                use raster_contracts::pool::WorkerPool;
                let handle = pool.spawn(move || compute_fn.compute(&submit_compute_fp, &bands, &primitive_arrays));

                let status_for_completion = status.clone();
                let waiters_for_completion = waiters.clone();
                let completion: crate::pool::Completion = Box::new(move |result| match result {
                    Ok(array) => {
                        status_for_completion.lock().insert(submit_compute_fp, ComputeStatus::Computed);
                        waiters_for_completion.lock().remove(&submit_compute_fp);
                        vec![Message::new(
                            Address::bare("ComputeAccumulator"),
                            Body::DoneOneCompute {
                                raster: qi_for_callback.raster,
                                compute_fp: submit_compute_fp,
                                array: Arc::new(array),
                            },
                        )]
                    }
                    Err(err) => {
                        tracing::warn!(compute_fp = ?submit_compute_fp, %err, "compute task failed");
                        // Un-claim the tile so a later query can retry it
                        // instead of finding it stuck `Working` forever, and
                        // cancel every query that deduped against this
                        // attempt, not just the one that submitted it.
                        status_for_completion.lock().remove(&submit_compute_fp);
                        let mut failed = vec![qi_for_callback.clone()];
                        if let Some(parked) = waiters_for_completion.lock().remove(&submit_compute_fp) {
                            failed.extend(parked);
                        }
                        failed
                            .into_iter()
                            .map(|qi| Message::new(Address::bare("QueriesHandler"), Body::CancelThisQuery { qi }))
                            .collect()
                    }
                });
                (Some((handle, completion)), Vec::new())
            });

            self.pool.lock().push_waiter(priority, callback);
        }
        Ok(Vec::new())
    }
}

impl Actor for Computer {
    fn name(&self) -> &'static str {
        "Computer"
    }

    fn receive(&mut self, body: Body) -> HandlerResult {
        match body {
            Body::ComputeThisArray { qi, cache_fp } => self.handle_compute_this_array(qi, cache_fp),
            // `compute_fps_status` dedups across every live query; there is
            // nothing keyed by `qi` here for cancellation to drop.
            Body::CancelThisQuery { .. } => Ok(Vec::new()),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{PoolActor, PoolTickActor};
    use raster_contracts::error::ContractError;
    use raster_contracts::interpolation::Interpolation;
    use raster_model::{BandId, BandSchema, Grid, MaskKind, RasterUid};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OnesComputeFn {
        calls: Arc<AtomicUsize>,
    }

    impl ComputeFn for OnesComputeFn {
        fn compute(
            &self,
            compute_fp: &Footprint,
            _bands: &[u32],
            _primitive_arrays: &HashMap<String, Vec<Array>>,
        ) -> Result<Array, ContractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (cols, rows) = compute_fp.shape();
            Ok(Array::filled((rows, cols, 1), 1.0))
        }
    }

    fn test_raster() -> Arc<RasterDescriptor> {
        let grid = Grid::new(0.0, 0.0, 1.0, -1.0).unwrap();
        let fp = Footprint::new(grid, 16, 16).unwrap();
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
                (16, 16),
                (16, 16),
                (8, 8),
                Vec::new(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn each_compute_tile_is_submitted_at_most_once() {
        let raster = test_raster();
        let calls = Arc::new(AtomicUsize::new(0));
        let compute_fn = Arc::new(OnesComputeFn { calls: calls.clone() });
        let priorities = Arc::new(Mutex::new(crate::global_priorities::GlobalPrioritiesWatcher::new()));
        let shared_pool = Arc::new(Mutex::new(PoolActor::new("compute", RayonPool::new(), 4)));

        let mut computer = Computer::new(raster.clone(), HashMap::new(), compute_fn, priorities, shared_pool.clone());

        let produce_fp = Footprint::new(*raster.fp_working.grid(), 16, 16).unwrap();
        let qi = Arc::new(
            QueryInfos::new(0, &raster, 4, vec![produce_fp], BandId::AllBands, None, Interpolation::Nearest).unwrap(),
        );
        let cache_fp = raster.fp_working;

        // Two admissions for the same cache tile, as ComputationGate might
        // produce if it swept the same tile twice before either finished.
        computer
            .receive(Body::ComputeThisArray { qi: qi.clone(), cache_fp })
            .unwrap();
        computer
            .receive(Body::ComputeThisArray { qi: qi.clone(), cache_fp })
            .unwrap();

        let mut tick_actor = PoolTickActor::new(shared_pool);
        let mut total = Vec::new();
        for _ in 0..2000 {
            let messages = tick_actor.ext_receive_nothing().unwrap().unwrap();
            total.extend(messages);
            if total.len() >= 4 {
                break;
            }
            std::thread::yield_now();
        }
        // 4 compute tiles (16x16 / 8x8), each submitted exactly once despite
        // the duplicate `ComputeThisArray` dispatch above.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(total.len(), 4);
    }

    struct AlwaysFailComputeFn {
        calls: Arc<AtomicUsize>,
    }

    impl ComputeFn for AlwaysFailComputeFn {
        fn compute(
            &self,
            _compute_fp: &Footprint,
            _bands: &[u32],
            _primitive_arrays: &HashMap<String, Vec<Array>>,
        ) -> Result<Array, ContractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ContractError::PoolTask("synthetic compute failure".into()))
        }
    }

    #[test]
    fn a_failed_compute_resets_the_tile_and_cancels_every_deduped_query() {
        let raster = test_raster();
        let calls = Arc::new(AtomicUsize::new(0));
        let compute_fn = Arc::new(AlwaysFailComputeFn { calls: calls.clone() });
        let priorities = Arc::new(Mutex::new(crate::global_priorities::GlobalPrioritiesWatcher::new()));
        let shared_pool = Arc::new(Mutex::new(PoolActor::new("compute", RayonPool::new(), 8)));
        let mut computer = Computer::new(raster.clone(), HashMap::new(), compute_fn, priorities, shared_pool.clone());

        let produce_fp = Footprint::new(*raster.fp_working.grid(), 16, 16).unwrap();
        let qi_a = Arc::new(
            QueryInfos::new(0, &raster, 4, vec![produce_fp], BandId::AllBands, None, Interpolation::Nearest).unwrap(),
        );
        let qi_b = Arc::new(
            QueryInfos::new(1, &raster, 4, vec![produce_fp], BandId::AllBands, None, Interpolation::Nearest).unwrap(),
        );
        let cache_fp = raster.fp_working;

        // Two concurrent, identical queries asking for the same cache
        // tile — scenario C's dedup path, except this compute attempt
        // fails for every tile.
        computer.receive(Body::ComputeThisArray { qi: qi_a, cache_fp }).unwrap();
        computer.receive(Body::ComputeThisArray { qi: qi_b, cache_fp }).unwrap();

        let mut tick_actor = PoolTickActor::new(shared_pool.clone());
        let mut cancellations = Vec::new();
        for _ in 0..2000 {
            let messages = tick_actor.ext_receive_nothing().unwrap().unwrap();
            cancellations.extend(messages);
            if cancellations.len() >= 8 {
                break;
            }
            std::thread::yield_now();
        }
        // 4 compute tiles, each failing once, cancels both the query that
        // won the race and the one that deduped against it — not just the
        // 4 winners.
        assert_eq!(cancellations.len(), 8);
        for msg in &cancellations {
            match &msg.body {
                Body::CancelThisQuery { qi } => assert!(qi.sequence == 0 || qi.sequence == 1),
                other => panic!("expected CancelThisQuery, got {}", other.title()),
            }
        }

        let attempts_before_retry = calls.load(Ordering::SeqCst);
        assert_eq!(attempts_before_retry, 4);

        // The tile was un-claimed on failure, so a later query for the
        // same cache tile retries compute rather than finding it stuck
        // `Working` forever.
        let qi_c = Arc::new(
            QueryInfos::new(2, &raster, 4, vec![produce_fp], BandId::AllBands, None, Interpolation::Nearest).unwrap(),
        );
        computer.receive(Body::ComputeThisArray { qi: qi_c, cache_fp }).unwrap();
        for _ in 0..2000 {
            let messages = tick_actor.ext_receive_nothing().unwrap().unwrap();
            if !messages.is_empty() {
                break;
            }
            std::thread::yield_now();
        }
        assert_eq!(calls.load(Ordering::SeqCst), attempts_before_retry + 4);
    }
}
