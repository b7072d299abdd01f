//! `QueriesHandler`: the per-raster entry point for external submissions
//! and the only actor a client's output channel is ever written to, per
//! `spec.md` §4.2.

use std::collections::HashMap;
use std::sync::Arc;

use raster_contracts::output_sink::OutputSink;
use raster_model::{Array, RasterUid};
use tracing::{trace, warn};

use crate::actor::{Actor, HandlerResult};
use crate::address::{Address, Group};
use crate::message::{Body, Message};
use crate::query_info::QueryInfos;

/// Every downstream actor that may hold a per-`qi` record and so must be
/// told when a query ends, whether by explicit cancellation or by finishing
/// naturally. `Computer` is deliberately absent: its dedup state
/// (`compute_fps_status`) is keyed by compute tile, never by `qi`.
const DOWNSTREAM_TEARDOWN_TARGETS: &[&str] = &[
    "ProductionGate",
    "CacheSupervisor",
    "ComputationGate",
    "Producer",
    "CacheExtractor",
    "Reader",
];

struct QueryRecord {
    qi: Arc<QueryInfos>,
    output: Arc<dyn OutputSink>,
    produced_count: usize,
    queue_size: usize,
    pending: HashMap<usize, Arc<Array>>,
}

/// Owns the lifetime of every live query against one raster: creation,
/// ordered delivery, and teardown (cancellation or natural completion).
pub struct QueriesHandler {
    raster: RasterUid,
    queries: HashMap<u64, QueryRecord>,
    alive: bool,
}

impl QueriesHandler {
    pub fn new(raster: RasterUid) -> Self {
        Self {
            raster,
            queries: HashMap::new(),
            alive: true,
        }
    }

    /// `qi.sequence` is assigned by the caller building it (the facade that
    /// exposes `TopLevel::new_query` owns the per-raster submission
    /// counter) — `QueryInfos` is immutable end to end, so there is no
    /// later point at which this handler could stamp a sequence onto it.
    fn handle_new_query(&mut self, qi: Arc<QueryInfos>, output: Arc<dyn OutputSink>) -> HandlerResult {
        let sequence = qi.sequence;
        let mut messages = vec![
            Message::new(
                Address::full(Group::Global, "GlobalPrioritiesWatcher"),
                Body::RegisterQuery {
                    raster: self.raster,
                    qi: qi.clone(),
                },
            ),
            Message::new(Address::bare("ProductionGate"), Body::MakeThoseArrays { qi: qi.clone() }),
        ];
        if !qi.list_of_cache_fp.is_empty() {
            messages.push(Message::new(
                Address::bare("CacheSupervisor"),
                Body::MakeThoseCacheTilesAvailable { qi: qi.clone() },
            ));
        }

        self.queries.insert(
            sequence,
            QueryRecord {
                qi,
                output,
                produced_count: 0,
                queue_size: 0,
                pending: HashMap::new(),
            },
        );
        Ok(messages)
    }

    fn handle_made_this_array(
        &mut self,
        qi: Arc<QueryInfos>,
        prod_id: usize,
        array: Arc<Array>,
    ) -> HandlerResult {
        let Some(record) = self.queries.get_mut(&qi.sequence) else {
            // The query was already torn down (cancelled or finished); a
            // late arrival from an in-flight pool task is expected, not an
            // error.
            return Ok(Vec::new());
        };
        record.pending.insert(prod_id, array);

        let mut sink_died = false;
        while let Some(next) = record.pending.remove(&record.produced_count) {
            match record.output.deliver(record.produced_count as u64, (*next).clone()) {
                Ok(()) => {
                    record.produced_count += 1;
                    record.queue_size += 1;
                }
                Err(err) => {
                    warn!(raster = self.raster.0, sequence = qi.sequence, %err, "output sink rejected a delivery, cancelling query");
                    sink_died = true;
                    break;
                }
            }
        }

        let produce_count = record.qi.produce_count();
        let finished = sink_died || record.produced_count == produce_count;
        if finished {
            if let Some(record) = self.queries.remove(&qi.sequence) {
                return Ok(self.teardown_messages(record.qi));
            }
        }
        Ok(Vec::new())
    }

    /// Reached when some downstream stage (`Computer`, `Resampler`,
    /// `Reader`) hit a `PoolTaskFailed` it can't recover from and asked for
    /// its query to be cancelled. Unlike `handle_die`, which fans out to
    /// every query at once, this tears down exactly the one named `qi` — the
    /// produce-index reported is `produced_count`, the index the client is
    /// actually still waiting on, since none of these callers know which
    /// specific produce-index their failed tile would have completed.
    fn handle_cancel_this_query(&mut self, qi: Arc<QueryInfos>) -> HandlerResult {
        let Some(record) = self.queries.remove(&qi.sequence) else {
            // Already torn down (finished, or cancelled by another failure
            // racing this one) — nothing left to report or clean up.
            return Ok(Vec::new());
        };
        if let Err(err) = record.output.fail(record.produced_count as u64, "worker pool task failed") {
            warn!(raster = self.raster.0, sequence = qi.sequence, %err, "failed to deliver failure record");
        }
        Ok(self.teardown_messages(record.qi))
    }

    fn handle_die(&mut self) -> HandlerResult {
        self.alive = false;
        let mut messages = Vec::new();
        for (_, record) in self.queries.drain() {
            messages.extend(self.teardown_messages(record.qi));
        }
        Ok(messages)
    }

    /// Tears down every downstream actor's record for `qi`, whether the
    /// query finished normally or was cancelled — the two cases leave
    /// identical cleanup work.
    fn teardown_messages(&self, qi: Arc<QueryInfos>) -> Vec<Message> {
        let mut messages: Vec<Message> = DOWNSTREAM_TEARDOWN_TARGETS
            .iter()
            .map(|name| Message::new(Address::bare(name), Body::CancelThisQuery { qi: qi.clone() }))
            .collect();
        messages.push(Message::new(
            Address::full(Group::Global, "GlobalPrioritiesWatcher"),
            Body::UnregisterQuery {
                raster: self.raster,
                qi,
            },
        ));
        messages
    }

    fn poll_channels(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();

        let dead: Vec<u64> = self
            .queries
            .iter()
            .filter(|(_, record)| !record.output.is_alive())
            .map(|(sequence, _)| *sequence)
            .collect();
        for sequence in dead {
            if let Some(record) = self.queries.remove(&sequence) {
                trace!(raster = self.raster.0, sequence, "output sink collected, cancelling query");
                messages.extend(self.teardown_messages(record.qi));
            }
        }

        for record in self.queries.values_mut() {
            let observed = record.output.queue_size();
            if observed == record.queue_size {
                continue;
            }
            record.queue_size = observed;
            let pulled_count = record.produced_count.saturating_sub(observed);
            for target in ["ProductionGate", "ComputationGate"] {
                messages.push(Message::new(
                    Address::bare(target),
                    Body::OutputQueueUpdate {
                        qi: record.qi.clone(),
                        pulled_count,
                    },
                ));
            }
            messages.push(Message::new(
                Address::full(Group::Global, "GlobalPrioritiesWatcher"),
                Body::OutputQueueUpdate {
                    qi: record.qi.clone(),
                    pulled_count,
                },
            ));
        }
        messages
    }
}


impl Actor for QueriesHandler {
    fn name(&self) -> &'static str {
        "QueriesHandler"
    }

    fn receive(&mut self, body: Body) -> HandlerResult {
        match body {
            Body::MadeThisArray { qi, prod_id, array } => self.handle_made_this_array(qi, prod_id, array),
            Body::CancelThisQuery { qi } => self.handle_cancel_this_query(qi),
            Body::Die => self.handle_die(),
            _ => Ok(Vec::new()),
        }
    }

    fn ext_receive(&mut self, body: Body) -> Option<HandlerResult> {
        match body {
            Body::NewQuery { qi, output } => Some(self.handle_new_query(qi, output)),
            _ => None,
        }
    }

    fn ext_receive_nothing(&mut self) -> Option<HandlerResult> {
        Some(Ok(self.poll_channels()))
    }

    fn supports_keep_alive(&self) -> bool {
        true
    }

    fn is_alive(&self) -> bool {
        self.alive
    }
}
