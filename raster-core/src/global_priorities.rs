//! `GlobalPrioritiesWatcher`: the single place that knows, across every
//! raster and every query, how urgently a piece of work is needed, per
//! `spec.md` §4.9. Pool actors ask it for a `PriorityKey`; it never emits
//! messages of its own.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use raster_model::RasterUid;

use crate::actor::{Actor, HandlerResult};
use crate::message::Body;
use crate::pool::PriorityKey;

/// Shared handle to the watcher's state. `priority_key` is specified in
/// `spec.md` §4.9/§9 as "a pure priority function" pool actors call
/// directly, rather than round-tripping through a message — holding the
/// state behind a shared lock rather than only inside the registry's boxed
/// actor is what makes that direct call possible without breaking the
/// "handlers never call other actors directly" rule, since pool actors call
/// the function, not the actor.
pub type SharedPriorities = Arc<Mutex<GlobalPrioritiesWatcher>>;

#[derive(Debug, Clone, Copy, Default)]
struct QueryState {
    pulled_count: usize,
}

#[derive(Default)]
pub struct GlobalPrioritiesWatcher {
    queries: HashMap<(RasterUid, u64), QueryState>,
}

impl GlobalPrioritiesWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_query(&mut self, raster: RasterUid, sequence: u64) {
        self.queries
            .entry((raster, sequence))
            .or_insert_with(QueryState::default);
    }

    pub fn unregister_query(&mut self, raster: RasterUid, sequence: u64) {
        self.queries.remove(&(raster, sequence));
    }

    pub fn update_pulled_count(&mut self, raster: RasterUid, sequence: u64, pulled_count: usize) {
        self.queries
            .entry((raster, sequence))
            .or_insert_with(QueryState::default)
            .pulled_count = pulled_count;
    }

    /// Pure priority function pool actors use to order their waiting rooms.
    /// `produce_index` is the produce-index the work in question ultimately
    /// serves (directly for a produce task, or via
    /// `min_prod_idx_per_cache_fp` for a compute task).
    pub fn priority_key(&self, raster: RasterUid, sequence: u64, produce_index: usize) -> PriorityKey {
        let pulled_count = self
            .queries
            .get(&(raster, sequence))
            .map(|state| state.pulled_count)
            .unwrap_or(0);
        let urgency = produce_index.saturating_sub(pulled_count) as u64;
        PriorityKey {
            urgency,
            query_sequence: sequence,
            raster,
            produce_index,
        }
    }
}

/// The actor registered at `/Global/GlobalPrioritiesWatcher`. Thin: every
/// handler call just locks the shared state and mutates it, so the same
/// state is visible to direct `priority_key` callers without waiting for a
/// message round-trip.
pub struct GlobalPrioritiesWatcherActor {
    shared: SharedPriorities,
}

impl GlobalPrioritiesWatcherActor {
    pub fn new(shared: SharedPriorities) -> Self {
        Self { shared }
    }
}

impl Actor for GlobalPrioritiesWatcherActor {
    fn name(&self) -> &'static str {
        "GlobalPrioritiesWatcher"
    }

    fn receive(&mut self, body: Body) -> HandlerResult {
        let mut watcher = self.shared.lock();
        match body {
            Body::RegisterQuery { raster, qi } => {
                watcher.register_query(raster, qi.sequence);
            }
            Body::UnregisterQuery { raster, qi } => {
                watcher.unregister_query(raster, qi.sequence);
            }
            Body::OutputQueueUpdate { qi, pulled_count } => {
                watcher.update_pulled_count(qi.raster, qi.sequence, pulled_count);
            }
            _ => {}
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_is_distance_between_pulled_and_served_index() {
        let mut watcher = GlobalPrioritiesWatcher::new();
        let raster = RasterUid(1);
        watcher.register_query(raster, 0);
        watcher.update_pulled_count(raster, 0, 3);
        let key = watcher.priority_key(raster, 0, 10);
        assert_eq!(key.urgency, 7);
    }

    #[test]
    fn unregistered_query_defaults_to_zero_pulled() {
        let watcher = GlobalPrioritiesWatcher::new();
        let key = watcher.priority_key(RasterUid(1), 0, 5);
        assert_eq!(key.urgency, 5);
    }
}
