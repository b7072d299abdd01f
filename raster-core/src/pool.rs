//! `PoolActor`: one worker pool modeled as a FIFO-by-priority waiting room
//! plus a working set of submitted, polled tasks, per `spec.md` §4.8. Other
//! actors (`Computer`, `Resampler`, `CacheExtractor`) push waiters directly
//! — the waiting room is pool-local bookkeeping rather than something that
//! benefits from round-tripping through the message bus, the same way the
//! original nests a `leave_waiting_room` closure rather than sending a
//! message back to itself.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use parking_lot::Mutex;
use raster_contracts::error::ContractError;
use raster_contracts::pool::{TaskHandle, WorkerPool};
use raster_model::{Array, RasterUid};

use crate::actor::{Actor, HandlerResult};
use crate::message::{Body, Message};

/// Priority key a waiter is ordered by. Reflects, in order, per-query
/// urgency (how close this work is to being needed), query age, and a
/// stable tie-breaker — never a fairness weight, per `spec.md` §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityKey {
    /// Distance between the client's `pulled_count` and the produce-index
    /// this work serves. Smaller is more urgent.
    pub urgency: u64,
    /// Query submission sequence; older queries (smaller value) win ties.
    pub query_sequence: u64,
    pub raster: RasterUid,
    pub produce_index: usize,
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; we want the *most urgent* (smallest
        // urgency/sequence) waiter to compare greatest, so every ordered
        // field is reversed here rather than at every call site.
        other
            .urgency
            .cmp(&self.urgency)
            .then_with(|| other.query_sequence.cmp(&self.query_sequence))
            .then_with(|| self.raster.0.cmp(&other.raster.0))
            .then_with(|| self.produce_index.cmp(&other.produce_index))
    }
}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Invoked once a submitted task's handle reports completion.
pub type Completion = Box<dyn FnOnce(Result<Array, ContractError>) -> Vec<Message> + Send>;

/// Invoked once a waiter is scheduled. Given a reference to the underlying
/// pool so it may submit a task, returns the handle/completion pair to move
/// into the working set, or `None` if the waiter decided there was nothing
/// left to submit (the dedup "status already advanced past `stand_by`" case
/// in `spec.md` §4.6), plus any messages to emit either way.
pub type WaiterCallback<P> = Box<
    dyn FnOnce(&P) -> (Option<(<P as WorkerPool>::Handle<Array>, Completion)>, Vec<Message>)
        + Send,
>;

struct Waiter<P: WorkerPool> {
    priority: PriorityKey,
    callback: WaiterCallback<P>,
}

impl<P: WorkerPool> PartialEq for Waiter<P> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl<P: WorkerPool> Eq for Waiter<P> {}
impl<P: WorkerPool> PartialOrd for Waiter<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<P: WorkerPool> Ord for Waiter<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority)
    }
}

pub struct PoolActor<P: WorkerPool> {
    name: &'static str,
    pool: P,
    capacity: usize,
    waiting_room: BinaryHeap<Waiter<P>>,
    working_set: Vec<(<P as WorkerPool>::Handle<Array>, Completion)>,
}

impl<P: WorkerPool> PoolActor<P> {
    pub fn new(name: &'static str, pool: P, capacity: usize) -> Self {
        Self {
            name,
            pool,
            capacity,
            waiting_room: BinaryHeap::new(),
            working_set: Vec::new(),
        }
    }

    pub fn push_waiter(&mut self, priority: PriorityKey, callback: WaiterCallback<P>) {
        self.waiting_room.push(Waiter { priority, callback });
    }

    pub fn waiting_room_len(&self) -> usize {
        self.waiting_room.len()
    }

    pub fn working_set_len(&self) -> usize {
        self.working_set.len()
    }

    fn tick(&mut self) -> Vec<Message> {
        let mut out = Vec::new();

        let mut still_working = Vec::with_capacity(self.working_set.len());
        for (mut handle, completion) in self.working_set.drain(..) {
            match handle.poll() {
                Some(result) => out.extend(completion(result)),
                None => still_working.push((handle, completion)),
            }
        }
        self.working_set = still_working;

        while self.working_set.len() < self.capacity {
            let Some(waiter) = self.waiting_room.pop() else {
                break;
            };
            let (submitted, messages) = (waiter.callback)(&self.pool);
            out.extend(messages);
            if let Some((handle, completion)) = submitted {
                self.working_set.push((handle, completion));
            }
        }
        out
    }
}

/// Shared handle to a pool's waiting room and working set. Domain actors
/// (`Computer`, `CacheExtractor`, `Resampler`, `Reader`) hold a clone and
/// call `push_waiter` on it directly rather than through a `Message` —
/// `WaiterCallback` closures aren't `Clone`, so they can't ride the same
/// pile machinery a `/Pool*/Name` broadcast would need. This mirrors the
/// `leave_waiting_room`-as-closure shape of the original scheduler rather
/// than the strict message-only rule in `spec.md` §4.1, a deliberate,
/// documented exception for exactly this one interaction.
pub type SharedPool<P> = Arc<Mutex<PoolActor<P>>>;

/// The actor registered under `/Pool:<name>/Worker` purely so the
/// scheduler's keep-alive rotation ticks the pool every loop iteration.
pub struct PoolTickActor<P: WorkerPool> {
    shared: SharedPool<P>,
}

impl<P: WorkerPool> PoolTickActor<P> {
    pub fn new(shared: SharedPool<P>) -> Self {
        Self { shared }
    }
}

impl<P: WorkerPool + 'static> Actor for PoolTickActor<P> {
    fn name(&self) -> &'static str {
        "Worker"
    }

    fn receive(&mut self, _body: Body) -> HandlerResult {
        Ok(Vec::new())
    }

    fn ext_receive_nothing(&mut self) -> Option<HandlerResult> {
        Some(Ok(self.shared.lock().tick()))
    }

    fn supports_keep_alive(&self) -> bool {
        true
    }
}
