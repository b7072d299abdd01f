//! The scheduler loop itself: single-threaded, message-passing, cooperative.
//! Grounds `_scheduler_loop_until_datasource_close` in
//! `_datasource_back_scheduler.py` almost step for step — a stack of
//! per-actor message piles drained depth-first, one external message
//! accepted per round, one keep-alive tick when nothing else is pending, an
//! idle sleep when there is truly nothing to do.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use raster_contracts::cache_store::CacheStore;
use raster_contracts::output_sink::OutputSink;
use raster_model::{BandId, Footprint, RasterDescriptor, RasterUid};

use crate::address::{Address, Group};
use crate::error::{Result, SchedulerError};
use crate::message::Message;
use crate::query_info::QueryInfos;
use crate::registry::Registry;
use crate::top_level::TopLevel;

/// One actor invocation's worth of outstanding messages. Stack-ordered: a
/// newly pushed pile is drained to exhaustion before its parent's remaining
/// messages are touched, the same depth-first order `piles_of_msgs` gives
/// the original. Each message resolves its own group from `body.raster()`
/// rather than the pile carrying one, since a pile born from a worker-pool
/// tick (`Group::Pool`) produces messages that belong to whatever raster
/// each one's task was submitted for, not to the pool's own group.
type Pile = VecDeque<Message>;

/// Thread-safe handle to a running scheduler. Cloned freely across client
/// threads; `submit`/`stop` just append to or flag shared state the
/// scheduler thread polls, mirroring the Python original's "a list is
/// thread-safe" external queue.
pub struct SchedulerHandle {
    inbox: Arc<Mutex<VecDeque<Message>>>,
    stop: Arc<AtomicBool>,
    error: Arc<Mutex<Option<SchedulerError>>>,
    join: Mutex<Option<thread::JoinHandle<()>>>,
    sequences: Mutex<HashMap<RasterUid, u64>>,
}

impl SchedulerHandle {
    /// Submits a message to the scheduler's external inbox, after confirming
    /// the scheduler thread is still alive.
    pub fn submit(&self, message: Message) -> Result<()> {
        self.ensure_alive()?;
        self.inbox.lock().push_back(message);
        Ok(())
    }

    /// Validates and submits a new query, assigning it the next submission
    /// sequence for its raster. Validation errors (`SchedulerError::UserInput`)
    /// never touch scheduler state, matching `spec.md` §7.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_query(
        &self,
        descriptor: &RasterDescriptor,
        max_queue_size: usize,
        produce_fps: Vec<Footprint>,
        band_selector: BandId,
        dst_nodata: Option<f64>,
        interpolation: raster_contracts::interpolation::Interpolation,
        output: Arc<dyn OutputSink>,
    ) -> Result<()> {
        let sequence = {
            let mut sequences = self.sequences.lock();
            let next = sequences.entry(descriptor.uid).or_insert(0);
            let sequence = *next;
            *next += 1;
            sequence
        };
        let qi = Arc::new(QueryInfos::new(
            sequence,
            descriptor,
            max_queue_size,
            produce_fps,
            band_selector,
            dst_nodata,
            interpolation,
        )?);
        self.submit(Message::new(
            Address::full(Group::Raster(descriptor.uid), "QueriesHandler"),
            crate::message::Body::NewQuery { qi, output },
        ))
    }

    /// Requests the raster's group be torn down: fans `Die` to its
    /// `QueriesHandler`, which cancels every live query before going
    /// not-alive, at which point the scheduler drops the whole group.
    pub fn close_raster(&self, raster: RasterUid) -> Result<()> {
        self.submit(Message::droppable(
            Address::full(Group::Raster(raster), "QueriesHandler"),
            crate::message::Body::Die,
        ))
    }

    /// Flags the scheduler thread to stop at the next checkpoint. Does not
    /// block; join the thread by dropping every handle and letting the
    /// `JoinHandle` inside run out, the same "fire and forget" shape
    /// `stop_scheduler` has in the original.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Mirrors `ensure_scheduler_still_alive`: if the scheduler thread has
    /// already terminated, the first subsequent call observes whatever error
    /// it captured.
    pub fn ensure_alive(&self) -> Result<()> {
        let finished = self
            .join
            .lock()
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true);
        if !finished {
            return Ok(());
        }
        if let Some(err) = self.error.lock().take() {
            return Err(err);
        }
        Ok(())
    }
}

pub struct Scheduler;

impl Scheduler {
    /// Spawns the scheduler's dedicated thread, named the way the original
    /// names its per-datasource thread (`'DataSource{:#x}Scheduler'`), and
    /// returns the handle every external caller submits messages through.
    /// `top_level` must already hold every raster this scheduler will ever
    /// be asked to query — see `TopLevel::register_raster`.
    pub fn spawn<C>(id: u64, idle_sleep: Duration, top_level: TopLevel<C>) -> SchedulerHandle
    where
        C: CacheStore + 'static,
    {
        let inbox = Arc::new(Mutex::new(VecDeque::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let error = Arc::new(Mutex::new(None));

        let thread_inbox = inbox.clone();
        let thread_stop = stop.clone();
        let thread_error = error.clone();

        let join = thread::Builder::new()
            .name(format!("DataSource{id:#x}Scheduler"))
            .spawn(move || {
                if let Err(err) = run_loop(top_level, &thread_inbox, &thread_stop, idle_sleep) {
                    tracing::error!(%err, "scheduler thread terminating on error");
                    *thread_error.lock() = Some(err);
                }
                thread_stop.store(true, Ordering::SeqCst);
            })
            .expect("failed to spawn scheduler thread");

        SchedulerHandle {
            inbox,
            stop,
            error,
            join: Mutex::new(Some(join)),
            sequences: Mutex::new(HashMap::new()),
        }
    }
}

fn run_loop<C>(
    top_level: TopLevel<C>,
    inbox: &Arc<Mutex<VecDeque<Message>>>,
    stop: &Arc<AtomicBool>,
    idle_sleep: Duration,
) -> Result<()>
where
    C: CacheStore + 'static,
{
    let mut registry = Registry::new();
    top_level.bootstrap_global(&mut registry);
    let mut piles: Vec<Pile> = Vec::new();

    loop {
        // Step 1: drain every message currently in flight, depth-first.
        while let Some(pile) = piles.last_mut() {
            let Some(message) = pile.pop_front() else {
                piles.pop();
                continue;
            };
            dispatch(&mut registry, &top_level, message, false, &mut piles)?;
            if stop.load(Ordering::SeqCst) {
                return Ok(());
            }
        }

        // Step 2: accept at most one externally submitted message per round.
        let external = inbox.lock().pop_front();
        if let Some(message) = external {
            dispatch(&mut registry, &top_level, message, true, &mut piles)?;
            if stop.load(Ordering::SeqCst) {
                return Ok(());
            }
            continue;
        }

        // Step 3: nothing pending and nothing external — tick exactly one
        // keep-alive actor (a `QueriesHandler` polling its output channels,
        // or a pool's worker tick), round-robin.
        if piles.is_empty() {
            if let Some((group, name)) = registry.next_keep_alive() {
                if let Some(actor) = registry.get_mut(group, name) {
                    if let Some(result) = actor.ext_receive_nothing() {
                        let messages = result?;
                        if !actor.is_alive() {
                            unregister_dead(&mut registry, group, name);
                        }
                        if stop.load(Ordering::SeqCst) {
                            return Ok(());
                        }
                        if !messages.is_empty() {
                            piles.push(messages.into());
                        }
                    }
                }
            }
        }

        // Step 4: truly nothing to do — sleep rather than spin.
        if piles.is_empty() {
            thread::sleep(idle_sleep);
        }

        if stop.load(Ordering::SeqCst) {
            return Ok(());
        }
    }
}

/// `QueriesHandler` going not-alive means its whole raster group is torn
/// down (it is the group's only controller; every sibling actor's own state
/// is either cache-tile-keyed, shared across rasters, or already empty by
/// the time `Die` reaches it via the `CancelThisQuery` fanout
/// `QueriesHandler::handle_die` emits). Any other actor going not-alive
/// would just drop itself, though none in this pipeline currently do.
fn unregister_dead(registry: &mut Registry, group: Group, name: &'static str) {
    if name == "QueriesHandler" {
        let dropped = registry.unregister_group(group);
        tracing::debug!(%group, ?dropped, "raster group torn down");
    } else {
        registry.unregister(group, name);
    }
}

fn dispatch<C>(
    registry: &mut Registry,
    top_level: &TopLevel<C>,
    message: Message,
    external: bool,
    piles: &mut Vec<Pile>,
) -> Result<()>
where
    C: CacheStore + 'static,
{
    let live_pools = registry.live_pool_groups();
    // `Die` is the only body with no raster of its own, and it always
    // travels by a fully-resolved address, so `Group::Global` here is never
    // actually consulted.
    let sender_group = message.body.raster().map(Group::Raster).unwrap_or(Group::Global);
    let destinations = message.to.resolve(sender_group, &live_pools);

    for (group, name) in destinations {
        if !registry.contains(group, name) {
            if let Group::Raster(raster) = group {
                top_level.ensure_raster_group(registry, raster);
            }
        }

        let Some(actor) = registry.get_mut(group, name) else {
            if message.droppable {
                continue;
            }
            return Err(SchedulerError::Internal(format!(
                "unresolved non-droppable address {group}/{name} for `{}`",
                message.title()
            )));
        };

        let new_messages = if external {
            match actor.ext_receive(message.body.clone()) {
                Some(result) => result?,
                // Not every externally-submitted message needs a dedicated
                // `ext_receive` arm (e.g. an admin `Die` from
                // `SchedulerHandle::close_raster`) — only messages an actor
                // restricts to its own internal protocol do, and those
                // still go through `receive` here.
                None => actor.receive(message.body.clone())?,
            }
        } else {
            actor.receive(message.body.clone())?
        };

        if !actor.is_alive() {
            unregister_dead(registry, group, name);
        }
        if !new_messages.is_empty() {
            piles.push(new_messages.into());
        }
    }
    Ok(())
}
