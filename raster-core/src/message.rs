//! The single message type carried through piles, the external inbox, and
//! pool completions. A tagged `Body` variant replaces the source's
//! string-dispatched `receive_<title>` lookup for everything except the
//! textual handler-name prefix (`receive_`/`ext_receive_`) the scheduler
//! still uses to route a pile to the right trait method.

use std::fmt;
use std::sync::Arc;

use raster_contracts::output_sink::OutputSink;
use raster_model::{Array, Footprint, RasterUid};

use crate::address::Address;
use crate::query_info::QueryInfos;

/// One message in flight between actors.
#[derive(Clone)]
pub struct Message {
    pub to: Address,
    pub body: Body,
    /// If true, an unresolved destination is silently dropped rather than
    /// treated as a programming-error panic. Used for messages whose
    /// destination may have already unregistered (e.g. late pool
    /// completions arriving after a query was cancelled).
    pub droppable: bool,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("to", &self.to)
            .field("title", &self.body.title())
            .field("droppable", &self.droppable)
            .finish()
    }
}

impl Message {
    pub fn new(to: Address, body: Body) -> Self {
        Self {
            to,
            body,
            droppable: false,
        }
    }

    pub fn droppable(to: Address, body: Body) -> Self {
        Self {
            to,
            body,
            droppable: true,
        }
    }

    /// The handler-name suffix this message's body dispatches to, e.g.
    /// `"schedule_collection"` for `Body::MakeThoseArrays`. Combined with the
    /// pile's `receive_`/`ext_receive_` prefix by the scheduler.
    pub fn title(&self) -> &'static str {
        self.body.title()
    }
}

/// A tile array accompanied by the cache footprint it fills, used wherever a
/// merge or extraction step collects several such pieces.
#[derive(Debug, Clone)]
pub struct TileArray {
    pub footprint: Footprint,
    pub array: Arc<Array>,
}

#[derive(Clone)]
pub enum Body {
    // --- QueriesHandler ---
    /// External: submit a new query. `ext_receive_new_query`. Carries the
    /// client's output channel directly rather than resolving it by address,
    /// since the client is not itself an actor.
    NewQuery {
        qi: Arc<QueryInfos>,
        output: Arc<dyn OutputSink>,
    },
    /// Internal: a produced array has arrived for buffering/draining.
    MadeThisArray {
        qi: Arc<QueryInfos>,
        prod_id: usize,
        array: Arc<Array>,
    },
    /// Sent to the gates and the watcher whenever a query's observed output
    /// queue occupancy changes. `pulled_count = produced_count - queue_size`
    /// is carried precomputed so every recipient derives the same value.
    OutputQueueUpdate {
        qi: Arc<QueryInfos>,
        pulled_count: usize,
    },
    /// Fanned out to every downstream actor holding state for `qi`.
    CancelThisQuery { qi: Arc<QueryInfos> },
    /// Fanned out to every actor in a raster's group when the raster dies.
    Die,

    // --- ProductionGate ---
    MakeThoseArrays { qi: Arc<QueryInfos> },

    // --- CacheSupervisor ---
    MakeThoseCacheTilesAvailable { qi: Arc<QueryInfos> },

    // --- ComputationGate ---
    /// `missing_cache_fps` is `qi.cache_computation`'s candidate set narrowed
    /// down by `CacheSupervisor` to the tiles it actually found absent on
    /// disk — `qi` itself stays immutable so this can't be written back
    /// onto `qi.cache_computation` in place.
    ComputeThoseCacheFiles {
        qi: Arc<QueryInfos>,
        missing_cache_fps: Vec<Footprint>,
    },
    ComputeThisArray {
        qi: Arc<QueryInfos>,
        cache_fp: Footprint,
    },

    // --- Computer / ComputeAccumulator / Merger / Writer ---
    DoneOneCompute {
        raster: RasterUid,
        compute_fp: Footprint,
        array: Arc<Array>,
    },
    ScheduleOneMerge {
        raster: RasterUid,
        cache_fp: Footprint,
        parts: Vec<TileArray>,
    },
    WriteCacheTile {
        raster: RasterUid,
        cache_fp: Footprint,
        array: Arc<Array>,
    },
    CacheTileWritten {
        raster: RasterUid,
        cache_fp: Footprint,
    },

    // --- Reader / CacheExtractor / Resampler / Producer ---
    ProduceThisArray { qi: Arc<QueryInfos>, prod_id: usize },
    AssembleCacheTiles {
        qi: Arc<QueryInfos>,
        prod_id: usize,
        produce_fp: Footprint,
        cache_fps: Vec<Footprint>,
    },
    ReadThisCacheFile {
        raster: RasterUid,
        cache_fp: Footprint,
        qi: Arc<QueryInfos>,
        prod_id: usize,
    },
    CacheTileRead {
        qi: Arc<QueryInfos>,
        prod_id: usize,
        tile: TileArray,
    },
    ResampleThisArray {
        qi: Arc<QueryInfos>,
        prod_id: usize,
        produce_fp: Footprint,
        tiles: Vec<TileArray>,
    },

    // --- GlobalPrioritiesWatcher ---
    RegisterQuery {
        raster: RasterUid,
        qi: Arc<QueryInfos>,
    },
    UnregisterQuery {
        raster: RasterUid,
        qi: Arc<QueryInfos>,
    },
}

impl Body {
    /// The raster this message concerns, when it concerns exactly one —
    /// every variant but `Die` (which already travels by a fully-resolved
    /// address and never needs to resolve a bare sibling address) carries
    /// one. Used by the scheduler to resolve `Address::Bare`/`PoolWildcard`
    /// destinations against the *raster* a message belongs to rather than
    /// the group of whichever actor happened to produce it — the two
    /// differ for messages born inside a worker-pool tick, which lives in
    /// `Group::Pool`, not any particular raster's group.
    pub fn raster(&self) -> Option<RasterUid> {
        match self {
            Body::NewQuery { qi, .. }
            | Body::MadeThisArray { qi, .. }
            | Body::OutputQueueUpdate { qi, .. }
            | Body::CancelThisQuery { qi }
            | Body::MakeThoseArrays { qi }
            | Body::MakeThoseCacheTilesAvailable { qi }
            | Body::ComputeThoseCacheFiles { qi, .. }
            | Body::ComputeThisArray { qi, .. }
            | Body::ProduceThisArray { qi, .. }
            | Body::AssembleCacheTiles { qi, .. }
            | Body::CacheTileRead { qi, .. }
            | Body::ResampleThisArray { qi, .. } => Some(qi.raster),
            Body::DoneOneCompute { raster, .. }
            | Body::ScheduleOneMerge { raster, .. }
            | Body::WriteCacheTile { raster, .. }
            | Body::CacheTileWritten { raster, .. }
            | Body::ReadThisCacheFile { raster, .. }
            | Body::RegisterQuery { raster, .. }
            | Body::UnregisterQuery { raster, .. } => Some(*raster),
            Body::Die => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Body::NewQuery { .. } => "new_query",
            Body::MadeThisArray { .. } => "made_this_array",
            Body::OutputQueueUpdate { .. } => "output_queue_update",
            Body::CancelThisQuery { .. } => "cancel_this_query",
            Body::Die => "die",
            Body::MakeThoseArrays { .. } => "make_those_arrays",
            Body::MakeThoseCacheTilesAvailable { .. } => "make_those_cache_tiles_available",
            Body::ComputeThoseCacheFiles { .. } => "compute_those_cache_files",
            Body::ComputeThisArray { .. } => "compute_this_array",
            Body::DoneOneCompute { .. } => "done_one_compute",
            Body::ScheduleOneMerge { .. } => "schedule_one_merge",
            Body::WriteCacheTile { .. } => "write_cache_tile",
            Body::CacheTileWritten { .. } => "cache_tile_written",
            Body::ProduceThisArray { .. } => "produce_this_array",
            Body::AssembleCacheTiles { .. } => "assemble_cache_tiles",
            Body::ReadThisCacheFile { .. } => "read_this_cache_file",
            Body::CacheTileRead { .. } => "cache_tile_read",
            Body::ResampleThisArray { .. } => "resample_this_array",
            Body::RegisterQuery { .. } => "register_query",
            Body::UnregisterQuery { .. } => "unregister_query",
        }
    }
}
