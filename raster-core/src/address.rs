//! Actor addressing: `/Group/Name` pairs, resolved through the scheduler's
//! registry. Mirrors the nested `_register_actor`/`_find_actors` closures of
//! the original scheduler loop, made into an explicit value type instead of
//! string matching on every send.

use std::fmt;

/// An actor's home group. Per-raster actor kinds live in a group named after
/// the raster (`Group::Raster(uid)`); the handful of process-wide singletons
/// live in `Group::Global`; worker pools live in their own group so a
/// `/Pool*/Name` address can fan out across every pool actor regardless of
/// which pool backs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Global,
    Raster(raster_model::RasterUid),
    Pool(&'static str),
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::Global => write!(f, "Global"),
            Group::Raster(uid) => write!(f, "Raster{}", uid.0),
            Group::Pool(name) => write!(f, "Pool:{name}"),
        }
    }
}

/// A fully- or partially-resolved destination for a message.
///
/// - `Address::Full(group, name)` targets exactly one actor.
/// - `Address::PoolWildcard(name)` is the `/Pool*/Name` form: fans out to
///   the actor named `name` in every live pool group.
/// - `Address::Bare(name)` resolves within the sending actor's own group,
///   the way a handler can say "send to my sibling `ComputationGate`"
///   without knowing its own raster id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Full(Group, &'static str),
    PoolWildcard(&'static str),
    Bare(&'static str),
}

impl Address {
    pub fn full(group: Group, name: &'static str) -> Self {
        Address::Full(group, name)
    }

    pub fn bare(name: &'static str) -> Self {
        Address::Bare(name)
    }

    pub fn pool_wildcard(name: &'static str) -> Self {
        Address::PoolWildcard(name)
    }

    /// Resolves a possibly-bare or wildcard address into a concrete list of
    /// `(group, name)` destinations, given the group the sending actor lives
    /// in and the set of currently-live pool groups.
    pub fn resolve(&self, sender_group: Group, live_pools: &[Group]) -> Vec<(Group, &'static str)> {
        match self {
            Address::Full(group, name) => vec![(*group, name)],
            Address::Bare(name) => vec![(sender_group, name)],
            Address::PoolWildcard(name) => live_pools.iter().map(|g| (*g, *name)).collect(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Full(group, name) => write!(f, "/{group}/{name}"),
            Address::Bare(name) => write!(f, "{name}"),
            Address::PoolWildcard(name) => write!(f, "/Pool*/{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_address_resolves_in_sender_group() {
        let sender = Group::Raster(raster_model::RasterUid(7));
        let resolved = Address::bare("ComputationGate").resolve(sender, &[]);
        assert_eq!(resolved, vec![(sender, "ComputationGate")]);
    }

    #[test]
    fn pool_wildcard_fans_out_to_every_live_pool() {
        let pools = vec![Group::Pool("compute"), Group::Pool("resample")];
        let resolved = Address::pool_wildcard("Worker").resolve(Group::Global, &pools);
        assert_eq!(resolved.len(), 2);
    }
}
