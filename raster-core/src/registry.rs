//! The scheduler's actor table: a two-level map keyed by `(Group, name)`,
//! plus the round-robin cursor over actors that opt into keep-alive ticks.
//! Grounds the nested `_register_actor`/`_find_actors`/`_unregister_actor`
//! closures of the original scheduler loop in an explicit owned structure.

use std::collections::{HashMap, HashSet};

use crate::actor::Actor;
use crate::address::Group;

#[derive(Default)]
pub struct Registry {
    actors: HashMap<(Group, &'static str), Box<dyn Actor>>,
    keep_alive_order: Vec<(Group, &'static str)>,
    keep_alive_cursor: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `actor` under `group`, keyed by its own `name()`. Panics on
    /// a duplicate `(group, name)` registration: that is a programming
    /// error (two actors claiming the same address), never a runtime
    /// condition callers should recover from.
    pub fn register(&mut self, group: Group, actor: Box<dyn Actor>) {
        let key = (group, actor.name());
        if actor.supports_keep_alive() {
            self.keep_alive_order.push(key);
        }
        let previous = self.actors.insert(key, actor);
        assert!(
            previous.is_none(),
            "duplicate actor registration at {group}/{}",
            key.1
        );
    }

    pub fn unregister(&mut self, group: Group, name: &'static str) {
        self.actors.remove(&(group, name));
        self.keep_alive_order.retain(|key| *key != (group, name));
    }

    /// Drops every actor in `group` at once, as `Die` fanout does when a
    /// raster's group is torn down. Returns the names that were present, so
    /// callers can log what was torn down.
    pub fn unregister_group(&mut self, group: Group) -> Vec<&'static str> {
        let names: Vec<&'static str> = self
            .actors
            .keys()
            .filter(|(g, _)| *g == group)
            .map(|(_, name)| *name)
            .collect();
        for name in &names {
            self.unregister(group, name);
        }
        names
    }

    pub fn get_mut(&mut self, group: Group, name: &'static str) -> Option<&mut Box<dyn Actor>> {
        self.actors.get_mut(&(group, name))
    }

    pub fn contains(&self, group: Group, name: &'static str) -> bool {
        self.actors.contains_key(&(group, name))
    }

    /// Every distinct `Group::Pool` currently holding at least one actor,
    /// for resolving `/Pool*/Name` wildcard sends.
    pub fn live_pool_groups(&self) -> Vec<Group> {
        self.actors
            .keys()
            .map(|(group, _)| *group)
            .filter(|group| matches!(group, Group::Pool(_)))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect()
    }

    /// Advances the keep-alive round-robin cursor by exactly one and
    /// returns the actor it now points at, or `None` if no registered actor
    /// currently opts into keep-alive ticks.
    pub fn next_keep_alive(&mut self) -> Option<(Group, &'static str)> {
        if self.keep_alive_order.is_empty() {
            return None;
        }
        let idx = self.keep_alive_cursor % self.keep_alive_order.len();
        self.keep_alive_cursor = (self.keep_alive_cursor + 1) % self.keep_alive_order.len();
        Some(self.keep_alive_order[idx])
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
