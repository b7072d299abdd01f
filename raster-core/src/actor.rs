//! The `Actor` trait: the three handler capabilities `spec.md` §9 calls for
//! expressed as trait methods rather than string-dispatched lookups. Every
//! actor implements `receive`; `ext_receive`/`ext_receive_nothing` default
//! to "not supported" so the scheduler can tell which piles a given actor
//! participates in without a separate capability table.

use crate::error::Result;
use crate::message::Body;

pub type HandlerResult = Result<Vec<crate::message::Message>>;

/// One participant in the scheduler. Handlers must be non-blocking and
/// return promptly; all waiting is expressed as messages or pool polling,
/// never as an actual block inside a handler body.
pub trait Actor: Send {
    /// Stable name within this actor's group, e.g. `"ComputationGate"`.
    fn name(&self) -> &'static str;

    /// Handles a message delivered internally (pile prefix `receive_`).
    /// Required: every actor accepts at least its own internal protocol.
    fn receive(&mut self, body: Body) -> HandlerResult;

    /// Handles a message submitted externally (pile prefix `ext_receive_`).
    /// `None` means this actor exposes no external entry points at all.
    fn ext_receive(&mut self, _body: Body) -> Option<HandlerResult> {
        None
    }

    /// Idle keep-alive tick. Only called on actors where
    /// `supports_keep_alive` is true.
    fn ext_receive_nothing(&mut self) -> Option<HandlerResult> {
        None
    }

    /// Whether this actor participates in the round-robin keep-alive
    /// rotation at all. Declared up front (rather than inferred by calling
    /// `ext_receive_nothing` and checking for `None`) so the scheduler's
    /// round-robin cursor only ever advances across actors that do real
    /// idle-tick work, matching "tick exactly one such actor per loop
    /// iteration" in `spec.md` §4.1.
    fn supports_keep_alive(&self) -> bool {
        false
    }

    /// Whether this actor should remain registered after its last handler
    /// call. An actor that goes "not alive" (e.g. `QueriesHandler` after
    /// `receive_die`) is unregistered by the scheduler on the next check.
    fn is_alive(&self) -> bool {
        true
    }
}
