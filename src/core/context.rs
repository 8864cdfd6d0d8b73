//! Borrowed machine capabilities handed to state code.
//!
//! A [`Context`] is passed by value into every `enter`, `handle` and
//! `exit` call. It borrows the parts of the machine a state is allowed
//! to touch while its own level is being operated on: the user data,
//! the pending-transition register, the event queue, and a read-only
//! view of the live ancestor states.

use tracing::trace;

use crate::core::state::{MachineDef, State};
use crate::runtime::arena::Slot;
use crate::runtime::queue::EventQueue;

/// Capabilities available to a state during entry, event handling and
/// exit.
///
/// The context is scoped to a single call; it cannot be stored. Borrows
/// obtained through it (e.g. [`ancestor`]) are invalidated when the call
/// returns, which is what keeps transitions free to destroy any level.
///
/// [`ancestor`]: Context::ancestor
pub struct Context<'a, M: MachineDef> {
    below: &'a [Slot<M>],
    data: &'a mut M::Data,
    pending: &'a mut Option<M::Id>,
    queue: &'a mut EventQueue<M::Event>,
}

impl<'a, M: MachineDef> Context<'a, M> {
    /// Shared access to the machine's user data.
    pub fn data(&self) -> &M::Data {
        self.data
    }

    /// Exclusive access to the machine's user data.
    pub fn data_mut(&mut self) -> &mut M::Data {
        self.data
    }

    /// Request a transition to `target`.
    ///
    /// The request is recorded in a single register and applied only
    /// after the current dispatch step completes (run-to-completion).
    /// A later request during the same step overwrites an earlier one.
    pub fn transition(&mut self, target: M::Id) {
        trace!(target = ?target, "transition requested");
        *self.pending = Some(target);
    }

    /// Post an event to the machine's own queue.
    ///
    /// The event is appended in FIFO order and dispatched after all
    /// events already queued; posting never dispatches recursively.
    pub fn post(&mut self, event: M::Event) {
        self.queue.push(event);
    }

    /// Borrow a live ancestor state.
    ///
    /// Searches the active chain strictly above the state this context
    /// was handed to (nearest first) and returns the ancestor whose id
    /// matches `S`, or `None` if `S` is not currently entered.
    pub fn ancestor<S: State<M>>(&self) -> Option<&S> {
        self.below.iter().rev().find_map(|slot| slot.borrow_state::<S>())
    }
}

/// The context ingredients a machine owns outside its arena.
///
/// Arena operations split the slot array themselves and combine the
/// lower levels with these borrows into a full [`Context`].
pub(crate) struct CtxParts<'a, M: MachineDef> {
    pub(crate) data: &'a mut M::Data,
    pub(crate) pending: &'a mut Option<M::Id>,
    pub(crate) queue: &'a mut EventQueue<M::Event>,
}

impl<'a, M: MachineDef> CtxParts<'a, M> {
    /// Reborrow for another call without giving up the originals.
    pub(crate) fn reborrow(&mut self) -> CtxParts<'_, M> {
        CtxParts {
            data: &mut *self.data,
            pending: &mut *self.pending,
            queue: &mut *self.queue,
        }
    }

    /// Assemble a full context over the given ancestor slots.
    pub(crate) fn ctx<'b>(&'b mut self, below: &'b [Slot<M>]) -> Context<'b, M> {
        Context {
            below,
            data: &mut *self.data,
            pending: &mut *self.pending,
            queue: &mut *self.queue,
        }
    }
}
