//! Core traits describing a machine and its states.
//!
//! A machine is declared in three parts: an identifier enum implementing
//! [`StateId`], a definition type implementing [`MachineDef`] that ties the
//! identifier, event and data types together and registers the state tree,
//! and one [`State`] impl per node of that tree.

use std::fmt::Debug;

use crate::core::context::Context;
use crate::core::error::DefinitionError;
use crate::registry::Registrar;

/// Identifier type for the states of one machine.
///
/// Usually an enum, one variant per state plus the reserved [`NULL`]
/// sentinel. The sentinel marks "no state": it is what
/// [`current_state_id`] reports before the machine is started, and
/// registering a real state under it is a configuration error.
///
/// The [`state_ids!`] macro generates a conforming enum.
///
/// [`NULL`]: StateId::NULL
/// [`current_state_id`]: crate::Machine::current_state_id
/// [`state_ids!`]: crate::state_ids
pub trait StateId: Copy + Eq + Debug + 'static {
    /// The reserved "no state" identifier.
    const NULL: Self;

    /// Check whether this id is the reserved sentinel.
    fn is_null(self) -> bool {
        self == Self::NULL
    }
}

/// Description of one machine type.
///
/// Ties together the identifier, event and data types and declares the
/// state tree. One `MachineDef` impl describes a machine *type*; any
/// number of [`Machine`] instances can be built from it.
///
/// [`Machine`]: crate::Machine
pub trait MachineDef: Sized + 'static {
    /// State identifier type.
    type Id: StateId;

    /// Event type delivered through [`post_event`]. Events are copied
    /// onto the internal queue, hence the `Clone` bound.
    ///
    /// [`post_event`]: crate::Machine::post_event
    type Event: Clone;

    /// User data owned by the machine, reachable from every state
    /// through [`Context::data`] / [`Context::data_mut`].
    type Data;

    /// Register every state of the tree. Parents must be registered
    /// before their children. Called once per machine construction.
    fn states(reg: &mut Registrar<'_, Self>) -> Result<(), DefinitionError<Self::Id>>;
}

/// Result of delivering an event to one state.
///
/// `Unhandled` lets the event bubble to the parent state; `Handled`
/// stops the walk.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    /// The event was consumed; ancestors will not see it.
    Handled,
    /// The event was not consumed; deliver it to the parent state.
    Unhandled,
}

/// Behavior of one node in the state hierarchy.
///
/// A state value is constructed in place when the state is entered and
/// destroyed in place when it is exited; it is never copied or moved
/// while live. Entry actions belong in [`enter`], exit actions in
/// [`exit`] (or a `Drop` impl when no machine access is needed).
///
/// A handler may request a transition with [`Context::transition`]. The
/// request is deferred: the machine finishes the full bubble walk for
/// the current event before any exit or entry runs. When several
/// handlers request a transition during one walk, the last request wins.
///
/// [`enter`]: State::enter
/// [`exit`]: State::exit
pub trait State<M: MachineDef>: Sized + 'static {
    /// The identifier this state is registered under.
    const ID: M::Id;

    /// Entry action: build the state value. Runs parents-first, so
    /// [`Context::ancestor`] already sees every enclosing state.
    fn enter(ctx: Context<'_, M>) -> Self;

    /// Deliver one event to this state.
    fn handle(&mut self, ctx: Context<'_, M>, event: &M::Event) -> Outcome;

    /// Exit action, invoked right before the state value is dropped.
    fn exit(&mut self, ctx: Context<'_, M>) {
        let _ = ctx;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_ids;

    state_ids! {
        enum TestId {
            None,
            Alpha,
            Beta,
        }
    }

    #[test]
    fn null_sentinel_is_distinguished() {
        assert!(TestId::None.is_null());
        assert!(!TestId::Alpha.is_null());
        assert!(!TestId::Beta.is_null());
        assert_eq!(TestId::NULL, TestId::None);
    }

    #[test]
    fn outcome_is_comparable() {
        assert_eq!(Outcome::Handled, Outcome::Handled);
        assert_ne!(Outcome::Handled, Outcome::Unhandled);
    }
}
