//! Error types for machine definition and machine use.
//!
//! Configuration mistakes surface as [`DefinitionError`] when the
//! machine is built; misuse of a built machine surfaces as
//! [`MachineError`] at the call site. Neither is ever silently coerced
//! into a no-op. Internal invariant violations (arena slot misuse) are
//! not represented here; they panic.

use std::fmt::Debug;

use thiserror::Error;

/// Errors raised while registering the state tree.
///
/// All of these indicate a programming mistake in the
/// [`MachineDef::states`] hook and are fatal to machine construction.
///
/// [`MachineDef::states`]: crate::MachineDef::states
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionError<I: Debug> {
    #[error("state {0:?} is already registered")]
    DuplicateState(I),

    #[error("the reserved null id cannot be registered as a state")]
    ReservedId,

    #[error("parent state {0:?} is not registered; register parents before children")]
    UnknownParent(I),
}

/// Errors raised by runtime calls on a built machine.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MachineError<I: Debug> {
    #[error("machine has not been started; call set_start_state first")]
    NotStarted,

    #[error("machine is already started; set_start_state may only run once")]
    AlreadyStarted,

    #[error("no state registered with id {0:?}")]
    UnknownState(I),
}
