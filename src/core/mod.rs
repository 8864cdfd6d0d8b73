//! User-facing traits, the state context, and error types.

pub mod context;
pub mod error;
pub mod state;

pub use context::Context;
pub use error::{DefinitionError, MachineError};
pub use state::{MachineDef, Outcome, State, StateId};
