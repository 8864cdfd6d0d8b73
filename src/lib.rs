//! Strata: a hierarchical state machine runtime.
//!
//! Strata lets an application declare a tree of states, enter and leave
//! them deterministically, and dispatch events with run-to-completion
//! and parent-bubbling semantics. It is aimed at interrupt-driven and
//! real-time software: all storage is allocated when the machine is
//! built, and the hot path (posting events, taking transitions) is
//! allocation-free.
//!
//! # Core concepts
//!
//! - **State**: a type with entry behavior (its construction), an event
//!   handler, and exit behavior (its [`exit`] hook and `Drop`). One
//!   state per level of the tree is live at a time.
//! - **Bubbling**: an event goes to the innermost active state first;
//!   if unhandled it is offered to each ancestor in turn.
//! - **Run-to-completion**: a transition requested by a handler is
//!   applied only after the full bubble walk for the current event
//!   finishes, and a queued event is dispatched only after the previous
//!   event's transitions are fully applied.
//!
//! [`exit`]: State::exit
//!
//! # Example
//!
//! ```
//! use strata::{
//!     state_ids, Context, DefinitionError, Machine, MachineDef, Outcome, Registrar, State,
//! };
//!
//! state_ids! {
//!     enum Id {
//!         None,
//!         Closed,
//!         Open,
//!     }
//! }
//!
//! #[derive(Clone)]
//! enum Event {
//!     Open,
//!     Close,
//! }
//!
//! struct Door;
//!
//! impl MachineDef for Door {
//!     type Id = Id;
//!     type Event = Event;
//!     type Data = u32; // times the door has been opened
//!
//!     fn states(reg: &mut Registrar<'_, Self>) -> Result<(), DefinitionError<Id>> {
//!         reg.root::<Closed>()?;
//!         reg.root::<Open>()?;
//!         Ok(())
//!     }
//! }
//!
//! struct Closed;
//!
//! impl State<Door> for Closed {
//!     const ID: Id = Id::Closed;
//!
//!     fn enter(_ctx: Context<'_, Door>) -> Self {
//!         Closed
//!     }
//!
//!     fn handle(&mut self, mut ctx: Context<'_, Door>, event: &Event) -> Outcome {
//!         match event {
//!             Event::Open => {
//!                 ctx.transition(Id::Open);
//!                 Outcome::Handled
//!             }
//!             _ => Outcome::Unhandled,
//!         }
//!     }
//! }
//!
//! struct Open;
//!
//! impl State<Door> for Open {
//!     const ID: Id = Id::Open;
//!
//!     fn enter(mut ctx: Context<'_, Door>) -> Self {
//!         *ctx.data_mut() += 1;
//!         Open
//!     }
//!
//!     fn handle(&mut self, mut ctx: Context<'_, Door>, event: &Event) -> Outcome {
//!         match event {
//!             Event::Close => {
//!                 ctx.transition(Id::Closed);
//!                 Outcome::Handled
//!             }
//!             _ => Outcome::Unhandled,
//!         }
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut door = Machine::<Door>::new(0)?;
//! door.set_start_state(Id::Closed)?;
//! door.post_event(Event::Open)?;
//! assert_eq!(door.current_state_id(), Id::Open);
//! assert_eq!(*door.data(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! A machine has a single logical owner. All operations are synchronous
//! and drain fully before returning; the type is not `Send` or `Sync`.
//! When driven from interrupt context, serialize access externally.

pub mod core;
mod macros;
pub mod registry;
pub mod runtime;

pub use crate::core::context::Context;
pub use crate::core::error::{DefinitionError, MachineError};
pub use crate::core::state::{MachineDef, Outcome, State, StateId};
pub use crate::registry::{Registrar, StateDescriptor, StateTable};
pub use crate::runtime::machine::Machine;
