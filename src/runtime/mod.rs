//! Runtime machinery: level arena, planner, queue, dispatcher, façade.

pub(crate) mod arena;
pub(crate) mod dispatch;
pub mod machine;
pub(crate) mod planner;
pub(crate) mod queue;

pub use machine::Machine;
