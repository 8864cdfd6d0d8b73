//! Innermost-first event delivery with parent bubbling.

use tracing::trace;

use crate::core::context::CtxParts;
use crate::core::state::{MachineDef, Outcome};
use crate::runtime::arena::LevelArena;

/// Deliver `event` to the innermost active state and bubble it toward
/// the root until some handler consumes it.
///
/// Transition requests made by handlers land in the pending register
/// carried inside `parts`; they are deliberately not applied here, so
/// the walk always runs to completion before any exit or entry fires.
pub(crate) fn bubble<M: MachineDef>(
    arena: &mut LevelArena<M>,
    depth: usize,
    event: &M::Event,
    mut parts: CtxParts<'_, M>,
) -> Outcome {
    for level in (0..depth).rev() {
        if arena.deliver(level, event, parts.reborrow()) == Outcome::Handled {
            trace!(level, "event handled");
            return Outcome::Handled;
        }
    }
    trace!("event unhandled by every active state");
    Outcome::Unhandled
}
