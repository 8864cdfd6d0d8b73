//! Transition planning over the state tree.
//!
//! Given the active chain and a target id, the planner resolves the
//! target's full ancestor chain and finds the divergence point: the
//! deepest level at which both chains still agree. Everything the
//! current chain holds at or above that level exits (leaf first), then
//! the target chain enters from the divergence point down (root first).
//!
//! The target chain is kept in a scratch buffer owned by the planner,
//! so steady-state planning performs no allocation.

use crate::core::error::MachineError;
use crate::core::state::MachineDef;
use crate::registry::StateTable;

pub(crate) struct Planner {
    /// Descriptor indices of the target chain, root first. Valid after
    /// a successful [`plan`](Planner::plan) until the next call.
    next: Vec<usize>,
}

impl Planner {
    pub(crate) fn new() -> Self {
        Planner { next: Vec::new() }
    }

    /// Compute the divergence level for a transition to `target`.
    ///
    /// Levels `divergence..current.len()` must exit, deepest first;
    /// levels `divergence..target_len()` must enter, shallowest first.
    /// A transition to the current leaf is a self-transition: it plans
    /// one exit and one re-entry of the leaf, never a no-op.
    pub(crate) fn plan<M: MachineDef>(
        &mut self,
        table: &StateTable<M>,
        current: &[usize],
        target: M::Id,
    ) -> Result<usize, MachineError<M::Id>> {
        let (target_idx, target_desc) = table
            .find(target)
            .ok_or(MachineError::UnknownState(target))?;

        self.next.clear();
        self.next.resize(target_desc.level() + 1, usize::MAX);
        let mut idx = target_idx;
        loop {
            let desc = table.descriptor(idx);
            self.next[desc.level()] = idx;
            if desc.level() == 0 {
                break;
            }
            idx = desc.parent_idx();
        }

        if current.is_empty() {
            // initial entry: everything from the root down
            return Ok(0);
        }

        // Self-transition: force a fresh exit and entry of the leaf.
        if current.last() == self.next.last() {
            return Ok(current.len() - 1);
        }

        let mut level = 0;
        while level < current.len() && level < self.next.len() && current[level] == self.next[level]
        {
            level += 1;
        }
        Ok(level)
    }

    /// Length of the planned target chain (target level + 1).
    pub(crate) fn target_len(&self) -> usize {
        self.next.len()
    }

    /// Descriptor index to enter at `level` of the planned chain.
    pub(crate) fn step(&self, level: usize) -> usize {
        self.next[level]
    }
}
