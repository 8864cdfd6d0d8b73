//! The machine façade: owns the table, arena, queue and active chain.

use tracing::{debug, trace};

use crate::core::context::CtxParts;
use crate::core::error::{DefinitionError, MachineError};
use crate::core::state::{MachineDef, State, StateId};
use crate::registry::StateTable;
use crate::runtime::arena::LevelArena;
use crate::runtime::dispatch;
use crate::runtime::planner::Planner;
use crate::runtime::queue::EventQueue;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
    Unstarted,
    Running,
}

/// A running instance of one machine definition.
///
/// Construction builds the state-description table and allocates the
/// per-level arena; after that the hot path (posting events, taking
/// transitions) performs no allocation. Dropping the machine exits
/// every active state, leaf to root, so every entered state is exited
/// exactly once.
///
/// A machine assumes one logical owner: all calls are synchronous and
/// run to completion, and the type is deliberately not `Send`/`Sync`.
pub struct Machine<M: MachineDef> {
    table: StateTable<M>,
    arena: LevelArena<M>,
    /// Active chain: descriptor indices, root first. Length equals the
    /// current leaf's level + 1.
    chain: Vec<usize>,
    planner: Planner,
    queue: EventQueue<M::Event>,
    pending: Option<M::Id>,
    data: M::Data,
    phase: Phase,
}

impl<M: MachineDef> Machine<M> {
    /// Build a machine from its definition.
    ///
    /// Runs [`MachineDef::states`]; any registration mistake surfaces
    /// here, before a single state can be entered.
    pub fn new(data: M::Data) -> Result<Self, DefinitionError<M::Id>> {
        let table = StateTable::build()?;
        let arena = LevelArena::new(table.level_layouts());
        let chain = Vec::with_capacity(table.levels());
        Ok(Machine {
            table,
            arena,
            chain,
            planner: Planner::new(),
            queue: EventQueue::new(),
            pending: None,
            data,
            phase: Phase::Unstarted,
        })
    }

    /// Enter the start state and begin running.
    ///
    /// Performs entry-only planning from the root down to `id`, then
    /// moves the machine to Running. Only one call may succeed; events
    /// posted by the entry actions are drained before returning.
    ///
    /// If startup fails (the target is unknown, or an entry action
    /// requests a transition to an unknown id), everything entered so
    /// far is exited again and anything posted meanwhile is discarded:
    /// the machine stays unstarted and a later call starts from
    /// scratch, entry-only.
    pub fn set_start_state(&mut self, id: M::Id) -> Result<(), MachineError<M::Id>> {
        if self.phase != Phase::Unstarted {
            return Err(MachineError::AlreadyStarted);
        }
        debug!(state = ?id, "starting machine");
        self.pending = Some(id);
        if let Err(err) = self.run_pending() {
            self.abort_start();
            return Err(err);
        }
        self.phase = Phase::Running;
        if !self.queue.is_empty() {
            self.drain()?;
        }
        Ok(())
    }

    /// Post one event.
    ///
    /// The event is queued; if no drain is in progress this call owns
    /// the drain loop and processes the whole queue (including events
    /// posted meanwhile) before returning. Transitions triggered by an
    /// event are fully applied before the next event is dispatched.
    pub fn post_event(&mut self, event: M::Event) -> Result<(), MachineError<M::Id>> {
        if self.phase != Phase::Running {
            return Err(MachineError::NotStarted);
        }
        let draining = !self.queue.is_empty();
        self.queue.push(event);
        if draining {
            // a caller further up the stack owns the drain loop
            return Ok(());
        }
        self.drain()
    }

    /// Identifier of the innermost active state, or the reserved null
    /// id while unstarted.
    pub fn current_state_id(&self) -> M::Id {
        self.chain
            .last()
            .map(|&idx| self.table.descriptor(idx).id())
            .unwrap_or(M::Id::NULL)
    }

    /// Borrow the innermost active state if it is an `S`.
    pub fn current_state<S: State<M>>(&self) -> Option<&S> {
        let leaf = self.chain.len().checked_sub(1)?;
        self.arena.get::<S>(leaf)
    }

    /// Borrow `S` if it is active anywhere in the chain, leaf or
    /// ancestor.
    pub fn active_state<S: State<M>>(&self) -> Option<&S> {
        (0..self.chain.len()).rev().find_map(|level| self.arena.get::<S>(level))
    }

    /// Identifiers of the active chain, root first.
    pub fn active_ids(&self) -> impl Iterator<Item = M::Id> + '_ {
        self.chain.iter().map(|&idx| self.table.descriptor(idx).id())
    }

    /// Depth of the active chain (current leaf level + 1, or 0 while
    /// unstarted).
    pub fn depth(&self) -> usize {
        self.chain.len()
    }

    /// Whether [`set_start_state`](Self::set_start_state) has run.
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// The machine's state-description table.
    pub fn table(&self) -> &StateTable<M> {
        &self.table
    }

    /// Shared access to the user data.
    pub fn data(&self) -> &M::Data {
        &self.data
    }

    /// Exclusive access to the user data.
    pub fn data_mut(&mut self) -> &mut M::Data {
        &mut self.data
    }

    fn drain(&mut self) -> Result<(), MachineError<M::Id>> {
        while let Some(event) = self.queue.pop() {
            if let Err(err) = self.process_event(&event) {
                // a failed transition must not leave half a queue behind
                self.queue.clear();
                return Err(err);
            }
        }
        Ok(())
    }

    fn process_event(&mut self, event: &M::Event) -> Result<(), MachineError<M::Id>> {
        let depth = self.chain.len();
        let outcome = dispatch::bubble(
            &mut self.arena,
            depth,
            event,
            CtxParts {
                data: &mut self.data,
                pending: &mut self.pending,
                queue: &mut self.queue,
            },
        );
        trace!(?outcome, "dispatch complete");
        self.run_pending()
    }

    /// Apply pending transition requests until none remain. Entry and
    /// exit actions may themselves request further transitions; those
    /// are honored here, in request order.
    fn run_pending(&mut self) -> Result<(), MachineError<M::Id>> {
        while let Some(target) = self.pending.take() {
            self.apply_transition(target)?;
        }
        Ok(())
    }

    fn apply_transition(&mut self, target: M::Id) -> Result<(), MachineError<M::Id>> {
        let divergence = self.planner.plan(&self.table, &self.chain, target)?;
        debug!(target = ?target, divergence, "transition");

        // exit strictly leaf to root
        while self.chain.len() > divergence {
            let level = self.chain.len() - 1;
            self.arena.dematerialize(
                level,
                CtxParts {
                    data: &mut self.data,
                    pending: &mut self.pending,
                    queue: &mut self.queue,
                },
            );
            self.chain.pop();
        }

        // enter strictly root to leaf; the chain is extended before each
        // entry so a constructor already sees itself as the leaf
        while self.chain.len() < self.planner.target_len() {
            let level = self.chain.len();
            let idx = self.planner.step(level);
            self.chain.push(idx);
            let desc = self.table.descriptor(idx);
            self.arena.materialize(
                level,
                desc,
                CtxParts {
                    data: &mut self.data,
                    pending: &mut self.pending,
                    queue: &mut self.queue,
                },
            );
        }
        Ok(())
    }

    /// Undo a partially applied start: exit whatever was entered and
    /// discard any transition request or event it produced.
    fn abort_start(&mut self) {
        self.teardown();
        self.pending = None;
        self.queue.clear();
    }

    /// Exit every active level, leaf to root.
    fn teardown(&mut self) {
        while !self.chain.is_empty() {
            let level = self.chain.len() - 1;
            self.arena.dematerialize(
                level,
                CtxParts {
                    data: &mut self.data,
                    pending: &mut self.pending,
                    queue: &mut self.queue,
                },
            );
            self.chain.pop();
        }
    }
}

impl<M: MachineDef> Drop for Machine<M> {
    fn drop(&mut self) {
        // symmetric: every entered state is exited exactly once
        self.teardown();
    }
}
