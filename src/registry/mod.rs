//! The static state-description table.
//!
//! Built once per machine construction from [`MachineDef::states`] and
//! immutable afterwards. For every declared state the table records its
//! identifier, parent, nesting level, storage layout and a factory that
//! constructs the state in place. It also tracks, per level, the layout
//! of the largest state that can occupy that level, which is what sizes
//! the level arena.

use std::alloc::Layout;
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::core::context::Context;
use crate::core::error::DefinitionError;
use crate::core::state::{MachineDef, Outcome, State, StateId};

/// Object-safe view of one live state, used by the dispatcher and the
/// arena. Every registered state type is driven through this trait via
/// the [`Sink`] shim, so the hot path needs no knowledge of concrete
/// state types.
pub(crate) trait EventSink<M: MachineDef> {
    fn handle(&mut self, ctx: Context<'_, M>, event: &M::Event) -> Outcome;
    fn exit(&mut self, ctx: Context<'_, M>);
}

/// Transparent wrapper binding a concrete state type to [`EventSink`].
///
/// `repr(transparent)` keeps the state at offset zero, which is what
/// allows an id-checked pointer cast back to `&S`.
#[repr(transparent)]
pub(crate) struct Sink<M, S> {
    pub(crate) state: S,
    _def: PhantomData<fn() -> M>,
}

impl<M: MachineDef, S: State<M>> EventSink<M> for Sink<M, S> {
    fn handle(&mut self, ctx: Context<'_, M>, event: &M::Event) -> Outcome {
        self.state.handle(ctx, event)
    }

    fn exit(&mut self, ctx: Context<'_, M>) {
        self.state.exit(ctx)
    }
}

/// Constructs a state in place inside raw level storage and returns the
/// dispatch handle to it.
pub(crate) type Factory<M> = unsafe fn(NonNull<u8>, Context<'_, M>) -> NonNull<dyn EventSink<M>>;

/// Monomorphized factory stored in each descriptor.
///
/// # Safety
///
/// `dst` must point at unoccupied storage at least as large and aligned
/// as `Layout::new::<Sink<M, S>>()`, and must stay valid and pinned for
/// as long as the returned handle is live.
unsafe fn construct<M: MachineDef, S: State<M>>(
    dst: NonNull<u8>,
    ctx: Context<'_, M>,
) -> NonNull<dyn EventSink<M>> {
    let slot = dst.cast::<Sink<M, S>>();
    unsafe {
        slot.as_ptr().write(Sink {
            state: S::enter(ctx),
            _def: PhantomData,
        });
    }
    let wide: *mut dyn EventSink<M> = slot.as_ptr();
    // derived from a NonNull, so never null
    unsafe { NonNull::new_unchecked(wide) }
}

/// Immutable metadata for one registered state.
pub struct StateDescriptor<M: MachineDef> {
    id: M::Id,
    parent_id: M::Id,
    level: usize,
    layout: Layout,
    name: &'static str,
    factory: Factory<M>,
    parent_idx: usize,
}

impl<M: MachineDef> StateDescriptor<M> {
    /// The state's identifier.
    pub fn id(&self) -> M::Id {
        self.id
    }

    /// The enclosing state's identifier; equal to [`id`](Self::id) for
    /// a root state.
    pub fn parent_id(&self) -> M::Id {
        self.parent_id
    }

    /// Nesting depth: roots are level 0, children are one below their
    /// parent.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Whether this descriptor names a root state.
    pub fn is_root(&self) -> bool {
        self.parent_id == self.id
    }

    /// The state's type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn layout(&self) -> Layout {
        self.layout
    }

    pub(crate) fn factory(&self) -> Factory<M> {
        self.factory
    }

    pub(crate) fn parent_idx(&self) -> usize {
        self.parent_idx
    }
}

// derives would demand Debug of the factory fn pointer's generics
impl<M: MachineDef> fmt::Debug for StateDescriptor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateDescriptor")
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("level", &self.level)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<M: MachineDef> fmt::Debug for StateTable<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTable")
            .field("states", &self.states)
            .field("level_layouts", &self.level_layouts)
            .finish()
    }
}

/// The state-description table for one machine type.
pub struct StateTable<M: MachineDef> {
    states: Vec<StateDescriptor<M>>,
    level_layouts: Vec<Layout>,
}

impl<M: MachineDef> StateTable<M> {
    /// Run the definition's registration hook and build the table.
    pub fn build() -> Result<Self, DefinitionError<M::Id>> {
        let mut table = StateTable {
            states: Vec::new(),
            level_layouts: Vec::new(),
        };
        let mut reg = Registrar { table: &mut table };
        M::states(&mut reg)?;
        Ok(table)
    }

    /// Look up a descriptor (and its table index) by state id.
    pub fn find(&self, id: M::Id) -> Option<(usize, &StateDescriptor<M>)> {
        self.states.iter().enumerate().find(|(_, desc)| desc.id == id)
    }

    /// Number of registered states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no state has been registered.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of nesting levels (max level + 1).
    pub fn levels(&self) -> usize {
        self.level_layouts.len()
    }

    /// All descriptors, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &StateDescriptor<M>> {
        self.states.iter()
    }

    pub(crate) fn descriptor(&self, idx: usize) -> &StateDescriptor<M> {
        &self.states[idx]
    }

    /// Per-level storage requirements: size and alignment of the
    /// largest state registered at each level. Raised incrementally by
    /// each registration, never lowered.
    pub(crate) fn level_layouts(&self) -> &[Layout] {
        &self.level_layouts
    }

    fn register<S: State<M>>(&mut self, parent_id: M::Id) -> Result<(), DefinitionError<M::Id>> {
        if S::ID == <M::Id as StateId>::NULL {
            return Err(DefinitionError::ReservedId);
        }
        if self.find(S::ID).is_some() {
            return Err(DefinitionError::DuplicateState(S::ID));
        }
        let (level, parent_idx) = if parent_id == S::ID {
            // a root is its own parent
            (0, self.states.len())
        } else {
            let (parent_idx, parent) = self
                .find(parent_id)
                .ok_or(DefinitionError::UnknownParent(parent_id))?;
            (parent.level + 1, parent_idx)
        };

        let layout = Layout::new::<Sink<M, S>>();
        if self.level_layouts.len() <= level {
            self.level_layouts.resize(level + 1, Layout::new::<()>());
        }
        self.level_layouts[level] = max_layout(self.level_layouts[level], layout);

        self.states.push(StateDescriptor {
            id: S::ID,
            parent_id,
            level,
            layout,
            name: type_name::<S>(),
            factory: construct::<M, S>,
            parent_idx,
        });
        Ok(())
    }
}

/// Registration handle passed to [`MachineDef::states`].
pub struct Registrar<'a, M: MachineDef> {
    table: &'a mut StateTable<M>,
}

impl<'a, M: MachineDef> Registrar<'a, M> {
    /// Register a root state (a state that is its own parent).
    pub fn root<S: State<M>>(&mut self) -> Result<(), DefinitionError<M::Id>> {
        self.table.register::<S>(S::ID)
    }

    /// Register `S` as a child of `P`. `P` must already be registered.
    pub fn child<S: State<M>, P: State<M>>(&mut self) -> Result<(), DefinitionError<M::Id>> {
        self.table.register::<S>(P::ID)
    }
}

fn max_layout(a: Layout, b: Layout) -> Layout {
    Layout::from_size_align(a.size().max(b.size()), a.align().max(b.align()))
        .expect("level layout exceeds isize::MAX")
}
