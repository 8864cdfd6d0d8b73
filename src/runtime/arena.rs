//! Per-level storage for live state objects.
//!
//! Each nesting level owns one raw byte buffer sized at machine
//! construction for the largest state registered at that level. A level
//! holds at most one live state at a time; entering a state constructs
//! it in place inside the level's buffer, exiting destroys it in place.
//! Buffers are allocated exactly once and never move while occupied, so
//! handles into them stay valid until the level is exited.
//!
//! Slot misuse (materializing an occupied level, dematerializing an
//! empty one) is an internal invariant violation and panics.

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ptr::{self, NonNull};

use tracing::trace;

use crate::core::context::CtxParts;
use crate::core::state::{MachineDef, Outcome, State};
use crate::registry::{EventSink, Sink, StateDescriptor};

/// One fixed, alignment-correct block of raw storage.
struct RawStorage {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl RawStorage {
    fn allocate(layout: Layout) -> Self {
        if layout.size() == 0 {
            // aligned dangling pointer; only zero-sized writes go through it
            let ptr = unsafe { NonNull::new_unchecked(layout.align() as *mut u8) };
            return RawStorage { ptr, layout };
        }
        let raw = unsafe { alloc(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            handle_alloc_error(layout);
        };
        RawStorage { ptr, layout }
    }
}

impl Drop for RawStorage {
    fn drop(&mut self) {
        if self.layout.size() != 0 {
            unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
        }
    }
}

/// Handle to the state currently materialized in a slot.
struct Live<M: MachineDef> {
    id: M::Id,
    sink: NonNull<dyn EventSink<M>>,
}

/// Storage and occupancy for one nesting level.
pub(crate) struct Slot<M: MachineDef> {
    storage: RawStorage,
    live: Option<Live<M>>,
}

impl<M: MachineDef> Slot<M> {
    /// Borrow the live state if this slot currently holds an `S`.
    ///
    /// The id comparison is what makes the downcast sound: registration
    /// rejects duplicate ids, so a matching id pins the concrete type
    /// constructed in this buffer to `Sink<M, S>`.
    pub(crate) fn borrow_state<S: State<M>>(&self) -> Option<&S> {
        let live = self.live.as_ref()?;
        if live.id != S::ID {
            return None;
        }
        let sink = live.sink.cast::<Sink<M, S>>();
        Some(unsafe { &sink.as_ref().state })
    }
}

impl<M: MachineDef> Drop for Slot<M> {
    fn drop(&mut self) {
        // ordinary teardown empties every slot first; this path only
        // runs when an unwind abandons the arena mid-flight
        if let Some(live) = self.live.take() {
            unsafe { ptr::drop_in_place(live.sink.as_ptr()) };
        }
    }
}

/// The reusable per-level arena.
pub(crate) struct LevelArena<M: MachineDef> {
    slots: Vec<Slot<M>>,
}

impl<M: MachineDef> LevelArena<M> {
    /// Allocate one buffer per level. Called once, before any state is
    /// entered; the layouts come from the finished descriptor table.
    pub(crate) fn new(level_layouts: &[Layout]) -> Self {
        let slots = level_layouts
            .iter()
            .map(|&layout| Slot {
                storage: RawStorage::allocate(layout),
                live: None,
            })
            .collect();
        LevelArena { slots }
    }

    /// Construct `desc`'s state in place at `level`.
    pub(crate) fn materialize(
        &mut self,
        level: usize,
        desc: &StateDescriptor<M>,
        mut parts: CtxParts<'_, M>,
    ) {
        let (below, rest) = self.slots.split_at_mut(level);
        let slot = &mut rest[0];
        assert!(
            slot.live.is_none(),
            "state slot at level {level} is already occupied"
        );
        debug_assert!(desc.layout().size() <= slot.storage.layout.size());
        trace!(state = desc.name(), level, "enter");
        // SAFETY: the buffer was sized and aligned for the largest
        // descriptor at this level and the slot is unoccupied.
        let sink = unsafe { (desc.factory())(slot.storage.ptr, parts.ctx(below)) };
        slot.live = Some(Live { id: desc.id(), sink });
    }

    /// Run the exit action of the state at `level` and destroy it.
    pub(crate) fn dematerialize(&mut self, level: usize, mut parts: CtxParts<'_, M>) {
        let (below, rest) = self.slots.split_at_mut(level);
        let slot = &mut rest[0];
        let Some(live) = slot.live.take() else {
            panic!("state slot at level {level} is empty");
        };
        trace!(state = ?live.id, level, "exit");
        // SAFETY: `sink` was produced by this slot's factory and the
        // slot is marked empty before anything can reuse the buffer.
        unsafe {
            (*live.sink.as_ptr()).exit(parts.ctx(below));
            ptr::drop_in_place(live.sink.as_ptr());
        }
    }

    /// Deliver one event to the state at `level`.
    pub(crate) fn deliver(
        &mut self,
        level: usize,
        event: &M::Event,
        mut parts: CtxParts<'_, M>,
    ) -> Outcome {
        let (below, rest) = self.slots.split_at_mut(level);
        let sink = rest[0]
            .live
            .as_ref()
            .expect("dispatch to an empty state slot")
            .sink;
        // SAFETY: `sink` points into this level's buffer; `below` covers
        // strictly lower levels, so no aliasing with the handled state.
        unsafe { (*sink.as_ptr()).handle(parts.ctx(below), event) }
    }

    /// Borrow the live state at `level` if it is an `S`.
    pub(crate) fn get<S: State<M>>(&self, level: usize) -> Option<&S> {
        self.slots.get(level)?.borrow_state::<S>()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::core::context::Context;
    use crate::core::error::DefinitionError;
    use crate::registry::{Registrar, StateTable};
    use crate::runtime::queue::EventQueue;
    use crate::state_ids;

    state_ids! {
        enum Id {
            None,
            Outer,
            Inner,
        }
    }

    type Trace = Rc<RefCell<Vec<&'static str>>>;

    struct Def;

    impl MachineDef for Def {
        type Id = Id;
        type Event = i32;
        type Data = Trace;

        fn states(reg: &mut Registrar<'_, Self>) -> Result<(), DefinitionError<Id>> {
            reg.root::<Outer>()?;
            reg.child::<Inner, Outer>()?;
            Ok(())
        }
    }

    struct Outer {
        tag: u32,
    }

    impl State<Def> for Outer {
        const ID: Id = Id::Outer;

        fn enter(mut ctx: Context<'_, Def>) -> Self {
            ctx.data_mut().borrow_mut().push("outer enter");
            Outer { tag: 7 }
        }

        fn handle(&mut self, mut ctx: Context<'_, Def>, _event: &i32) -> Outcome {
            ctx.data_mut().borrow_mut().push("outer event");
            Outcome::Handled
        }

        fn exit(&mut self, mut ctx: Context<'_, Def>) {
            ctx.data_mut().borrow_mut().push("outer exit");
        }
    }

    struct Inner;

    impl State<Def> for Inner {
        const ID: Id = Id::Inner;

        fn enter(mut ctx: Context<'_, Def>) -> Self {
            let parent_tag = ctx.ancestor::<Outer>().expect("outer is live").tag;
            assert_eq!(parent_tag, 7);
            ctx.data_mut().borrow_mut().push("inner enter");
            Inner
        }

        fn handle(&mut self, mut ctx: Context<'_, Def>, _event: &i32) -> Outcome {
            ctx.data_mut().borrow_mut().push("inner event");
            Outcome::Unhandled
        }

        fn exit(&mut self, mut ctx: Context<'_, Def>) {
            ctx.data_mut().borrow_mut().push("inner exit");
        }
    }

    struct Fixture {
        table: StateTable<Def>,
        arena: LevelArena<Def>,
        data: Trace,
        pending: Option<Id>,
        queue: EventQueue<i32>,
    }

    impl Fixture {
        fn new() -> Self {
            let table = StateTable::<Def>::build().unwrap();
            let arena = LevelArena::new(table.level_layouts());
            Fixture {
                table,
                arena,
                data: Rc::new(RefCell::new(Vec::new())),
                pending: None,
                queue: EventQueue::new(),
            }
        }

        fn materialize(&mut self, id: Id) {
            let (idx, _) = self.table.find(id).unwrap();
            let desc = self.table.descriptor(idx);
            let parts = CtxParts {
                data: &mut self.data,
                pending: &mut self.pending,
                queue: &mut self.queue,
            };
            self.arena.materialize(desc.level(), desc, parts);
        }

        fn dematerialize(&mut self, level: usize) {
            let parts = CtxParts {
                data: &mut self.data,
                pending: &mut self.pending,
                queue: &mut self.queue,
            };
            self.arena.dematerialize(level, parts);
        }

        fn deliver(&mut self, level: usize, event: i32) -> Outcome {
            let parts = CtxParts {
                data: &mut self.data,
                pending: &mut self.pending,
                queue: &mut self.queue,
            };
            self.arena.deliver(level, &event, parts)
        }
    }

    #[test]
    fn materialize_runs_entry_and_get_borrows() {
        let mut fx = Fixture::new();
        fx.materialize(Id::Outer);
        fx.materialize(Id::Inner);

        assert_eq!(fx.arena.get::<Outer>(0).unwrap().tag, 7);
        assert!(fx.arena.get::<Inner>(1).is_some());
        // wrong type at a level yields None, never a punned read
        assert!(fx.arena.get::<Inner>(0).is_none());
        assert!(fx.arena.get::<Outer>(1).is_none());

        assert_eq!(*fx.data.borrow(), ["outer enter", "inner enter"]);
    }

    #[test]
    fn dematerialize_runs_exit_then_drop() {
        let mut fx = Fixture::new();
        fx.materialize(Id::Outer);
        fx.materialize(Id::Inner);

        fx.dematerialize(1);
        assert!(fx.arena.get::<Inner>(1).is_none());
        fx.dematerialize(0);

        assert_eq!(
            *fx.data.borrow(),
            ["outer enter", "inner enter", "inner exit", "outer exit"]
        );
    }

    #[test]
    fn deliver_reaches_the_addressed_level() {
        let mut fx = Fixture::new();
        fx.materialize(Id::Outer);
        fx.materialize(Id::Inner);

        assert_eq!(fx.deliver(1, 0), Outcome::Unhandled);
        assert_eq!(fx.deliver(0, 0), Outcome::Handled);

        assert_eq!(
            *fx.data.borrow(),
            ["outer enter", "inner enter", "inner event", "outer event"]
        );
    }

    #[test]
    #[should_panic(expected = "already occupied")]
    fn materializing_an_occupied_slot_panics() {
        let mut fx = Fixture::new();
        fx.materialize(Id::Outer);
        fx.materialize(Id::Outer);
    }

    #[test]
    #[should_panic(expected = "is empty")]
    fn dematerializing_an_empty_slot_panics() {
        let mut fx = Fixture::new();
        fx.dematerialize(0);
    }
}
