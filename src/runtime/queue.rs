//! FIFO event queue that drains to empty between bursts.
//!
//! A plain `Vec` with a moving head index: popping advances the head
//! instead of shifting elements, and the storage snaps back to empty
//! once the last element is consumed. Appending is allowed while the
//! queue is being drained, which is how events posted from inside a
//! handler keep global FIFO order. If pops lag behind pushes for long,
//! the consumed prefix is compacted away so the buffer cannot creep.

/// Queue length above which a push considers compacting the consumed
/// prefix.
const NORM_LIMIT: usize = 15;

pub(crate) struct EventQueue<E> {
    store: Vec<E>,
    head: usize,
}

impl<E: Clone> EventQueue<E> {
    pub(crate) fn new() -> Self {
        EventQueue {
            store: Vec::new(),
            head: 0,
        }
    }

    /// Append an event. Safe to call while the queue is being drained.
    pub(crate) fn push(&mut self, event: E) {
        if self.store.len() > NORM_LIMIT {
            self.renormalize();
        }
        self.store.push(event);
    }

    /// Remove and return the oldest event.
    pub(crate) fn pop(&mut self) -> Option<E> {
        if self.is_empty() {
            return None;
        }
        let event = self.store[self.head].clone();
        self.head += 1;
        if self.head == self.store.len() {
            self.store.clear();
            self.head = 0;
        }
        Some(event)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drop all queued events.
    pub(crate) fn clear(&mut self) {
        self.store.clear();
        self.head = 0;
    }

    fn renormalize(&mut self) {
        if self.head > self.store.len() / 2 {
            self.store.drain(..self.head);
            self.head = 0;
        }
    }
}
