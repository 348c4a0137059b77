//! Deferred event emission for the text model.
//!
//! Two emitter flavors share one discipline and differ only in payload
//! policy:
//!
//! * [`QueueingEmitter`] buffers every fire while a deferred scope is open
//!   and drains the queue FIFO when the outermost scope closes.
//! * [`SignalEmitter`] collapses any number of fires inside a scope into at
//!   most one payload-free notification on scope exit.
//!
//! Scopes nest by counting; only the outermost `end_deferred_emit` flushes.
//! Outside any scope both emitters deliver immediately. Observers therefore
//! never see a half-applied batch: every mutating model entry point opens a
//! scope on both emitters before touching state.
//!
//! Emitters hold no reference back to their owner; the owner calls `fire`
//! directly (and is free to drop the emitter to detach all listeners).

use std::collections::VecDeque;

use tracing::trace;

/// Handle returned by `on`; pass to `off` to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Box<dyn FnMut(&E)>;

/// FIFO-buffering emitter.
pub struct QueueingEmitter<E> {
    listeners: Vec<(ListenerId, Listener<E>)>,
    next_listener: u64,
    deferred_depth: u32,
    queue: VecDeque<E>,
    suppressed: bool,
}

impl<E> Default for QueueingEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> QueueingEmitter<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_listener: 0,
            deferred_depth: 0,
            queue: VecDeque::new(),
            suppressed: false,
        }
    }

    pub fn on(&mut self, listener: impl FnMut(&E) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn off(&mut self, id: ListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Drop all firings until re-enabled. Used during teardown so observers
    /// do not see events from a half-disposed model.
    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    pub fn begin_deferred_emit(&mut self) {
        self.deferred_depth += 1;
    }

    pub fn end_deferred_emit(&mut self) {
        debug_assert!(self.deferred_depth > 0, "unbalanced end_deferred_emit");
        self.deferred_depth -= 1;
        if self.deferred_depth == 0 && !self.queue.is_empty() {
            trace!(target: "model.events", queued = self.queue.len(), "flush");
            while let Some(event) = self.queue.pop_front() {
                self.deliver(&event);
            }
        }
    }

    pub fn fire(&mut self, event: E) {
        if self.suppressed {
            return;
        }
        if self.deferred_depth > 0 {
            self.queue.push_back(event);
        } else {
            self.deliver(&event);
        }
    }

    fn deliver(&mut self, event: &E) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(event);
        }
    }
}

/// Collapsing emitter: at most one notification per deferred scope.
pub struct SignalEmitter {
    listeners: Vec<(ListenerId, Box<dyn FnMut()>)>,
    next_listener: u64,
    deferred_depth: u32,
    should_fire: bool,
    suppressed: bool,
}

impl Default for SignalEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_listener: 0,
            deferred_depth: 0,
            should_fire: false,
            suppressed: false,
        }
    }

    pub fn on(&mut self, listener: impl FnMut() + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn off(&mut self, id: ListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }

    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    pub fn begin_deferred_emit(&mut self) {
        self.deferred_depth += 1;
    }

    pub fn end_deferred_emit(&mut self) {
        debug_assert!(self.deferred_depth > 0, "unbalanced end_deferred_emit");
        self.deferred_depth -= 1;
        if self.deferred_depth == 0 && self.should_fire {
            self.should_fire = false;
            self.deliver();
        }
    }

    pub fn fire(&mut self) {
        if self.suppressed {
            return;
        }
        if self.deferred_depth > 0 {
            self.should_fire = true;
        } else {
            self.deliver();
        }
    }

    fn deliver(&mut self) {
        for (_, listener) in self.listeners.iter_mut() {
            listener();
        }
    }
}
