//! Revocable registrations on external change streams.
//!
//! Providers attach to "content changed" and "download finished" streams
//! with explicit handles instead of implicit object lifetimes; dropping
//! the handle detaches the handler, and a handler can detach itself by
//! returning [`Subsist::Stop`].

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Whether a fired handler stays attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsist {
    /// Keep the registration armed.
    Keep,
    /// Detach after this event, like a take-one subscription.
    Stop,
}

/// Handler attached to an event stream.
pub type EventHandler = Box<dyn FnMut() -> Subsist + Send>;

type Slot = Arc<Mutex<EventHandler>>;

#[derive(Default)]
struct Slots {
    next_id: u64,
    handlers: HashMap<u64, Slot>,
}

/// A broadcast stream of unit events with revocable subscriptions.
///
/// Events are delivered synchronously on the firing thread, which by
/// contract is the coordinating thread.
#[derive(Default)]
pub struct EventStream {
    slots: Arc<Mutex<Slots>>,
}

impl EventStream {
    /// Creates an empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a handler; it stays attached until the returned
    /// [`Registration`] is dropped or the handler returns [`Subsist::Stop`].
    pub fn subscribe(&self, handler: impl FnMut() -> Subsist + Send + 'static) -> Registration {
        self.subscribe_boxed(Box::new(handler))
    }

    /// [`subscribe`](Self::subscribe) for an already-boxed handler, as
    /// handed through the collaborator ports.
    pub fn subscribe_boxed(&self, handler: EventHandler) -> Registration {
        let mut slots = self.slots.lock();
        let id = slots.next_id;
        slots.next_id += 1;
        slots.handlers.insert(id, Arc::new(Mutex::new(handler)));
        Registration {
            id,
            slots: Arc::downgrade(&self.slots),
        }
    }

    /// Fires the event, invoking every attached handler once.
    ///
    /// The slot table lock is not held across handler invocations, so a
    /// handler may subscribe or drop registrations on this same stream.
    pub fn fire(&self) {
        let snapshot: Vec<(u64, Slot)> = {
            let slots = self.slots.lock();
            slots
                .handlers
                .iter()
                .map(|(id, slot)| (*id, slot.clone()))
                .collect()
        };
        for (id, slot) in snapshot {
            // The slot may have been revoked between snapshot and call.
            let still_attached = self.slots.lock().handlers.contains_key(&id);
            if !still_attached {
                continue;
            }
            let verdict = {
                let mut handler = slot.lock();
                (&mut **handler)()
            };
            if verdict == Subsist::Stop {
                self.slots.lock().handlers.remove(&id);
            }
        }
    }

    /// Number of attached handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().handlers.len()
    }

    /// True when no handler is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle for one attached handler; detaches on drop.
#[must_use = "dropping the registration immediately detaches the handler"]
pub struct Registration {
    id: u64,
    slots: Weak<Mutex<Slots>>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.upgrade() {
            slots.lock().handlers.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}
