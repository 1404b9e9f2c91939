#![forbid(unsafe_code)]

//! Listener registration with RAII unsubscription.
//!
//! Listeners are held by their [`Subscription`] guard; the registry only
//! keeps `Weak` references. Dropping the guard makes the listener
//! unreachable immediately, and the dead entry is pruned on the next
//! notification.
//!
//! # Failure Modes
//!
//! - **Leaked guard**: storing a `Subscription` forever keeps the listener
//!   alive forever. Dead weak references are cleaned lazily.

use std::any::Any;
use std::rc::{Rc, Weak};

type ListenerRc<E> = Rc<dyn Fn(&E)>;
type ListenerWeak<E> = Weak<dyn Fn(&E)>;

/// Ordered listener registry for one event type.
pub(crate) struct Listeners<E> {
    entries: Vec<ListenerWeak<E>>,
}

impl<E: 'static> Listeners<E> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, listener: impl Fn(&E) + 'static) -> Subscription {
        let strong: ListenerRc<E> = Rc::new(listener);
        self.entries.push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Prune dead entries and return the live ones in registration order.
    ///
    /// Callers invoke the returned listeners after releasing any borrow of
    /// the owning state, so listeners may re-enter the tree.
    pub(crate) fn live(&mut self) -> Vec<ListenerRc<E>> {
        self.entries.retain(|w| w.strong_count() > 0);
        self.entries.iter().filter_map(Weak::upgrade).collect()
    }

    /// Registered entries, including dead ones not yet pruned.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// RAII guard for a tree listener.
///
/// Dropping the `Subscription` unregisters the listener before the next
/// event is delivered.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    /// Type-erased strong reference keeping the listener `Rc` alive.
    _guard: Box<dyn Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
