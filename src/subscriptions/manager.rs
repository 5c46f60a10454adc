//! Subscription registry and fan-out.

use crate::types::{Subscriber, SubscriberId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::types::Selection;

/// Type-erased view of a subscription, keyed on the full state type.
pub(crate) trait Notify<S> {
    fn subscriber_id(&self) -> SubscriberId;

    /// Deliver the current state unconditionally, establishing the baseline.
    fn push_initial(&self, state: &Rc<S>);

    /// Deliver `state` unless a filter rejects it.
    fn notify(&self, state: &Rc<S>);

    fn deactivate(&self);

    fn is_active(&self) -> bool;
}

/// One subscriber paired with its selection and the last value it was given.
pub(crate) struct Subscription<S, T> {
    id: SubscriberId,
    subscriber: Rc<dyn Subscriber<T>>,
    selection: Selection<S, T>,
    last_delivered: RefCell<Option<Rc<T>>>,
    active: Cell<bool>,
}

impl<S, T> Subscription<S, T> {
    pub(crate) fn new(
        id: SubscriberId,
        subscriber: Rc<dyn Subscriber<T>>,
        selection: Selection<S, T>,
    ) -> Self {
        Self {
            id,
            subscriber,
            selection,
            last_delivered: RefCell::new(None),
            active: Cell::new(true),
        }
    }

    /// Record the value before handing it out, so a nested pass started from
    /// inside the callback compares against what this subscriber saw.
    fn deliver(&self, value: Rc<T>) {
        *self.last_delivered.borrow_mut() = Some(Rc::clone(&value));
        self.subscriber.new_state(&value);
    }
}

impl<S: 'static, T: 'static> Notify<S> for Subscription<S, T> {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn push_initial(&self, state: &Rc<S>) {
        if self.is_active() {
            self.deliver(self.selection.project(state));
        }
    }

    fn notify(&self, state: &Rc<S>) {
        if !self.is_active() {
            return;
        }

        let next = self.selection.project(state);
        let last = self.last_delivered.borrow().clone();
        if let Some(last) = last {
            if self.selection.should_skip(&last, &next) {
                tracing::trace!(subscriber = %self.id, "skipped repeated state");
                return;
            }
        }

        self.deliver(next);
    }

    fn deactivate(&self) {
        self.active.set(false);
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }
}

/// Ordered set of subscriptions, one per subscriber identity.
///
/// Callbacks never run while the entry list is borrowed, so subscribers may
/// add or remove subscriptions from inside a notification.
pub(crate) struct SubscriptionManager<S> {
    entries: RefCell<Vec<Rc<dyn Notify<S>>>>,
}

impl<S> SubscriptionManager<S> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    /// Add a subscription, replacing in place any entry with the same
    /// subscriber identity. Returns true if an entry was replaced.
    pub(crate) fn insert(&self, entry: Rc<dyn Notify<S>>) -> bool {
        let replaced = {
            let mut entries = self.entries.borrow_mut();
            let id = entry.subscriber_id();
            match entries.iter().position(|e| e.subscriber_id() == id) {
                Some(index) => Some(std::mem::replace(&mut entries[index], entry)),
                None => {
                    entries.push(entry);
                    None
                }
            }
        };

        // Dropped outside the borrow: it may hold the last handle to a
        // subscriber whose destructor touches the store.
        match replaced {
            Some(old) => {
                old.deactivate();
                true
            }
            None => false,
        }
    }

    /// Remove the subscription for `id`. Returns false if there was none.
    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            entries
                .iter()
                .position(|e| e.subscriber_id() == id)
                .map(|index| entries.remove(index))
        };

        match removed {
            Some(old) => {
                old.deactivate();
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.entries.borrow().iter().any(|e| e.subscriber_id() == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Notify every subscription registered when the pass starts, in order.
    ///
    /// Entries removed during the pass are skipped; entries added during the
    /// pass wait for the next one. A nested broadcast started from a callback
    /// runs to completion, then this pass resumes where it left off.
    pub(crate) fn broadcast(&self, state: &Rc<S>) {
        let snapshot: Vec<Rc<dyn Notify<S>>> = self.entries.borrow().clone();

        for entry in snapshot {
            entry.notify(state);
        }
    }
}

impl<S> Default for SubscriptionManager<S> {
    fn default() -> Self {
        Self::new()
    }
}
