//! Core types shared by the store and its subscriptions.

use std::fmt;
use std::rc::Rc;

/// Anything that can receive a new state value from a store.
///
/// Closures taking `&T` are subscribers too.
pub trait Subscriber<T: ?Sized> {
    fn new_state(&self, state: &T);
}

impl<T: ?Sized, F> Subscriber<T> for F
where
    F: Fn(&T),
{
    fn new_state(&self, state: &T) {
        self(state)
    }
}

/// Identity of a subscriber: the address of its `Rc` allocation.
///
/// Two handles to the same allocation are the same subscriber, regardless of
/// how their contents compare.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

impl SubscriberId {
    pub fn of<T: ?Sized>(subscriber: &Rc<T>) -> Self {
        SubscriberId(Rc::as_ptr(subscriber).cast::<()>() as usize)
    }
}

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({:#x})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
