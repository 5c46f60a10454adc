//! Subscriptions: who gets notified after a dispatch, and with what.
//!
//! Each subscriber identity owns at most one subscription. A subscription
//! pairs the subscriber with a [`Selection`]:
//! - a projection from the full state to the substate it cares about
//! - optional filters that suppress redundant deliveries
//!
//! The registry tolerates subscribe/unsubscribe calls made from inside a
//! notification: a broadcast iterates over the entries present when it
//! started and skips any that were removed since.

mod manager;
mod types;

pub(crate) use manager::{Notify, Subscription, SubscriptionManager};
pub use types::Selection;
