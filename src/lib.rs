//! # Reflux
//!
//! A unidirectional-data-flow state container. A single piece of state is
//! replaced only by a pure reducer driven by actions, and subscribers are
//! notified synchronously after every change.
//!
//! ## Core Concepts
//!
//! - **Store**: owns the current state, the reducer and the subscriptions
//! - **Reducer**: `(&Action, Option<&State>) -> Result<State>`
//! - **Subscriber**: anything that can receive a state value, compared by identity
//! - **Selection**: a substate projection plus optional skip-repeats filters
//! - **Middleware**: wrappers composed around dispatch, first declared outermost
//!
//! Subscribers may dispatch, subscribe and unsubscribe from inside their own
//! notification. The store is single-threaded (`!Send`); serialize access
//! from other threads through one owner.
//!
//! ## Example
//!
//! ```ignore
//! use reflux::{Store, StoreError};
//! use std::rc::Rc;
//!
//! #[derive(Clone, PartialEq)]
//! struct Game { clicks: u32 }
//!
//! enum Action { Click }
//!
//! let store = Store::new(
//!     |action: &Action, state: Option<&Game>| {
//!         let state = state.cloned().unwrap_or(Game { clicks: 0 });
//!         match action {
//!             Action::Click => Ok(Game { clicks: state.clicks + 1 }),
//!         }
//!     },
//!     Game { clicks: 0 },
//! );
//!
//! let label = Rc::new(|clicks: &u32| println!("clicked {clicks} times"));
//! store.subscribe_with(&label, |s| s.select(|game| game.clicks).skip_repeats());
//! store.dispatch(Action::Click)?;
//! store.unsubscribe(&label);
//! ```

pub mod error;
pub mod middleware;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{BoxError, Result, StoreError};
pub use middleware::{DispatchFn, Middleware, MiddlewareContext};
pub use store::{ReduceFn, Store, StoreBuilder, StoreConfig, WeakStore};
pub use subscriptions::Selection;
pub use types::{Subscriber, SubscriberId};
