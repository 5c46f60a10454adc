//! The store: current state, reducer, middleware chain and subscriptions.

use crate::error::{Result, StoreError};
use crate::middleware::{self, DispatchFn, Middleware, MiddlewareContext};
use crate::subscriptions::{Notify, Selection, Subscription, SubscriptionManager};
use crate::types::{Subscriber, SubscriberId};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Reducer signature: next state from an action and the current state.
///
/// `state` is `None` only when the store is initialised from an init action.
pub type ReduceFn<S, A> = dyn Fn(&A, Option<&S>) -> Result<S>;

type EqualityFn<S> = Rc<dyn Fn(&S, &S) -> bool>;

/// Store configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name attached to every log event of this store.
    /// Default: "store"
    pub label: String,

    /// Nesting depth of reentrant dispatches above which a warning is logged.
    /// Dispatch is never refused because of depth.
    /// Default: 32
    pub reentrancy_warn_depth: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            label: "store".to_string(),
            reentrancy_warn_depth: 32,
        }
    }
}

impl StoreConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

struct Shared<S, A> {
    config: StoreConfig,
    state: RefCell<Rc<S>>,
    reducer: Box<ReduceFn<S, A>>,
    /// Composed middleware chain ending in `reduce_and_broadcast`.
    dispatcher: DispatchFn<A>,
    subscriptions: SubscriptionManager<S>,
    /// Skip predicate for plain `subscribe` calls, if enabled.
    default_filter: Option<EqualityFn<S>>,
    /// Bumped on every successful reduction.
    revision: Cell<u64>,
    reducing: Cell<bool>,
    depth: Cell<usize>,
    depth_warned: Cell<bool>,
}

impl<S: 'static, A: 'static> Shared<S, A> {
    fn current_state(&self) -> Rc<S> {
        Rc::clone(&self.state.borrow())
    }

    /// The dispatch primitive at the bottom of the middleware chain.
    fn reduce_and_broadcast(&self, action: A) -> Result<()> {
        if self.reducing.get() {
            tracing::warn!(store = %self.config.label, "dispatch rejected: reducer is running");
            return Err(StoreError::DispatchWhileReducing);
        }

        let previous = self.current_state();
        let reduced = {
            self.reducing.set(true);
            let _reset = scopeguard::guard((), |_| self.reducing.set(false));
            (self.reducer)(&action, Some(&*previous))
        };
        let next = match reduced {
            Ok(state) => Rc::new(state),
            Err(e) => {
                tracing::warn!(store = %self.config.label, error = %e, "reducer failed, state unchanged");
                return Err(e);
            }
        };

        *self.state.borrow_mut() = Rc::clone(&next);
        let revision = self.revision.get() + 1;
        self.revision.set(revision);

        let depth = self.enter_broadcast();
        let _leave = scopeguard::guard((), |_| self.leave_broadcast());
        tracing::debug!(
            store = %self.config.label,
            revision,
            depth,
            subscribers = self.subscriptions.len(),
            "state replaced"
        );
        self.subscriptions.broadcast(&next);

        Ok(())
    }

    fn enter_broadcast(&self) -> usize {
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        if depth > self.config.reentrancy_warn_depth && !self.depth_warned.get() {
            self.depth_warned.set(true);
            tracing::warn!(
                store = %self.config.label,
                depth,
                "deeply nested dispatch from subscribers; check for a dispatch loop"
            );
        }
        depth
    }

    fn leave_broadcast(&self) {
        let depth = self.depth.get().saturating_sub(1);
        self.depth.set(depth);
        if depth == 0 {
            self.depth_warned.set(false);
        }
    }
}

/// A single-threaded state container.
///
/// State is replaced wholesale by the reducer on every dispatch, and every
/// subscription is notified synchronously afterwards. `Store` is a cheap
/// handle: clones refer to the same state and subscriptions.
///
/// Subscribers are held strongly until [`unsubscribe`](Self::unsubscribe)
/// is called. A subscriber that keeps a `Store` clone forms a reference
/// cycle; keep a [`WeakStore`] instead when that matters.
pub struct Store<S, A> {
    shared: Rc<Shared<S, A>>,
}

impl<S, A> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<S: 'static, A: 'static> Store<S, A> {
    /// Create a store with the given initial state, no middleware and the
    /// default configuration. No action is applied.
    pub fn new<R>(reducer: R, state: S) -> Self
    where
        R: Fn(&A, Option<&S>) -> Result<S> + 'static,
    {
        Self::assemble(
            Box::new(reducer),
            state,
            Vec::new(),
            StoreConfig::default(),
            None,
        )
    }

    /// Start building a store with middleware or custom configuration.
    pub fn builder<R>(reducer: R) -> StoreBuilder<S, A>
    where
        R: Fn(&A, Option<&S>) -> Result<S> + 'static,
    {
        StoreBuilder::new(reducer)
    }

    fn assemble(
        reducer: Box<ReduceFn<S, A>>,
        state: S,
        middleware: Vec<Box<dyn Middleware<S, A>>>,
        config: StoreConfig,
        default_filter: Option<EqualityFn<S>>,
    ) -> Self {
        let shared = Rc::new_cyclic(|weak: &Weak<Shared<S, A>>| {
            let raw: DispatchFn<A> = {
                let weak = Weak::clone(weak);
                Rc::new(move |action: A| match weak.upgrade() {
                    Some(shared) => shared.reduce_and_broadcast(action),
                    None => Err(StoreError::StoreDropped),
                })
            };
            let ctx = MiddlewareContext::new(WeakStore {
                shared: Weak::clone(weak),
            });
            let dispatcher = middleware::compose(&middleware, &ctx, raw);

            tracing::debug!(
                store = %config.label,
                middleware = middleware.len(),
                "store created"
            );

            Shared {
                config,
                state: RefCell::new(Rc::new(state)),
                reducer,
                dispatcher,
                subscriptions: SubscriptionManager::new(),
                default_filter,
                revision: Cell::new(0),
                reducing: Cell::new(false),
                depth: Cell::new(0),
                depth_warned: Cell::new(false),
            }
        });

        Self { shared }
    }

    /// Apply `action` through the middleware chain and the reducer, then
    /// notify subscribers.
    ///
    /// Reducer and middleware errors are returned as is; the state is left
    /// unchanged when the reducer fails. May be called from inside a
    /// subscriber, in which case the nested dispatch completes before the
    /// call returns.
    pub fn dispatch(&self, action: A) -> Result<()> {
        let dispatcher = Rc::clone(&self.shared.dispatcher);
        dispatcher(action)
    }

    /// The current state.
    pub fn current_state(&self) -> Rc<S> {
        self.shared.current_state()
    }

    /// Subscribe to the full state.
    ///
    /// The subscriber immediately receives the current state once. If the
    /// same subscriber is already registered its subscription is replaced
    /// in place.
    pub fn subscribe<Sub>(&self, subscriber: &Rc<Sub>) -> SubscriberId
    where
        Sub: Subscriber<S> + 'static,
    {
        let mut selection = Selection::identity();
        if let Some(equal) = &self.shared.default_filter {
            let equal = Rc::clone(equal);
            selection = selection.skip_repeats_by(move |last: &S, next: &S| equal(last, next));
        }
        self.register(subscriber, selection)
    }

    /// Subscribe with a custom [`Selection`]: a substate projection and/or
    /// filters.
    ///
    /// ```ignore
    /// store.subscribe_with(&label, |s| s.select(|state| state.title.clone()).skip_repeats());
    /// ```
    pub fn subscribe_with<T, Sub, F>(&self, subscriber: &Rc<Sub>, configure: F) -> SubscriberId
    where
        T: 'static,
        Sub: Subscriber<T> + 'static,
        F: FnOnce(Selection<S, S>) -> Selection<S, T>,
    {
        self.register(subscriber, configure(Selection::identity()))
    }

    fn register<T, Sub>(&self, subscriber: &Rc<Sub>, selection: Selection<S, T>) -> SubscriberId
    where
        T: 'static,
        Sub: Subscriber<T> + 'static,
    {
        let id = SubscriberId::of(subscriber);
        let erased: Rc<dyn Subscriber<T>> = Rc::<Sub>::clone(subscriber);
        let subscription = Rc::new(Subscription::new(id, erased, selection));

        let entry: Rc<dyn Notify<S>> = Rc::<Subscription<S, T>>::clone(&subscription);
        if self.shared.subscriptions.insert(entry) {
            tracing::debug!(store = %self.shared.config.label, subscriber = %id, "subscription replaced");
        } else {
            tracing::debug!(store = %self.shared.config.label, subscriber = %id, "subscribed");
        }

        subscription.push_initial(&self.current_state());
        id
    }

    /// Remove the subscription of `subscriber`. Returns false if it was not
    /// subscribed.
    pub fn unsubscribe<Sub: ?Sized>(&self, subscriber: &Rc<Sub>) -> bool {
        self.unsubscribe_id(SubscriberId::of(subscriber))
    }

    /// Remove a subscription by the id returned from `subscribe`.
    pub fn unsubscribe_id(&self, id: SubscriberId) -> bool {
        let removed = self.shared.subscriptions.remove(id);
        if removed {
            tracing::debug!(store = %self.shared.config.label, subscriber = %id, "unsubscribed");
        }
        removed
    }

    /// Whether `subscriber` currently has a subscription on this store.
    pub fn is_subscribed<Sub: ?Sized>(&self, subscriber: &Rc<Sub>) -> bool {
        self.shared
            .subscriptions
            .contains(SubscriberId::of(subscriber))
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.len()
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// A handle that does not keep the store alive, for subscribers and
    /// reducers that need to reach back into it.
    pub fn downgrade(&self) -> WeakStore<S, A> {
        WeakStore {
            shared: Rc::downgrade(&self.shared),
        }
    }
}

impl<S, A> fmt::Debug for Store<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("label", &self.shared.config.label)
            .field("subscriptions", &self.shared.subscriptions.len())
            .field("revision", &self.shared.revision.get())
            .finish()
    }
}

/// A non-owning handle to a [`Store`].
pub struct WeakStore<S, A> {
    shared: Weak<Shared<S, A>>,
}

impl<S, A> WeakStore<S, A> {
    /// The store, unless every strong handle has been dropped.
    pub fn upgrade(&self) -> Option<Store<S, A>> {
        self.shared.upgrade().map(|shared| Store { shared })
    }
}

impl<S, A> Clone for WeakStore<S, A> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

/// A handle that never upgrades.
impl<S, A> Default for WeakStore<S, A> {
    fn default() -> Self {
        Self { shared: Weak::new() }
    }
}

/// Builder for a [`Store`] with middleware, configuration or an init action.
pub struct StoreBuilder<S, A> {
    reducer: Box<ReduceFn<S, A>>,
    state: Option<S>,
    init_action: Option<A>,
    middleware: Vec<Box<dyn Middleware<S, A>>>,
    config: StoreConfig,
    default_filter: Option<EqualityFn<S>>,
}

impl<S: 'static, A: 'static> StoreBuilder<S, A> {
    /// Start from a reducer with no middleware and the default configuration.
    pub fn new<R>(reducer: R) -> Self
    where
        R: Fn(&A, Option<&S>) -> Result<S> + 'static,
    {
        Self {
            reducer: Box::new(reducer),
            state: None,
            init_action: None,
            middleware: Vec::new(),
            config: StoreConfig::default(),
            default_filter: None,
        }
    }

    /// Initial state. Takes precedence over [`init_action`](Self::init_action).
    pub fn state(mut self, state: S) -> Self {
        self.state = Some(state);
        self
    }

    /// Derive the initial state by reducing `action` against no state.
    pub fn init_action(mut self, action: A) -> Self {
        self.init_action = Some(action);
        self
    }

    /// Append a middleware. Earlier middleware wraps later middleware.
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware<S, A> + 'static,
    {
        self.middleware.push(Box::new(middleware));
        self
    }

    /// Replace the default configuration.
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve the initial state and compose the middleware chain.
    ///
    /// Fails with [`StoreError::MissingInitialState`] when neither a state nor
    /// an init action was given, or with the reducer's error when the init
    /// action fails.
    pub fn build(self) -> Result<Store<S, A>> {
        let state = match (self.state, self.init_action) {
            (Some(state), _) => state,
            (None, Some(action)) => (self.reducer)(&action, None)?,
            (None, None) => return Err(StoreError::MissingInitialState),
        };

        Ok(Store::assemble(
            self.reducer,
            state,
            self.middleware,
            self.config,
            self.default_filter,
        ))
    }
}

impl<S: PartialEq + 'static, A: 'static> StoreBuilder<S, A> {
    /// Make plain [`Store::subscribe`] skip states equal to the last one
    /// delivered.
    pub fn skip_repeats_by_default(mut self) -> Self {
        self.default_filter = Some(Rc::new(|last: &S, next: &S| last == next));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Counter(i32);

    enum Op {
        Add(i32),
        Reset,
    }

    fn reducer(op: &Op, state: Option<&Counter>) -> Result<Counter> {
        let current = state.cloned().unwrap_or(Counter(0));
        Ok(match op {
            Op::Add(n) => Counter(current.0 + n),
            Op::Reset => Counter(0),
        })
    }

    #[test]
    fn test_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.label, "store");
        assert_eq!(config.reentrancy_warn_depth, 32);
    }

    #[test]
    fn test_config_from_json_partial() {
        let config = StoreConfig::from_json(r#"{"label": "game"}"#).unwrap();
        assert_eq!(config.label, "game");
        assert_eq!(config.reentrancy_warn_depth, 32);
    }

    #[test]
    fn test_config_from_json_invalid() {
        let result = StoreConfig::from_json(r#"{"reentrancy_warn_depth": "deep"}"#);
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn test_new_applies_no_action() {
        let store = Store::new(reducer, Counter(7));
        assert_eq!(*store.current_state(), Counter(7));
    }

    #[test]
    fn test_dispatch_replaces_state() {
        let store = Store::new(reducer, Counter(1));
        let before = store.current_state();

        store.dispatch(Op::Add(2)).unwrap();

        assert_eq!(*store.current_state(), Counter(3));
        assert_eq!(*before, Counter(1));
        assert!(!Rc::ptr_eq(&before, &store.current_state()));
    }

    #[test]
    fn test_builder_init_action() {
        let store = Store::builder(reducer)
            .init_action(Op::Add(4))
            .build()
            .unwrap();
        assert_eq!(*store.current_state(), Counter(4));
    }

    #[test]
    fn test_builder_state_wins_over_init_action() {
        let store = Store::builder(reducer)
            .init_action(Op::Add(4))
            .state(Counter(9))
            .build()
            .unwrap();
        assert_eq!(*store.current_state(), Counter(9));
    }

    #[test]
    fn test_builder_requires_state() {
        let result = Store::builder(reducer).build();
        assert!(matches!(result, Err(StoreError::MissingInitialState)));
    }

    #[test]
    fn test_weak_store_upgrade() {
        let store = Store::new(reducer, Counter(0));
        let weak = store.downgrade();
        weak.upgrade().unwrap().dispatch(Op::Add(1)).unwrap();
        assert_eq!(*store.current_state(), Counter(1));

        drop(store);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let store = Store::new(reducer, Counter(0));
        let other = store.clone();
        other.dispatch(Op::Add(5)).unwrap();
        store.dispatch(Op::Reset).unwrap();
        assert_eq!(*other.current_state(), Counter(0));
    }

    #[test]
    fn test_debug_output() {
        let store = Store::builder(reducer)
            .state(Counter(0))
            .config(StoreConfig {
                label: "counter".to_string(),
                ..Default::default()
            })
            .build()
            .unwrap();
        let rendered = format!("{store:?}");
        assert!(rendered.contains("counter"));
        assert!(rendered.contains("revision: 0"));
    }
}
