//! Middleware: wrappers composed around the dispatch primitive.
//!
//! A middleware receives a [`MiddlewareContext`] and the next dispatch
//! function in the chain, and returns the function that replaces it. The
//! returned function may pass a (possibly different) action on to `next`,
//! dispatch something new through the context, or return without calling
//! `next` at all.
//!
//! The chain is composed once when the store is built. The first middleware
//! given to the builder is the outermost: it sees each action first and
//! finishes last.

use crate::error::{Result, StoreError};
use crate::store::WeakStore;
use std::fmt;
use std::rc::Rc;

/// A dispatch function at some point of the middleware chain.
pub type DispatchFn<A> = Rc<dyn Fn(A) -> Result<()>>;

/// Wraps the next dispatch function of the chain.
pub trait Middleware<S, A> {
    fn wrap(&self, ctx: MiddlewareContext<S, A>, next: DispatchFn<A>) -> DispatchFn<A>;
}

impl<S, A, F> Middleware<S, A> for F
where
    F: Fn(MiddlewareContext<S, A>, DispatchFn<A>) -> DispatchFn<A>,
{
    fn wrap(&self, ctx: MiddlewareContext<S, A>, next: DispatchFn<A>) -> DispatchFn<A> {
        self(ctx, next)
    }
}

/// Store access handed to middleware.
///
/// Holds a weak handle, so a middleware keeping its context does not keep
/// the store alive.
pub struct MiddlewareContext<S, A> {
    store: WeakStore<S, A>,
}

impl<S, A> Clone for MiddlewareContext<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: 'static, A: 'static> MiddlewareContext<S, A> {
    pub(crate) fn new(store: WeakStore<S, A>) -> Self {
        Self { store }
    }

    /// Current state of the store.
    pub fn state(&self) -> Result<Rc<S>> {
        self.store
            .upgrade()
            .map(|store| store.current_state())
            .ok_or(StoreError::StoreDropped)
    }

    /// Dispatch through the whole chain, starting at the outermost middleware.
    pub fn dispatch(&self, action: A) -> Result<()> {
        self.store
            .upgrade()
            .ok_or(StoreError::StoreDropped)?
            .dispatch(action)
    }
}

/// Fold `middleware` around `raw`, first element outermost.
pub(crate) fn compose<S, A>(
    middleware: &[Box<dyn Middleware<S, A>>],
    ctx: &MiddlewareContext<S, A>,
    raw: DispatchFn<A>,
) -> DispatchFn<A> {
    middleware
        .iter()
        .rev()
        .fold(raw, |next, m| m.wrap(ctx.clone(), next))
}

/// Log every action before it goes down the chain, and the outcome after.
pub fn logging<S, A>() -> impl Middleware<S, A>
where
    A: fmt::Debug + 'static,
{
    |_ctx: MiddlewareContext<S, A>, next: DispatchFn<A>| -> DispatchFn<A> {
        Rc::new(move |action: A| {
            tracing::debug!(?action, "dispatching action");
            let result = next(action);
            if let Err(ref e) = result {
                tracing::debug!(error = %e, "dispatch failed");
            }
            result
        })
    }
}
