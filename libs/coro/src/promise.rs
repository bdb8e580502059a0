// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Single-assignment deferred values.
//!
//! A [`Promise`] is the consumer side of a value that will be produced later, the matching
//! [`Resolver`] is the producer side. Both are cheap handles to the same shared state:
//!
//! ```
//! let (resolver, promise) = coro::pending::<u32>();
//! let doubled = promise.then(|v| v * 2);
//!
//! resolver.resolve(21);
//! assert_eq!(doubled.peek().unwrap().unwrap(), 42);
//! ```
//!
//! Continuations registered on a promise fire exactly once, in registration order, after the
//! promise settles (or immediately if it already has). Rejections propagate down a chain of
//! [`Promise::then`] calls until they reach a [`Promise::error`] or [`Promise::or_else`] handler.
//!
//! Promises are single-threaded: neither handle is `Send` or `Sync`.

mod combinators;
pub(crate) mod reaction;

use crate::error::AlreadySettled;
use crate::promise::reaction::Job;
use crate::value::{Failure, Value};
use core::fmt;
use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

pub use combinators::{all, any, join, race};

type Reaction<T> = Box<dyn FnOnce(Result<T, Failure>)>;

/// Creates a new pending promise along with the handle used to settle it.
pub fn pending<T: 'static>() -> (Resolver<T>, Promise<T>) {
    let inner = Rc::new(RefCell::new(Inner {
        outcome: None,
        reactions: Vec::new(),
        resolvers: 1,
        observed: false,
        release: release::<T>,
    }));

    let resolver = Resolver {
        inner: inner.clone(),
    };
    let promise = Promise { inner };

    (resolver, promise)
}

/// The state of a [`Promise`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

/// The consumer half of a deferred value.
#[must_use = "promises do nothing unless observed"]
pub struct Promise<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

/// The producer half of a deferred value.
///
/// A resolver may be cloned to hand it to several producers, but only the first one to settle the
/// promise succeeds. Settling it again is a programming error.
///
/// Once every resolver of a pending promise is dropped the promise can never settle, its
/// continuations are dropped without being called.
pub struct Resolver<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

struct Inner<T> {
    outcome: Option<Result<T, Failure>>,
    reactions: Vec<Reaction<T>>,
    /// Number of live `Resolver`s.
    resolvers: usize,
    /// Set once any continuation has been registered, used to report unhandled rejections.
    observed: bool,
    /// Disposes of the continuations of a promise that can never settle.
    release: fn(Vec<Reaction<T>>),
}

/// Drops abandoned continuations from the reaction queue.
///
/// A continuation may own the resolver of the next promise in a chain, so dropping it in place
/// would recurse once per link.
fn release<T: 'static>(reactions: Vec<Reaction<T>>) {
    reaction::dispatch([Box::new(move || drop(reactions)) as Job]);
}

static_assertions::assert_not_impl_any!(Promise<()>: Send, Sync);
static_assertions::assert_not_impl_any!(Resolver<()>: Send, Sync);

// === impl Promise ===

impl<T: Clone + 'static> Promise<T> {
    /// Returns a promise that is already fulfilled with `value`.
    pub fn resolved(value: T) -> Self {
        let (resolver, promise) = pending();
        resolver.resolve(value);
        promise
    }

    /// Returns a promise that is already rejected with `failure`.
    pub fn rejected(failure: impl Into<Failure>) -> Self {
        let (resolver, promise) = pending();
        resolver.reject(failure);
        promise
    }

    /// Returns the outcome of this promise, if it has settled.
    pub fn peek(&self) -> Option<Result<T, Failure>> {
        self.inner.borrow().outcome.clone()
    }

    /// Registers `f` to be called with the outcome of this promise.
    ///
    /// If the promise has already settled `f` runs right away, unless a continuation is currently
    /// executing on this thread, in which case it runs as soon as that continuation returns.
    pub fn on_settled<F>(&self, f: F)
    where
        F: FnOnce(Result<T, Failure>) + 'static,
    {
        let outcome = {
            let mut inner = self.inner.borrow_mut();
            inner.observed = true;

            match inner.outcome.clone() {
                Some(outcome) => Some(outcome),
                // can never settle
                None if inner.resolvers == 0 => None,
                None => {
                    inner.reactions.push(Box::new(f));
                    return;
                }
            }
        };
        let Some(outcome) = outcome else {
            return;
        };

        reaction::dispatch([Box::new(move || f(outcome)) as Job]);
    }

    /// Chains a continuation onto the fulfilled branch of this promise.
    ///
    /// The returned promise is fulfilled with the return value of `f`. If this promise rejects,
    /// `f` is never called and the returned promise rejects with the same failure.
    pub fn then<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        let (resolver, promise) = pending();
        self.on_settled(move |res| resolver.settle(res.map(f)));
        promise
    }

    /// Like [`Promise::then`], but `f` returns a promise that the returned promise follows.
    ///
    /// The returned promise settles only once the inner promise does. This is also the way to
    /// reject from inside a chain: return [`Promise::rejected`].
    pub fn and_then<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Promise<U> + 'static,
    {
        let (resolver, promise) = pending();
        self.on_settled(move |res| match res {
            Ok(value) => f(value).forward(resolver),
            Err(failure) => resolver.settle(Err(failure)),
        });
        promise
    }

    /// Chains a continuation onto the rejected branch of this promise.
    ///
    /// The returned promise is fulfilled either with this promise's value or, if this promise
    /// rejects, with the value `f` recovered from the failure.
    pub fn error<F>(&self, f: F) -> Promise<T>
    where
        F: FnOnce(Failure) -> T + 'static,
    {
        let (resolver, promise) = pending();
        self.on_settled(move |res| resolver.settle(Ok(res.unwrap_or_else(f))));
        promise
    }

    /// Like [`Promise::error`], but `f` returns a promise that the returned promise follows.
    pub fn or_else<F>(&self, f: F) -> Promise<T>
    where
        F: FnOnce(Failure) -> Promise<T> + 'static,
    {
        let (resolver, promise) = pending();
        self.on_settled(move |res| match res {
            Ok(value) => resolver.settle(Ok(value)),
            Err(failure) => f(failure).forward(resolver),
        });
        promise
    }

    /// Calls `f` once this promise settles either way, passing the outcome through unchanged.
    pub fn finally<F>(&self, f: F) -> Promise<T>
    where
        F: FnOnce() + 'static,
    {
        let (resolver, promise) = pending();
        self.on_settled(move |res| {
            f();
            resolver.settle(res);
        });
        promise
    }

    /// Erases the value type of this promise.
    pub fn erase(&self) -> Promise<Value> {
        self.then(Value::new)
    }

    fn forward(&self, resolver: Resolver<T>) {
        self.on_settled(move |res| resolver.settle(res));
    }
}

impl<T> Promise<T> {
    /// Returns whether this promise is pending, fulfilled or rejected.
    pub fn state(&self) -> State {
        match &self.inner.borrow().outcome {
            None => State::Pending,
            Some(Ok(_)) => State::Fulfilled,
            Some(Err(_)) => State::Rejected,
        }
    }

    /// Returns `true` if this promise has not settled yet.
    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    /// Returns `true` if both handles refer to the same promise.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.inner, &other.inner)
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Promise");
        match self.inner.try_borrow() {
            Ok(inner) => s
                .field("outcome", &inner.outcome)
                .field("reactions", &inner.reactions.len()),
            Err(_) => s.field("outcome", &format_args!("<borrowed>")),
        };
        s.finish_non_exhaustive()
    }
}

// === impl Resolver ===

impl<T: Clone + 'static> Resolver<T> {
    /// Fulfills the promise with `value`.
    ///
    /// # Panics
    ///
    /// Panics if the promise has already been settled.
    #[track_caller]
    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    /// Rejects the promise with `failure`.
    ///
    /// # Panics
    ///
    /// Panics if the promise has already been settled.
    #[track_caller]
    pub fn reject(&self, failure: impl Into<Failure>) {
        self.settle(Err(failure.into()));
    }

    /// Attempts to fulfill the promise with `value`.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadySettled`] if the promise already has an outcome, `value` is dropped.
    pub fn try_resolve(&self, value: T) -> Result<(), AlreadySettled> {
        self.try_settle(Ok(value))
    }

    /// Attempts to reject the promise with `failure`.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadySettled`] if the promise already has an outcome.
    pub fn try_reject(&self, failure: impl Into<Failure>) -> Result<(), AlreadySettled> {
        self.try_settle(Err(failure.into()))
    }

    /// Settles the promise with `outcome`.
    ///
    /// # Panics
    ///
    /// Panics if the promise has already been settled.
    #[track_caller]
    pub fn settle(&self, outcome: Result<T, Failure>) {
        if let Err(err) = self.try_settle(outcome) {
            panic!("{err}");
        }
    }

    /// Attempts to settle the promise with `outcome`.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadySettled`] if the promise already has an outcome.
    pub fn try_settle(&self, outcome: Result<T, Failure>) -> Result<(), AlreadySettled> {
        let reactions = {
            let mut inner = self.inner.borrow_mut();
            if inner.outcome.is_some() {
                return Err(AlreadySettled(()));
            }

            inner.outcome = Some(outcome.clone());
            mem::take(&mut inner.reactions)
        };

        tracing::trace!(
            fulfilled = outcome.is_ok(),
            reactions = reactions.len(),
            "promise settled"
        );

        reaction::dispatch(reactions.into_iter().map(|reaction| {
            let outcome = outcome.clone();
            Box::new(move || reaction(outcome)) as Job
        }));

        Ok(())
    }

    /// Returns the promise settled by this resolver.
    pub fn promise(&self) -> Promise<T> {
        Promise {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Resolver<T> {
    /// Returns `true` if the promise has not been settled yet.
    pub fn is_pending(&self) -> bool {
        self.inner.borrow().outcome.is_none()
    }
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        self.inner.borrow_mut().resolvers += 1;
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        let (abandoned, release) = {
            let mut inner = self.inner.borrow_mut();
            inner.resolvers -= 1;

            if inner.resolvers == 0 && inner.outcome.is_none() {
                (mem::take(&mut inner.reactions), inner.release)
            } else {
                return;
            }
        };

        if !abandoned.is_empty() {
            tracing::trace!(
                reactions = abandoned.len(),
                "last resolver dropped, releasing continuations"
            );
            release(abandoned);
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}

// === impl Inner ===

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(Err(failure)) = &self.outcome
            && !self.observed
        {
            tracing::warn!(%failure, "rejected promise was dropped without being observed");
        }
    }
}
