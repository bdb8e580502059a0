// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Stackful coroutines that wait on promises.
//!
//! A coroutine body is an ordinary closure running on its own [`Fiber`] stack. Calling
//! [`Context::wait`] on a promise that hasn't settled yet suspends the body, no matter how deep
//! in the call stack the call happens, and hands control back to whoever resumed it. The
//! coroutine is resumed once the promise settles:
//!
//! ```
//! use coro::{EventLoop, ManualClock};
//! use std::time::Duration;
//!
//! let event_loop = EventLoop::with_clock(ManualClock::new());
//!
//! let handle = event_loop.clone();
//! let promise = coro::spawn(move |cx| {
//!     cx.wait(&handle.sleep(Duration::from_secs(1)))?;
//!     Ok(handle.now())
//! });
//! assert!(promise.is_pending());
//!
//! event_loop.run();
//! assert_eq!(promise.peek().unwrap().unwrap(), Duration::from_secs(1));
//! ```
//!
//! # Frame lifecycle
//!
//! ```text
//! Pending  --(resumed)-->              Active
//! Active   --(waits on a promise)-->   Awaiting
//! Active   --(body returns Ok)-->      Returned
//! Active   --(body returns Err)-->     Thrown
//! Awaiting --(promise settles)-->      Pending
//! ```
//!
//! While a frame is awaiting, the only thing keeping it alive is the continuation registered on
//! the awaited promise. Once every [`Resolver`] of the awaited promise is dropped without settling
//! it, the frame is dropped as well, unwinding its stack.

mod builder;
mod id;

use crate::promise::{Promise, Resolver, pending, reaction};
use crate::value::{Failure, Value};
use core::any::type_name;
use core::fmt;
use fiber::stack::FiberStack;
use fiber::{Fiber, FiberResult, Suspend};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub use builder::Builder;
pub use id::Id;

/// Spawns `body` as a new coroutine with the default configuration.
///
/// The body starts running right away, up to the first [`Context::wait`] on a promise that hasn't
/// settled yet. The returned promise fulfills with the body's `Ok` value or rejects with its
/// failure. If the coroutine's stack cannot be allocated the promise rejects with a
/// [`SpawnError`][crate::SpawnError].
///
/// See [`Builder`] for configuring name and stack size.
pub fn spawn<T, F>(body: F) -> Promise<T>
where
    T: Clone + 'static,
    F: FnOnce(&Context<'_>) -> Result<T, Failure> + 'static,
{
    Builder::new().spawn(body)
}

/// The execution status of a coroutine.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Status {
    /// Ready to be resumed.
    Pending,
    /// Currently executing.
    Active,
    /// Suspended waiting for a promise to settle.
    Awaiting,
    /// The body returned a value.
    Returned,
    /// The body returned a failure.
    Thrown,
}

/// Handle passed to a coroutine body, used to wait on promises.
pub struct Context<'a> {
    state: &'a FrameState,
    suspend: &'a Suspend<(), Promise<Value>>,
}

type Body<T> = Fiber<(), Promise<Value>, Result<T, Failure>>;

pub(crate) struct Frame<T> {
    state: Rc<FrameState>,
    fiber: RefCell<Body<T>>,
    resolver: Resolver<T>,
    span: tracing::Span,
}

struct FrameState {
    id: Id,
    name: Option<String>,
    status: Cell<Status>,
    /// The outcome of the promise the frame last waited on.
    slot: RefCell<Slot>,
}

enum Slot {
    Empty,
    Value(Value),
    Failure(Failure),
}

static_assertions::assert_not_impl_any!(Context<'static>: Send, Sync);

// === impl Context ===

impl Context<'_> {
    /// Suspends the coroutine until `promise` settles, returning its outcome.
    ///
    /// If the promise already settled the coroutine is still suspended, and resumed again before
    /// the reaction queue is left. Failures are returned as `Err`, so `?` rethrows them out of the
    /// body:
    ///
    /// ```
    /// use coro::{Failure, Promise};
    ///
    /// let promise = coro::spawn(|cx| {
    ///     let n = cx.wait(&Promise::resolved(2u32))?;
    ///     cx.wait(&Promise::<u32>::rejected(Failure::msg("nope")))?;
    ///     Ok(n)
    /// });
    ///
    /// let err = promise.peek().unwrap().unwrap_err();
    /// assert_eq!(err.to_string(), "nope");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the failure the promise was rejected with.
    ///
    /// # Panics
    ///
    /// Panics if the coroutine isn't currently running, or if the promise was erased and its value
    /// isn't a `U`.
    pub fn wait<U>(&self, promise: &Promise<U>) -> Result<U, Failure>
    where
        U: Clone + 'static,
    {
        let status = self.state.status.get();
        assert_eq!(
            status,
            Status::Active,
            "coroutine {} can only wait while it is running",
            self.state.id
        );

        self.state.status.set(Status::Awaiting);
        tracing::trace!(awaited = %type_name::<U>(), "coroutine suspending");
        self.suspend.suspend(promise.erase());

        match self.state.slot.replace(Slot::Empty) {
            Slot::Value(value) => Ok(value.downcast()),
            Slot::Failure(failure) => Err(failure),
            Slot::Empty => panic!(
                "coroutine {} was resumed before the awaited promise settled",
                self.state.id
            ),
        }
    }

    pub fn id(&self) -> Id {
        self.state.id
    }

    pub fn name(&self) -> Option<&str> {
        self.state.name.as_deref()
    }

    pub fn status(&self) -> Status {
        self.state.status.get()
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.state.id)
            .field("name", &self.state.name)
            .field("status", &self.state.status.get())
            .finish_non_exhaustive()
    }
}

// === impl Frame ===

impl<T: Clone + 'static> Frame<T> {
    pub(crate) fn new<F>(name: Option<&str>, stack: FiberStack, body: F) -> Rc<Self>
    where
        F: FnOnce(&Context<'_>) -> Result<T, Failure> + 'static,
    {
        let state = Rc::new(FrameState {
            id: Id::next(),
            name: name.map(ToOwned::to_owned),
            status: Cell::new(Status::Pending),
            slot: RefCell::new(Slot::Empty),
        });

        let span = tracing::trace_span!(
            "coroutine",
            coro.id = state.id.as_u64(),
            coro.name = ?state.name,
            coro.output = %type_name::<T>(),
        );

        let fiber: Body<T> = {
            let state = state.clone();
            Fiber::with_stack(stack, move |(), suspend| {
                let cx = Context {
                    state: &state,
                    suspend,
                };
                body(&cx)
            })
        };

        let (resolver, _) = pending();

        Rc::new(Self {
            state,
            fiber: RefCell::new(fiber),
            resolver,
            span,
        })
    }

    pub(crate) fn promise(&self) -> Promise<T> {
        self.resolver.promise()
    }

    /// Runs the frame up to its first suspension.
    ///
    /// Continuations triggered in the meantime are held back until the frame has suspended, so
    /// they never run on the frame's stack.
    pub(crate) fn start(self: &Rc<Self>) {
        tracing::debug!(parent: &self.span, "coroutine spawned");
        reaction::batch(|| self.next());
    }

    fn next(self: &Rc<Self>) {
        match self.state.status.get() {
            Status::Pending => {}
            Status::Returned | Status::Thrown => return,
            status @ (Status::Active | Status::Awaiting) => {
                panic!("coroutine {} resumed while {status:?}", self.state.id)
            }
        }

        self.state.status.set(Status::Active);

        let res = {
            let _entered = self.span.enter();
            tracing::trace!("coroutine resuming");
            self.fiber.borrow_mut().resume(())
        };

        match res {
            FiberResult::Yield(awaited) => {
                debug_assert_eq!(self.state.status.get(), Status::Awaiting);

                let frame = self.clone();
                awaited.on_settled(move |res| {
                    *frame.state.slot.borrow_mut() = match res {
                        Ok(value) => Slot::Value(value),
                        Err(failure) => Slot::Failure(failure),
                    };
                    frame.state.status.set(Status::Pending);
                    frame.next();
                });
            }
            FiberResult::Return(Ok(value)) => {
                self.state.status.set(Status::Returned);
                tracing::debug!(parent: &self.span, "coroutine returned");
                self.resolver.resolve(value);
            }
            FiberResult::Return(Err(failure)) => {
                self.state.status.set(Status::Thrown);
                tracing::debug!(parent: &self.span, %failure, "coroutine threw");
                self.resolver.reject(failure);
            }
        }
    }
}

impl<T> fmt::Debug for Frame<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.state.id)
            .field("name", &self.state.name)
            .field("status", &self.state.status.get())
            .finish_non_exhaustive()
    }
}
