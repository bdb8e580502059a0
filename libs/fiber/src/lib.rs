// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Support for safe & efficient stack switching.
//!
//! This crate provides the [`Fiber`] which implements stackful [`coroutines`]. A fiber runs a
//! closure on its own [`FiberStack`] and can suspend itself at any call depth through the
//! [`Suspend`] handle it is given, transferring control (and a value) back to whoever called
//! [`Fiber::resume`].
//!
//! The architecture specific context switching is provided by [`corosensei`] by Amanieu d'Antras,
//! this crate adds guard-paged stack allocation and the resume/suspend surface the rest of the
//! workspace is written against.
//!
//! [`coroutines`]: https://en.wikipedia.org/wiki/Coroutine
//! [`corosensei`]: https://github.com/Amanieu/corosensei

pub mod stack;

use crate::stack::{FiberStack, Stack};
use corosensei::{Coroutine, CoroutineResult};
use std::fmt;

/// Handle passed to the body of a fiber which allows it to suspend itself.
pub type Suspend<Input, Yield> = corosensei::Yielder<Input, Yield>;

/// Value returned from resuming a fiber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FiberResult<Yield, Return> {
    /// Value returned by a fiber suspending itself with a [`Suspend`].
    Yield(Yield),

    /// Value returned by a fiber returning from its main function.
    Return(Return),
}

impl<Yield, Return> FiberResult<Yield, Return> {
    /// Returns the `Yield` value as an `Option<Yield>`.
    pub fn into_yield(self) -> Option<Yield> {
        match self {
            FiberResult::Yield(val) => Some(val),
            FiberResult::Return(_) => None,
        }
    }

    /// Returns the `Return` value as an `Option<Return>`.
    pub fn into_return(self) -> Option<Return> {
        match self {
            FiberResult::Yield(_) => None,
            FiberResult::Return(val) => Some(val),
        }
    }
}

impl<Yield, Return> From<CoroutineResult<Yield, Return>> for FiberResult<Yield, Return> {
    fn from(res: CoroutineResult<Yield, Return>) -> Self {
        match res {
            CoroutineResult::Yield(val) => FiberResult::Yield(val),
            CoroutineResult::Return(val) => FiberResult::Return(val),
        }
    }
}

/// A stackful coroutine.
///
/// Fibers are `!Send`, they must be resumed on the thread that created them.
///
/// Dropping a fiber that has been started but not yet completed unwinds its stack, running the
/// destructors of every live object on it.
pub struct Fiber<Input, Yield, Return, S: Stack = FiberStack> {
    inner: Coroutine<Input, Yield, Return, S>,
}

impl<Input, Yield, Return, S: Stack> Fiber<Input, Yield, Return, S> {
    /// Creates a new fiber running `func` on the provided stack.
    ///
    /// The function will not start running until the fiber is first resumed, its first argument
    /// is the `Input` value passed to that first [`Fiber::resume`].
    pub fn with_stack<F>(stack: S, func: F) -> Self
    where
        F: FnOnce(Input, &Suspend<Input, Yield>) -> Return,
        F: 'static,
        Input: 'static,
        Yield: 'static,
        Return: 'static,
    {
        Self {
            inner: Coroutine::with_stack(stack, move |suspend, input| func(input, suspend)),
        }
    }

    /// Resume a suspended fiber, the `Input` value will be passed to the fiber and returned by
    /// [`Suspend::suspend`].
    ///
    /// Panics raised by the fiber body are propagated to the caller of this method.
    ///
    /// # Panics
    ///
    /// Panics if the fiber is already completed.
    pub fn resume(&mut self, input: Input) -> FiberResult<Yield, Return> {
        assert!(!self.done(), "attempt to resume a completed fiber");
        self.inner.resume(input).into()
    }

    /// Returns whether this fiber has been resumed at least once.
    pub fn started(&self) -> bool {
        self.inner.started()
    }

    /// Returns whether this fiber has finished executing.
    ///
    /// A fiber that has returned from its initial function can no longer
    /// be resumed.
    pub fn done(&self) -> bool {
        self.inner.done()
    }

    /// Forcibly marks the fiber as having completed, even if it is
    /// currently suspended in the middle of a function.
    ///
    /// # Safety
    ///
    /// This is equivalent to a `longjmp` all the way back to the initial
    /// function of the fiber, so the same rules apply.
    ///
    /// This can only be done safely if there are no objects currently on the
    /// fiber's stack that need to execute `Drop` code.
    pub unsafe fn force_reset(&mut self) {
        // Safety: ensured by caller
        unsafe { self.inner.force_reset() }
    }
}

impl<Input, Yield, Return, S: Stack> fmt::Debug for Fiber<Input, Yield, Return, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("started", &self.started())
            .field("done", &self.done())
            .finish_non_exhaustive()
    }
}
