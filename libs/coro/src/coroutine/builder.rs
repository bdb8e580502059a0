// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::coroutine::{Context, Frame};
use crate::error::SpawnError;
use crate::promise::Promise;
use crate::value::Failure;
use fiber::stack::{DEFAULT_STACK_SIZE, FiberStack};

/// Configures and spawns coroutines.
///
/// ```
/// let promise = coro::Builder::new()
///     .name("answer")
///     .stack_size(64 * 1024)
///     .spawn(|_cx| Ok(42));
///
/// assert_eq!(promise.peek().unwrap().unwrap(), 42);
/// ```
#[derive(Clone, Debug)]
pub struct Builder<'a> {
    name: Option<&'a str>,
    stack_size: usize,
}

impl<'a> Builder<'a> {
    pub fn new() -> Self {
        Self {
            name: None,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    /// Override the name of coroutines spawned by this builder, this will only show up in debug
    /// messages and spans.
    ///
    /// By default, coroutines are unnamed.
    pub fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Override the size of the stack allocated for coroutines spawned by this builder.
    ///
    /// Sizes are clamped to [`MIN_STACK_SIZE`][fiber::stack::MIN_STACK_SIZE] and rounded up to
    /// whole pages. By default, coroutines get [`DEFAULT_STACK_SIZE`] bytes.
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Attempt to spawn `body` as a new coroutine.
    ///
    /// The body starts running right away and keeps running until it first waits on a promise that
    /// hasn't settled yet. The returned promise settles with the outcome of the body.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError::Stack`] when the coroutine's stack cannot be allocated.
    pub fn try_spawn<T, F>(&self, body: F) -> Result<Promise<T>, SpawnError>
    where
        T: Clone + 'static,
        F: FnOnce(&Context<'_>) -> Result<T, Failure> + 'static,
    {
        let stack = FiberStack::new(self.stack_size)?;
        let frame = Frame::new(self.name, stack, body);
        let promise = frame.promise();

        frame.start();

        Ok(promise)
    }

    /// Spawns `body` as a new coroutine.
    ///
    /// Like [`Builder::try_spawn`], but a stack allocation failure rejects the returned promise
    /// with the [`SpawnError`] instead.
    pub fn spawn<T, F>(&self, body: F) -> Promise<T>
    where
        T: Clone + 'static,
        F: FnOnce(&Context<'_>) -> Result<T, Failure> + 'static,
    {
        match self.try_spawn(body) {
            Ok(promise) => promise,
            Err(err) => {
                tracing::debug!(name = ?self.name, %err, "failed to spawn coroutine");
                Promise::rejected(err)
            }
        }
    }
}

impl Default for Builder<'_> {
    fn default() -> Self {
        Self::new()
    }
}
