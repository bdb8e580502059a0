// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Single-threaded cooperative concurrency built from three pieces:
//!
//! - [`Promise`]s, single-assignment deferred values with chained continuations and
//!   combinators ([`all`], [`join`], [`any`], [`race`]).
//! - The [`EventLoop`], which turns the passage of time on a [`Clock`] into callbacks.
//! - Stackful coroutines ([`spawn`]), sequential code that suspends at any call depth while
//!   [waiting][Context::wait] on a promise.
//!
//! ```
//! use coro::{EventLoop, ManualClock};
//! use std::time::Duration;
//!
//! let event_loop = EventLoop::with_clock(ManualClock::new());
//!
//! let timers = event_loop.clone();
//! let total = coro::spawn(move |cx| {
//!     let mut total = 0;
//!     for secs in 1..=3 {
//!         cx.wait(&timers.sleep(Duration::from_secs(secs)))?;
//!         total += secs;
//!     }
//!     Ok(total)
//! });
//!
//! event_loop.run();
//! assert_eq!(total.peek().unwrap().unwrap(), 6);
//! assert_eq!(event_loop.now(), Duration::from_secs(6));
//! ```
//!
//! Everything in this crate is bound to the thread it was created on.

pub mod coroutine;
mod error;
pub mod event_loop;
pub mod promise;
#[cfg(test)]
mod test_util;
mod value;

pub use coroutine::{Builder, Context, Status, spawn};
pub use error::{AlreadySettled, SpawnError, TypeMismatch};
pub use event_loop::{Clock, Deadline, EventLoop, ManualClock, SystemClock, Turn};
pub use promise::{Promise, Resolver, State, all, any, join, pending, race};
pub use value::{Failure, Value};
