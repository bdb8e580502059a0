// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Per-thread queue of continuations waiting to run.
//!
//! Settling a promise never calls its continuations recursively. Instead they are pushed onto
//! this queue; whoever is the outermost caller on the thread drains it before returning. Settling
//! from top level code therefore still observes every continuation synchronously, while a
//! continuation that settles another promise simply appends to the queue.
//!
//! Only the outermost drainer runs jobs, which means jobs never run on a coroutine stack: every
//! coroutine is resumed either from [`batch`] or from inside a job.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

pub(crate) type Job = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Job>> = const { RefCell::new(VecDeque::new()) };
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

/// Queues `jobs` in order and runs them unless a drain is already in progress further up the
/// stack.
pub(crate) fn dispatch(jobs: impl IntoIterator<Item = Job>) {
    QUEUE.with_borrow_mut(|queue| queue.extend(jobs));
    drain();
}

/// Runs `f` as if it were a job: continuations it triggers are deferred until `f` returns and
/// then drained before `batch` itself returns.
pub(crate) fn batch<R>(f: impl FnOnce() -> R) -> R {
    let Some(guard) = Draining::enter() else {
        return f();
    };

    let ret = f();
    run_queue();
    drop(guard);
    ret
}

fn drain() {
    if let Some(_guard) = Draining::enter() {
        run_queue();
    }
}

fn run_queue() {
    let mut ran = 0usize;
    while let Some(job) = QUEUE.with_borrow_mut(VecDeque::pop_front) {
        job();
        ran += 1;
    }
    tracing::trace!(jobs = ran, "drained reaction queue");
}

/// Marks the current thread as draining, resetting the flag when dropped.
///
/// A panicking continuation unwinds through the guard so the flag is always cleared. Jobs still
/// in the queue at that point are kept and run by the next drain.
#[must_use]
struct Draining(());

impl Draining {
    fn enter() -> Option<Self> {
        if DRAINING.replace(true) {
            None
        } else {
            Some(Self(()))
        }
    }
}

impl Drop for Draining {
    fn drop(&mut self) {
        DRAINING.set(false);
    }
}
