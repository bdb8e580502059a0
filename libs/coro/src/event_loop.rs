// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A time-ordered callback scheduler.
//!
//! The [`EventLoop`] holds callbacks keyed by the [`Deadline`] they become due at. Driving it with
//! [`EventLoop::run`] fires them in deadline order, parking the [`Clock`] whenever nothing is due
//! yet, until no callbacks are left:
//!
//! ```
//! use coro::{EventLoop, ManualClock};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! let event_loop = EventLoop::with_clock(ManualClock::new());
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! for (name, ms) in [("slow", 20), ("fast", 10)] {
//!     let log = log.clone();
//!     event_loop.schedule(move || log.borrow_mut().push(name), Duration::from_millis(ms));
//! }
//!
//! assert_eq!(event_loop.run(), 2);
//! assert_eq!(*log.borrow(), ["fast", "slow"]);
//! ```
//!
//! There is no global loop, every scheduling call goes through an explicit handle.

mod clock;

use crate::promise::{Promise, pending};
use core::cmp::{Ordering, Reverse};
use core::fmt;
use core::time::Duration;
use std::cell::RefCell;
use std::collections::BinaryHeap;
use std::rc::Rc;

pub use clock::{Clock, Deadline, ManualClock, SystemClock};

/// A handle to an event loop.
///
/// Cloning the handle is cheap, all clones schedule onto the same loop.
#[derive(Clone)]
pub struct EventLoop {
    shared: Rc<Shared>,
}

/// The result of a single [`EventLoop::turn`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Turn {
    /// The number of callbacks that fired.
    pub fired: usize,
    /// The deadline of the earliest callback still waiting, if any.
    pub next_deadline: Option<Deadline>,
}

struct Shared {
    clock: Box<dyn Clock>,
    core: RefCell<Core>,
}

struct Core {
    pending: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

struct Entry {
    deadline: Deadline,
    /// Breaks ties between entries sharing a deadline, lower fires first.
    seq: u64,
    callback: Box<dyn FnOnce()>,
}

static_assertions::assert_not_impl_any!(EventLoop: Send, Sync);

// === impl EventLoop ===

impl EventLoop {
    /// Creates an event loop driven by the [`SystemClock`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }

    /// Creates an event loop driven by `clock`.
    #[must_use]
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        tracing::debug!(clock = clock.name(), "creating event loop");

        Self {
            shared: Rc::new(Shared {
                clock: Box::new(clock),
                core: RefCell::new(Core {
                    pending: BinaryHeap::new(),
                    next_seq: 0,
                }),
            }),
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        &*self.shared.clock
    }

    /// Returns the current time of this loop's clock.
    pub fn now(&self) -> Duration {
        self.shared.clock.now()
    }

    /// Returns the number of callbacks that have not fired yet.
    pub fn len(&self) -> usize {
        self.shared.core.borrow().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schedules `callback` to run once, no earlier than `delay` from now.
    ///
    /// Returns the deadline the callback was scheduled at.
    pub fn schedule<F>(&self, callback: F, delay: Duration) -> Deadline
    where
        F: FnOnce() + 'static,
    {
        self.schedule_at(callback, Deadline::after(self.now(), delay))
    }

    /// Schedules `callback` to run once, no earlier than `deadline`.
    ///
    /// Callbacks sharing a deadline fire in the order they were scheduled. A deadline in the past
    /// fires on the next turn.
    pub fn schedule_at<F>(&self, callback: F, deadline: Deadline) -> Deadline
    where
        F: FnOnce() + 'static,
    {
        let mut core = self.shared.core.borrow_mut();
        let seq = core.next_seq;
        core.next_seq += 1;

        tracing::trace!(%deadline, seq, "scheduling callback");
        core.pending.push(Reverse(Entry {
            deadline,
            seq,
            callback: Box::new(callback),
        }));

        deadline
    }

    /// Returns a promise that fulfills once `delay` has passed.
    pub fn sleep(&self, delay: Duration) -> Promise<()> {
        let (resolver, promise) = pending();
        self.schedule(move || resolver.resolve(()), delay);
        promise
    }

    /// Fires every callback that is currently due, without parking.
    ///
    /// Callbacks scheduled by fired callbacks also run during this turn if they are already due.
    pub fn turn(&self) -> Turn {
        let mut fired = 0;

        loop {
            let now = self.now();
            let Some(entry) = self.shared.core.borrow_mut().pop_due(now) else {
                break;
            };

            tracing::trace!(deadline = %entry.deadline, seq = entry.seq, "firing callback");
            // the core is not borrowed here, callbacks are free to schedule more work
            (entry.callback)();
            fired += 1;
        }

        Turn {
            fired,
            next_deadline: self.shared.core.borrow().next_deadline(),
        }
    }

    /// Runs the loop until no callbacks are left, returning how many fired.
    ///
    /// Whenever nothing is due the clock is parked until the earliest deadline. Returns
    /// immediately if the loop is empty.
    ///
    /// # Panics
    ///
    /// A panic raised by a callback propagates out of this method. The loop stays usable and the
    /// remaining callbacks fire on the next call to `run`.
    pub fn run(&self) -> usize {
        tracing::debug!(
            clock = self.shared.clock.name(),
            pending = self.len(),
            "running event loop"
        );

        let mut fired = 0;
        loop {
            let turn = self.turn();
            fired += turn.fired;

            let Some(deadline) = turn.next_deadline else {
                break;
            };

            tracing::trace!(%deadline, "waiting for next deadline");
            self.shared.clock.park_until(deadline);
        }

        tracing::debug!(fired, "event loop finished");
        fired
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("EventLoop");
        s.field("clock", &self.shared.clock.name());
        match self.shared.core.try_borrow() {
            Ok(core) => s
                .field("pending", &core.pending.len())
                .field("next_deadline", &core.next_deadline()),
            Err(_) => s.field("pending", &format_args!("<borrowed>")),
        };
        s.finish_non_exhaustive()
    }
}

// === impl Core ===

impl Core {
    fn pop_due(&mut self, now: Duration) -> Option<Entry> {
        let Reverse(head) = self.pending.peek()?;
        if !head.deadline.is_due(now) {
            return None;
        }

        self.pending.pop().map(|Reverse(entry)| entry)
    }

    fn next_deadline(&self) -> Option<Deadline> {
        self.pending.peek().map(|Reverse(entry)| entry.deadline)
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(
                abandoned = self.pending.len(),
                "event loop dropped with callbacks that never fired"
            );
        }
    }
}

// === impl Entry ===

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
    }
}
