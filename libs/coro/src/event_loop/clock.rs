// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::time::Duration;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// A source of time for an [`EventLoop`][crate::EventLoop].
///
/// Time is measured as the [`Duration`] elapsed since an arbitrary, clock-specific epoch. It must
/// never go backwards.
pub trait Clock {
    /// Returns this clock's name, for diagnostics.
    fn name(&self) -> &'static str {
        "<unnamed mystery clock>"
    }

    /// Returns the time elapsed since this clock's epoch.
    fn now(&self) -> Duration;

    /// Blocks until [`Clock::now`] has reached `deadline`.
    ///
    /// Returning early is allowed, the event loop will simply check again.
    fn park_until(&self, deadline: Deadline);
}

/// A point in time on a [`Clock`], expressed as the time elapsed since its epoch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline(Duration);

/// Wall clock time backed by [`Instant`].
///
/// The epoch is the moment the clock was created, parking puts the current thread to sleep.
#[derive(Clone, Debug)]
pub struct SystemClock {
    anchor: Instant,
}

/// A virtual clock that only moves when told to.
///
/// Parking on a `ManualClock` doesn't block, it jumps the clock straight to the deadline. Clones
/// share the same time, so a test can keep a handle to [`ManualClock::advance`] a clock it handed
/// to an event loop.
///
/// ```
/// use coro::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let handle = clock.clone();
///
/// handle.advance(Duration::from_secs(5));
/// assert_eq!(clock.now(), Duration::from_secs(5));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

// === impl Deadline ===

impl Deadline {
    pub const fn from_elapsed(elapsed: Duration) -> Self {
        Self(elapsed)
    }

    /// Returns the deadline `delay` after `now`, saturating at the largest representable time.
    #[must_use]
    pub fn after(now: Duration, delay: Duration) -> Self {
        Self(now.saturating_add(delay))
    }

    pub const fn elapsed(self) -> Duration {
        self.0
    }

    /// Returns how much time is left until this deadline, or zero if it has passed.
    #[must_use]
    pub fn remaining(self, now: Duration) -> Duration {
        self.0.saturating_sub(now)
    }

    pub fn is_due(self, now: Duration) -> bool {
        self.0 <= now
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

// === impl SystemClock ===

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn name(&self) -> &'static str {
        "system"
    }

    fn now(&self) -> Duration {
        self.anchor.elapsed()
    }

    fn park_until(&self, deadline: Deadline) {
        let remaining = deadline.remaining(self.now());
        if !remaining.is_zero() {
            tracing::trace!(?remaining, "parking current thread");
            std::thread::sleep(remaining);
        }
    }
}

// === impl ManualClock ===

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get().saturating_add(by));
    }
}

impl Clock for ManualClock {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn now(&self) -> Duration {
        self.now.get()
    }

    fn park_until(&self, deadline: Deadline) {
        if !deadline.is_due(self.now.get()) {
            self.now.set(deadline.elapsed());
        }
    }
}
