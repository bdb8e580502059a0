// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod common;

use coro::{EventLoop, Failure, ManualClock, Promise, SpawnError, State};
use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

fn delayed<T: Clone + 'static>(event_loop: &EventLoop, value: T, delay: Duration) -> Promise<T> {
    let (resolver, promise) = coro::pending();
    event_loop.schedule(move || resolver.resolve(value), delay);
    promise
}

#[test]
fn sequential_timers() {
    let _trace = common::trace_init();

    let clock = ManualClock::new();
    let event_loop = EventLoop::with_clock(clock.clone());
    let seen = Rc::new(RefCell::new(Vec::new()));

    let handle = event_loop.clone();
    let log = seen.clone();
    let promise = coro::spawn(move |cx| {
        for (value, delay) in [(1, 1), (2, 2), (3, 3)] {
            let timer = delayed(&handle, value, Duration::from_secs(delay));
            let v = cx.wait(&timer)?;
            log.borrow_mut().push((v, handle.now()));
        }
        Ok("finished")
    });

    assert!(seen.borrow().is_empty());
    assert!(promise.is_pending());

    clock.advance(Duration::from_secs(1));
    assert_eq!(event_loop.turn().fired, 1);
    assert_eq!(*seen.borrow(), [(1, Duration::from_secs(1))]);
    assert!(promise.is_pending());

    // the second timer is only registered once the first value arrived
    clock.advance(Duration::from_secs(2));
    assert_eq!(event_loop.turn().fired, 1);
    assert_eq!(seen.borrow().len(), 2);
    assert!(promise.is_pending());

    clock.advance(Duration::from_secs(2));
    assert_eq!(event_loop.turn().fired, 0);
    assert!(promise.is_pending());

    clock.advance(Duration::from_secs(1));
    assert_eq!(event_loop.turn().fired, 1);
    assert!(event_loop.is_empty());
    assert_eq!(
        *seen.borrow(),
        [
            (1, Duration::from_secs(1)),
            (2, Duration::from_secs(3)),
            (3, Duration::from_secs(6)),
        ]
    );
    assert_eq!(promise.peek().unwrap().unwrap(), "finished");
}

#[test]
fn uncaught_rejection_ends_the_frame() {
    let _trace = common::trace_init();

    let event_loop = EventLoop::with_clock(ManualClock::new());
    let (resolver, awaited) = coro::pending::<u32>();
    let failure = Failure::msg("disk on fire");

    let after_wait = Rc::new(RefCell::new(false));
    let flag = after_wait.clone();
    let promise = coro::spawn(move |cx| {
        let v = cx.wait(&awaited)?;
        *flag.borrow_mut() = true;
        Ok(v)
    });

    let reject = failure.clone();
    event_loop.schedule(move || resolver.reject(reject), Duration::from_millis(5));
    event_loop.run();

    assert!(!*after_wait.borrow());
    assert_eq!(promise.state(), State::Rejected);
    let err = promise.peek().unwrap().unwrap_err();
    assert!(Failure::ptr_eq(&err, &failure));
    let _ = promise.error(|_| 0);
}

#[test]
fn caught_rejection_continues() {
    let (resolver, awaited) = coro::pending::<u32>();

    let promise = coro::spawn(move |cx| {
        let v = cx.wait(&awaited).unwrap_or_else(|failure| {
            assert_eq!(failure.to_string(), "try again");
            7
        });
        let w = cx.wait(&Promise::resolved(v + 1))?;
        Ok(v + w)
    });

    resolver.reject(Failure::msg("try again"));
    assert_eq!(promise.peek().unwrap().unwrap(), 15);
}

#[test]
fn question_mark_converts_errors() {
    let promise = coro::spawn(|cx| {
        cx.wait(&Promise::resolved(()))?;
        let res: Result<(), io::Error> = Err(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        res?;
        Ok(())
    });

    let err = promise.peek().unwrap().unwrap_err();
    let source = err.downcast_ref::<io::Error>().unwrap();
    assert_eq!(source.kind(), io::ErrorKind::TimedOut);
    let _ = promise.error(|_| ());
}

#[test]
fn coroutines_interleave() {
    let _trace = common::trace_init();

    let event_loop = EventLoop::with_clock(ManualClock::new());
    let log = Rc::new(RefCell::new(Vec::new()));

    let spawn_ticker = |name: &'static str, period: u64| {
        let handle = event_loop.clone();
        let log = log.clone();
        coro::Builder::new().name(name).spawn(move |cx| {
            for _ in 0..3 {
                cx.wait(&handle.sleep(Duration::from_millis(period)))?;
                log.borrow_mut().push((name, handle.now().as_millis()));
            }
            Ok(())
        })
    };

    let both = coro::join(spawn_ticker("fast", 2), spawn_ticker("slow", 5));
    event_loop.run();

    assert!(both.peek().unwrap().is_ok());
    assert_eq!(
        *log.borrow(),
        [
            ("fast", 2),
            ("fast", 4),
            ("slow", 5),
            ("fast", 6),
            ("slow", 10),
            ("slow", 15),
        ]
    );
}

#[test]
fn awaiting_all_from_a_coroutine() {
    let event_loop = EventLoop::with_clock(ManualClock::new());

    let handle = event_loop.clone();
    let promise = coro::spawn(move |cx| {
        let timers = [3, 1, 2].map(|n| delayed(&handle, n, Duration::from_secs(n)));
        let values = cx.wait(&coro::all(timers))?;
        Ok(values)
    });

    event_loop.run();
    assert_eq!(promise.peek().unwrap().unwrap(), [3, 1, 2]);
    assert_eq!(event_loop.now(), Duration::from_secs(3));
}

#[test]
fn spawn_error_is_a_failure() {
    let err = SpawnError::from(io::Error::from(io::ErrorKind::OutOfMemory));
    assert!(err.to_string().starts_with("failed to allocate coroutine stack"));

    let failure = Failure::from(err);
    assert!(failure.is::<SpawnError>());
    assert!(failure.as_error().unwrap().source().is_some());
}
