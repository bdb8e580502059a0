// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod common;

use coro::{Failure, Promise, State, Value};
use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

#[derive(Debug, PartialEq)]
struct Refused(&'static str);

#[test]
fn settling_twice_is_a_fault() {
    let _trace = common::trace_init();

    for (first_ok, second_ok) in [(true, true), (true, false), (false, true), (false, false)] {
        let (resolver, promise) = coro::pending::<u8>();
        let settle = |ok| {
            if ok {
                resolver.resolve(1);
            } else {
                resolver.reject(Failure::new(Refused("nope")));
            }
        };

        settle(first_ok);
        let res = catch_unwind(AssertUnwindSafe(|| settle(second_ok)));
        assert!(res.is_err(), "settling {first_ok} then {second_ok} must panic");

        // the first outcome sticks
        let expected = if first_ok {
            State::Fulfilled
        } else {
            State::Rejected
        };
        assert_eq!(promise.state(), expected);
        let _ = promise.error(|_| 0);
    }
}

#[test]
fn every_continuation_sees_the_value_once_and_in_order() {
    let _trace = common::trace_init();

    let (resolver, promise) = coro::pending::<String>();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let rejected = Rc::new(Cell::new(0));

    for i in 0..16 {
        let seen = seen.clone();
        let _ = promise.then(move |v| seen.borrow_mut().push((i, v)));

        let rejected = rejected.clone();
        let _ = promise.error(move |_| {
            rejected.set(rejected.get() + 1);
            String::new()
        });
    }

    resolver.resolve("v".to_string());

    let expected: Vec<_> = (0..16).map(|i| (i, "v".to_string())).collect();
    assert_eq!(*seen.borrow(), expected);
    assert_eq!(rejected.get(), 0);
}

#[test]
fn continuations_registered_from_continuations() {
    let (resolver, promise) = coro::pending::<u32>();
    let log = Rc::new(RefCell::new(Vec::new()));

    let inner = promise.clone();
    let l = log.clone();
    promise.on_settled(move |_| {
        l.borrow_mut().push("first");
        let l2 = l.clone();
        inner.on_settled(move |_| l2.borrow_mut().push("late"));
        l.borrow_mut().push("first done");
    });
    let l = log.clone();
    promise.on_settled(move |_| l.borrow_mut().push("second"));

    resolver.resolve(1);
    assert_eq!(*log.borrow(), ["first", "first done", "second", "late"]);
}

#[test]
fn all_rejects_with_the_first_failure() {
    let _trace = common::trace_init();

    let (a, pa) = coro::pending::<u32>();
    let (b, pb) = coro::pending::<u32>();
    let (c, pc) = coro::pending::<u32>();
    let joined = coro::all([pa, pb, pc]);

    let failure = Failure::new(Refused("b"));
    b.reject(failure.clone());
    a.resolve(1);
    c.resolve(3);

    let err = joined.peek().unwrap().unwrap_err();
    assert!(Failure::ptr_eq(&err, &failure));
    assert_eq!(err.downcast_ref::<Refused>(), Some(&Refused("b")));
    let _ = joined.error(|_| Vec::new());
}

#[test]
fn any_adopts_the_first_outcome() {
    let (a, pa) = coro::pending::<u32>();
    let (b, pb) = coro::pending::<String>();
    let first = coro::any([pa.erase(), pb.erase()]);

    b.resolve("b".into());
    a.resolve(1);

    let value: Value = first.peek().unwrap().unwrap();
    assert_eq!(value.type_name(), "alloc::string::String");
    assert_eq!(value.downcast::<String>(), "b");
}

#[test]
fn race_ignores_losing_rejections() {
    let (a, pa) = coro::pending::<u32>();
    let (b, pb) = coro::pending::<u32>();
    let winner = coro::race([pa, pb]);

    a.resolve(1);
    b.reject(Failure::new(Refused("late")));

    assert_eq!(winner.peek().unwrap().unwrap(), 1);
}

#[test]
fn recovery_chain() {
    let recovered = Promise::<u32>::rejected(Failure::msg("flaky"))
        .then(|v| v + 100)
        .or_else(|failure| {
            assert_eq!(failure.to_string(), "flaky");
            Promise::resolved(1)
        })
        .and_then(|v| Promise::resolved(v * 2))
        .finally(|| {});

    assert_eq!(recovered.peek().unwrap().unwrap(), 2);
}

#[test]
fn already_settled_error_is_reportable() {
    let (resolver, _promise) = coro::pending::<()>();
    resolver.resolve(());

    let err = resolver.try_resolve(()).unwrap_err();
    assert_eq!(err.to_string(), "promise was already settled");

    // converts into a failure like any other error
    let failure = Failure::from(err);
    assert!(failure.is::<coro::AlreadySettled>());
}
