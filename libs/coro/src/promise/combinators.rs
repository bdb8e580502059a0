// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::promise::{Promise, pending};
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Waits for every promise in `promises` to fulfill.
///
/// The returned promise fulfills with the values in input order, or rejects with the first
/// failure observed. Settlements arriving after that are discarded. An empty input fulfills right
/// away with an empty vector.
pub fn all<T, I>(promises: I) -> Promise<Vec<T>>
where
    T: Clone + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    let promises: Vec<_> = promises.into_iter().collect();
    if promises.is_empty() {
        return Promise::resolved(Vec::new());
    }

    let (resolver, promise) = pending();
    let slots = Rc::new(RefCell::new(vec![None; promises.len()]));
    let remaining = Rc::new(Cell::new(promises.len()));

    for (idx, input) in promises.into_iter().enumerate() {
        let resolver = resolver.clone();
        let slots = slots.clone();
        let remaining = remaining.clone();

        input.on_settled(move |res| {
            if !resolver.is_pending() {
                return;
            }

            match res {
                Ok(value) => {
                    slots.borrow_mut()[idx] = Some(value);
                    remaining.set(remaining.get() - 1);

                    if remaining.get() == 0 {
                        let values = slots.take().into_iter().flatten().collect();
                        resolver.resolve(values);
                    }
                }
                Err(failure) => resolver.reject(failure),
            }
        });
    }

    promise
}

/// Waits for two promises of possibly different types to fulfill.
///
/// Rejects with whichever failure is observed first.
pub fn join<A, B>(a: Promise<A>, b: Promise<B>) -> Promise<(A, B)>
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    let (resolver, promise) = pending();
    let slots: Rc<RefCell<(Option<A>, Option<B>)>> = Rc::new(RefCell::new((None, None)));

    {
        let resolver = resolver.clone();
        let slots = slots.clone();
        a.on_settled(move |res| match res {
            Ok(value) if resolver.is_pending() => {
                let mut slots = slots.borrow_mut();
                slots.0 = Some(value);
                if let (Some(a), Some(b)) = &*slots {
                    resolver.resolve((a.clone(), b.clone()));
                }
            }
            Ok(_) => {}
            Err(failure) => {
                let _ = resolver.try_reject(failure);
            }
        });
    }

    b.on_settled(move |res| match res {
        Ok(value) if resolver.is_pending() => {
            let mut slots = slots.borrow_mut();
            slots.1 = Some(value);
            if let (Some(a), Some(b)) = &*slots {
                resolver.resolve((a.clone(), b.clone()));
            }
        }
        Ok(_) => {}
        Err(failure) => {
            let _ = resolver.try_reject(failure);
        }
    });

    promise
}

/// Settles with the outcome of whichever promise in `promises` settles first.
///
/// If several inputs are already settled, the one that comes first in `promises` wins. An empty
/// input never settles.
pub fn race<T, I>(promises: I) -> Promise<T>
where
    T: Clone + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    let (resolver, promise) = pending();

    for input in promises {
        let resolver = resolver.clone();
        input.on_settled(move |res| {
            // losers are discarded
            let _ = resolver.try_settle(res);
        });
    }

    promise
}

/// Like [`race`], but for promises of different types that were [erased][Promise::erase] first.
///
/// ```
/// use coro::{Promise, Value};
///
/// let (_never, slow) = coro::pending::<u8>();
/// let fast = Promise::resolved("done");
///
/// let first = coro::any([slow.erase(), fast.erase()]);
/// let value: Value = first.peek().unwrap().unwrap();
/// assert_eq!(value.downcast::<&str>(), "done");
/// ```
pub fn any<I>(promises: I) -> Promise<Value>
where
    I: IntoIterator<Item = Promise<Value>>,
{
    race(promises)
}
