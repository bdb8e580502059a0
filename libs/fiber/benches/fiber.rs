// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use criterion::{Criterion, criterion_group, criterion_main};
use fiber::Fiber;
use fiber::stack::{DEFAULT_STACK_SIZE, FiberStack};
use std::hint::black_box;

fn fiber_switch(c: &mut Criterion) {
    let stack = FiberStack::new(DEFAULT_STACK_SIZE).unwrap();
    let mut identity = Fiber::<usize, usize, (), _>::with_stack(stack, |mut input, suspend| {
        loop {
            input = suspend.suspend(input);
        }
    });

    c.bench_function("fiber_switch", |b| b.iter(|| identity.resume(black_box(0usize))));

    // Forcibly reset the fiber, its stack holds nothing that needs dropping.
    // Safety: the fiber body only holds a `usize` on its stack
    unsafe {
        identity.force_reset();
    }
}

fn fiber_stack_alloc(c: &mut Criterion) {
    c.bench_function("fiber_stack_alloc", |b| {
        b.iter(|| FiberStack::new(black_box(DEFAULT_STACK_SIZE)).unwrap());
    });
}

criterion_group!(
    name = time;
    config = Criterion::default();
    targets = fiber_switch, fiber_stack_alloc
);
criterion_main!(time);
