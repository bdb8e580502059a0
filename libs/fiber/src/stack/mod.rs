// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Execution stacks for fibers.
//!
//! On unix targets stacks are allocated with `mmap` and protected by a guard page at their lowest
//! address so that a stack overflow faults instead of silently corrupting adjacent memory. On all
//! other targets the platform stack provided by `corosensei` is used.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::FiberStack;
    } else {
        /// Stack allocated by the platform support code in `corosensei`.
        pub type FiberStack = corosensei::stack::DefaultStack;
    }
}

pub use corosensei::stack::{Stack, StackPointer};

/// Minimum size of a stack, excluding guard pages.
pub const MIN_STACK_SIZE: usize = 4096;

/// Size of the stacks handed out when the caller doesn't ask for a specific size.
pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;
