// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use std::io;

/// Returned by [`Resolver::try_resolve`][crate::Resolver::try_resolve] and
/// [`Resolver::try_reject`][crate::Resolver::try_reject] when the promise already has an outcome.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AlreadySettled(pub(crate) ());

impl fmt::Display for AlreadySettled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("promise was already settled")
    }
}

impl core::error::Error for AlreadySettled {}

/// A type-erased [`Value`][crate::Value] was extracted as the wrong type.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TypeMismatch {
    /// The type the caller asked for.
    pub expected: &'static str,
    /// The type actually stored in the value.
    pub found: &'static str,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type mismatch: expected value of type `{}`, found `{}`",
            self.expected, self.found
        )
    }
}

impl core::error::Error for TypeMismatch {}

#[derive(Debug)]
#[non_exhaustive]
pub enum SpawnError {
    /// The execution stack for the coroutine could not be allocated.
    Stack(io::Error),
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::Stack(err) => write!(f, "failed to allocate coroutine stack: {err}"),
        }
    }
}

impl core::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            SpawnError::Stack(err) => Some(err),
        }
    }
}

impl From<io::Error> for SpawnError {
    fn from(err: io::Error) -> Self {
        Self::Stack(err)
    }
}
