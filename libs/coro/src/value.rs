// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Type-erased payloads carried across promise and coroutine boundaries.

use crate::error::TypeMismatch;
use core::any::{Any, type_name};
use core::error::Error;
use core::fmt;
use std::rc::Rc;

/// A reference counted value of any type.
///
/// `Value` is what heterogeneous combinators such as [`any`][crate::any] and the coroutine engine
/// use to move results of differing types through a single slot. The stored type is only checked
/// when the value is extracted again.
#[derive(Clone)]
pub struct Value {
    inner: Rc<dyn Any>,
    type_name: &'static str,
}

impl Value {
    /// Wraps `value`, remembering its type name.
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            inner: Rc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Returns the name of the stored type, for diagnostics only.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the stored value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrows the stored value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Extracts the stored value, cloning it if other handles to it are still alive.
    ///
    /// # Errors
    ///
    /// Returns [`TypeMismatch`] if the value doesn't hold a `T`.
    pub fn try_downcast<T: Any + Clone>(self) -> Result<T, TypeMismatch> {
        let found = self.type_name;
        let rc = self.inner.downcast::<T>().map_err(|_| TypeMismatch {
            expected: type_name::<T>(),
            found,
        })?;

        Ok(Rc::try_unwrap(rc).unwrap_or_else(|rc| T::clone(&rc)))
    }

    /// Extracts the stored value.
    ///
    /// # Panics
    ///
    /// Extracting the wrong type is a programming error and panics.
    #[track_caller]
    pub fn downcast<T: Any + Clone>(self) -> T {
        match self.try_downcast() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Value").field(&self.type_name).finish()
    }
}

/// An opaque, captured failure.
///
/// A `Failure` carries an arbitrary payload from whoever rejected a promise (or returned `Err`
/// from a coroutine body) to whoever observes the rejection. Clones share the same payload, so
/// identity survives any number of hops (see [`Failure::ptr_eq`]).
///
/// Every [`Error`] type converts into a `Failure`, which makes `?` work inside coroutine bodies.
#[derive(Clone)]
pub struct Failure(Rc<dyn Payload>);

trait Payload: fmt::Debug + fmt::Display {
    fn as_any(&self) -> &dyn Any;
    fn as_error(&self) -> Option<&(dyn Error + 'static)>;
}

struct Opaque<E>(E);

struct ErrorPayload<E>(E);

struct Message(String);

impl Failure {
    /// Captures an arbitrary payload.
    pub fn new<E: Any + fmt::Debug>(payload: E) -> Self {
        Self(Rc::new(Opaque(payload)))
    }

    /// Captures an error, keeping it reachable through [`Failure::as_error`].
    pub fn from_error<E: Error + 'static>(error: E) -> Self {
        Self(Rc::new(ErrorPayload(error)))
    }

    /// Shorthand for a failure that is just a message.
    ///
    /// The message can be recovered with `downcast_ref::<String>()`.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(Rc::new(Message(message.into())))
    }

    /// Returns `true` if the payload is an `E`.
    pub fn is<E: Any>(&self) -> bool {
        self.0.as_any().is::<E>()
    }

    /// Borrows the payload if it is an `E`.
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.0.as_any().downcast_ref()
    }

    /// Returns the payload as an [`Error`] if it was captured from one.
    pub fn as_error(&self) -> Option<&(dyn Error + 'static)> {
        self.0.as_error()
    }

    /// Returns `true` if both failures share the same captured payload.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.0, &other.0)
    }
}

impl<E: Error + 'static> From<E> for Failure {
    fn from(error: E) -> Self {
        Self::from_error(error)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Failure").field(&self.0).finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// === impl Opaque ===

impl<E: Any + fmt::Debug> Payload for Opaque<E> {
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn as_error(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl<E: fmt::Debug> fmt::Debug for Opaque<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<E: fmt::Debug> fmt::Display for Opaque<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// === impl ErrorPayload ===

impl<E: Error + 'static> Payload for ErrorPayload<E> {
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn as_error(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl<E: fmt::Debug> fmt::Debug for ErrorPayload<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<E: fmt::Display> fmt::Display for ErrorPayload<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// === impl Message ===

impl Payload for Message {
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn as_error(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, PartialEq)]
    struct Code(u32);

    #[test]
    fn value_roundtrips_through_erasure() {
        let value = Value::new(vec![1, 2, 3]);
        assert!(value.is::<Vec<i32>>());
        assert_eq!(value.downcast_ref::<Vec<i32>>(), Some(&vec![1, 2, 3]));
        assert_eq!(value.clone().downcast::<Vec<i32>>(), vec![1, 2, 3]);
    }

    #[test]
    fn unit_value_is_a_value() {
        let value = Value::new(());
        assert!(value.is::<()>());
        value.downcast::<()>();
    }

    #[test]
    fn value_type_mismatch() {
        let err = Value::new(1u8).try_downcast::<String>().unwrap_err();
        assert_eq!(err.expected, "alloc::string::String");
        assert_eq!(err.found, "u8");
    }

    #[test]
    #[should_panic(expected = "type mismatch")]
    fn value_downcast_wrong_type_panics() {
        Value::new(1u8).downcast::<u16>();
    }

    #[test]
    fn failure_keeps_payload_and_identity() {
        let failure = Failure::new(Code(7));
        let clone = failure.clone();

        assert!(clone.is::<Code>());
        assert_eq!(clone.downcast_ref::<Code>(), Some(&Code(7)));
        assert!(Failure::ptr_eq(&failure, &clone));
        assert!(!Failure::ptr_eq(&failure, &Failure::new(Code(7))));
        assert!(failure.as_error().is_none());
    }

    #[test]
    fn errors_convert_into_failures() {
        fn fails() -> Result<(), Failure> {
            let res: Result<(), io::Error> =
                Err(io::Error::new(io::ErrorKind::NotFound, "no such thing"));
            res?;
            Ok(())
        }

        let failure = fails().unwrap_err();
        let err = failure.downcast_ref::<io::Error>().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(failure.to_string(), "no such thing");
        assert!(failure.as_error().is_some());
    }

    #[test]
    fn message_failures() {
        let failure = Failure::msg("connection reset");
        assert_eq!(failure.to_string(), "connection reset");
        assert_eq!(
            failure.downcast_ref::<String>().map(String::as_str),
            Some("connection reset")
        );
    }
}
