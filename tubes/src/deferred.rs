//! Single-threaded one-shot values that arrive out of band.
//!
//! A tube that cannot produce an output right away emits a
//! [`Value::Pending`](crate::Value::Pending) holding a [`Deferred`]. The siphon
//! pauses itself until the value is resolved, then delivers it in place, ahead
//! of anything buffered after it.

use crate::error::BoxError;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type Callback<T> = Box<dyn FnOnce(Result<T, BoxError>)>;

struct Slot<T> {
    result: Option<Result<T, BoxError>>,
    callback: Option<Callback<T>>,
}

/// The receiving half of a pending value.
pub struct Deferred<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

/// The completing half of a pending value.
///
/// Dropping a `Resolver` without completing it rejects the value.
pub struct Resolver<T> {
    slot: Option<Rc<RefCell<Slot<T>>>>,
}

/// Creates a pending value and the resolver that completes it.
pub fn deferred<T>() -> (Deferred<T>, Resolver<T>) {
    let slot = Rc::new(RefCell::new(Slot {
        result: None,
        callback: None,
    }));
    (
        Deferred {
            slot: Rc::clone(&slot),
        },
        Resolver { slot: Some(slot) },
    )
}

impl<T> Deferred<T> {
    /// A value that is already available.
    pub fn resolved(value: T) -> Self {
        Self::completed(Ok(value))
    }

    /// A value whose production already failed.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::completed(Err(error.into()))
    }

    fn completed(result: Result<T, BoxError>) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot {
                result: Some(result),
                callback: None,
            })),
        }
    }

    /// Whether the value has been resolved or rejected.
    pub fn is_complete(&self) -> bool {
        self.slot.borrow().result.is_some()
    }

    /// Runs `callback` with the outcome: immediately if it is already known,
    /// otherwise from within [`Resolver::resolve`] or [`Resolver::reject`].
    pub fn when_done(self, callback: impl FnOnce(Result<T, BoxError>) + 'static)
    where
        T: 'static,
    {
        let ready = self.slot.borrow_mut().result.take();
        match ready {
            Some(result) => callback(result),
            None => self.slot.borrow_mut().callback = Some(Box::new(callback)),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl<T> Resolver<T> {
    /// Completes the value successfully.
    pub fn resolve(mut self, value: T) {
        self.complete(Ok(value));
    }

    /// Completes the value with an error.
    pub fn reject(mut self, error: impl Into<BoxError>) {
        self.complete(Err(error.into()));
    }

    fn complete(&mut self, result: Result<T, BoxError>) {
        let Some(slot) = self.slot.take() else {
            return;
        };
        let callback = slot.borrow_mut().callback.take();
        match callback {
            Some(callback) => callback(result),
            None => slot.borrow_mut().result = Some(result),
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if self.slot.is_some() {
            self.complete(Err("pending value abandoned before it was resolved".into()));
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("complete", &self.slot.is_none())
            .finish()
    }
}
