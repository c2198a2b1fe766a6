//! # Tube Trait - Transformation Stages
//!
//! A [`Tube`] is the unit of transformation in a flow. It never talks to
//! founts or drains directly: each hook simply returns the outputs it wants
//! delivered, and a [`Siphon`](crate::Siphon) takes care of buffering them,
//! honouring pauses from downstream and pausing upstream when needed.
//!
//! ## Hooks
//!
//! - **`started`**: called once, the first time an upstream fount attaches
//! - **`received`**: called for every item the upstream delivers
//! - **`stopped`**: called once when the upstream reports the end of the flow
//!
//! Each hook returns [`Outputs`]: either nothing, or a lazy sequence of
//! [`Value`]s. A value is either ready now or [pending](crate::Deferred).
//! Returning an `Err` from a hook is fatal for the flow: the siphon stops its
//! upstream and reports the [failure](crate::Failure) downstream.
//!
//! ## Example: Doubling Tube
//!
//! ```rust
//! use tubes::{BoxError, Outputs, Tube};
//!
//! struct Doubler;
//!
//! impl Tube for Doubler {
//!     type Input = u32;
//!     type Output = u32;
//!
//!     fn name(&self) -> &str {
//!         "Doubler"
//!     }
//!
//!     fn received(&mut self, item: u32) -> Result<Outputs<u32>, BoxError> {
//!         Ok(Outputs::from(vec![item, item]))
//!     }
//! }
//! ```
//!
//! ## Example: Line Splitter
//!
//! One input may produce any number of outputs, including none, and the
//! stop hook may flush whatever the tube still holds:
//!
//! ```rust
//! use tubes::{BoxError, Outputs, StopReason, Tube};
//!
//! #[derive(Default)]
//! struct Lines {
//!     partial: String,
//! }
//!
//! impl Tube for Lines {
//!     type Input = String;
//!     type Output = String;
//!
//!     fn name(&self) -> &str {
//!         "Lines"
//!     }
//!
//!     fn received(&mut self, chunk: String) -> Result<Outputs<String>, BoxError> {
//!         self.partial.push_str(&chunk);
//!         let mut lines: Vec<String> = self.partial.split('\n').map(str::to_owned).collect();
//!         self.partial = lines.pop().unwrap_or_default();
//!         Ok(Outputs::from(lines))
//!     }
//!
//!     fn stopped(&mut self, _reason: &StopReason) -> Result<Outputs<String>, BoxError> {
//!         if self.partial.is_empty() {
//!             return Ok(Outputs::nothing());
//!         }
//!         Ok(Outputs::one(std::mem::take(&mut self.partial)))
//!     }
//! }
//! ```

use crate::deferred::Deferred;
use crate::error::{BoxError, StopReason};
use std::any::type_name;
use std::fmt;

/// A lazily produced sequence of output values.
pub type Sequence<T> = Box<dyn Iterator<Item = Value<T>>>;

/// One output of a tube hook.
pub enum Value<T> {
    /// Deliverable right away.
    Ready(T),
    /// Becomes available later; the siphon pauses until it does.
    Pending(Deferred<T>),
}

impl<T> From<Deferred<T>> for Value<T> {
    fn from(deferred: Deferred<T>) -> Self {
        Value::Pending(deferred)
    }
}

impl<T: fmt::Debug> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Ready(item) => f.debug_tuple("Ready").field(item).finish(),
            Value::Pending(deferred) => f.debug_tuple("Pending").field(deferred).finish(),
        }
    }
}

/// What a tube hook yields.
///
/// `Nothing` and an empty sequence differ: an empty sequence is still
/// buffered, so a siphon without a downstream pauses its upstream on it.
pub enum Outputs<T> {
    /// The hook has no output.
    Nothing,
    /// Values to deliver, pulled one at a time as downstream accepts them.
    ///
    /// The iterator runs while the siphon is busy delivering and must not call
    /// back into the pipeline it belongs to.
    Sequence(Sequence<T>),
}

impl<T: 'static> Outputs<T> {
    /// No output.
    pub fn nothing() -> Self {
        Outputs::Nothing
    }

    /// A single ready item.
    pub fn one(item: T) -> Self {
        Self::items(std::iter::once(item))
    }

    /// A single pending item.
    pub fn pending(deferred: Deferred<T>) -> Self {
        Self::values(std::iter::once(Value::Pending(deferred)))
    }

    /// Ready items, produced lazily from `items`.
    pub fn items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'static,
    {
        Outputs::Sequence(Box::new(items.into_iter().map(Value::Ready)))
    }

    /// A mix of ready and pending values, produced lazily from `values`.
    pub fn values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value<T>>,
        I::IntoIter: 'static,
    {
        Outputs::Sequence(Box::new(values.into_iter()))
    }

    pub(crate) fn into_sequence(self) -> Option<Sequence<T>> {
        match self {
            Outputs::Nothing => None,
            Outputs::Sequence(sequence) => Some(sequence),
        }
    }
}

impl<T> Default for Outputs<T> {
    fn default() -> Self {
        Outputs::Nothing
    }
}

impl<T: 'static> From<Vec<T>> for Outputs<T> {
    fn from(items: Vec<T>) -> Self {
        Outputs::items(items)
    }
}

/// A transformation stage with start, receive and stop hooks.
///
/// Wrap a tube in a [`Siphon`](crate::Siphon) to connect it between a fount
/// and a drain.
pub trait Tube: 'static {
    /// Items this tube receives.
    type Input: 'static;

    /// Items this tube produces.
    type Output: 'static;

    /// Returns the tube's name, used in logs and failure reports.
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Type tag checked against the upstream fount's output type when the
    /// siphon is attached. `None` accepts anything.
    fn input_type(&self) -> Option<&'static str> {
        Some(type_name::<Self::Input>())
    }

    /// Type tag advertised by the siphon's fount face.
    fn output_type(&self) -> Option<&'static str> {
        Some(type_name::<Self::Output>())
    }

    /// Called the first time an upstream fount attaches.
    fn started(&mut self) -> Result<Outputs<Self::Output>, BoxError> {
        Ok(Outputs::Nothing)
    }

    /// Called for each item the upstream delivers.
    fn received(&mut self, item: Self::Input) -> Result<Outputs<Self::Output>, BoxError>;

    /// Called once when the upstream ends the flow. Outputs returned here are
    /// delivered before the stop notification propagates downstream.
    fn stopped(&mut self, _reason: &StopReason) -> Result<Outputs<Self::Output>, BoxError> {
        Ok(Outputs::Nothing)
    }
}
