//! The buffered sequence queue a siphon delivers from.

use crate::tube::{Sequence, Value};
use std::collections::VecDeque;

/// Result of pulling from a [`BufferedQueue`].
pub(crate) enum Next<T> {
    /// The next value, in order.
    Value(Value<T>),
    /// The queue is suspended; nothing was consumed.
    Paused,
    /// Every buffered sequence is exhausted.
    Exhausted,
}

/// An ordered queue of lazy sequences, drained head first.
///
/// Pulling destructively advances the head sequence until it runs dry, then
/// moves on to the next one. While suspended the queue pretends to be empty.
pub(crate) struct BufferedQueue<T> {
    sequences: VecDeque<Sequence<T>>,
    suspended: bool,
}

impl<T: 'static> BufferedQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            sequences: VecDeque::new(),
            suspended: false,
        }
    }

    pub(crate) fn suspend(&mut self) {
        self.suspended = true;
    }

    pub(crate) fn resume(&mut self) {
        self.suspended = false;
    }

    pub(crate) fn append(&mut self, sequence: Sequence<T>) {
        self.sequences.push_back(sequence);
    }

    /// Puts `value` ahead of everything else buffered.
    pub(crate) fn prepend(&mut self, value: Value<T>) {
        self.sequences.push_front(Box::new(std::iter::once(value)));
    }

    /// Drops everything buffered.
    pub(crate) fn clear(&mut self) {
        self.sequences.clear();
    }

    pub(crate) fn next(&mut self) -> Next<T> {
        if self.suspended {
            return Next::Paused;
        }
        while let Some(head) = self.sequences.front_mut() {
            match head.next() {
                Some(value) => return Next::Value(value),
                None => {
                    self.sequences.pop_front();
                }
            }
        }
        Next::Exhausted
    }
}
