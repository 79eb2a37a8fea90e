//! Queue error types

use std::fmt;

use thiserror::Error;

/// Errors from queue construction and popping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// A queue must be able to hold at least one item
    #[error("queue capacity must be greater than zero")]
    ZeroCapacity,

    /// The queue was closed and has nothing left to hand out
    #[error("queue is closed")]
    Closed,
}

/// Returned by a push on a closed queue. Carries the rejected item back to
/// the caller so it is never silently lost.
#[derive(PartialEq, Eq)]
pub struct PushError<T>(pub T);

impl<T> PushError<T> {
    /// Take back the item that could not be queued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PushError(..)")
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("push on a closed queue")
    }
}

impl<T> std::error::Error for PushError<T> {}
