//! Bounded blocking FIFO used to hand work between pipeline stages.

mod bounded;
mod error;

pub use bounded::BoundedQueue;
pub use error::{PushError, QueueError};
