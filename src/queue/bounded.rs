//! Fixed-capacity blocking FIFO.
//!
//! A ring buffer preallocated to the queue's capacity, guarded by one mutex
//! and two condition variables:
//!
//! ```text
//!   push ──▶ [ head … tail ] ──▶ pop
//!     │  waits on not_full    │  waits on not_empty
//!     └─ signals not_empty    └─ signals not_full
//! ```
//!
//! Waiters always re-check their predicate after waking, so spurious wakeups
//! and several threads racing for one slot are harmless. The wait callback
//! passed to [`BoundedQueue::push_with`] / [`BoundedQueue::pop_with`] runs
//! with the lock released.

use super::error::{PushError, QueueError};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
    /// Highest length ever observed
    peak_len: usize,
}

/// Thread-safe FIFO with a hard capacity bound and blocking push/pop.
pub struct BoundedQueue<T> {
    name: String,
    capacity: usize,
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    /// Create an empty queue that holds at most `capacity` items.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        Self::with_name("queue", capacity)
    }

    /// Create a named queue. The name only shows up in log messages.
    pub fn with_name(name: impl Into<String>, capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }

        Ok(Self {
            name: name.into(),
            capacity,
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
                peak_len: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of queued items.
    ///
    /// A snapshot only: by the time the caller looks at it another thread may
    /// already have changed the queue.
    pub fn size(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Alias for [`size`](Self::size).
    pub fn len(&self) -> usize {
        self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Largest number of items the queue has held at once.
    pub fn peak_len(&self) -> usize {
        self.inner.lock().peak_len
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Append `item` at the tail, blocking while the queue is full.
    ///
    /// Never fails on an open queue.
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        self.push_with(item, || {})
    }

    /// Like [`push`](Self::push), calling `on_wait` once every time the
    /// caller is about to block on a full queue.
    pub fn push_with<F>(&self, item: T, mut on_wait: F) -> Result<(), PushError<T>>
    where
        F: FnMut(),
    {
        let mut inner = self.inner.lock();

        loop {
            if inner.closed {
                return Err(PushError(item));
            }
            if inner.items.len() < self.capacity {
                break;
            }

            MutexGuard::unlocked(&mut inner, &mut on_wait);

            if !inner.closed && inner.items.len() >= self.capacity {
                self.not_full.wait(&mut inner);
            }
        }

        inner.items.push_back(item);
        let len = inner.items.len();
        assert!(
            len <= self.capacity,
            "{}: length {} exceeds capacity {}",
            self.name,
            len,
            self.capacity
        );
        inner.peak_len = inner.peak_len.max(len);
        drop(inner);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the head item, blocking while the queue is empty.
    ///
    /// Returns [`QueueError::Closed`] only once the queue is closed and every
    /// queued item has been handed out.
    pub fn pop(&self) -> Result<T, QueueError> {
        self.pop_with(|| {})
    }

    /// Like [`pop`](Self::pop), calling `on_wait` once every time the caller
    /// is about to block on an empty queue.
    pub fn pop_with<F>(&self, mut on_wait: F) -> Result<T, QueueError>
    where
        F: FnMut(),
    {
        let mut inner = self.inner.lock();

        loop {
            if let Some(item) = inner.items.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Ok(item);
            }
            if inner.closed {
                return Err(QueueError::Closed);
            }

            MutexGuard::unlocked(&mut inner, &mut on_wait);

            if !inner.closed && inner.items.is_empty() {
                self.not_empty.wait(&mut inner);
            }
        }
    }

    /// Close the queue and wake every blocked caller.
    ///
    /// Blocked and future pushes are rejected. Pops keep draining whatever is
    /// still queued, then report [`QueueError::Closed`].
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        drop(inner);

        tracing::debug!(queue = %self.name, "queue closed");
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Remove every queued item, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let mut inner = self.inner.lock();
        let items: Vec<T> = inner.items.drain(..).collect();
        drop(inner);

        if !items.is_empty() {
            self.not_full.notify_all();
        }
        items
    }
}

impl<T> Drop for BoundedQueue<T> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.items.is_empty() {
            return;
        }

        tracing::warn!(
            queue = %self.name,
            remaining = inner.items.len(),
            "Queue dropped while non-empty, discarding remaining items"
        );

        let mut released = 0usize;
        while let Some(item) = inner.items.pop_front() {
            drop(item);
            released += 1;
        }
        tracing::debug!(queue = %self.name, released, "Released discarded items");
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BoundedQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &inner.items.len())
            .field("closed", &inner.closed)
            .finish()
    }
}
