//! Bounded ring buffer for handing finished heaps to consumers.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::error::{RingError, RingPushError};

struct RingState<T> {
    queue: VecDeque<T>,
    stopped: bool,
}

/// Bounded producer/consumer queue with blocking and non-blocking
/// operations and an explicit stopped state to break waiting consumers.
///
/// Safe for any number of producers and consumers; the protocol engine
/// only requires single-producer / single-consumer.
///
/// ## Example
///
/// ```rust
/// use spead_core::{RingError, Ringbuffer};
///
/// let ring = Ringbuffer::new(2);
/// ring.try_push(1).unwrap();
/// ring.try_push(2).unwrap();
/// assert!(ring.try_push(3).is_err());
///
/// assert_eq!(ring.pop().unwrap(), 1);
/// ring.stop();
/// // Queued items drain before the stopped condition is reported
/// assert_eq!(ring.pop().unwrap(), 2);
/// assert_eq!(ring.pop(), Err(RingError::Stopped));
/// ```
pub struct Ringbuffer<T> {
    state: Mutex<RingState<T>>,
    capacity: usize,
    data_ready: Condvar,
    space_ready: Condvar,
}

impl<T> Ringbuffer<T> {
    /// Create a ring buffer holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");
        Self {
            state: Mutex::new(RingState {
                queue: VecDeque::with_capacity(capacity),
                stopped: false,
            }),
            capacity,
            data_ready: Condvar::new(),
            space_ready: Condvar::new(),
        }
    }

    /// Append an item without blocking.
    pub fn try_push(&self, value: T) -> Result<(), RingPushError<T>> {
        let mut state = self.state.lock();
        if state.stopped {
            return Err(RingPushError::Stopped(value));
        }
        if state.queue.len() == self.capacity {
            return Err(RingPushError::Full(value));
        }
        state.queue.push_back(value);
        drop(state);
        self.data_ready.notify_one();
        Ok(())
    }

    /// Append an item, blocking while the buffer is full.
    pub fn push(&self, value: T) -> Result<(), RingPushError<T>> {
        let mut state = self.state.lock();
        loop {
            if state.stopped {
                return Err(RingPushError::Stopped(value));
            }
            if state.queue.len() < self.capacity {
                state.queue.push_back(value);
                drop(state);
                self.data_ready.notify_one();
                return Ok(());
            }
            self.space_ready.wait(&mut state);
        }
    }

    /// Remove the oldest item without blocking.
    pub fn try_pop(&self) -> Result<T, RingError> {
        let mut state = self.state.lock();
        match state.queue.pop_front() {
            Some(value) => {
                drop(state);
                self.space_ready.notify_one();
                Ok(value)
            }
            None if state.stopped => Err(RingError::Stopped),
            None => Err(RingError::Empty),
        }
    }

    /// Remove the oldest item, blocking while the buffer is empty.
    ///
    /// Returns [`RingError::Stopped`] once the buffer is stopped and
    /// drained.
    pub fn pop(&self) -> Result<T, RingError> {
        let mut state = self.state.lock();
        loop {
            if let Some(value) = state.queue.pop_front() {
                drop(state);
                self.space_ready.notify_one();
                return Ok(value);
            }
            if state.stopped {
                return Err(RingError::Stopped);
            }
            self.data_ready.wait(&mut state);
        }
    }

    /// Stop the buffer: all waiters wake, pushes fail, and pops report
    /// [`RingError::Stopped`] once the queue drains. Idempotent.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        drop(state);
        self.data_ready.notify_all();
        self.space_ready.notify_all();
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// True if no items are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    /// True if [`Ringbuffer::stop`] has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }
}
