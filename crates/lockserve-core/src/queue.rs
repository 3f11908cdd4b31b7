//! Bounded blocking FIFO queue
//!
//! Hands accepted connections from the listener to the worker threads.
//! Capacity is fixed at construction; `push` blocks while the queue is full
//! and `pop` blocks while it is empty. Nothing is ever dropped.
//!
//! Waiting producers are served in arrival order, and so are waiting
//! consumers: each blocked caller takes a ticket and only the holder of the
//! next ticket may proceed. Items themselves sit in a fixed-size
//! `crossbeam_queue::ArrayQueue`, so the storage can never exceed capacity.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crossbeam_queue::ArrayQueue;

use crate::error::QueueError;

#[derive(Debug, Default)]
struct Tickets {
    next_push: u64,
    serving_push: u64,
    next_pop: u64,
    serving_pop: u64,
    closed: bool,
}

/// A bounded multi-producer multi-consumer blocking queue
pub struct BoundedQueue<T> {
    slots: ArrayQueue<T>,
    tickets: Mutex<Tickets>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (at least 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: ArrayQueue::new(capacity.max(1)),
            tickets: Mutex::new(Tickets::default()),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    #[inline]
    fn tickets(&self) -> MutexGuard<'_, Tickets> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `item`, blocking while the queue is full
    ///
    /// Returns the item back if the queue is closed.
    pub fn push(&self, item: T) -> Result<(), QueueError<T>> {
        let mut t = self.tickets();
        if t.closed {
            return Err(QueueError::Closed(item));
        }
        let ticket = t.next_push;
        t.next_push += 1;

        while !t.closed && (t.serving_push != ticket || self.slots.is_full()) {
            t = self.not_full.wait(t).unwrap_or_else(PoisonError::into_inner);
        }
        t.serving_push += 1;
        if t.closed {
            self.not_full.notify_all();
            return Err(QueueError::Closed(item));
        }

        // Ticket order plus the is_full check under the mutex means the
        // slot is free.
        let pushed = self.slots.push(item);
        debug_assert!(pushed.is_ok());
        self.not_full.notify_all();
        self.not_empty.notify_all();
        Ok(())
    }

    /// Remove the oldest item, blocking while the queue is empty
    ///
    /// Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut t = self.tickets();
        let ticket = t.next_pop;
        t.next_pop += 1;

        loop {
            if t.serving_pop == ticket {
                if let Some(item) = self.slots.pop() {
                    t.serving_pop += 1;
                    self.not_empty.notify_all();
                    self.not_full.notify_all();
                    return Some(item);
                }
                if t.closed {
                    t.serving_pop += 1;
                    self.not_empty.notify_all();
                    return None;
                }
            }
            t = self.not_empty.wait(t).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Append without blocking
    ///
    /// Fails with `Full` if at capacity or if blocked producers are queued
    /// ahead (jumping them would break FIFO order).
    pub fn try_push(&self, item: T) -> Result<(), QueueError<T>> {
        let mut t = self.tickets();
        if t.closed {
            return Err(QueueError::Closed(item));
        }
        if t.next_push != t.serving_push {
            return Err(QueueError::Full(item));
        }
        match self.slots.push(item) {
            Ok(()) => {
                t.next_push += 1;
                t.serving_push += 1;
                self.not_empty.notify_all();
                Ok(())
            }
            Err(item) => Err(QueueError::Full(item)),
        }
    }

    /// Remove the oldest item without blocking
    pub fn try_pop(&self) -> Option<T> {
        let mut t = self.tickets();
        if t.next_pop != t.serving_pop {
            return None;
        }
        let item = self.slots.pop()?;
        t.next_pop += 1;
        t.serving_pop += 1;
        self.not_full.notify_all();
        Some(item)
    }

    /// Close the queue
    ///
    /// Blocked and future producers get their item back; consumers drain
    /// what is left and then receive `None`.
    pub fn close(&self) {
        let mut t = self.tickets();
        t.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.tickets().closed
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}
