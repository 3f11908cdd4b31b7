//! Fair N-way reader-writer lock
//!
//! Gives shared (reader) or exclusive (writer) access to one resource.
//! Unlike `std::sync::RwLock`, which makes no fairness promise at all, this
//! lock bounds starvation in both directions:
//!
//! - A reader is admitted immediately only while fewer than `N` readers
//!   have been admitted since the last writer held the lock, or while no
//!   writer is waiting. Past that bound new readers queue behind the
//!   waiting writer.
//! - Writers are admitted one at a time in arrival (ticket) order. Each
//!   admission resets the consecutive-reader count.
//! - When a writer releases, every queued reader is admitted as one batch
//!   before the next writer can get in.
//!
//! The lock guards no data of its own; it is a pure access protocol around
//! an external resource (a file). `read()` / `write()` return RAII guards;
//! the raw `acquire_*` / `release_*` calls exist for callers that manage
//! the hold explicitly.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Fairness bound used when none is given.
///
/// One reader admission per waiting writer: readers and writers alternate
/// under contention.
pub const DEFAULT_FAIRNESS: usize = 1;

#[derive(Debug, Default)]
struct LockState {
    active_readers: usize,
    writer_active: bool,
    waiting_readers: usize,
    waiting_writers: usize,
    /// Readers admitted since the last writer was admitted
    readers_since_writer: usize,
    next_writer_ticket: u64,
    serving_writer: u64,
    /// Bumped each time a releasing writer admits the queued readers
    reader_batch: u64,
}

impl LockState {
    #[inline]
    fn reader_may_enter(&self, fairness: usize) -> bool {
        !self.writer_active
            && self.waiting_readers == 0
            && (self.waiting_writers == 0 || self.readers_since_writer < fairness)
    }

    #[inline]
    fn admit_reader(&mut self) {
        self.active_readers += 1;
        self.readers_since_writer = self.readers_since_writer.saturating_add(1);
    }

    #[inline]
    fn writer_may_enter(&self, ticket: u64) -> bool {
        self.serving_writer == ticket && !self.writer_active && self.active_readers == 0
    }

    #[inline]
    fn admit_writer(&mut self) {
        self.serving_writer += 1;
        self.writer_active = true;
        self.readers_since_writer = 0;
    }
}

/// Point-in-time view of a lock's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStats {
    pub active_readers: usize,
    pub writer_active: bool,
    pub waiting_readers: usize,
    pub waiting_writers: usize,
    pub readers_since_writer: usize,
}

/// A reader-writer lock admitting at most `N` consecutive readers ahead of
/// a waiting writer
///
/// # Example
///
/// ```
/// use lockserve_core::FairRwLock;
///
/// let lock = FairRwLock::new(2);
/// {
///     let _r1 = lock.read();
///     let _r2 = lock.read();
///     assert_eq!(lock.stats().active_readers, 2);
/// }
/// let _w = lock.write();
/// assert!(lock.stats().writer_active);
/// ```
pub struct FairRwLock {
    state: Mutex<LockState>,
    readers: Condvar,
    writers: Condvar,
    fairness: usize,
}

impl FairRwLock {
    /// Create a lock with fairness bound `n` (clamped to at least 1)
    pub fn new(n: usize) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            readers: Condvar::new(),
            writers: Condvar::new(),
            fairness: n.max(1),
        }
    }

    /// The configured fairness bound `N`
    #[inline]
    pub fn fairness(&self) -> usize {
        self.fairness
    }

    // The state mutex is never held across user code, so a poisoned guard
    // still holds consistent counters.
    #[inline]
    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until shared access is granted
    pub fn acquire_read(&self) {
        let mut st = self.lock_state();
        if st.reader_may_enter(self.fairness) {
            st.admit_reader();
            return;
        }

        // Queue behind the writer; the writer's release admits us.
        st.waiting_readers += 1;
        let batch = st.reader_batch;
        while st.reader_batch == batch {
            st = self.readers.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Release shared access previously granted to this thread
    pub fn release_read(&self) {
        let mut st = self.lock_state();
        debug_assert!(st.active_readers > 0, "release_read without a read hold");
        st.active_readers = st.active_readers.saturating_sub(1);
        if st.active_readers == 0 && st.waiting_writers > 0 {
            self.writers.notify_all();
        }
    }

    /// Block until exclusive access is granted
    pub fn acquire_write(&self) {
        let mut st = self.lock_state();
        let ticket = st.next_writer_ticket;
        st.next_writer_ticket += 1;
        st.waiting_writers += 1;

        while !st.writer_may_enter(ticket) {
            st = self.writers.wait(st).unwrap_or_else(PoisonError::into_inner);
        }

        st.waiting_writers -= 1;
        st.admit_writer();
    }

    /// Release exclusive access previously granted to this thread
    pub fn release_write(&self) {
        let mut st = self.lock_state();
        debug_assert!(st.writer_active, "release_write without a write hold");
        st.writer_active = false;

        if st.waiting_readers > 0 {
            // Hand the lock to every queued reader at once.
            let batch = st.waiting_readers;
            st.waiting_readers = 0;
            st.active_readers += batch;
            st.readers_since_writer = st.readers_since_writer.saturating_add(batch);
            st.reader_batch = st.reader_batch.wrapping_add(1);
            self.readers.notify_all();
        } else if st.waiting_writers > 0 {
            self.writers.notify_all();
        }
    }

    /// Acquire shared access, returning a guard that releases on drop
    pub fn read(&self) -> FairReadGuard<'_> {
        self.acquire_read();
        FairReadGuard { lock: self }
    }

    /// Acquire exclusive access, returning a guard that releases on drop
    pub fn write(&self) -> FairWriteGuard<'_> {
        self.acquire_write();
        FairWriteGuard { lock: self }
    }

    /// Take shared access only if it can be granted without waiting
    pub fn try_read(&self) -> Option<FairReadGuard<'_>> {
        let mut st = self.lock_state();
        if st.reader_may_enter(self.fairness) {
            st.admit_reader();
            Some(FairReadGuard { lock: self })
        } else {
            None
        }
    }

    /// Take exclusive access only if nobody holds or waits for the lock
    pub fn try_write(&self) -> Option<FairWriteGuard<'_>> {
        let mut st = self.lock_state();
        let idle = !st.writer_active
            && st.active_readers == 0
            && st.waiting_writers == 0
            && st.waiting_readers == 0;
        if idle {
            st.next_writer_ticket += 1;
            st.admit_writer();
            Some(FairWriteGuard { lock: self })
        } else {
            None
        }
    }

    pub fn stats(&self) -> LockStats {
        let st = self.lock_state();
        LockStats {
            active_readers: st.active_readers,
            writer_active: st.writer_active,
            waiting_readers: st.waiting_readers,
            waiting_writers: st.waiting_writers,
            readers_since_writer: st.readers_since_writer,
        }
    }
}

impl Default for FairRwLock {
    fn default() -> Self {
        Self::new(DEFAULT_FAIRNESS)
    }
}

impl fmt::Debug for FairRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FairRwLock")
            .field("fairness", &self.fairness)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Shared access to a `FairRwLock`, released on drop
#[must_use = "dropping the guard releases the read lock immediately"]
pub struct FairReadGuard<'a> {
    lock: &'a FairRwLock,
}

impl Drop for FairReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// Exclusive access to a `FairRwLock`, released on drop
#[must_use = "dropping the guard releases the write lock immediately"]
pub struct FairWriteGuard<'a> {
    lock: &'a FairRwLock,
}

impl Drop for FairWriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    /// Spin until `cond` holds on the lock's stats, or fail after 5s
    fn wait_for(lock: &FairRwLock, cond: impl Fn(&LockStats) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond(&lock.stats()) {
            assert!(Instant::now() < deadline, "timed out, stats: {:?}", lock.stats());
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_shared_readers() {
        let lock = FairRwLock::new(4);
        let r1 = lock.read();
        let r2 = lock.try_read();
        assert!(r2.is_some());
        assert_eq!(lock.stats().active_readers, 2);
        assert!(lock.try_write().is_none());
        drop(r1);
        drop(r2);
        assert_eq!(lock.stats().active_readers, 0);
    }

    #[test]
    fn test_writer_excludes_everyone() {
        let lock = FairRwLock::new(1);
        let w = lock.write();
        assert!(lock.try_read().is_none());
        assert!(lock.try_write().is_none());
        drop(w);
        assert!(lock.try_write().is_some());
        assert!(lock.try_read().is_some());
    }

    #[test]
    fn test_zero_fairness_clamped() {
        assert_eq!(FairRwLock::new(0).fairness(), 1);
        assert_eq!(FairRwLock::default().fairness(), DEFAULT_FAIRNESS);
    }

    #[test]
    fn test_raw_api_pairs() {
        let lock = FairRwLock::new(2);
        lock.acquire_read();
        lock.acquire_read();
        lock.release_read();
        lock.release_read();
        lock.acquire_write();
        assert!(lock.stats().writer_active);
        lock.release_write();
        assert_eq!(
            lock.stats(),
            LockStats {
                active_readers: 0,
                writer_active: false,
                waiting_readers: 0,
                waiting_writers: 0,
                readers_since_writer: 0,
            }
        );
    }

    #[test]
    fn test_mutual_exclusion_under_load() {
        let lock = Arc::new(FairRwLock::new(3));
        let readers = Arc::new(AtomicUsize::new(0));
        let writers = Arc::new(AtomicUsize::new(0));
        let violated = Arc::new(AtomicBool::new(false));
        let mut handles = vec![];

        for t in 0..8 {
            let lock = Arc::clone(&lock);
            let readers = Arc::clone(&readers);
            let writers = Arc::clone(&writers);
            let violated = Arc::clone(&violated);
            handles.push(thread::spawn(move || {
                for i in 0..300 {
                    if (t + i) % 4 == 0 {
                        let _g = lock.write();
                        let w = writers.fetch_add(1, Ordering::SeqCst);
                        if w != 0 || readers.load(Ordering::SeqCst) != 0 {
                            violated.store(true, Ordering::SeqCst);
                        }
                        thread::yield_now();
                        writers.fetch_sub(1, Ordering::SeqCst);
                    } else {
                        let _g = lock.read();
                        readers.fetch_add(1, Ordering::SeqCst);
                        if writers.load(Ordering::SeqCst) != 0 {
                            violated.store(true, Ordering::SeqCst);
                        }
                        thread::yield_now();
                        readers.fetch_sub(1, Ordering::SeqCst);
                    }
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert!(!violated.load(Ordering::SeqCst));
        assert_eq!(lock.stats().active_readers, 0);
        assert!(!lock.stats().writer_active);
    }

    #[test]
    fn test_waiting_writer_bounds_reader_admissions() {
        const N: usize = 3;
        let lock = Arc::new(FairRwLock::new(N));
        let admitted = Arc::new(AtomicUsize::new(0));

        // First reader holds the lock; the writer queues behind it.
        let mut held = vec![lock.read()];
        admitted.fetch_add(1, Ordering::SeqCst);

        let writer = {
            let lock = Arc::clone(&lock);
            let admitted = Arc::clone(&admitted);
            thread::spawn(move || {
                let _w = lock.write();
                admitted.load(Ordering::SeqCst)
            })
        };
        wait_for(&lock, |s| s.waiting_writers == 1);

        // Only N readers in total may get in ahead of the writer.
        while let Some(g) = lock.try_read() {
            held.push(g);
            admitted.fetch_add(1, Ordering::SeqCst);
            assert!(held.len() <= N, "reader admitted past fairness bound");
        }
        assert_eq!(held.len(), N);

        drop(held);
        let seen = writer.join().unwrap();
        assert_eq!(seen, N);
    }

    #[test]
    fn test_late_reader_waits_for_queued_writer() {
        let lock = Arc::new(FairRwLock::new(1));
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = lock.read();
        let writer = {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            thread::spawn(move || {
                let _w = lock.write();
                order.lock().unwrap().push("writer");
            })
        };
        wait_for(&lock, |s| s.waiting_writers == 1);

        let reader = {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            thread::spawn(move || {
                let _r = lock.read();
                order.lock().unwrap().push("reader");
            })
        };
        wait_for(&lock, |s| s.waiting_readers == 1);

        drop(first);
        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["writer", "reader"]);
    }

    #[test]
    fn test_writers_admitted_in_arrival_order() {
        let lock = Arc::new(FairRwLock::new(1));
        let order = Arc::new(Mutex::new(Vec::new()));
        let gate = lock.write();

        let mut handles = vec![];
        for id in 0..4 {
            let lock2 = Arc::clone(&lock);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                let _w = lock2.write();
                order.lock().unwrap().push(id);
            }));
            // Let this writer take its ticket before the next one starts.
            wait_for(&lock, |s| s.waiting_writers == id + 1);
        }

        drop(gate);
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_queued_readers_admitted_as_batch() {
        let lock = Arc::new(FairRwLock::new(1));
        let w = lock.write();
        let inside = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(AtomicBool::new(false));

        let mut handles = vec![];
        for _ in 0..3 {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            let release = Arc::clone(&release);
            handles.push(thread::spawn(move || {
                let _r = lock.read();
                inside.fetch_add(1, Ordering::SeqCst);
                while !release.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
            }));
        }
        wait_for(&lock, |s| s.waiting_readers == 3);

        drop(w);
        wait_for(&lock, |s| s.active_readers == 3);
        release.store(true, Ordering::SeqCst);
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(inside.load(Ordering::SeqCst), 3);
    }
}
