//! Worker thread pool
//!
//! A fixed set of named OS threads draining one bounded queue. Each worker
//! pops an item, runs the handler on it and drops it (for connections,
//! dropping closes the socket). Workers exit once the queue is closed and
//! empty.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use lockserve_core::{kdebug, kerror, BoundedQueue, QueueError};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

pub struct WorkerPool<T> {
    queue: Arc<BoundedQueue<T>>,
    handles: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn `config.num_workers` workers, each calling `handler(worker_id, item)`
    pub fn start<F>(config: &ServerConfig, handler: F) -> ServerResult<Self>
    where
        F: Fn(usize, T) + Send + Sync + 'static,
    {
        let num_workers = config.num_workers.max(1);
        let queue = Arc::new(BoundedQueue::new(config.effective_queue_capacity()));
        let handler = Arc::new(handler);

        let mut pool = Self {
            queue,
            handles: Vec::with_capacity(num_workers),
        };

        for i in 0..num_workers {
            let queue = Arc::clone(&pool.queue);
            let handler = Arc::clone(&handler);

            let spawned = thread::Builder::new()
                .name(format!("lockserve-worker-{}", i))
                .spawn(move || worker_loop(i, &queue, &*handler));

            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    pool.stop();
                    return Err(ServerError::Spawn(e));
                }
            }
        }

        kdebug!("worker pool started: {} workers", num_workers);
        Ok(pool)
    }

    /// Hand an item to the workers, blocking while the queue is full
    pub fn submit(&self, item: T) -> Result<(), QueueError<T>> {
        self.queue.push(item)
    }

    pub fn queue(&self) -> &Arc<BoundedQueue<T>> {
        &self.queue
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }

    /// Close the queue, let the workers drain it and wait for them
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.queue.close();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                kerror!("worker thread exited by panic");
            }
        }
    }
}

fn worker_loop<T, F>(worker_id: usize, queue: &BoundedQueue<T>, handler: &F)
where
    F: Fn(usize, T),
{
    while let Some(item) = queue.pop() {
        // A panic is confined to the request that caused it.
        if panic::catch_unwind(AssertUnwindSafe(|| handler(worker_id, item))).is_err() {
            kerror!("worker {}: request handler panicked", worker_id);
        }
    }
    kdebug!("worker {}: queue closed, exiting", worker_id);
}
