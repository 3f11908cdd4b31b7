//! # lockserve-core
//!
//! Concurrency primitives for the lockserve file server. Nothing in this
//! crate knows about sockets or HTTP; the server crate builds on it.
//!
//! ## Modules
//!
//! - `fair_rwlock` - Fair N-way reader-writer lock
//! - `registry` - Lazy per-resource lock registry (fixed buckets + chaining)
//! - `queue` - Bounded blocking FIFO queue feeding the worker pool
//! - `error` - Error types
//! - `kprint` - Kernel-style logging macros
//! - `env` - Environment variable utilities

pub mod fair_rwlock;
pub mod registry;
pub mod queue;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use fair_rwlock::{FairReadGuard, FairRwLock, FairWriteGuard, LockStats, DEFAULT_FAIRNESS};
pub use registry::{bucket_index, LockRegistry, MAX_KEY_LEN, TABLE_SIZE};
pub use queue::BoundedQueue;
pub use error::{QueueError, RegistryError, RegistryResult};
pub use env::{env_get, env_get_bool, env_get_opt};
