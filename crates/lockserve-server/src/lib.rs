//! # lockserve-server
//!
//! Multithreaded GET/PUT file server. A listener queues accepted sockets,
//! a fixed pool of workers pops them, and the coordinator serves each
//! request under the per-resource fair lock from `lockserve-core`.
//!
//! ## Modules
//!
//! - `http` - Request head parsing, status responses, connection I/O
//! - `coordinator` - Lock scope, staged writes, status mapping
//! - `pool` - Worker threads over a bounded queue
//! - `listener` - TCP listener and the accept loop
//! - `staging` - Private staging files for PUT bodies
//! - `audit` - Per-request audit records
//! - `config` - Server configuration
//! - `io` - Byte-copy helpers
//! - `error` - Error types

pub mod audit;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod io;
pub mod listener;
pub mod pool;
pub mod staging;

pub use audit::AuditRecord;
pub use config::ServerConfig;
pub use coordinator::Coordinator;
pub use error::{ServerError, ServerResult};
pub use http::Status;
pub use listener::{Listener, Server};
pub use pool::WorkerPool;
