//! Server configuration
//!
//! Compile-time defaults. The CLI sets the port and worker count on top
//! of `new()`; nothing here is read from the environment.
//!
//! ```rust,ignore
//! use lockserve_server::ServerConfig;
//!
//! let config = ServerConfig::new()
//!     .port(8080)
//!     .num_workers(8);
//! config.validate()?;
//! ```

use std::path::PathBuf;

/// Library defaults
pub mod defaults {
    /// Worker threads when `-t` is not given
    pub const NUM_WORKERS: usize = 4;

    /// Reader admissions a waiting writer may be bypassed by
    pub const FAIRNESS: usize = lockserve_core::DEFAULT_FAIRNESS;

    /// Directory served when none is configured
    pub const ROOT: &str = ".";

    /// Upper bound on worker threads accepted by `validate()`
    pub const MAX_WORKERS: usize = 1024;
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port; 0 asks the OS for an ephemeral port
    pub port: u16,
    /// Number of worker threads
    pub num_workers: usize,
    /// Connections that may wait for a worker; `None` means `num_workers`
    pub queue_capacity: Option<usize>,
    /// Fairness bound for every per-resource lock
    pub fairness: usize,
    /// Directory that request targets resolve against
    pub root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    /// Library defaults
    pub fn new() -> Self {
        Self {
            port: 0,
            num_workers: defaults::NUM_WORKERS,
            queue_capacity: None,
            fairness: defaults::FAIRNESS,
            root: PathBuf::from(defaults::ROOT),
        }
    }

    // Builder methods

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn queue_capacity(mut self, cap: usize) -> Self {
        self.queue_capacity = Some(cap);
        self
    }

    pub fn fairness(mut self, n: usize) -> Self {
        self.fairness = n;
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Queue capacity actually used by the pool
    #[inline]
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.num_workers)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.num_workers == 0 {
            return Err("num_workers must be > 0");
        }
        if self.num_workers > defaults::MAX_WORKERS {
            return Err("num_workers must be <= 1024");
        }
        if self.effective_queue_capacity() == 0 {
            return Err("queue_capacity must be > 0");
        }
        if self.fairness == 0 {
            return Err("fairness must be > 0");
        }
        if !self.root.is_dir() {
            return Err("root must be an existing directory");
        }
        Ok(())
    }
}
