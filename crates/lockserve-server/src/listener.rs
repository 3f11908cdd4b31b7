//! TCP listener and the accept loop that ties the server together

use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;

use lockserve_core::{kerror, kinfo, ktrace, LockRegistry};

use crate::config::ServerConfig;
use crate::coordinator::Coordinator;
use crate::error::{ServerError, ServerResult};
use crate::pool::WorkerPool;

pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind `0.0.0.0:port`; port 0 picks an ephemeral port
    pub fn bind(port: u16) -> io::Result<Self> {
        let inner = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))?;
        Ok(Self { inner })
    }

    /// Block until a client connects
    pub fn accept(&self) -> io::Result<TcpStream> {
        self.inner.accept().map(|(stream, _)| stream)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

/// A bound server: listener, lock registry, coordinator and worker pool
pub struct Server {
    listener: Listener,
    coordinator: Arc<Coordinator>,
    pool: WorkerPool<TcpStream>,
}

impl Server {
    /// Validate `config`, bind the port and start the workers
    pub fn bind(config: ServerConfig) -> ServerResult<Self> {
        config.validate().map_err(ServerError::InvalidConfig)?;

        let listener = Listener::bind(config.port).map_err(|source| ServerError::Bind {
            port: config.port,
            source,
        })?;

        let registry = Arc::new(LockRegistry::with_fairness(config.fairness));
        let coordinator = Arc::new(Coordinator::new(config.root.clone(), registry));

        let c = Arc::clone(&coordinator);
        let pool = WorkerPool::start(&config, move |worker_id, stream: TcpStream| {
            c.handle_connection(stream, worker_id);
        })?;

        if let Ok(addr) = listener.local_addr() {
            kinfo!(
                "listening on {} ({} workers, queue {}, fairness {})",
                addr,
                pool.num_workers(),
                config.effective_queue_capacity(),
                config.fairness
            );
        }

        Ok(Self {
            listener,
            coordinator,
            pool,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Accept connections forever
    ///
    /// Accept failures are logged and the loop carries on. Each accepted
    /// socket is queued for a worker, blocking while all queue slots are
    /// taken.
    pub fn run(self) -> ! {
        loop {
            let stream = match self.listener.accept() {
                Ok(stream) => stream,
                Err(e) => {
                    kerror!("accept failed: {}", e);
                    continue;
                }
            };
            ktrace!("accepted connection from {:?}", stream.peer_addr().ok());

            // The pool is never closed while the server runs.
            if let Err(e) = self.pool.submit(stream) {
                kerror!("dropping connection: {}", e);
            }
        }
    }

    /// Stop the workers after they drain queued connections
    ///
    /// Only for servers that never entered `run`.
    pub fn shutdown(self) {
        self.pool.shutdown();
    }
}
