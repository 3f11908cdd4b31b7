//! Request coordinator
//!
//! Runs one connection end to end on the calling worker thread: parse the
//! head, pick the lock mode, do the file I/O, send exactly one response and
//! emit the audit record.
//!
//! # Lock scope
//!
//! - GET opens the target before touching the registry, so a request for a
//!   missing file never creates a lock. The read lock covers the stat and
//!   the whole transfer.
//! - PUT receives the body into a staging file with no lock held. The write
//!   lock covers only the existence check, the truncating open and the copy
//!   from the staging file.
//! - Anything else gets 501 and never reaches the registry.
//!
//! Locks are held through RAII guards and staging files unlink themselves
//! on drop, so every early return releases both.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lockserve_core::{kdebug, kerror, FairRwLock, LockRegistry};
use nix::errno::Errno;
use nix::unistd::{access, AccessFlags};

use crate::audit::AuditRecord;
use crate::http::{Connection, Method, Request, Status};
use crate::io::{is_errno, pass_n_bytes};
use crate::staging::StagedFile;

/// Permission bits for files created by PUT (before umask)
const CREATE_MODE: u32 = 0o666;

pub struct Coordinator {
    root: PathBuf,
    registry: Arc<LockRegistry>,
    stage_seq: AtomicU64,
}

impl Coordinator {
    pub fn new(root: impl Into<PathBuf>, registry: Arc<LockRegistry>) -> Self {
        Self {
            root: root.into(),
            registry,
            stage_seq: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<LockRegistry> {
        &self.registry
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serve one connection
    ///
    /// Returns the audit record, or `None` if the head could not be parsed
    /// (those get a 400/505 and a debug line, but no audit record).
    pub fn handle_connection<S: Read + Write>(&self, stream: S, worker_id: usize) -> Option<AuditRecord> {
        let mut conn = Connection::new(stream);

        let request = match conn.read_request() {
            Ok(request) => request,
            Err(e) => {
                kdebug!("worker {}: bad request: {}", worker_id, e);
                if let Err(e) = conn.send_status(e.status()) {
                    kdebug!("worker {}: error response not delivered: {}", worker_id, e);
                }
                return None;
            }
        };

        let status = match request.method() {
            Method::Get => self.handle_get(&mut conn, &request),
            Method::Put => self.handle_put(&mut conn, &request, worker_id),
            Method::Other(_) => Status::NotImplemented,
        };

        // GET success (and a GET that failed mid-transfer) already wrote
        // its response head.
        if !conn.responded() {
            if let Err(e) = conn.send_status(status) {
                kdebug!("worker {}: response not delivered: {}", worker_id, e);
            }
        }

        let record = AuditRecord::new(&request, status);
        record.emit();
        Some(record)
    }

    fn lock_for(&self, key: &str) -> Option<Arc<FairRwLock>> {
        match self.registry.get_or_create(key) {
            Ok(lock) => Some(lock),
            Err(e) => {
                kerror!("lock registry: /{}: {}", key, e);
                None
            }
        }
    }

    fn handle_get<S: Read + Write>(&self, conn: &mut Connection<S>, request: &Request) -> Status {
        let path = self.root.join(request.target());
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => return open_failure(&e, &path),
        };

        let Some(lock) = self.lock_for(request.target()) else {
            return Status::InternalServerError;
        };
        let _guard = lock.read();

        let meta = match file.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                kerror!("stat {}: {}", path.display(), e);
                return Status::InternalServerError;
            }
        };
        if meta.is_dir() {
            return Status::Forbidden;
        }

        match conn.send_file(&mut file, meta.len()) {
            Ok(()) => Status::Ok,
            Err(e) => {
                kdebug!("GET {}: transfer failed: {}", path.display(), e);
                Status::InternalServerError
            }
        }
    }

    fn handle_put<S: Read + Write>(
        &self,
        conn: &mut Connection<S>,
        request: &Request,
        worker_id: usize,
    ) -> Status {
        let Some(len) = request.content_length() else {
            return Status::BadRequest;
        };

        let seq = self.stage_seq.fetch_add(1, Ordering::Relaxed);
        let mut stage = match StagedFile::create(&self.root, worker_id, seq) {
            Ok(stage) => stage,
            Err(e) => {
                kerror!("worker {}: cannot create staging file: {}", worker_id, e);
                return Status::InternalServerError;
            }
        };
        if let Err(e) = conn.recv_body(stage.file_mut(), len).and_then(|()| stage.rewind()) {
            kdebug!("worker {}: staging /{} failed: {}", worker_id, request.target(), e);
            return Status::InternalServerError;
        }

        let Some(lock) = self.lock_for(request.target()) else {
            return Status::InternalServerError;
        };
        let _guard = lock.write();

        let path = self.root.join(request.target());
        let existed = access(path.as_path(), AccessFlags::F_OK).is_ok();

        let mut target = match OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(CREATE_MODE)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if is_errno(&e, Errno::EACCES) || is_errno(&e, Errno::EISDIR) => {
                return Status::Forbidden;
            }
            Err(e) => {
                kerror!("open {} for writing: {}", path.display(), e);
                return Status::InternalServerError;
            }
        };

        if let Err(e) = pass_n_bytes(stage.file_mut(), &mut target, len) {
            kerror!("PUT {}: install failed: {}", path.display(), e);
            return Status::InternalServerError;
        }

        if existed {
            Status::Ok
        } else {
            Status::Created
        }
    }
}

/// Status for a failed open of a GET target
fn open_failure(err: &io::Error, path: &Path) -> Status {
    if is_errno(err, Errno::EACCES) {
        Status::Forbidden
    } else if is_errno(err, Errno::ENOENT) || is_errno(err, Errno::ENOTDIR) {
        Status::NotFound
    } else {
        kerror!("open {}: {}", path.display(), err);
        Status::InternalServerError
    }
}
