//! Per-request audit records
//!
//! One line per request that reached the coordinator:
//!
//! ```text
//! METHOD,/RESOURCE,STATUS_CODE,REQUEST_ID
//! ```
//!
//! Lines go to stderr through `kprintln!`, which holds the stderr lock for
//! the whole line.

use std::fmt;

use lockserve_core::kprintln;

use crate::http::{Method, Request, Status};

/// Method name recorded for requests that are neither GET nor PUT
pub const UNSUPPORTED_METHOD: &str = "UNSUPPORTED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub method: String,
    pub resource: String,
    pub status: Status,
    pub request_id: String,
}

impl AuditRecord {
    pub fn new(request: &Request, status: Status) -> Self {
        let method = match request.method() {
            Method::Other(_) => UNSUPPORTED_METHOD,
            m => m.as_str(),
        };
        Self {
            method: method.to_string(),
            resource: request.target().to_string(),
            status,
            request_id: request.request_id().to_string(),
        }
    }

    /// Write this record to the audit stream
    pub fn emit(&self) {
        kprintln!("{}", self);
    }
}

impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},/{},{},{}",
            self.method,
            self.resource,
            self.status.code(),
            self.request_id
        )
    }
}
