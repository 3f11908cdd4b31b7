//! Server setup errors
//!
//! Request-level failures never surface here: the coordinator turns them
//! into a response status on the spot.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum ServerError {
    /// Configuration failed validation
    InvalidConfig(&'static str),

    /// Could not bind or listen on the port
    Bind { port: u16, source: io::Error },

    /// Could not spawn a worker thread
    Spawn(io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::InvalidConfig(why) => write!(f, "invalid configuration: {}", why),
            ServerError::Bind { port, source } => write!(f, "cannot listen on port {}: {}", port, source),
            ServerError::Spawn(e) => write!(f, "failed to spawn worker thread: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::InvalidConfig(_) => None,
            ServerError::Bind { source, .. } => Some(source),
            ServerError::Spawn(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_and_source() {
        let e = ServerError::Bind {
            port: 80,
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(e.to_string(), "cannot listen on port 80: denied");
        assert!(e.source().is_some());
        assert!(ServerError::InvalidConfig("x").source().is_none());
    }
}
