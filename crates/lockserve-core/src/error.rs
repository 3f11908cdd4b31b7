//! Error types for the lock registry and the bounded queue

use core::fmt;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned by `LockRegistry::get_or_create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Resource key is longer than `MAX_KEY_LEN` bytes
    KeyTooLong { len: usize, max: usize },

    /// Growing a bucket to hold a new entry failed
    AllocationFailed,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::KeyTooLong { len, max } => {
                write!(f, "resource key of {} bytes exceeds limit of {}", len, max)
            }
            RegistryError::AllocationFailed => write!(f, "lock entry allocation failed"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Error returned when pushing onto a queue
///
/// Carries the rejected item back to the caller.
#[derive(Clone, PartialEq, Eq)]
pub enum QueueError<T> {
    /// Queue is at capacity (only from `try_push`)
    Full(T),

    /// Queue was closed
    Closed(T),
}

impl<T> QueueError<T> {
    /// Recover the item that could not be queued
    pub fn into_inner(self) -> T {
        match self {
            QueueError::Full(v) | QueueError::Closed(v) => v,
        }
    }
}

// Does not require `T: Debug`.
impl<T> fmt::Debug for QueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full(_) => write!(f, "Full(..)"),
            QueueError::Closed(_) => write!(f, "Closed(..)"),
        }
    }
}

impl<T> fmt::Display for QueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full(_) => write!(f, "queue full"),
            QueueError::Closed(_) => write!(f, "queue closed"),
        }
    }
}

impl<T> std::error::Error for QueueError<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = RegistryError::KeyTooLong { len: 300, max: 255 };
        assert_eq!(e.to_string(), "resource key of 300 bytes exceeds limit of 255");
        assert_eq!(RegistryError::AllocationFailed.to_string(), "lock entry allocation failed");
    }

    #[test]
    fn test_queue_error_returns_item() {
        let e = QueueError::Closed(7);
        assert_eq!(e.to_string(), "queue closed");
        assert_eq!(e.into_inner(), 7);
        assert_eq!(QueueError::Full("conn").into_inner(), "conn");
    }
}
