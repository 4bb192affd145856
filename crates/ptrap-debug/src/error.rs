//! Debug session error types.

use ptrap_platform::ProcessError;
use thiserror::Error;

/// Errors from debug session operations.
#[derive(Debug, Error)]
pub enum DebugError {
    /// The operation needs an attached process.
    #[error("no process attached")]
    NotAttached,

    /// A session is already active.
    #[error("already debugging process {0}")]
    AlreadyDebugging(u32),

    /// A breakpoint or watchpoint slot is out of range.
    #[error("slot index {index} out of range (max {max})")]
    InvalidIndex {
        /// The requested slot.
        index: u32,
        /// Number of available slots.
        max: usize,
    },

    /// The request payload is missing or malformed.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A process-control call failed.
    #[error("operation failed: {0}")]
    OperationFailed(#[from] ProcessError),

    /// A debug-register update reached only some threads.
    #[error("debug register update failed on threads {failed:?} (applied to {applied:?})")]
    BroadcastFailed {
        /// Threads whose update failed.
        failed: Vec<u32>,
        /// Threads left modified.
        applied: Vec<u32>,
    },

    /// The notification channel could not be opened or written.
    #[error("notification channel error: {0}")]
    Notification(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_not_attached_display() {
        assert_eq!(DebugError::NotAttached.to_string(), "no process attached");
    }

    #[test]
    fn error_already_debugging_display() {
        assert_eq!(
            DebugError::AlreadyDebugging(100).to_string(),
            "already debugging process 100"
        );
    }

    #[test]
    fn error_invalid_index_display() {
        let err = DebugError::InvalidIndex { index: 30, max: 30 };
        assert_eq!(err.to_string(), "slot index 30 out of range (max 30)");
    }

    #[test]
    fn error_malformed_request_display() {
        let err = DebugError::MalformedRequest("bad length".into());
        assert_eq!(err.to_string(), "malformed request: bad length");
    }

    #[test]
    fn error_operation_failed_from_process_error() {
        let err: DebugError = ProcessError::NoSuchThread(5).into();
        assert!(matches!(err, DebugError::OperationFailed(_)));
        assert_eq!(err.to_string(), "operation failed: no such thread: 5");
    }

    #[test]
    fn error_broadcast_failed_lists_threads() {
        let err = DebugError::BroadcastFailed {
            failed: vec![102],
            applied: vec![100, 101],
        };
        let msg = err.to_string();
        assert!(msg.contains("[102]"));
        assert!(msg.contains("[100, 101]"));
    }

    #[test]
    fn error_notification_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = DebugError::Notification(io_err);
        assert!(err.to_string().contains("notification channel error"));
        assert!(err.to_string().contains("refused"));
    }
}
