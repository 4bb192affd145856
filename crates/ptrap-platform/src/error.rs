use thiserror::Error;

/// Errors raised by process-control backends.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{op} failed for {id}: {reason}")]
    Failed {
        op: &'static str,
        id: u32,
        reason: String,
    },

    #[error("process {0} is not traced")]
    NotTraced(u32),

    #[error("no such thread: {0}")]
    NoSuchThread(u32),

    #[error("address {0:#x} is not mapped")]
    BadAddress(u64),

    #[error("invalid {what} pattern: {detail}")]
    InvalidPattern { what: &'static str, detail: String },

    #[error("process state lock poisoned: {0}")]
    Poisoned(String),

    #[error("unsupported operation on {os}: {detail}")]
    Unsupported { os: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    pub(crate) fn failed(op: &'static str, id: u32, reason: impl ToString) -> Self {
        Self::Failed {
            op,
            id,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_display_names_operation_and_id() {
        let err = ProcessError::failed("attach", 100, "permission denied");
        assert_eq!(err.to_string(), "attach failed for 100: permission denied");
    }

    #[test]
    fn not_traced_display() {
        assert_eq!(
            ProcessError::NotTraced(7).to_string(),
            "process 7 is not traced"
        );
    }

    #[test]
    fn no_such_thread_display() {
        assert_eq!(ProcessError::NoSuchThread(9).to_string(), "no such thread: 9");
    }

    #[test]
    fn bad_address_display_is_hex() {
        assert_eq!(
            ProcessError::BadAddress(0x400000).to_string(),
            "address 0x400000 is not mapped"
        );
    }

    #[test]
    fn unsupported_display_contains_os_and_detail() {
        let err = ProcessError::Unsupported {
            os: "windows".into(),
            detail: "ptrace".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("windows"));
        assert!(msg.contains("ptrace"));
    }

    #[test]
    fn invalid_pattern_display() {
        let err = ProcessError::InvalidPattern {
            what: "maps line",
            detail: "unclosed group".into(),
        };
        assert_eq!(err.to_string(), "invalid maps line pattern: unclosed group");
    }

    #[test]
    fn io_error_converts() {
        let err: ProcessError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, ProcessError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}
