use std::io;

use ptrap_debug::DebugError;
use ptrap_platform::ProcessError;
use ptrap_scan::ScanError;
use ptrap_wire::{Status, WireError};
use thiserror::Error;

/// Everything a request handler can fail with.
///
/// Each failure maps to exactly one wire [`Status`]; a few are fatal to
/// the connection.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Debug(#[from] DebugError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Declared payload exceeds the per-packet limit.
    #[error("payload of {0} bytes exceeds the packet limit")]
    PayloadTooLarge(u32),

    /// A scan value too large to buffer.
    #[error("scan value of {0} bytes is too large")]
    ValueTooLarge(u32),

    #[error("could not allocate {what}")]
    AllocationFailed { what: &'static str },

    #[error("session actor is gone")]
    SessionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ServerError {
    /// The status reported to the controller for this failure.
    pub fn status(&self) -> Status {
        match self {
            Self::Wire(WireError::Truncated { .. } | WireError::InvalidField { .. }) => {
                Status::DataNull
            }
            Self::Wire(_) => Status::Error,
            Self::Debug(e) => match e {
                DebugError::MalformedRequest(_) => Status::DataNull,
                DebugError::AlreadyDebugging(_) => Status::AlreadyDebugging,
                DebugError::InvalidIndex { .. } => Status::InvalidIndex,
                DebugError::NotAttached
                | DebugError::OperationFailed(_)
                | DebugError::BroadcastFailed { .. }
                | DebugError::Notification(_) => Status::Error,
            },
            Self::Scan(ScanError::MemoryMap(_)) => Status::Error,
            Self::Scan(_) => Status::DataNull,
            Self::Process(_) => Status::Error,
            Self::PayloadTooLarge(_) => Status::TooMuchData,
            Self::ValueTooLarge(_) | Self::AllocationFailed { .. } => Status::DataNull,
            Self::SessionClosed | Self::Io(_) => Status::Error,
        }
    }

    /// Whether the connection must be closed after this failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Wire(WireError::Io(_) | WireError::BadMagic(_))
                | Self::Io(_)
                | Self::PayloadTooLarge(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_statuses() {
        let cases = [
            (ServerError::from(DebugError::NotAttached), Status::Error),
            (
                ServerError::from(DebugError::MalformedRequest("x".into())),
                Status::DataNull,
            ),
            (
                ServerError::from(DebugError::AlreadyDebugging(7)),
                Status::AlreadyDebugging,
            ),
            (
                ServerError::from(DebugError::InvalidIndex { index: 30, max: 30 }),
                Status::InvalidIndex,
            ),
            (
                ServerError::from(DebugError::BroadcastFailed {
                    failed: vec![2],
                    applied: vec![1],
                }),
                Status::Error,
            ),
            (
                ServerError::from(DebugError::OperationFailed(ProcessError::NoSuchThread(4))),
                Status::Error,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[test]
    fn scan_validation_is_data_null() {
        assert_eq!(
            ServerError::from(ScanError::InvalidValueType(12)).status(),
            Status::DataNull
        );
        assert_eq!(
            ServerError::from(ScanError::AllocationFailed { what: "matches" }).status(),
            Status::DataNull
        );
        assert_eq!(
            ServerError::from(ScanError::MemoryMap(ProcessError::NotTraced(1))).status(),
            Status::Error
        );
    }

    #[test]
    fn short_payloads_are_data_null() {
        let err = ServerError::from(WireError::Truncated {
            what: "attach request",
            expected: 4,
            actual: 2,
        });
        assert_eq!(err.status(), Status::DataNull);
        assert!(!err.is_fatal());
    }

    #[test]
    fn oversized_payload_is_fatal() {
        let err = ServerError::PayloadTooLarge(70_000);
        assert_eq!(err.status(), Status::TooMuchData);
        assert!(err.is_fatal());
        assert!(err.to_string().contains("70000"));
    }

    #[test]
    fn socket_failures_are_fatal() {
        let io = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert!(ServerError::from(WireError::from(io)).is_fatal());
        assert!(ServerError::from(WireError::BadMagic(0)).is_fatal());
        assert!(!ServerError::from(WireError::UnknownCommand(1)).is_fatal());
        assert!(!ServerError::SessionClosed.is_fatal());
    }
}
