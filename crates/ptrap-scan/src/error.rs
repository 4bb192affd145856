use ptrap_platform::ProcessError;
use thiserror::Error;

/// Errors raised while preparing or running a memory scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("unknown scan value type: {0}")]
    InvalidValueType(u8),

    #[error("unknown scan compare type: {0}")]
    InvalidCompareOp(u8),

    #[error("scan value is empty")]
    EmptyValue,

    #[error("scan value length {actual} does not fit a {expected}-byte value")]
    ValueLength { expected: usize, actual: usize },

    #[error("could not allocate {what}")]
    AllocationFailed { what: &'static str },

    #[error("memory map unavailable: {0}")]
    MemoryMap(#[from] ProcessError),
}
