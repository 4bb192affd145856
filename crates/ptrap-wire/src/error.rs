//! Wire error types.

use thiserror::Error;

/// Errors from decoding or transferring protocol data.
#[derive(Debug, Error)]
pub enum WireError {
    /// A payload was shorter than its fixed layout.
    #[error("truncated {what}: expected {expected} bytes, got {actual}")]
    Truncated {
        /// The record or request being decoded.
        what: &'static str,
        /// Bytes required by the layout.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// A packet header carried the wrong magic value.
    #[error("bad packet magic: {0:#010x}")]
    BadMagic(u32),

    /// A packet header named a command this server does not know.
    #[error("unknown command: {0:#010x}")]
    UnknownCommand(u32),

    /// A field held a value outside its allowed set.
    #[error("invalid {field}: {value}")]
    InvalidField {
        /// The field name.
        field: &'static str,
        /// The rejected raw value.
        value: u64,
    },

    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
