//! ptrap-wire: binary wire formats for the ptrap control protocol.
//!
//! Everything that crosses a socket lives here: the packet header,
//! status and command codes, per-command request payloads, the
//! fixed-layout register records, the DR7 control-register helpers,
//! the trap-notification record, and the chunked async transport.
//! All integers are little-endian and all records have fixed sizes.

pub mod codec;
pub mod command;
pub mod dbreg;
pub mod error;
pub mod event;
pub mod regs;
pub mod request;
pub mod response;
pub mod status;
pub mod text;
pub mod transport;

// Re-export key types for convenience.
pub use command::{Command, PacketHeader, PACKET_HEADER_SIZE, PACKET_MAGIC};
pub use dbreg::{DebugRegisters, Dr7, WatchAccess, WatchLength};
pub use error::WireError;
pub use event::InterruptPacket;
pub use regs::{FpRegisters, GeneralRegisters};
pub use request::*;
pub use response::{MapEntry, ProcInfoResponse, ProcListEntry, ThreadInfoResponse};
pub use status::Status;

/// Maximum number of software breakpoint slots per session.
pub const MAX_BREAKPOINTS: usize = 30;

/// Number of hardware watchpoint slots (DR0–DR3).
pub const MAX_WATCHPOINTS: usize = 4;

/// Largest chunk written to or read from a socket in one call.
pub const NET_MAX_LENGTH: usize = 8192;

/// Terminates the address stream of a scan response.
pub const SCAN_END_MARKER: u64 = u64::MAX;
