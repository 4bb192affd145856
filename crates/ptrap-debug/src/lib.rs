//! ptrap-debug: the debug session manager.
//!
//! Owns the single attached process: breakpoint and watchpoint slots,
//! register transfer, thread control and the notification channel that
//! carries trap events back to the controller.

pub mod breakpoint;
pub mod error;
pub mod notify;
pub mod session;

pub use breakpoint::{Breakpoint, BreakpointTable, TRAP_OPCODE};
pub use error::DebugError;
pub use notify::NotificationChannel;
pub use session::{DebugSession, InterruptOutcome, RegisterKind, SessionOptions};

/// Controller port the notification channel connects back to.
pub const DEFAULT_NOTIFY_PORT: u16 = 755;
