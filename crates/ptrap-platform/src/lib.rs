//! ptrap-platform: process-control backends.
//!
//! Provides the [`ProcessControl`] trait the debug session and scan
//! engine are written against, the memory-region model, a
//! `/proc/<pid>/maps` parser, a ptrace backend for Linux x86-64 and an
//! in-memory backend for tests.

pub mod control;
pub mod error;
pub mod in_memory;
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
pub mod linux;
pub mod maps;
pub mod memory;
pub mod unsupported;

pub use control::{
    ProcessControl, ProcessDetails, ProcessSummary, ResumeSignal, StopEvent, StopReason,
    ThreadDetails,
};
pub use error::ProcessError;
pub use in_memory::InMemoryProcess;
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
pub use linux::PtraceProcess;
pub use memory::{MemoryRegion, Protection};
pub use unsupported::UnsupportedProcess;

/// The process-control backend for the host platform.
pub fn native() -> Box<dyn ProcessControl> {
    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    {
        Box::new(PtraceProcess::new())
    }
    #[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
    {
        Box::new(UnsupportedProcess)
    }
}
