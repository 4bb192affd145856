//! The process-control seam.
//!
//! [`ProcessControl`] is everything the debug session and the scan
//! engine need from the operating system. Backends implement it over
//! ptrace ([`crate::PtraceProcess`]) or over plain data structures
//! ([`crate::InMemoryProcess`]).

use ptrap_wire::{DebugRegisters, FpRegisters, GeneralRegisters};

use crate::error::ProcessError;
use crate::memory::MemoryRegion;

/// Signal number of SIGKILL.
pub const SIGKILL: i32 = 9;
/// Signal number of SIGTRAP.
pub const SIGTRAP: i32 = 5;
/// Signal number of SIGSTOP.
pub const SIGSTOP: i32 = 19;

/// Signal delivered when a process is continued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeSignal {
    Stop,
    Kill,
}

impl ResumeSignal {
    pub fn number(self) -> i32 {
        match self {
            Self::Stop => SIGSTOP,
            Self::Kill => SIGKILL,
        }
    }
}

/// Why a traced thread reported a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stopped by a signal and still alive.
    Stopped(i32),
    /// Terminated by a signal.
    Killed(i32),
    /// Exited normally with the given code.
    Exited(i32),
}

/// A state change reported by [`ProcessControl::wait_stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopEvent {
    pub lwpid: u32,
    pub reason: StopReason,
}

impl StopEvent {
    pub fn stopped(lwpid: u32, signal: i32) -> Self {
        Self {
            lwpid,
            reason: StopReason::Stopped(signal),
        }
    }

    pub fn killed(lwpid: u32, signal: i32) -> Self {
        Self {
            lwpid,
            reason: StopReason::Killed(signal),
        }
    }

    pub fn exited(lwpid: u32, code: i32) -> Self {
        Self {
            lwpid,
            reason: StopReason::Exited(code),
        }
    }

    /// The event encoded as a classic wait(2) status word.
    pub fn wait_status(&self) -> u32 {
        match self.reason {
            StopReason::Stopped(sig) => (((sig & 0xFF) as u32) << 8) | 0x7F,
            StopReason::Killed(sig) => (sig & 0x7F) as u32,
            StopReason::Exited(code) => ((code & 0xFF) as u32) << 8,
        }
    }

    /// Whether the process is gone or about to be.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.reason,
            StopReason::Killed(_) | StopReason::Exited(_) | StopReason::Stopped(SIGKILL)
        )
    }
}

/// Scheduling details of one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadDetails {
    pub lwpid: u32,
    pub priority: u32,
    pub name: String,
}

/// One entry of the system process list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub pid: u32,
    pub name: String,
}

/// Identity of one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDetails {
    pub pid: u32,
    pub name: String,
    /// Executable path, empty when it cannot be resolved.
    pub path: String,
}

/// Low-level control over a traced process.
///
/// All calls block until the operating system answers. Identifiers are
/// raw process ids (`pid`) or thread ids (`lwpid`).
pub trait ProcessControl: Send {
    /// Stop and trace every thread of `pid`.
    fn attach(&mut self, pid: u32) -> Result<(), ProcessError>;

    /// Release every traced thread of `pid`, leaving it running.
    fn detach(&mut self, pid: u32) -> Result<(), ProcessError>;

    /// Stop one thread.
    fn suspend(&mut self, lwpid: u32) -> Result<(), ProcessError>;

    /// Resume one thread.
    fn resume(&mut self, lwpid: u32) -> Result<(), ProcessError>;

    /// Resume the whole process, optionally delivering a signal.
    fn continue_process(
        &mut self,
        pid: u32,
        signal: Option<ResumeSignal>,
    ) -> Result<(), ProcessError>;

    /// Execute one instruction of the process.
    fn step(&mut self, pid: u32) -> Result<(), ProcessError>;

    fn get_registers(&self, lwpid: u32) -> Result<GeneralRegisters, ProcessError>;
    fn set_registers(&mut self, lwpid: u32, regs: &GeneralRegisters) -> Result<(), ProcessError>;

    fn get_fp_registers(&self, lwpid: u32) -> Result<FpRegisters, ProcessError>;
    fn set_fp_registers(&mut self, lwpid: u32, regs: &FpRegisters) -> Result<(), ProcessError>;

    fn get_debug_registers(&self, lwpid: u32) -> Result<DebugRegisters, ProcessError>;
    fn set_debug_registers(
        &mut self,
        lwpid: u32,
        regs: &DebugRegisters,
    ) -> Result<(), ProcessError>;

    /// Fill `buf` from `pid`'s memory at `address`.
    fn read_memory(&self, pid: u32, address: u64, buf: &mut [u8]) -> Result<(), ProcessError>;

    /// Write `data` into `pid`'s memory at `address`.
    fn write_memory(&mut self, pid: u32, address: u64, data: &[u8]) -> Result<(), ProcessError>;

    /// Thread ids of `pid`, in ascending order.
    fn list_threads(&self, pid: u32) -> Result<Vec<u32>, ProcessError>;

    /// Mapped regions of `pid`, in ascending address order.
    fn memory_map(&self, pid: u32) -> Result<Vec<MemoryRegion>, ProcessError>;

    fn thread_info(&self, pid: u32, lwpid: u32) -> Result<ThreadDetails, ProcessError>;

    /// Every process visible to the server, in ascending pid order.
    fn list_processes(&self) -> Result<Vec<ProcessSummary>, ProcessError>;

    fn process_info(&self, pid: u32) -> Result<ProcessDetails, ProcessError>;

    /// Poll for a pending state change without blocking.
    fn wait_stop(&mut self, pid: u32) -> Result<Option<StopEvent>, ProcessError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_status_encodes_signal() {
        let ev = StopEvent::stopped(1, SIGTRAP);
        assert_eq!(ev.wait_status(), 0x57F);
        assert!(!ev.is_terminal());
    }

    #[test]
    fn exit_and_kill_are_terminal() {
        assert!(StopEvent::exited(1, 0).is_terminal());
        assert!(StopEvent::killed(1, SIGKILL).is_terminal());
        assert!(StopEvent::stopped(1, SIGKILL).is_terminal());
        assert_eq!(StopEvent::exited(1, 3).wait_status(), 0x300);
        assert_eq!(StopEvent::killed(1, SIGKILL).wait_status(), 9);
    }

    #[test]
    fn resume_signal_numbers() {
        assert_eq!(ResumeSignal::Stop.number(), SIGSTOP);
        assert_eq!(ResumeSignal::Kill.number(), SIGKILL);
    }
}
