//! Backend for targets without ptrace support.

use ptrap_wire::{DebugRegisters, FpRegisters, GeneralRegisters};

use crate::control::{
    ProcessControl, ProcessDetails, ProcessSummary, ResumeSignal, StopEvent, ThreadDetails,
};
use crate::error::ProcessError;
use crate::memory::MemoryRegion;

/// Rejects every operation with [`ProcessError::Unsupported`].
#[derive(Debug, Default)]
pub struct UnsupportedProcess;

fn unsupported<T>(op: &str) -> Result<T, ProcessError> {
    Err(ProcessError::Unsupported {
        os: std::env::consts::OS.into(),
        detail: format!("{op} requires the Linux x86-64 ptrace backend"),
    })
}

impl ProcessControl for UnsupportedProcess {
    fn attach(&mut self, _pid: u32) -> Result<(), ProcessError> {
        unsupported("attach")
    }
    fn detach(&mut self, _pid: u32) -> Result<(), ProcessError> {
        unsupported("detach")
    }
    fn suspend(&mut self, _lwpid: u32) -> Result<(), ProcessError> {
        unsupported("suspend")
    }
    fn resume(&mut self, _lwpid: u32) -> Result<(), ProcessError> {
        unsupported("resume")
    }
    fn continue_process(&mut self, _pid: u32, _signal: Option<ResumeSignal>) -> Result<(), ProcessError> {
        unsupported("continue")
    }
    fn step(&mut self, _pid: u32) -> Result<(), ProcessError> {
        unsupported("step")
    }
    fn get_registers(&self, _lwpid: u32) -> Result<GeneralRegisters, ProcessError> {
        unsupported("get_registers")
    }
    fn set_registers(&mut self, _lwpid: u32, _regs: &GeneralRegisters) -> Result<(), ProcessError> {
        unsupported("set_registers")
    }
    fn get_fp_registers(&self, _lwpid: u32) -> Result<FpRegisters, ProcessError> {
        unsupported("get_fp_registers")
    }
    fn set_fp_registers(&mut self, _lwpid: u32, _regs: &FpRegisters) -> Result<(), ProcessError> {
        unsupported("set_fp_registers")
    }
    fn get_debug_registers(&self, _lwpid: u32) -> Result<DebugRegisters, ProcessError> {
        unsupported("get_debug_registers")
    }
    fn set_debug_registers(&mut self, _lwpid: u32, _regs: &DebugRegisters) -> Result<(), ProcessError> {
        unsupported("set_debug_registers")
    }
    fn read_memory(&self, _pid: u32, _address: u64, _buf: &mut [u8]) -> Result<(), ProcessError> {
        unsupported("read_memory")
    }
    fn write_memory(&mut self, _pid: u32, _address: u64, _data: &[u8]) -> Result<(), ProcessError> {
        unsupported("write_memory")
    }
    fn list_threads(&self, _pid: u32) -> Result<Vec<u32>, ProcessError> {
        unsupported("list_threads")
    }
    fn memory_map(&self, _pid: u32) -> Result<Vec<MemoryRegion>, ProcessError> {
        unsupported("memory_map")
    }
    fn thread_info(&self, _pid: u32, _lwpid: u32) -> Result<ThreadDetails, ProcessError> {
        unsupported("thread_info")
    }
    fn list_processes(&self) -> Result<Vec<ProcessSummary>, ProcessError> {
        unsupported("list_processes")
    }
    fn process_info(&self, _pid: u32) -> Result<ProcessDetails, ProcessError> {
        unsupported("process_info")
    }
    fn wait_stop(&mut self, _pid: u32) -> Result<Option<StopEvent>, ProcessError> {
        Ok(None)
    }
}
