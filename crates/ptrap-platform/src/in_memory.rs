//! In-memory process for tests and dry runs.
//!
//! Clones share one state, so a test can hand a clone to the code under
//! test and keep another to seed memory, inject failures and inspect
//! what happened.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ptrap_wire::{DebugRegisters, FpRegisters, GeneralRegisters};

use crate::control::{
    ProcessControl, ProcessDetails, ProcessSummary, ResumeSignal, StopEvent, ThreadDetails,
};
use crate::error::ProcessError;
use crate::memory::{MemoryRegion, Protection};

#[derive(Debug, Clone, Default)]
struct ThreadState {
    name: String,
    priority: u32,
    regs: GeneralRegisters,
    fp_regs: FpRegisters,
    debug_regs: DebugRegisters,
    suspended: bool,
}

#[derive(Debug)]
struct Mapping {
    region: MemoryRegion,
    /// `None` for regions that are listed but cannot be read.
    data: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct State {
    pid: u32,
    name: String,
    path: String,
    /// Other processes shown in the process list.
    neighbours: BTreeMap<u32, ProcessDetails>,
    threads: BTreeMap<u32, ThreadState>,
    mappings: Vec<Mapping>,
    attached: bool,
    running: bool,
    last_signal: Option<ResumeSignal>,
    steps: usize,
    stops: VecDeque<StopEvent>,
    failures: Vec<(&'static str, Option<u32>)>,
    calls: Vec<String>,
}

impl State {
    /// Log the call and apply any injected failure.
    fn enter(&mut self, op: &'static str, id: u32) -> Result<(), ProcessError> {
        self.calls.push(format!("{op} {id}"));
        let injected = self
            .failures
            .iter()
            .any(|&(f_op, f_id)| f_op == op && f_id.map_or(true, |f| f == id));
        if injected {
            return Err(ProcessError::failed(op, id, "injected failure"));
        }
        Ok(())
    }

    fn check_pid(&self, op: &'static str, pid: u32) -> Result<(), ProcessError> {
        if pid != self.pid {
            return Err(ProcessError::failed(op, pid, "no such process"));
        }
        Ok(())
    }

    fn thread(&self, lwpid: u32) -> Result<&ThreadState, ProcessError> {
        self.threads
            .get(&lwpid)
            .ok_or(ProcessError::NoSuchThread(lwpid))
    }

    fn thread_mut(&mut self, lwpid: u32) -> Result<&mut ThreadState, ProcessError> {
        self.threads
            .get_mut(&lwpid)
            .ok_or(ProcessError::NoSuchThread(lwpid))
    }

    /// Locate the backing bytes for `[address, address + len)`.
    fn backing(&self, address: u64, len: usize) -> Result<(usize, usize), ProcessError> {
        let end = address
            .checked_add(len as u64)
            .ok_or(ProcessError::BadAddress(address))?;
        let index = self
            .mappings
            .iter()
            .position(|m| m.region.contains(address) && end <= m.region.end)
            .ok_or(ProcessError::BadAddress(address))?;
        let mapping = &self.mappings[index];
        if mapping.data.is_none() {
            return Err(ProcessError::BadAddress(address));
        }
        Ok((index, (address - mapping.region.start) as usize))
    }
}

/// A fake process whose memory, threads and registers live in plain
/// data structures.
#[derive(Debug, Clone)]
pub struct InMemoryProcess {
    state: Arc<Mutex<State>>,
}

impl InMemoryProcess {
    /// Create process `pid` with a single thread `pid` named "main".
    pub fn new(pid: u32) -> Self {
        let process = Self {
            state: Arc::new(Mutex::new(State {
                pid,
                name: "main".into(),
                ..State::default()
            })),
        };
        process.add_thread(pid, "main");
        process
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, ProcessError> {
        self.state
            .lock()
            .map_err(|e| ProcessError::Poisoned(e.to_string()))
    }

    fn inspect(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pid(&self) -> u32 {
        self.inspect().pid
    }

    /// Set the name and executable path of the process itself.
    pub fn set_identity(&self, name: &str, path: &str) {
        let mut state = self.inspect();
        state.name = name.to_string();
        state.path = path.to_string();
    }

    /// Add an unrelated process to the process list.
    pub fn add_process(&self, pid: u32, name: &str, path: &str) {
        self.inspect().neighbours.insert(
            pid,
            ProcessDetails {
                pid,
                name: name.to_string(),
                path: path.to_string(),
            },
        );
    }

    pub fn add_thread(&self, lwpid: u32, name: &str) {
        self.inspect().threads.insert(
            lwpid,
            ThreadState {
                name: name.to_string(),
                priority: 120,
                ..ThreadState::default()
            },
        );
    }

    /// Map `data` at `start` with the given protection.
    pub fn map(&self, start: u64, data: Vec<u8>, protection: Protection, name: &str) {
        let region = MemoryRegion::new(start, start + data.len() as u64, protection, name);
        self.insert_mapping(Mapping {
            region,
            data: Some(data),
        });
    }

    /// List a region in the memory map whose reads always fail.
    pub fn map_unbacked(&self, start: u64, len: u64, protection: Protection, name: &str) {
        let region = MemoryRegion::new(start, start + len, protection, name);
        self.insert_mapping(Mapping { region, data: None });
    }

    fn insert_mapping(&self, mapping: Mapping) {
        let mut state = self.inspect();
        let at = state
            .mappings
            .partition_point(|m| m.region.start < mapping.region.start);
        state.mappings.insert(at, mapping);
    }

    /// Make every call of `op` fail.
    pub fn fail_on(&self, op: &'static str) {
        self.inspect().failures.push((op, None));
    }

    /// Make calls of `op` fail for one id only.
    pub fn fail_on_id(&self, op: &'static str, id: u32) {
        self.inspect().failures.push((op, Some(id)));
    }

    pub fn clear_failures(&self) {
        self.inspect().failures.clear();
    }

    /// Queue a state change for [`ProcessControl::wait_stop`].
    pub fn push_stop(&self, event: StopEvent) {
        self.inspect().stops.push_back(event);
    }

    /// Every backend call so far, as `"<op> <id>"`.
    pub fn calls(&self) -> Vec<String> {
        self.inspect().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inspect().calls.clear();
    }

    /// Current bytes at `[address, address + len)`, if backed.
    pub fn memory_at(&self, address: u64, len: usize) -> Option<Vec<u8>> {
        let state = self.inspect();
        let (index, offset) = state.backing(address, len).ok()?;
        state.mappings[index]
            .data
            .as_ref()
            .map(|d| d[offset..offset + len].to_vec())
    }

    pub fn is_attached(&self) -> bool {
        self.inspect().attached
    }

    pub fn is_running(&self) -> bool {
        self.inspect().running
    }

    pub fn last_signal(&self) -> Option<ResumeSignal> {
        self.inspect().last_signal
    }

    pub fn step_count(&self) -> usize {
        self.inspect().steps
    }

    pub fn is_suspended(&self, lwpid: u32) -> bool {
        self.inspect()
            .threads
            .get(&lwpid)
            .is_some_and(|t| t.suspended)
    }

    pub fn debug_registers_of(&self, lwpid: u32) -> Option<DebugRegisters> {
        self.inspect().threads.get(&lwpid).map(|t| t.debug_regs)
    }
}

impl ProcessControl for InMemoryProcess {
    fn attach(&mut self, pid: u32) -> Result<(), ProcessError> {
        let mut s = self.lock()?;
        s.enter("attach", pid)?;
        s.check_pid("attach", pid)?;
        s.attached = true;
        s.running = false;
        Ok(())
    }

    fn detach(&mut self, pid: u32) -> Result<(), ProcessError> {
        let mut s = self.lock()?;
        s.enter("detach", pid)?;
        s.check_pid("detach", pid)?;
        if !s.attached {
            return Err(ProcessError::NotTraced(pid));
        }
        s.attached = false;
        s.running = true;
        Ok(())
    }

    fn suspend(&mut self, lwpid: u32) -> Result<(), ProcessError> {
        let mut s = self.lock()?;
        s.enter("suspend", lwpid)?;
        s.thread_mut(lwpid)?.suspended = true;
        Ok(())
    }

    fn resume(&mut self, lwpid: u32) -> Result<(), ProcessError> {
        let mut s = self.lock()?;
        s.enter("resume", lwpid)?;
        s.thread_mut(lwpid)?.suspended = false;
        Ok(())
    }

    fn continue_process(
        &mut self,
        pid: u32,
        signal: Option<ResumeSignal>,
    ) -> Result<(), ProcessError> {
        let mut s = self.lock()?;
        s.enter("continue", pid)?;
        s.check_pid("continue", pid)?;
        s.running = true;
        s.last_signal = signal;
        Ok(())
    }

    fn step(&mut self, pid: u32) -> Result<(), ProcessError> {
        let mut s = self.lock()?;
        s.enter("step", pid)?;
        s.check_pid("step", pid)?;
        s.steps += 1;
        Ok(())
    }

    fn get_registers(&self, lwpid: u32) -> Result<GeneralRegisters, ProcessError> {
        let mut s = self.lock()?;
        s.enter("get_registers", lwpid)?;
        Ok(s.thread(lwpid)?.regs)
    }

    fn set_registers(&mut self, lwpid: u32, regs: &GeneralRegisters) -> Result<(), ProcessError> {
        let mut s = self.lock()?;
        s.enter("set_registers", lwpid)?;
        s.thread_mut(lwpid)?.regs = *regs;
        Ok(())
    }

    fn get_fp_registers(&self, lwpid: u32) -> Result<FpRegisters, ProcessError> {
        let mut s = self.lock()?;
        s.enter("get_fp_registers", lwpid)?;
        Ok(s.thread(lwpid)?.fp_regs)
    }

    fn set_fp_registers(&mut self, lwpid: u32, regs: &FpRegisters) -> Result<(), ProcessError> {
        let mut s = self.lock()?;
        s.enter("set_fp_registers", lwpid)?;
        s.thread_mut(lwpid)?.fp_regs = *regs;
        Ok(())
    }

    fn get_debug_registers(&self, lwpid: u32) -> Result<DebugRegisters, ProcessError> {
        let mut s = self.lock()?;
        s.enter("get_debug_registers", lwpid)?;
        Ok(s.thread(lwpid)?.debug_regs)
    }

    fn set_debug_registers(
        &mut self,
        lwpid: u32,
        regs: &DebugRegisters,
    ) -> Result<(), ProcessError> {
        let mut s = self.lock()?;
        s.enter("set_debug_registers", lwpid)?;
        s.thread_mut(lwpid)?.debug_regs = *regs;
        Ok(())
    }

    fn read_memory(&self, pid: u32, address: u64, buf: &mut [u8]) -> Result<(), ProcessError> {
        let mut s = self.lock()?;
        s.enter("read_memory", pid)?;
        s.check_pid("read_memory", pid)?;
        let (index, offset) = s.backing(address, buf.len())?;
        let data = s.mappings[index]
            .data
            .as_ref()
            .ok_or(ProcessError::BadAddress(address))?;
        buf.copy_from_slice(&data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_memory(&mut self, pid: u32, address: u64, data: &[u8]) -> Result<(), ProcessError> {
        let mut s = self.lock()?;
        s.enter("write_memory", pid)?;
        s.check_pid("write_memory", pid)?;
        let (index, offset) = s.backing(address, data.len())?;
        let backing = s.mappings[index]
            .data
            .as_mut()
            .ok_or(ProcessError::BadAddress(address))?;
        backing[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn list_threads(&self, pid: u32) -> Result<Vec<u32>, ProcessError> {
        let mut s = self.lock()?;
        s.enter("list_threads", pid)?;
        s.check_pid("list_threads", pid)?;
        Ok(s.threads.keys().copied().collect())
    }

    fn memory_map(&self, pid: u32) -> Result<Vec<MemoryRegion>, ProcessError> {
        let mut s = self.lock()?;
        s.enter("memory_map", pid)?;
        s.check_pid("memory_map", pid)?;
        Ok(s.mappings.iter().map(|m| m.region.clone()).collect())
    }

    fn thread_info(&self, pid: u32, lwpid: u32) -> Result<ThreadDetails, ProcessError> {
        let mut s = self.lock()?;
        s.enter("thread_info", lwpid)?;
        s.check_pid("thread_info", pid)?;
        let thread = s.thread(lwpid)?;
        Ok(ThreadDetails {
            lwpid,
            priority: thread.priority,
            name: thread.name.clone(),
        })
    }

    fn list_processes(&self) -> Result<Vec<ProcessSummary>, ProcessError> {
        let mut s = self.lock()?;
        s.enter("list_processes", 0)?;
        let mut list: Vec<ProcessSummary> = s
            .neighbours
            .values()
            .map(|p| ProcessSummary {
                pid: p.pid,
                name: p.name.clone(),
            })
            .collect();
        list.push(ProcessSummary {
            pid: s.pid,
            name: s.name.clone(),
        });
        list.sort_by_key(|p| p.pid);
        Ok(list)
    }

    fn process_info(&self, pid: u32) -> Result<ProcessDetails, ProcessError> {
        let mut s = self.lock()?;
        s.enter("process_info", pid)?;
        if pid == s.pid {
            return Ok(ProcessDetails {
                pid,
                name: s.name.clone(),
                path: s.path.clone(),
            });
        }
        s.neighbours
            .get(&pid)
            .cloned()
            .ok_or_else(|| ProcessError::failed("process_info", pid, "no such process"))
    }

    fn wait_stop(&mut self, pid: u32) -> Result<Option<StopEvent>, ProcessError> {
        let mut s = self.lock()?;
        s.check_pid("wait_stop", pid)?;
        let event = s.stops.pop_front();
        if event.is_some() {
            s.running = false;
        }
        Ok(event)
    }
}
