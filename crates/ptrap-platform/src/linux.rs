//! ptrace backend for Linux on x86-64.

use std::collections::BTreeSet;
use std::ffi::c_void;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileExt;

use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, trace, warn};

use ptrap_wire::{DebugRegisters, FpRegisters, GeneralRegisters};

use crate::control::{
    ProcessControl, ProcessDetails, ProcessSummary, ResumeSignal, StopEvent, ThreadDetails,
    SIGTRAP,
};
use crate::error::ProcessError;
use crate::maps::parse_maps;
use crate::memory::MemoryRegion;

/// Debug registers Linux lets a tracer write (DR4/DR5 are aliases).
const WRITABLE_DEBUG_REGS: [usize; 6] = [0, 1, 2, 3, 6, 7];

fn pid_of(id: u32) -> Pid {
    Pid::from_raw(id as i32)
}

fn errno<E: ToString>(op: &'static str, id: u32) -> impl FnOnce(E) -> ProcessError {
    move |e| ProcessError::failed(op, id, e)
}

fn debugreg_offset(index: usize) -> *mut c_void {
    (std::mem::offset_of!(libc::user, u_debugreg) + index * 8) as *mut c_void
}

fn peek_debugreg(lwpid: u32, index: usize) -> Result<u64, Errno> {
    Errno::clear();
    // SAFETY: PEEKUSER reads one word of the tracee's user area and
    // writes no local memory.
    let value = unsafe {
        libc::ptrace(
            libc::PTRACE_PEEKUSER,
            lwpid as libc::pid_t,
            debugreg_offset(index),
            std::ptr::null_mut::<c_void>(),
        )
    };
    if value == -1 && Errno::last() != Errno::UnknownErrno {
        return Err(Errno::last());
    }
    Ok(value as u64)
}

fn poke_debugreg(lwpid: u32, index: usize, value: u64) -> Result<(), Errno> {
    // SAFETY: POKEUSER passes `value` by value; no local memory is touched.
    let rc = unsafe {
        libc::ptrace(
            libc::PTRACE_POKEUSER,
            lwpid as libc::pid_t,
            debugreg_offset(index),
            value as *mut c_void,
        )
    };
    if rc < 0 {
        return Err(Errno::last());
    }
    Ok(())
}

/// Stop one thread with a directed SIGSTOP and reap the stop.
fn stop_thread(lwpid: u32) -> Result<(), ProcessError> {
    let tgid = fs::read_to_string(format!("/proc/{lwpid}/status"))?
        .lines()
        .find_map(|l| l.strip_prefix("Tgid:")?.trim().parse::<libc::pid_t>().ok())
        .unwrap_or(lwpid as libc::pid_t);
    // SAFETY: tgkill takes plain integers and has no memory effects.
    let rc = unsafe { libc::syscall(libc::SYS_tgkill, tgid, lwpid as libc::pid_t, libc::SIGSTOP) };
    if rc != 0 {
        return Err(ProcessError::failed(
            "suspend",
            lwpid,
            std::io::Error::last_os_error(),
        ));
    }
    waitpid(pid_of(lwpid), Some(WaitPidFlag::__WALL)).map_err(errno("suspend", lwpid))?;
    Ok(())
}

/// Copy the writable debug registers of stopped thread `from` to
/// stopped thread `to`.
fn copy_debug_registers(from: u32, to: u32) -> Result<(), Errno> {
    for index in WRITABLE_DEBUG_REGS {
        poke_debugreg(to, index, peek_debugreg(from, index)?)?;
    }
    Ok(())
}

/// Traces real processes through ptrace and `/proc`.
///
/// Tracks the threads it attached to so process-wide operations reach
/// every one of them. Threads the target creates later are traced
/// through `PTRACE_O_TRACECLONE` and adopted as their clone events are
/// reaped.
#[derive(Debug, Default)]
pub struct PtraceProcess {
    pid: Option<u32>,
    traced: BTreeSet<u32>,
    /// Clone children whose first stop arrived before the parent's
    /// clone event.
    early_clones: BTreeSet<u32>,
}

impl PtraceProcess {
    pub fn new() -> Self {
        Self::default()
    }

    fn task_ids(pid: u32) -> Result<Vec<u32>, ProcessError> {
        let mut ids: Vec<u32> = fs::read_dir(format!("/proc/{pid}/task"))?
            .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse().ok())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn attach_thread(&mut self, tid: u32) -> Result<(), Errno> {
        ptrace::attach(pid_of(tid))?;
        waitpid(pid_of(tid), Some(WaitPidFlag::__WALL))?;
        self.traced.insert(tid);
        ptrace::setoptions(pid_of(tid), ptrace::Options::PTRACE_O_TRACECLONE)?;
        trace!(tid, "thread attached");
        Ok(())
    }

    fn release_all(&mut self) {
        for tid in std::mem::take(&mut self.traced)
            .into_iter()
            .chain(std::mem::take(&mut self.early_clones))
        {
            let _ = ptrace::detach(pid_of(tid), None);
        }
        self.pid = None;
    }

    /// Run a ptrace request against traced thread `lwpid`.
    ///
    /// ptrace refuses register access to a running tracee with ESRCH; in
    /// that case the thread is stopped for the request and continued after.
    fn while_stopped<T>(
        &self,
        op: &'static str,
        lwpid: u32,
        request: impl Fn() -> Result<T, Errno>,
    ) -> Result<T, ProcessError> {
        if !self.traced.contains(&lwpid) {
            return Err(ProcessError::NotTraced(lwpid));
        }
        match request() {
            Err(Errno::ESRCH) => {}
            other => return other.map_err(errno(op, lwpid)),
        }
        trace!(lwpid, op, "stopping running thread");
        stop_thread(lwpid)?;
        let result = request().map_err(errno(op, lwpid));
        if let Err(e) = ptrace::cont(pid_of(lwpid), None) {
            warn!(lwpid, error = %e, "thread not continued");
        }
        result
    }

    /// Trace the thread `parent` just created and let both run.
    fn adopt_clone(&mut self, parent: u32) {
        let child = match ptrace::getevent(pid_of(parent)) {
            Ok(raw) => raw as u32,
            Err(e) => {
                warn!(parent, error = %e, "clone event without a child id");
                let _ = ptrace::cont(pid_of(parent), None);
                return;
            }
        };
        if !self.early_clones.remove(&child) {
            if let Err(e) = waitpid(pid_of(child), Some(WaitPidFlag::__WALL)) {
                warn!(child, error = %e, "new thread never stopped");
            }
        }
        self.traced.insert(child);
        // Hardware breakpoints are not inherited across clone.
        if let Err(e) = copy_debug_registers(parent, child) {
            warn!(parent, child, error = %e, "debug registers not copied");
        }
        for tid in [child, parent] {
            if let Err(e) = ptrace::cont(pid_of(tid), None) {
                warn!(tid, error = %e, "thread not continued");
            }
        }
        debug!(parent, child, "thread adopted");
    }

    /// Reap one wait status. Clone bookkeeping is absorbed here and
    /// never surfaces as an event.
    fn next_event(&mut self, pid: u32) -> Result<Option<StopEvent>, ProcessError> {
        loop {
            let status = match waitpid(None::<Pid>, Some(WaitPidFlag::WNOHANG | WaitPidFlag::__WALL)) {
                Ok(status) => status,
                Err(Errno::ECHILD) => return Ok(None),
                Err(e) => return Err(ProcessError::failed("wait", pid, e)),
            };
            match status {
                WaitStatus::StillAlive => return Ok(None),
                WaitStatus::PtraceEvent(tid, _, event)
                    if event == ptrace::Event::PTRACE_EVENT_CLONE as i32 =>
                {
                    self.adopt_clone(tid.as_raw() as u32);
                    continue;
                }
                WaitStatus::Stopped(tid, Signal::SIGSTOP)
                    if !self.traced.contains(&(tid.as_raw() as u32)) =>
                {
                    self.early_clones.insert(tid.as_raw() as u32);
                    continue;
                }
                _ => {}
            }
            match self.stop_event(status) {
                // A secondary thread exiting is not a process event.
                Some(ev) if matches!(status, WaitStatus::Exited(..)) && ev.lwpid != pid => continue,
                other => return Ok(other),
            }
        }
    }

    fn stop_event(&mut self, status: WaitStatus) -> Option<StopEvent> {
        match status {
            WaitStatus::Stopped(tid, sig) => Some(StopEvent::stopped(tid.as_raw() as u32, sig as i32)),
            WaitStatus::PtraceEvent(tid, _, _) | WaitStatus::PtraceSyscall(tid) => {
                Some(StopEvent::stopped(tid.as_raw() as u32, SIGTRAP))
            }
            WaitStatus::Exited(tid, code) => {
                let tid = tid.as_raw() as u32;
                self.traced.remove(&tid);
                Some(StopEvent::exited(tid, code))
            }
            WaitStatus::Signaled(tid, sig, _) => {
                let tid = tid.as_raw() as u32;
                self.traced.remove(&tid);
                Some(StopEvent::killed(tid, sig as i32))
            }
            WaitStatus::Continued(_) | WaitStatus::StillAlive => None,
        }
    }
}

impl ProcessControl for PtraceProcess {
    fn attach(&mut self, pid: u32) -> Result<(), ProcessError> {
        self.pid = Some(pid);
        // Untraced threads may still spawn more; rescan until none are new.
        loop {
            let fresh: Vec<u32> = match Self::task_ids(pid) {
                Ok(ids) => ids.into_iter().filter(|t| !self.traced.contains(t)).collect(),
                Err(e) => {
                    self.release_all();
                    return Err(e);
                }
            };
            if fresh.is_empty() {
                break;
            }
            for tid in fresh {
                match self.attach_thread(tid) {
                    Ok(()) => {}
                    // Exited between listing and attaching.
                    Err(Errno::ESRCH) if tid != pid => trace!(tid, "thread gone before attach"),
                    Err(e) => {
                        self.release_all();
                        return Err(ProcessError::failed("attach", tid, e));
                    }
                }
            }
        }
        debug!(pid, threads = self.traced.len(), "process attached");
        Ok(())
    }

    fn detach(&mut self, pid: u32) -> Result<(), ProcessError> {
        if self.traced.is_empty() {
            return Err(ProcessError::NotTraced(pid));
        }
        // Adopt pending clone children so none stay behind stopped.
        while let Ok(Some(ev)) = self.next_event(pid) {
            trace!(lwpid = ev.lwpid, "event dropped on detach");
        }
        let mut result = Ok(());
        for tid in std::mem::take(&mut self.traced) {
            let detached = match ptrace::detach(pid_of(tid), None) {
                Err(Errno::ESRCH) => {
                    stop_thread(tid).and_then(|()| {
                        ptrace::detach(pid_of(tid), None).map_err(errno("detach", tid))
                    })
                }
                other => other.map_err(errno("detach", tid)),
            };
            if let Err(e) = detached {
                warn!(tid, error = %e, "thread detach failed");
                if tid == pid {
                    result = Err(e);
                }
            }
        }
        for tid in std::mem::take(&mut self.early_clones) {
            let _ = ptrace::detach(pid_of(tid), None);
        }
        self.pid = None;
        result
    }

    fn suspend(&mut self, lwpid: u32) -> Result<(), ProcessError> {
        if !self.traced.contains(&lwpid) {
            return Err(ProcessError::NotTraced(lwpid));
        }
        stop_thread(lwpid)
    }

    fn resume(&mut self, lwpid: u32) -> Result<(), ProcessError> {
        ptrace::cont(pid_of(lwpid), None).map_err(errno("resume", lwpid))
    }

    fn continue_process(
        &mut self,
        pid: u32,
        signal: Option<ResumeSignal>,
    ) -> Result<(), ProcessError> {
        let sig = match signal {
            Some(ResumeSignal::Stop) => Some(Signal::SIGSTOP),
            Some(ResumeSignal::Kill) => Some(Signal::SIGKILL),
            None => None,
        };
        for &tid in &self.traced {
            let deliver = if tid == pid { sig } else { None };
            if let Err(e) = ptrace::cont(pid_of(tid), deliver) {
                // Threads that are already running report ESRCH.
                if tid == pid {
                    return Err(ProcessError::failed("continue", tid, e));
                }
                trace!(tid, error = %e, "thread not continued");
            }
        }
        Ok(())
    }

    fn step(&mut self, pid: u32) -> Result<(), ProcessError> {
        ptrace::step(pid_of(pid), None).map_err(errno("step", pid))
    }

    fn get_registers(&self, lwpid: u32) -> Result<GeneralRegisters, ProcessError> {
        let r = self.while_stopped("get_registers", lwpid, || ptrace::getregs(pid_of(lwpid)))?;
        Ok(GeneralRegisters {
            r15: r.r15,
            r14: r.r14,
            r13: r.r13,
            r12: r.r12,
            r11: r.r11,
            r10: r.r10,
            r9: r.r9,
            r8: r.r8,
            rdi: r.rdi,
            rsi: r.rsi,
            rbp: r.rbp,
            rbx: r.rbx,
            rdx: r.rdx,
            rcx: r.rcx,
            rax: r.rax,
            trapno: r.orig_rax as u32,
            fs: r.fs as u16,
            gs: r.gs as u16,
            err: 0,
            es: r.es as u16,
            ds: r.ds as u16,
            rip: r.rip,
            cs: r.cs,
            rflags: r.eflags,
            rsp: r.rsp,
            ss: r.ss,
        })
    }

    fn set_registers(&mut self, lwpid: u32, regs: &GeneralRegisters) -> Result<(), ProcessError> {
        let pid = pid_of(lwpid);
        self.while_stopped("set_registers", lwpid, || {
            let mut r = ptrace::getregs(pid)?;
            r.r15 = regs.r15;
            r.r14 = regs.r14;
            r.r13 = regs.r13;
            r.r12 = regs.r12;
            r.r11 = regs.r11;
            r.r10 = regs.r10;
            r.r9 = regs.r9;
            r.r8 = regs.r8;
            r.rdi = regs.rdi;
            r.rsi = regs.rsi;
            r.rbp = regs.rbp;
            r.rbx = regs.rbx;
            r.rdx = regs.rdx;
            r.rcx = regs.rcx;
            r.rax = regs.rax;
            r.rip = regs.rip;
            r.eflags = regs.rflags;
            r.rsp = regs.rsp;
            ptrace::setregs(pid, r)
        })
    }

    fn get_fp_registers(&self, lwpid: u32) -> Result<FpRegisters, ProcessError> {
        let image = self.while_stopped("get_fp_registers", lwpid, || {
            let mut image = [0u8; FpRegisters::FXSAVE_SIZE];
            // SAFETY: PTRACE_GETFPREGS fills exactly one 512-byte
            // user_fpregs_struct, which `image` provides.
            let rc = unsafe {
                libc::ptrace(
                    libc::PTRACE_GETFPREGS,
                    lwpid as libc::pid_t,
                    std::ptr::null_mut::<c_void>(),
                    image.as_mut_ptr() as *mut c_void,
                )
            };
            if rc < 0 {
                return Err(Errno::last());
            }
            Ok(image)
        })?;
        FpRegisters::from_fxsave(&image)
            .map_err(|e| ProcessError::failed("get_fp_registers", lwpid, e))
    }

    fn set_fp_registers(&mut self, lwpid: u32, regs: &FpRegisters) -> Result<(), ProcessError> {
        self.while_stopped("set_fp_registers", lwpid, || {
            let mut image = regs.to_fxsave();
            // SAFETY: `image` is a 512-byte FXSAVE area, the size
            // PTRACE_SETFPREGS reads.
            let rc = unsafe {
                libc::ptrace(
                    libc::PTRACE_SETFPREGS,
                    lwpid as libc::pid_t,
                    std::ptr::null_mut::<c_void>(),
                    image.as_mut_ptr() as *mut c_void,
                )
            };
            if rc < 0 {
                return Err(Errno::last());
            }
            Ok(())
        })
    }

    fn get_debug_registers(&self, lwpid: u32) -> Result<DebugRegisters, ProcessError> {
        self.while_stopped("get_debug_registers", lwpid, || {
            let mut regs = DebugRegisters::default();
            for index in 0..8 {
                regs.dr[index] = peek_debugreg(lwpid, index)?;
            }
            Ok(regs)
        })
    }

    fn set_debug_registers(
        &mut self,
        lwpid: u32,
        regs: &DebugRegisters,
    ) -> Result<(), ProcessError> {
        // DR7 goes last so the kernel validates enables against the new addresses.
        self.while_stopped("set_debug_registers", lwpid, || {
            for index in WRITABLE_DEBUG_REGS {
                poke_debugreg(lwpid, index, regs.dr[index])?;
            }
            Ok(())
        })
    }

    fn read_memory(&self, pid: u32, address: u64, buf: &mut [u8]) -> Result<(), ProcessError> {
        let mem = fs::File::open(format!("/proc/{pid}/mem"))?;
        mem.read_exact_at(buf, address)
            .map_err(|_| ProcessError::BadAddress(address))
    }

    fn write_memory(&mut self, pid: u32, address: u64, data: &[u8]) -> Result<(), ProcessError> {
        let mem = fs::OpenOptions::new()
            .write(true)
            .open(format!("/proc/{pid}/mem"))?;
        mem.write_all_at(data, address)
            .map_err(|_| ProcessError::BadAddress(address))
    }

    fn list_threads(&self, pid: u32) -> Result<Vec<u32>, ProcessError> {
        let live = Self::task_ids(pid)?;
        if self.pid != Some(pid) {
            return Ok(live);
        }
        // Threads whose clone event is still pending are left out until adopted.
        Ok(live.into_iter().filter(|t| self.traced.contains(t)).collect())
    }

    fn memory_map(&self, pid: u32) -> Result<Vec<MemoryRegion>, ProcessError> {
        let content = fs::read_to_string(format!("/proc/{pid}/maps"))?;
        parse_maps(&content)
    }

    fn thread_info(&self, pid: u32, lwpid: u32) -> Result<ThreadDetails, ProcessError> {
        let dir = format!("/proc/{pid}/task/{lwpid}");
        let name = fs::read_to_string(format!("{dir}/comm"))
            .map_err(|_| ProcessError::NoSuchThread(lwpid))?
            .trim_end()
            .to_string();
        let stat = fs::read_to_string(format!("{dir}/stat"))?;
        Ok(ThreadDetails {
            lwpid,
            priority: parse_stat_priority(&stat).unwrap_or(0),
            name,
        })
    }

    fn list_processes(&self) -> Result<Vec<ProcessSummary>, ProcessError> {
        let mut list: Vec<ProcessSummary> = fs::read_dir("/proc")?
            .filter_map(|entry| {
                let pid: u32 = entry.ok()?.file_name().to_str()?.parse().ok()?;
                // Processes can exit while the list is built.
                let name = fs::read_to_string(format!("/proc/{pid}/comm")).ok()?;
                Some(ProcessSummary {
                    pid,
                    name: name.trim_end().to_string(),
                })
            })
            .collect();
        list.sort_unstable_by_key(|p| p.pid);
        Ok(list)
    }

    fn process_info(&self, pid: u32) -> Result<ProcessDetails, ProcessError> {
        let name = fs::read_to_string(format!("/proc/{pid}/comm"))
            .map_err(errno("process_info", pid))?
            .trim_end()
            .to_string();
        let path = fs::read_link(format!("/proc/{pid}/exe"))
            .map(|p| String::from_utf8_lossy(p.as_os_str().as_bytes()).into_owned())
            .unwrap_or_default();
        Ok(ProcessDetails { pid, name, path })
    }

    fn wait_stop(&mut self, pid: u32) -> Result<Option<StopEvent>, ProcessError> {
        self.next_event(pid)
    }
}

/// Scheduling priority: field 18 of a `stat` line.
fn parse_stat_priority(stat: &str) -> Option<u32> {
    // The command name may contain spaces; fields resume after the last ')'.
    let rest = &stat[stat.rfind(')')? + 1..];
    let value: i64 = rest.split_whitespace().nth(15)?.parse().ok()?;
    u32::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};
    use std::time::{Duration, Instant};

    #[test]
    fn stat_priority_is_field_eighteen() {
        let stat = "1234 (my prog) S 1 1234 1234 0 -1 4194560 100 0 0 0 5 3 0 0 20 0 1 0 100 0 0";
        assert_eq!(parse_stat_priority(stat), Some(20));
    }

    #[test]
    fn stat_priority_handles_parens_in_name() {
        let stat = "7 (a) b)) R 1 7 7 0 -1 0 0 0 0 0 0 0 0 0 39 0 1 0 1 0 0";
        assert_eq!(parse_stat_priority(stat), Some(39));
    }

    #[test]
    fn own_threads_are_listed() {
        let pid = std::process::id();
        let ids = PtraceProcess::task_ids(pid).unwrap();
        assert!(ids.contains(&pid));
    }

    #[test]
    fn own_memory_is_readable_through_proc() {
        let value: u64 = 0x1122_3344_5566_7788;
        let addr = &value as *const u64 as u64;
        let backend = PtraceProcess::new();
        let mut buf = [0u8; 8];
        backend
            .read_memory(std::process::id(), addr, &mut buf)
            .unwrap();
        assert_eq!(u64::from_le_bytes(buf), value);
    }

    #[test]
    fn own_memory_map_contains_the_stack() {
        let backend = PtraceProcess::new();
        let map = backend.memory_map(std::process::id()).unwrap();
        assert!(map.iter().any(|r| r.name == "[stack]"));
    }

    #[test]
    fn detach_without_attach_is_not_traced() {
        let mut backend = PtraceProcess::new();
        assert!(matches!(
            backend.detach(1),
            Err(ProcessError::NotTraced(1))
        ));
    }

    #[test]
    fn registers_of_untraced_threads_are_refused() {
        let backend = PtraceProcess::new();
        let me = std::process::id();
        assert!(matches!(
            backend.get_debug_registers(me),
            Err(ProcessError::NotTraced(id)) if id == me
        ));
    }

    #[test]
    fn own_process_is_listed_with_its_name() {
        let backend = PtraceProcess::new();
        let me = std::process::id();
        let list = backend.list_processes().unwrap();
        assert!(list.windows(2).all(|w| w[0].pid < w[1].pid));
        let own = list.iter().find(|p| p.pid == me).unwrap();
        let info = backend.process_info(me).unwrap();
        assert_eq!(info.name, own.name);
        assert!(!info.path.is_empty());
    }

    const LATE_THREAD_CHILD: &str = "PTRAP_LATE_THREAD_CHILD";

    /// Body of the child process used below; a no-op in a normal run.
    #[test]
    fn late_thread_child() {
        if std::env::var_os(LATE_THREAD_CHILD).is_none() {
            return;
        }
        std::thread::sleep(Duration::from_millis(700));
        let _worker = std::thread::spawn(|| loop {
            std::thread::sleep(Duration::from_millis(20));
        });
        std::thread::sleep(Duration::from_secs(10));
    }

    fn process_state(pid: u32) -> char {
        let stat = fs::read_to_string(format!("/proc/{pid}/stat")).unwrap();
        let rest = &stat[stat.rfind(')').unwrap() + 1..];
        rest.trim_start().chars().next().unwrap()
    }

    #[test]
    fn threads_spawned_after_attach_are_traced_and_released() {
        let mut child = Command::new(std::env::current_exe().unwrap())
            .args(["--exact", "linux::tests::late_thread_child", "--test-threads=1"])
            .env(LATE_THREAD_CHILD, "1")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id();
        std::thread::sleep(Duration::from_millis(200));

        let mut backend = PtraceProcess::new();
        if let Err(e) = backend.attach(pid) {
            let _ = child.kill();
            let _ = child.wait();
            // Sandboxes without ptrace permission cannot run this test.
            if matches!(&e, ProcessError::Failed { reason, .. } if reason.contains("EPERM")) {
                return;
            }
            panic!("attach failed: {e}");
        }
        let before = PtraceProcess::task_ids(pid).unwrap().len();
        backend.continue_process(pid, None).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut threads = Vec::new();
        while Instant::now() < deadline {
            if let Some(ev) = backend.wait_stop(pid).unwrap() {
                assert!(!ev.is_terminal(), "target died: {ev:?}");
            }
            threads = backend.list_threads(pid).unwrap();
            if threads.len() > before && threads == PtraceProcess::task_ids(pid).unwrap() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(threads.len() > before, "late thread never adopted: {threads:?}");

        let cleared = DebugRegisters::default();
        for &tid in &threads {
            backend.set_debug_registers(tid, &cleared).unwrap();
        }
        assert_ne!(process_state(pid), 'T');

        backend.detach(pid).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        let state = process_state(pid);
        let _ = child.kill();
        let _ = child.wait();
        assert!(state != 'T' && state != 't', "target left stopped: {state}");
    }
}
