//! The debug session: at most one attached process at a time.
//!
//! [`DebugSession`] owns the process-control backend, the breakpoint
//! slots, the shared watchpoint register block and the notification
//! channel. It is `Detached` while `target_pid == 0` and `Attached`
//! otherwise; every operation except attach, detach and trap polling
//! requires the attached state.

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use ptrap_platform::control::SIGSTOP;
use ptrap_platform::{ProcessControl, ResumeSignal, StopEvent, StopReason};
use ptrap_wire::{
    DebugRegisters, FpRegisters, GeneralRegisters, InterruptPacket, StopGoMode,
    ThreadInfoResponse, WatchAccess, WatchLength, MAX_BREAKPOINTS, MAX_WATCHPOINTS,
};
use tracing::{debug, info, warn};

use crate::breakpoint::BreakpointTable;
use crate::error::DebugError;
use crate::notify::NotificationChannel;
use crate::DEFAULT_NOTIFY_PORT;

/// Tunables for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Controller port the notification channel connects to.
    pub notify_port: u16,
    pub connect_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            notify_port: DEFAULT_NOTIFY_PORT,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// The three register records a controller can replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    General,
    Fp,
    Debug,
}

impl RegisterKind {
    pub fn size(self) -> usize {
        match self {
            Self::General => GeneralRegisters::SIZE,
            Self::Fp => FpRegisters::SIZE,
            Self::Debug => DebugRegisters::SIZE,
        }
    }

    /// Reject a declared length that differs from the record size.
    pub fn check_len(self, len: u32) -> Result<(), DebugError> {
        if len as usize != self.size() {
            return Err(DebugError::MalformedRequest(format!(
                "{self:?} register record must be {} bytes, got {len}",
                self.size()
            )));
        }
        Ok(())
    }
}

/// Result of one trap poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// Nothing attached or nothing pending.
    Idle,
    /// A SIGSTOP stop that is not forwarded.
    Ignored(u32),
    /// An event was sent on the notification channel.
    Reported(u32),
    /// An event could not be delivered; the notification channel is
    /// closed and the thread stays stopped.
    Dropped(u32),
    /// The target died; the session was torn down.
    Ended,
}

pub struct DebugSession {
    control: Box<dyn ProcessControl>,
    options: SessionOptions,
    target_pid: u32,
    breakpoints: BreakpointTable,
    watch_registers: DebugRegisters,
    notifier: Option<NotificationChannel>,
}

impl fmt::Debug for DebugSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugSession")
            .field("target_pid", &self.target_pid)
            .field("breakpoints", &self.breakpoints.enabled_count())
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

fn slot(index: u32, max: usize) -> Result<usize, DebugError> {
    let i = index as usize;
    if i >= max {
        return Err(DebugError::InvalidIndex { index, max });
    }
    Ok(i)
}

impl DebugSession {
    /// Create a detached session over `control`.
    pub fn new(control: Box<dyn ProcessControl>, options: SessionOptions) -> Self {
        Self {
            control,
            options,
            target_pid: 0,
            breakpoints: BreakpointTable::new(),
            watch_registers: DebugRegisters::default(),
            notifier: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.target_pid != 0
    }

    /// The attached pid, or 0 when detached.
    pub fn target_pid(&self) -> u32 {
        self.target_pid
    }

    pub fn breakpoints(&self) -> &BreakpointTable {
        &self.breakpoints
    }

    /// The watchpoint block last broadcast to the target's threads.
    pub fn watch_registers(&self) -> &DebugRegisters {
        &self.watch_registers
    }

    pub fn has_notifier(&self) -> bool {
        self.notifier.is_some()
    }

    pub fn control(&self) -> &dyn ProcessControl {
        self.control.as_ref()
    }

    pub fn control_mut(&mut self) -> &mut dyn ProcessControl {
        self.control.as_mut()
    }

    fn require_attached(&self) -> Result<u32, DebugError> {
        if self.target_pid == 0 {
            return Err(DebugError::NotAttached);
        }
        Ok(self.target_pid)
    }

    /// Attach to `pid` and open the notification channel back to
    /// `controller` on the configured port.
    pub fn attach(&mut self, pid: u32, controller: IpAddr) -> Result<(), DebugError> {
        let addr = SocketAddr::new(controller, self.options.notify_port);
        let timeout = self.options.connect_timeout;
        self.attach_with(pid, || NotificationChannel::connect(addr, timeout))
    }

    /// Attach to `pid`, obtaining the notification channel from
    /// `open_channel` once the target is traced and running.
    ///
    /// On any failure the target is released and no session remains.
    pub fn attach_with<F>(&mut self, pid: u32, open_channel: F) -> Result<(), DebugError>
    where
        F: FnOnce() -> io::Result<NotificationChannel>,
    {
        if self.target_pid != 0 {
            return Err(DebugError::AlreadyDebugging(self.target_pid));
        }
        if pid == 0 {
            return Err(DebugError::MalformedRequest("pid 0".into()));
        }

        self.control.attach(pid)?;
        let opened = self
            .control
            .continue_process(pid, None)
            .map_err(DebugError::from)
            .and_then(|()| open_channel().map_err(DebugError::Notification));
        let channel = match opened {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(detach_err) = self.control.detach(pid) {
                    warn!(pid, error = %detach_err, "detach after failed attach");
                }
                return Err(e);
            }
        };

        self.target_pid = pid;
        self.breakpoints = BreakpointTable::new();
        self.watch_registers = DebugRegisters::default();
        self.notifier = Some(channel);
        info!(pid, "attached");
        Ok(())
    }

    /// Tear the session down. Every step is best-effort and the session
    /// always ends detached; calling this while detached does nothing.
    pub fn detach(&mut self) {
        let pid = self.target_pid;
        if pid == 0 {
            self.notifier = None;
            return;
        }

        self.breakpoints.restore_all(self.control.as_mut(), pid);

        let cleared = DebugRegisters::default();
        match self.control.list_threads(pid) {
            Ok(threads) => {
                for tid in threads {
                    if let Err(e) = self.control.set_debug_registers(tid, &cleared) {
                        warn!(tid, error = %e, "clearing debug registers failed");
                    }
                }
            }
            Err(e) => warn!(pid, error = %e, "thread list unavailable during detach"),
        }
        self.watch_registers = cleared;

        if let Err(e) = self.control.continue_process(pid, None) {
            warn!(pid, error = %e, "continue during detach failed");
        }
        if let Err(e) = self.control.detach(pid) {
            warn!(pid, error = %e, "detach failed");
        }

        self.notifier = None;
        self.target_pid = 0;
        info!(pid, "detached");
    }

    pub fn set_breakpoint(
        &mut self,
        index: u32,
        address: u64,
        enabled: bool,
    ) -> Result<(), DebugError> {
        let pid = self.require_attached()?;
        let index = slot(index, MAX_BREAKPOINTS)?;
        if enabled {
            self.breakpoints
                .enable(self.control.as_mut(), pid, index, address)?;
        } else {
            self.breakpoints.disable(self.control.as_mut(), pid, index)?;
        }
        Ok(())
    }

    /// Arm or disarm hardware watch slot `index` on every thread.
    ///
    /// `length` and `access` are raw DR7 codes and are only checked when
    /// enabling. Threads updated before a failure stay updated.
    pub fn set_watchpoint(
        &mut self,
        index: u32,
        address: u64,
        length: u8,
        access: u8,
        enabled: bool,
    ) -> Result<(), DebugError> {
        let pid = self.require_attached()?;
        let index = slot(index, MAX_WATCHPOINTS)?;
        let threads = self.control.list_threads(pid)?;

        let mut regs = self.watch_registers;
        if enabled {
            let length = WatchLength::from_code(length)
                .map_err(|e| DebugError::MalformedRequest(e.to_string()))?;
            let access = WatchAccess::from_code(access)
                .map_err(|e| DebugError::MalformedRequest(e.to_string()))?;
            regs.set_watch(index, address, length, access);
        } else {
            regs.clear_watch(index);
        }
        self.watch_registers = regs;
        debug!(index, enabled, threads = threads.len(), "watchpoint update");
        self.broadcast_debug_registers(&threads, &regs)
    }

    fn broadcast_debug_registers(
        &mut self,
        threads: &[u32],
        regs: &DebugRegisters,
    ) -> Result<(), DebugError> {
        let mut applied = Vec::with_capacity(threads.len());
        let mut failed = Vec::new();
        for &tid in threads {
            match self.control.set_debug_registers(tid, regs) {
                Ok(()) => applied.push(tid),
                Err(e) => {
                    warn!(tid, error = %e, "debug register update failed");
                    failed.push(tid);
                }
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(DebugError::BroadcastFailed { failed, applied })
        }
    }

    pub fn list_threads(&self) -> Result<Vec<u32>, DebugError> {
        let pid = self.require_attached()?;
        Ok(self.control.list_threads(pid)?)
    }

    pub fn stop_thread(&mut self, lwpid: u32) -> Result<(), DebugError> {
        self.require_attached()?;
        Ok(self.control.suspend(lwpid)?)
    }

    pub fn resume_thread(&mut self, lwpid: u32) -> Result<(), DebugError> {
        self.require_attached()?;
        Ok(self.control.resume(lwpid)?)
    }

    pub fn get_registers(&self, lwpid: u32) -> Result<GeneralRegisters, DebugError> {
        self.require_attached()?;
        Ok(self.control.get_registers(lwpid)?)
    }

    pub fn set_registers(&mut self, lwpid: u32, regs: &GeneralRegisters) -> Result<(), DebugError> {
        self.require_attached()?;
        Ok(self.control.set_registers(lwpid, regs)?)
    }

    pub fn get_fp_registers(&self, lwpid: u32) -> Result<FpRegisters, DebugError> {
        self.require_attached()?;
        Ok(self.control.get_fp_registers(lwpid)?)
    }

    pub fn set_fp_registers(&mut self, lwpid: u32, regs: &FpRegisters) -> Result<(), DebugError> {
        self.require_attached()?;
        Ok(self.control.set_fp_registers(lwpid, regs)?)
    }

    pub fn get_debug_registers(&self, lwpid: u32) -> Result<DebugRegisters, DebugError> {
        self.require_attached()?;
        Ok(self.control.get_debug_registers(lwpid)?)
    }

    pub fn set_debug_registers(
        &mut self,
        lwpid: u32,
        regs: &DebugRegisters,
    ) -> Result<(), DebugError> {
        self.require_attached()?;
        Ok(self.control.set_debug_registers(lwpid, regs)?)
    }

    /// Resume the whole target, optionally delivering a stop or kill.
    pub fn stop_go(&mut self, mode: StopGoMode) -> Result<(), DebugError> {
        let pid = self.require_attached()?;
        let signal = match mode {
            StopGoMode::Continue => None,
            StopGoMode::Stop => Some(ResumeSignal::Stop),
            StopGoMode::Kill => Some(ResumeSignal::Kill),
        };
        Ok(self.control.continue_process(pid, signal)?)
    }

    pub fn thread_info(&self, lwpid: u32) -> Result<ThreadInfoResponse, DebugError> {
        let pid = self.require_attached()?;
        let details = self.control.thread_info(pid, lwpid)?;
        Ok(ThreadInfoResponse {
            lwpid: details.lwpid,
            priority: details.priority,
            name: details.name,
        })
    }

    pub fn single_step(&mut self) -> Result<(), DebugError> {
        let pid = self.require_attached()?;
        Ok(self.control.step(pid)?)
    }

    /// Poll the target for a trap and forward it to the controller.
    ///
    /// SIGSTOP stops are not forwarded. A kill or exit tears the
    /// session down.
    pub fn check_interrupt(&mut self) -> Result<InterruptOutcome, DebugError> {
        let pid = self.target_pid;
        if pid == 0 {
            return Ok(InterruptOutcome::Idle);
        }
        let Some(event) = self.control.wait_stop(pid)? else {
            return Ok(InterruptOutcome::Idle);
        };

        if event.is_terminal() {
            info!(pid, lwpid = event.lwpid, reason = ?event.reason, "target ended");
            self.detach();
            return Ok(InterruptOutcome::Ended);
        }
        if event.reason == StopReason::Stopped(SIGSTOP) {
            return Ok(InterruptOutcome::Ignored(event.lwpid));
        }

        let packet = self.interrupt_packet(pid, &event)?;
        let Some(channel) = self.notifier.as_mut() else {
            return Ok(InterruptOutcome::Dropped(event.lwpid));
        };
        // A partial record would desynchronise the stream, so a failed
        // write closes the channel.
        if let Err(e) = channel.send(&packet) {
            warn!(lwpid = event.lwpid, error = %e, "notification channel closed");
            self.notifier = None;
            return Ok(InterruptOutcome::Dropped(event.lwpid));
        }
        debug!(lwpid = event.lwpid, status = packet.status, "interrupt reported");
        Ok(InterruptOutcome::Reported(event.lwpid))
    }

    fn interrupt_packet(&self, pid: u32, event: &StopEvent) -> Result<InterruptPacket, DebugError> {
        let lwpid = event.lwpid;
        let details = self.control.thread_info(pid, lwpid)?;
        Ok(InterruptPacket {
            lwpid,
            status: event.wait_status(),
            thread_name: details.name,
            regs: self.control.get_registers(lwpid)?,
            fp_regs: self.control.get_fp_registers(lwpid)?,
            debug_regs: self.control.get_debug_registers(lwpid)?,
        })
    }
}
