//! The session actor.
//!
//! ptrace only accepts requests from the thread that attached, so one
//! dedicated OS thread owns the [`DebugSession`] and the process-control
//! backend. Connection tasks talk to it through a cloneable
//! [`SessionHandle`]; each request carries a oneshot sender for its
//! reply. Between requests the actor polls the target for traps.

use std::io;
use std::net::IpAddr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use ptrap_debug::{DebugSession, InterruptOutcome, RegisterKind};
use ptrap_platform::{MemoryRegion, ProcessDetails, ProcessSummary};
use ptrap_scan::{ScanOutcome, ScanQuery, Scanner};
use ptrap_wire::{
    BreakpointRequest, DebugRegisters, FpRegisters, GeneralRegisters, StopGoMode,
    ThreadInfoResponse, WatchpointRequest,
};

use crate::error::ServerError;

type Reply<T> = oneshot::Sender<Result<T, ServerError>>;

enum SessionCommand {
    Attach {
        pid: u32,
        controller: IpAddr,
        reply: Reply<()>,
    },
    Detach {
        reply: Reply<()>,
    },
    SetBreakpoint {
        request: BreakpointRequest,
        reply: Reply<()>,
    },
    SetWatchpoint {
        request: WatchpointRequest,
        reply: Reply<()>,
    },
    ListThreads {
        reply: Reply<Vec<u32>>,
    },
    StopThread {
        lwpid: u32,
        reply: Reply<()>,
    },
    ResumeThread {
        lwpid: u32,
        reply: Reply<()>,
    },
    GetRegisters {
        lwpid: u32,
        reply: Reply<GeneralRegisters>,
    },
    SetRegisters {
        lwpid: u32,
        regs: GeneralRegisters,
        reply: Reply<()>,
    },
    GetFpRegisters {
        lwpid: u32,
        reply: Reply<FpRegisters>,
    },
    SetFpRegisters {
        lwpid: u32,
        regs: Box<FpRegisters>,
        reply: Reply<()>,
    },
    GetDebugRegisters {
        lwpid: u32,
        reply: Reply<DebugRegisters>,
    },
    SetDebugRegisters {
        lwpid: u32,
        regs: DebugRegisters,
        reply: Reply<()>,
    },
    /// Pre-ack check for a register write.
    CheckRegisterWrite {
        kind: RegisterKind,
        length: u32,
        reply: Reply<()>,
    },
    StopGo {
        mode: StopGoMode,
        reply: Reply<()>,
    },
    ThreadInfo {
        lwpid: u32,
        reply: Reply<ThreadInfoResponse>,
    },
    SingleStep {
        reply: Reply<()>,
    },
    ReadMemory {
        pid: u32,
        address: u64,
        length: usize,
        reply: Reply<Vec<u8>>,
    },
    WriteMemory {
        pid: u32,
        address: u64,
        data: Vec<u8>,
        reply: Reply<()>,
    },
    MemoryMap {
        pid: u32,
        reply: Reply<Vec<MemoryRegion>>,
    },
    ProcessList {
        reply: Reply<Vec<ProcessSummary>>,
    },
    ProcessInfo {
        pid: u32,
        reply: Reply<ProcessDetails>,
    },
    Scan {
        query: ScanQuery,
        regions: Vec<MemoryRegion>,
        reply: Reply<ScanOutcome>,
    },
    Shutdown,
}

struct SessionActor {
    session: DebugSession,
    scanner: Scanner,
    poll: Duration,
    rx: mpsc::Receiver<SessionCommand>,
}

/// Start the actor thread.
pub fn spawn(
    session: DebugSession,
    scanner: Scanner,
    poll: Duration,
) -> io::Result<(SessionHandle, JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel();
    let actor = SessionActor {
        session,
        scanner,
        poll,
        rx,
    };
    let join = thread::Builder::new()
        .name("ptrap-session".into())
        .spawn(move || actor.run())?;
    Ok((SessionHandle { tx }, join))
}

impl SessionActor {
    fn run(mut self) {
        debug!(poll_ms = self.poll.as_millis() as u64, "session actor started");
        loop {
            match self.rx.recv_timeout(self.poll) {
                Ok(SessionCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => self.handle(command),
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.poll_interrupt();
        }
        if self.session.is_attached() {
            info!(pid = self.session.target_pid(), "detaching on shutdown");
        }
        self.session.detach();
        debug!("session actor stopped");
    }

    fn poll_interrupt(&mut self) {
        match self.session.check_interrupt() {
            Ok(InterruptOutcome::Reported(lwpid)) => debug!(lwpid, "trap reported"),
            Ok(InterruptOutcome::Ended) => info!("target ended, session closed"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "trap reporting failed"),
        }
    }

    fn handle(&mut self, command: SessionCommand) {
        let s = &mut self.session;
        match command {
            SessionCommand::Attach {
                pid,
                controller,
                reply,
            } => {
                let _ = reply.send(s.attach(pid, controller).map_err(Into::into));
            }
            SessionCommand::Detach { reply } => {
                s.detach();
                let _ = reply.send(Ok(()));
            }
            SessionCommand::SetBreakpoint { request, reply } => {
                let result = s.set_breakpoint(request.index, request.address, request.enabled);
                let _ = reply.send(result.map_err(Into::into));
            }
            SessionCommand::SetWatchpoint { request, reply } => {
                let result = s.set_watchpoint(
                    request.index,
                    request.address,
                    request.length,
                    request.access,
                    request.enabled,
                );
                let _ = reply.send(result.map_err(Into::into));
            }
            SessionCommand::ListThreads { reply } => {
                let _ = reply.send(s.list_threads().map_err(Into::into));
            }
            SessionCommand::StopThread { lwpid, reply } => {
                let _ = reply.send(s.stop_thread(lwpid).map_err(Into::into));
            }
            SessionCommand::ResumeThread { lwpid, reply } => {
                let _ = reply.send(s.resume_thread(lwpid).map_err(Into::into));
            }
            SessionCommand::GetRegisters { lwpid, reply } => {
                let _ = reply.send(s.get_registers(lwpid).map_err(Into::into));
            }
            SessionCommand::SetRegisters { lwpid, regs, reply } => {
                let _ = reply.send(s.set_registers(lwpid, &regs).map_err(Into::into));
            }
            SessionCommand::GetFpRegisters { lwpid, reply } => {
                let _ = reply.send(s.get_fp_registers(lwpid).map_err(Into::into));
            }
            SessionCommand::SetFpRegisters { lwpid, regs, reply } => {
                let _ = reply.send(s.set_fp_registers(lwpid, &regs).map_err(Into::into));
            }
            SessionCommand::GetDebugRegisters { lwpid, reply } => {
                let _ = reply.send(s.get_debug_registers(lwpid).map_err(Into::into));
            }
            SessionCommand::SetDebugRegisters { lwpid, regs, reply } => {
                let _ = reply.send(s.set_debug_registers(lwpid, &regs).map_err(Into::into));
            }
            SessionCommand::CheckRegisterWrite {
                kind,
                length,
                reply,
            } => {
                let result = if s.is_attached() {
                    kind.check_len(length)
                } else {
                    Err(ptrap_debug::DebugError::NotAttached)
                };
                let _ = reply.send(result.map_err(Into::into));
            }
            SessionCommand::StopGo { mode, reply } => {
                let _ = reply.send(s.stop_go(mode).map_err(Into::into));
            }
            SessionCommand::ThreadInfo { lwpid, reply } => {
                let _ = reply.send(s.thread_info(lwpid).map_err(Into::into));
            }
            SessionCommand::SingleStep { reply } => {
                let _ = reply.send(s.single_step().map_err(Into::into));
            }
            SessionCommand::ReadMemory {
                pid,
                address,
                length,
                reply,
            } => {
                let _ = reply.send(read_memory(s, pid, address, length));
            }
            SessionCommand::WriteMemory {
                pid,
                address,
                data,
                reply,
            } => {
                let result = s.control_mut().write_memory(pid, address, &data);
                let _ = reply.send(result.map_err(Into::into));
            }
            SessionCommand::MemoryMap { pid, reply } => {
                let result = self.scanner.memory_map(s.control(), pid);
                let _ = reply.send(result.map_err(Into::into));
            }
            SessionCommand::ProcessList { reply } => {
                let _ = reply.send(s.control().list_processes().map_err(Into::into));
            }
            SessionCommand::ProcessInfo { pid, reply } => {
                let _ = reply.send(s.control().process_info(pid).map_err(Into::into));
            }
            SessionCommand::Scan {
                query,
                regions,
                reply,
            } => {
                let result = self.scanner.scan(s.control(), &regions, &query);
                if let Ok(outcome) = &result {
                    info!(
                        pid = query.pid,
                        matches = outcome.matches.len(),
                        regions = outcome.regions_scanned,
                        skipped = outcome.pages_skipped,
                        cancelled = outcome.cancelled,
                        "scan finished"
                    );
                }
                let _ = reply.send(result.map_err(Into::into));
            }
            SessionCommand::Shutdown => {}
        }
    }
}

fn read_memory(
    session: &DebugSession,
    pid: u32,
    address: u64,
    length: usize,
) -> Result<Vec<u8>, ServerError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(length)
        .map_err(|_| ServerError::AllocationFailed { what: "read buffer" })?;
    buf.resize(length, 0);
    session.control().read_memory(pid, address, &mut buf)?;
    Ok(buf)
}

/// Async front door to the session actor.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, ServerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| ServerError::SessionClosed)?;
        rx.await.map_err(|_| ServerError::SessionClosed)?
    }

    pub async fn attach(&self, pid: u32, controller: IpAddr) -> Result<(), ServerError> {
        self.call(|reply| SessionCommand::Attach {
            pid,
            controller,
            reply,
        })
        .await
    }

    pub async fn detach(&self) -> Result<(), ServerError> {
        self.call(|reply| SessionCommand::Detach { reply }).await
    }

    pub async fn set_breakpoint(&self, request: BreakpointRequest) -> Result<(), ServerError> {
        self.call(|reply| SessionCommand::SetBreakpoint { request, reply })
            .await
    }

    pub async fn set_watchpoint(&self, request: WatchpointRequest) -> Result<(), ServerError> {
        self.call(|reply| SessionCommand::SetWatchpoint { request, reply })
            .await
    }

    pub async fn list_threads(&self) -> Result<Vec<u32>, ServerError> {
        self.call(|reply| SessionCommand::ListThreads { reply }).await
    }

    pub async fn stop_thread(&self, lwpid: u32) -> Result<(), ServerError> {
        self.call(|reply| SessionCommand::StopThread { lwpid, reply })
            .await
    }

    pub async fn resume_thread(&self, lwpid: u32) -> Result<(), ServerError> {
        self.call(|reply| SessionCommand::ResumeThread { lwpid, reply })
            .await
    }

    pub async fn get_registers(&self, lwpid: u32) -> Result<GeneralRegisters, ServerError> {
        self.call(|reply| SessionCommand::GetRegisters { lwpid, reply })
            .await
    }

    pub async fn set_registers(
        &self,
        lwpid: u32,
        regs: GeneralRegisters,
    ) -> Result<(), ServerError> {
        self.call(|reply| SessionCommand::SetRegisters { lwpid, regs, reply })
            .await
    }

    pub async fn get_fp_registers(&self, lwpid: u32) -> Result<FpRegisters, ServerError> {
        self.call(|reply| SessionCommand::GetFpRegisters { lwpid, reply })
            .await
    }

    pub async fn set_fp_registers(&self, lwpid: u32, regs: FpRegisters) -> Result<(), ServerError> {
        let regs = Box::new(regs);
        self.call(|reply| SessionCommand::SetFpRegisters { lwpid, regs, reply })
            .await
    }

    pub async fn get_debug_registers(&self, lwpid: u32) -> Result<DebugRegisters, ServerError> {
        self.call(|reply| SessionCommand::GetDebugRegisters { lwpid, reply })
            .await
    }

    pub async fn set_debug_registers(
        &self,
        lwpid: u32,
        regs: DebugRegisters,
    ) -> Result<(), ServerError> {
        self.call(|reply| SessionCommand::SetDebugRegisters { lwpid, regs, reply })
            .await
    }

    /// Check that a register write of `length` bytes may be acked.
    pub async fn check_register_write(
        &self,
        kind: RegisterKind,
        length: u32,
    ) -> Result<(), ServerError> {
        self.call(|reply| SessionCommand::CheckRegisterWrite {
            kind,
            length,
            reply,
        })
        .await
    }

    pub async fn stop_go(&self, mode: StopGoMode) -> Result<(), ServerError> {
        self.call(|reply| SessionCommand::StopGo { mode, reply }).await
    }

    pub async fn thread_info(&self, lwpid: u32) -> Result<ThreadInfoResponse, ServerError> {
        self.call(|reply| SessionCommand::ThreadInfo { lwpid, reply })
            .await
    }

    pub async fn single_step(&self) -> Result<(), ServerError> {
        self.call(|reply| SessionCommand::SingleStep { reply }).await
    }

    pub async fn read_memory(
        &self,
        pid: u32,
        address: u64,
        length: usize,
    ) -> Result<Vec<u8>, ServerError> {
        self.call(|reply| SessionCommand::ReadMemory {
            pid,
            address,
            length,
            reply,
        })
        .await
    }

    pub async fn write_memory(
        &self,
        pid: u32,
        address: u64,
        data: Vec<u8>,
    ) -> Result<(), ServerError> {
        self.call(|reply| SessionCommand::WriteMemory {
            pid,
            address,
            data,
            reply,
        })
        .await
    }

    pub async fn memory_map(&self, pid: u32) -> Result<Vec<MemoryRegion>, ServerError> {
        self.call(|reply| SessionCommand::MemoryMap { pid, reply })
            .await
    }

    pub async fn process_list(&self) -> Result<Vec<ProcessSummary>, ServerError> {
        self.call(|reply| SessionCommand::ProcessList { reply }).await
    }

    pub async fn process_info(&self, pid: u32) -> Result<ProcessDetails, ServerError> {
        self.call(|reply| SessionCommand::ProcessInfo { pid, reply })
            .await
    }

    pub async fn scan(
        &self,
        query: ScanQuery,
        regions: Vec<MemoryRegion>,
    ) -> Result<ScanOutcome, ServerError> {
        self.call(|reply| SessionCommand::Scan {
            query,
            regions,
            reply,
        })
        .await
    }

    /// Ask the actor to detach and exit. Pending requests queued before
    /// this one are still served.
    pub fn shutdown(&self) {
        let _ = self.tx.send(SessionCommand::Shutdown);
    }
}
