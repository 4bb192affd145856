//! Per-connection command dispatch.
//!
//! Reads packets one at a time and runs each to completion before the
//! next. A handler that fails before sending its final reply leaves the
//! status to [`serve_connection`], which maps the error through
//! [`ServerError::status`].

use std::net::IpAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use ptrap_debug::RegisterKind;
use ptrap_scan::{CompareOp, ScanQuery, ValueType};
use ptrap_wire::response::{encode_map_entries, encode_process_list, encode_thread_list};
use ptrap_wire::transport::{
    read_header, recv_exact, send_scan_results, send_status, send_status_with,
};
use ptrap_wire::{
    AttachRequest, BreakpointRequest, Command, DebugRegisters, FpRegisters, GeneralRegisters,
    MapsRequest, MemoryRequest, ProcInfoRequest, ProcInfoResponse, ProcListEntry, ScanRequest,
    SetRegistersRequest, Status, StopGoRequest, ThreadRequest, WatchpointRequest,
    NET_MAX_LENGTH,
};

use crate::actor::SessionHandle;
use crate::error::ServerError;

/// Largest request payload accepted in a packet.
pub const MAX_PAYLOAD: u32 = 64 * 1024;

/// Largest scan value accepted after the ack.
pub const MAX_SCAN_VALUE: u32 = 64 * 1024;

/// Serve one controller connection until it closes.
///
/// Returns `Ok(())` when the peer disconnects between packets and an
/// error when the connection had to be dropped.
pub async fn serve_connection<S>(
    stream: &mut S,
    peer: IpAddr,
    session: &SessionHandle,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let Some(header) = read_header(stream).await? else {
            return Ok(());
        };
        if header.data_len > MAX_PAYLOAD {
            send_status(stream, Status::TooMuchData).await?;
            return Err(ServerError::PayloadTooLarge(header.data_len));
        }
        let payload = recv_exact(stream, header.data_len as usize).await?;

        let command = match header.command() {
            Ok(command) => command,
            Err(e) => {
                warn!(%peer, error = %e, "rejecting request");
                send_status(stream, Status::Error).await?;
                continue;
            }
        };
        debug!(%peer, ?command, len = payload.len(), "request");

        match handle(command, &payload, stream, peer, session).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                let status = e.status();
                debug!(?command, ?status, error = %e, "request failed");
                send_status(stream, status).await?;
            }
        }
    }
}

async fn handle<S>(
    command: Command,
    payload: &[u8],
    stream: &mut S,
    peer: IpAddr,
    session: &SessionHandle,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match command {
        Command::ProcList => proc_list(stream, session).await,
        Command::ProcInfo => proc_info(payload, stream, session).await,
        Command::ProcRead => proc_read(payload, stream, session).await,
        Command::ProcWrite => proc_write(payload, stream, session).await,
        Command::ProcMaps => proc_maps(payload, stream, session).await,
        Command::Scan => scan(payload, stream, session).await,
        Command::Attach => {
            let req = AttachRequest::decode(payload)?;
            session.attach(req.pid, peer).await?;
            success(stream).await
        }
        Command::Detach => {
            session.detach().await?;
            success(stream).await
        }
        Command::SetBreakpoint => {
            session
                .set_breakpoint(BreakpointRequest::decode(payload)?)
                .await?;
            success(stream).await
        }
        Command::SetWatchpoint => {
            session
                .set_watchpoint(WatchpointRequest::decode(payload)?)
                .await?;
            success(stream).await
        }
        Command::ListThreads => {
            let threads = session.list_threads().await?;
            reply(stream, &encode_thread_list(&threads)).await
        }
        Command::StopThread => {
            let req = ThreadRequest::decode(payload)?;
            session.stop_thread(req.lwpid).await?;
            success(stream).await
        }
        Command::ResumeThread => {
            let req = ThreadRequest::decode(payload)?;
            session.resume_thread(req.lwpid).await?;
            success(stream).await
        }
        Command::GetRegisters => {
            let req = ThreadRequest::decode(payload)?;
            let regs = session.get_registers(req.lwpid).await?;
            reply(stream, &regs.encode()).await
        }
        Command::GetFpRegisters => {
            let req = ThreadRequest::decode(payload)?;
            let regs = session.get_fp_registers(req.lwpid).await?;
            reply(stream, &regs.encode()).await
        }
        Command::GetDebugRegisters => {
            let req = ThreadRequest::decode(payload)?;
            let regs = session.get_debug_registers(req.lwpid).await?;
            reply(stream, &regs.encode()).await
        }
        Command::SetRegisters => {
            let (lwpid, data) =
                register_record(payload, RegisterKind::General, stream, session).await?;
            session
                .set_registers(lwpid, GeneralRegisters::decode(&data)?)
                .await?;
            success(stream).await
        }
        Command::SetFpRegisters => {
            let (lwpid, data) =
                register_record(payload, RegisterKind::Fp, stream, session).await?;
            session
                .set_fp_registers(lwpid, FpRegisters::decode(&data)?)
                .await?;
            success(stream).await
        }
        Command::SetDebugRegisters => {
            let (lwpid, data) =
                register_record(payload, RegisterKind::Debug, stream, session).await?;
            session
                .set_debug_registers(lwpid, DebugRegisters::decode(&data)?)
                .await?;
            success(stream).await
        }
        Command::StopGo => {
            let req = StopGoRequest::decode(payload)?;
            session.stop_go(req.mode).await?;
            success(stream).await
        }
        Command::ThreadInfo => {
            let req = ThreadRequest::decode(payload)?;
            let info = session.thread_info(req.lwpid).await?;
            reply(stream, &info.encode()).await
        }
        Command::SingleStep => {
            session.single_step().await?;
            success(stream).await
        }
    }
}

async fn success<S>(stream: &mut S) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    Ok(send_status(stream, Status::Success).await?)
}

async fn reply<S>(stream: &mut S, data: &[u8]) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    Ok(send_status_with(stream, Status::Success, data).await?)
}

/// Validate, ack and receive the record of a Set*Registers exchange.
async fn register_record<S>(
    payload: &[u8],
    kind: RegisterKind,
    stream: &mut S,
    session: &SessionHandle,
) -> Result<(u32, Vec<u8>), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let req = SetRegistersRequest::decode(payload)?;
    session.check_register_write(kind, req.length).await?;
    send_status(stream, Status::Success).await?;
    let data = recv_exact(stream, req.length as usize).await?;
    Ok((req.lwpid, data))
}

/// An empty process list is answered with `DataNull`.
async fn proc_list<S>(stream: &mut S, session: &SessionHandle) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    let processes = session.process_list().await?;
    if processes.is_empty() {
        return Ok(send_status(stream, Status::DataNull).await?);
    }
    let entries: Vec<_> = processes
        .into_iter()
        .map(|p| ProcListEntry {
            name: p.name,
            pid: p.pid,
        })
        .collect();
    reply(stream, &encode_process_list(&entries)).await
}

async fn proc_info<S>(payload: &[u8], stream: &mut S, session: &SessionHandle) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    let req = ProcInfoRequest::decode(payload)?;
    let info = session.process_info(req.pid).await?;
    let response = ProcInfoResponse {
        pid: info.pid,
        name: info.name,
        path: info.path,
        ..ProcInfoResponse::default()
    };
    reply(stream, &response.encode()).await
}

async fn proc_read<S>(payload: &[u8], stream: &mut S, session: &SessionHandle) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    let req = MemoryRequest::decode(payload)?;
    let data = session
        .read_memory(req.pid, req.address, req.length as usize)
        .await?;
    reply(stream, &data).await
}

/// Ack, then receive the data chunk by chunk, writing each chunk as it
/// arrives. After a failed write the rest is drained unwritten.
async fn proc_write<S>(payload: &[u8], stream: &mut S, session: &SessionHandle) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let req = MemoryRequest::decode(payload)?;
    send_status(stream, Status::Success).await?;

    let total = req.length as usize;
    let mut offset = 0usize;
    let mut failure = None;
    while offset < total {
        let n = (total - offset).min(NET_MAX_LENGTH);
        let chunk = recv_exact(stream, n).await?;
        if failure.is_none() {
            let address = req.address.wrapping_add(offset as u64);
            if let Err(e) = session.write_memory(req.pid, address, chunk).await {
                failure = Some(e);
            }
        }
        offset += n;
    }
    match failure {
        Some(e) => Err(e),
        None => success(stream).await,
    }
}

async fn proc_maps<S>(payload: &[u8], stream: &mut S, session: &SessionHandle) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    let req = MapsRequest::decode(payload)?;
    let regions = session.memory_map(req.pid).await?;
    let entries: Vec<_> = regions.iter().map(|r| r.to_map_entry()).collect();
    reply(stream, &encode_map_entries(&entries)).await
}

async fn scan<S>(payload: &[u8], stream: &mut S, session: &SessionHandle) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let req = ScanRequest::decode(payload)?;
    let value_type = ValueType::from_code(req.value_type)?;
    let compare = CompareOp::from_code(req.compare_op)?;
    value_type.check_payload_len(req.length as usize)?;
    if req.length > MAX_SCAN_VALUE {
        return Err(ServerError::ValueTooLarge(req.length));
    }
    send_status(stream, Status::Success).await?;

    let value = recv_exact(stream, req.length as usize).await?;
    let query = ScanQuery::from_payload(req.pid, value_type, compare, &value)?;

    let regions = match session.memory_map(req.pid).await {
        Ok(regions) => regions,
        Err(e) => {
            warn!(pid = req.pid, error = %e, "scan aborted, no memory map");
            send_status(stream, Status::Error).await?;
            return Ok(());
        }
    };
    send_status(stream, Status::Success).await?;

    match session.scan(query, regions).await {
        Ok(outcome) => send_scan_results(stream, &outcome.matches).await?,
        Err(e) => {
            warn!(pid = req.pid, error = %e, "scan failed");
            send_scan_results(stream, &[]).await?;
        }
    }
    Ok(())
}
