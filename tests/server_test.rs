use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use ptrap::{Server, ServerError};
use ptrap_config::Config;
use ptrap_platform::control::{SIGSTOP, SIGTRAP};
use ptrap_platform::{InMemoryProcess, Protection, StopEvent};
use ptrap_wire::transport::{read_scan_results, read_status, send_packet};
use ptrap_wire::{
    AttachRequest, BreakpointRequest, Command, DebugRegisters, InterruptPacket, ScanRequest,
    SetRegistersRequest, Status, ThreadRequest, WatchpointRequest,
};

const PID: u32 = 100;
const TEXT: u64 = 0x40_0000;

struct Rig {
    proc: InMemoryProcess,
    client: TcpStream,
    notify: TcpListener,
    stop: oneshot::Sender<()>,
    server: JoinHandle<Result<(), ServerError>>,
}

async fn rig() -> Rig {
    let proc = InMemoryProcess::new(PID);
    proc.add_thread(101, "render");
    proc.map(TEXT, vec![0x90; 0x1000], Protection::new(true, false, true), "/app/eboot.bin");

    let notify = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = Config::default();
    config.server.bind = "127.0.0.1".into();
    config.server.port = 0;
    config.server.notify_port = notify.local_addr().unwrap().port();
    config.debug.interrupt_poll_ms = 5;

    let server = Server::bind(&config, Box::new(proc.clone())).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel();
    let server = tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));
    let client = TcpStream::connect(addr).await.unwrap();

    Rig {
        proc,
        client,
        notify,
        stop,
        server,
    }
}

async fn request(client: &mut TcpStream, cmd: Command, payload: &[u8]) -> Option<Status> {
    send_packet(client, cmd, payload).await.unwrap();
    Status::from_code(read_status(client).await.unwrap())
}

async fn attach(rig: &mut Rig) -> TcpStream {
    let req = AttachRequest { pid: PID };
    assert_eq!(
        request(&mut rig.client, Command::Attach, &req.encode()).await,
        Some(Status::Success)
    );
    let (channel, _) = rig.notify.accept().await.unwrap();
    channel
}

async fn shutdown(rig: Rig) -> InMemoryProcess {
    let _ = rig.stop.send(());
    rig.server.await.unwrap().unwrap();
    rig.proc
}

#[tokio::test]
async fn breakpoint_and_debug_register_session() {
    let mut rig = rig().await;
    let _channel = attach(&mut rig).await;
    assert!(rig.proc.is_attached());

    let bp = BreakpointRequest {
        index: 0,
        address: TEXT,
        enabled: true,
    };
    assert_eq!(
        request(&mut rig.client, Command::SetBreakpoint, &bp.encode()).await,
        Some(Status::Success)
    );
    assert_eq!(rig.proc.memory_at(TEXT, 1).unwrap(), [0xCC]);

    let get = ThreadRequest { lwpid: PID };
    assert_eq!(
        request(&mut rig.client, Command::GetDebugRegisters, &get.encode()).await,
        Some(Status::Success)
    );
    let mut raw = vec![0u8; DebugRegisters::SIZE];
    rig.client.read_exact(&mut raw).await.unwrap();
    assert_eq!(DebugRegisters::decode(&raw).unwrap(), DebugRegisters::default());

    let set = SetRegistersRequest {
        lwpid: PID,
        length: DebugRegisters::SIZE as u32,
    };
    assert_eq!(
        request(&mut rig.client, Command::SetDebugRegisters, &set.encode()).await,
        Some(Status::Success)
    );
    rig.client
        .write_all(&DebugRegisters::default().encode())
        .await
        .unwrap();
    assert_eq!(
        Status::from_code(read_status(&mut rig.client).await.unwrap()),
        Some(Status::Success)
    );

    assert_eq!(
        request(&mut rig.client, Command::Detach, &[]).await,
        Some(Status::Success)
    );
    assert_eq!(rig.proc.memory_at(TEXT, 1).unwrap(), [0x90]);
    assert!(!rig.proc.is_attached());
    shutdown(rig).await;
}

#[tokio::test]
async fn second_attach_reports_already_debugging() {
    let mut rig = rig().await;
    let _channel = attach(&mut rig).await;
    let req = AttachRequest { pid: 200 };
    assert_eq!(
        request(&mut rig.client, Command::Attach, &req.encode()).await,
        Some(Status::AlreadyDebugging)
    );
    assert!(rig.proc.is_attached());
    shutdown(rig).await;
}

#[tokio::test]
async fn out_of_range_slots_are_invalid_index() {
    let mut rig = rig().await;
    let _channel = attach(&mut rig).await;
    let bp = BreakpointRequest {
        index: 30,
        address: TEXT,
        enabled: true,
    };
    assert_eq!(
        request(&mut rig.client, Command::SetBreakpoint, &bp.encode()).await,
        Some(Status::InvalidIndex)
    );
    let wp = WatchpointRequest {
        index: 4,
        address: TEXT,
        length: 0,
        access: 1,
        enabled: true,
    };
    assert_eq!(
        request(&mut rig.client, Command::SetWatchpoint, &wp.encode()).await,
        Some(Status::InvalidIndex)
    );
    shutdown(rig).await;
}

#[tokio::test]
async fn traps_arrive_on_the_notification_channel() {
    let mut rig = rig().await;
    let mut channel = attach(&mut rig).await;

    rig.proc.push_stop(StopEvent::stopped(101, SIGSTOP));
    rig.proc.push_stop(StopEvent::stopped(101, SIGTRAP));

    let mut raw = vec![0u8; InterruptPacket::SIZE];
    tokio::time::timeout(Duration::from_secs(5), channel.read_exact(&mut raw))
        .await
        .expect("interrupt within timeout")
        .unwrap();
    let packet = InterruptPacket::decode(&raw).unwrap();
    assert_eq!(packet.lwpid, 101);
    assert_eq!(packet.status, 0x57F);
    assert_eq!(packet.thread_name, "render");
    shutdown(rig).await;
}

#[tokio::test]
async fn scan_without_matches_sends_only_the_marker() {
    let mut rig = rig().await;
    let req = ScanRequest {
        pid: PID,
        value_type: 6,
        compare_op: 0,
        length: 8,
    };
    assert_eq!(
        request(&mut rig.client, Command::Scan, &req.encode()).await,
        Some(Status::Success)
    );
    rig.client
        .write_all(&0xDEAD_BEEF_u64.to_le_bytes())
        .await
        .unwrap();
    assert_eq!(
        Status::from_code(read_status(&mut rig.client).await.unwrap()),
        Some(Status::Success)
    );
    assert!(read_scan_results(&mut rig.client).await.unwrap().is_empty());
    shutdown(rig).await;
}

#[tokio::test]
async fn shutdown_detaches_the_active_session() {
    let mut rig = rig().await;
    let _channel = attach(&mut rig).await;
    let bp = BreakpointRequest {
        index: 3,
        address: TEXT + 0x10,
        enabled: true,
    };
    assert_eq!(
        request(&mut rig.client, Command::SetBreakpoint, &bp.encode()).await,
        Some(Status::Success)
    );
    let proc = shutdown(rig).await;
    assert!(!proc.is_attached());
    assert_eq!(proc.memory_at(TEXT + 0x10, 1).unwrap(), [0x90]);
}
