//! Command codes and the 12-byte packet header.

use crate::codec::{ByteReader, ByteWriter};
use crate::error::WireError;

/// Magic value that starts every request packet.
pub const PACKET_MAGIC: u32 = 0xFFAA_BBCC;

/// Encoded size of [`PacketHeader`].
pub const PACKET_HEADER_SIZE: usize = 12;

/// A request command understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    ProcList = 0xBDAA_0001,
    ProcRead = 0xBDAA_0002,
    ProcWrite = 0xBDAA_0003,
    ProcMaps = 0xBDAA_0004,
    Scan = 0xBDAA_0009,
    ProcInfo = 0xBDAA_000A,

    Attach = 0xBDBB_0001,
    Detach = 0xBDBB_0002,
    SetBreakpoint = 0xBDBB_0003,
    SetWatchpoint = 0xBDBB_0004,
    ListThreads = 0xBDBB_0005,
    StopThread = 0xBDBB_0006,
    ResumeThread = 0xBDBB_0007,
    GetRegisters = 0xBDBB_0008,
    SetRegisters = 0xBDBB_0009,
    GetFpRegisters = 0xBDBB_000A,
    SetFpRegisters = 0xBDBB_000B,
    GetDebugRegisters = 0xBDBB_000C,
    SetDebugRegisters = 0xBDBB_000D,
    StopGo = 0xBDBB_0010,
    ThreadInfo = 0xBDBB_0011,
    SingleStep = 0xBDBB_0012,
}

impl Command {
    const ALL: [Command; 22] = [
        Command::ProcList,
        Command::ProcRead,
        Command::ProcWrite,
        Command::ProcMaps,
        Command::Scan,
        Command::ProcInfo,
        Command::Attach,
        Command::Detach,
        Command::SetBreakpoint,
        Command::SetWatchpoint,
        Command::ListThreads,
        Command::StopThread,
        Command::ResumeThread,
        Command::GetRegisters,
        Command::SetRegisters,
        Command::GetFpRegisters,
        Command::SetFpRegisters,
        Command::GetDebugRegisters,
        Command::SetDebugRegisters,
        Command::StopGo,
        Command::ThreadInfo,
        Command::SingleStep,
    ];

    /// Raw wire value.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up a command by its raw code.
    pub fn from_code(code: u32) -> Result<Self, WireError> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or(WireError::UnknownCommand(code))
    }

    /// Whether the command acts on the attached debug session.
    pub fn is_debug(self) -> bool {
        self.code() & 0xFFFF_0000 == 0xBDBB_0000
    }
}

/// Header preceding every request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Raw command code; validated separately so unknown commands can
    /// still be answered with a status.
    pub cmd: u32,
    /// Number of payload bytes following the header.
    pub data_len: u32,
}

impl PacketHeader {
    pub fn new(cmd: Command, data_len: u32) -> Self {
        Self {
            cmd: cmd.code(),
            data_len,
        }
    }

    pub fn encode(&self) -> [u8; PACKET_HEADER_SIZE] {
        let mut w = ByteWriter::with_capacity(PACKET_HEADER_SIZE);
        w.u32(PACKET_MAGIC).u32(self.cmd).u32(self.data_len);
        let mut out = [0u8; PACKET_HEADER_SIZE];
        out.copy_from_slice(&w.finish());
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(data, "packet header");
        r.require(PACKET_HEADER_SIZE)?;
        let magic = r.u32()?;
        if magic != PACKET_MAGIC {
            return Err(WireError::BadMagic(magic));
        }
        Ok(Self {
            cmd: r.u32()?,
            data_len: r.u32()?,
        })
    }

    /// The decoded command, if known.
    pub fn command(&self) -> Result<Command, WireError> {
        Command::from_code(self.cmd)
    }
}
