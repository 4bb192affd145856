//! Request payload layouts, one struct per command family.
//!
//! Decoding checks the full fixed size up front so a short payload is
//! reported as a single truncation error.

use crate::codec::{ByteReader, ByteWriter};
use crate::error::WireError;

macro_rules! fixed_request {
    ($ty:ident, $what:literal, $size:expr) => {
        impl $ty {
            pub const SIZE: usize = $size;

            pub fn decode(data: &[u8]) -> Result<Self, WireError> {
                let mut r = ByteReader::new(data, $what);
                r.require(Self::SIZE)?;
                Self::read(&mut r)
            }
        }
    };
}

/// Attach to a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachRequest {
    pub pid: u32,
}
fixed_request!(AttachRequest, "attach request", 4);

impl AttachRequest {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self { pid: r.u32()? })
    }

    pub fn encode(&self) -> Vec<u8> {
        self.pid.to_le_bytes().to_vec()
    }
}

/// Enable or disable a software breakpoint slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointRequest {
    pub index: u32,
    pub address: u64,
    pub enabled: bool,
}
fixed_request!(BreakpointRequest, "breakpoint request", 13);

impl BreakpointRequest {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            index: r.u32()?,
            address: r.u64()?,
            enabled: r.u8()? != 0,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        w.u32(self.index).u64(self.address).u8(self.enabled as u8);
        w.finish()
    }
}

/// Enable or disable a hardware watchpoint slot.
///
/// `length` and `access` are raw DR7 codes; the session validates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchpointRequest {
    pub index: u32,
    pub address: u64,
    pub length: u8,
    pub access: u8,
    pub enabled: bool,
}
fixed_request!(WatchpointRequest, "watchpoint request", 15);

impl WatchpointRequest {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            index: r.u32()?,
            address: r.u64()?,
            length: r.u8()?,
            access: r.u8()?,
            enabled: r.u8()? != 0,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        w.u32(self.index)
            .u64(self.address)
            .u8(self.length)
            .u8(self.access)
            .u8(self.enabled as u8);
        w.finish()
    }
}

/// Any request addressed to a single thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadRequest {
    pub lwpid: u32,
}
fixed_request!(ThreadRequest, "thread request", 4);

impl ThreadRequest {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self { lwpid: r.u32()? })
    }

    pub fn encode(&self) -> Vec<u8> {
        self.lwpid.to_le_bytes().to_vec()
    }
}

/// Header of a Set*Registers exchange; the record follows after the ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetRegistersRequest {
    pub lwpid: u32,
    pub length: u32,
}
fixed_request!(SetRegistersRequest, "set registers request", 8);

impl SetRegistersRequest {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            lwpid: r.u32()?,
            length: r.u32()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        w.u32(self.lwpid).u32(self.length);
        w.finish()
    }
}

/// Process-wide run control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopGoMode {
    Continue,
    Stop,
    Kill,
}

impl StopGoMode {
    pub fn code(self) -> u8 {
        match self {
            Self::Continue => 0,
            Self::Stop => 1,
            Self::Kill => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, WireError> {
        match code {
            0 => Ok(Self::Continue),
            1 => Ok(Self::Stop),
            2 => Ok(Self::Kill),
            other => Err(WireError::InvalidField {
                field: "stop/go mode",
                value: u64::from(other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopGoRequest {
    pub mode: StopGoMode,
}
fixed_request!(StopGoRequest, "stop/go request", 1);

impl StopGoRequest {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            mode: StopGoMode::from_code(r.u8()?)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![self.mode.code()]
    }
}

/// Header of a Scan exchange; the value bytes follow after the ack.
///
/// Type and comparator stay raw so the scan engine can reject them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    pub pid: u32,
    pub value_type: u8,
    pub compare_op: u8,
    pub length: u32,
}
fixed_request!(ScanRequest, "scan request", 10);

impl ScanRequest {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            pid: r.u32()?,
            value_type: r.u8()?,
            compare_op: r.u8()?,
            length: r.u32()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        w.u32(self.pid)
            .u8(self.value_type)
            .u8(self.compare_op)
            .u32(self.length);
        w.finish()
    }
}

/// ProcRead / ProcWrite header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequest {
    pub pid: u32,
    pub address: u64,
    pub length: u32,
}
fixed_request!(MemoryRequest, "memory request", 16);

impl MemoryRequest {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            pid: r.u32()?,
            address: r.u64()?,
            length: r.u32()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        w.u32(self.pid).u64(self.address).u32(self.length);
        w.finish()
    }
}

/// ProcMaps request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapsRequest {
    pub pid: u32,
}
fixed_request!(MapsRequest, "maps request", 4);

impl MapsRequest {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self { pid: r.u32()? })
    }

    pub fn encode(&self) -> Vec<u8> {
        self.pid.to_le_bytes().to_vec()
    }
}

/// ProcInfo request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcInfoRequest {
    pub pid: u32,
}
fixed_request!(ProcInfoRequest, "process info request", 4);

impl ProcInfoRequest {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self { pid: r.u32()? })
    }

    pub fn encode(&self) -> Vec<u8> {
        self.pid.to_le_bytes().to_vec()
    }
}
