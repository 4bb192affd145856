//! Trap-notification record pushed on the notification channel.

use crate::codec::{ByteReader, ByteWriter};
use crate::dbreg::DebugRegisters;
use crate::error::WireError;
use crate::regs::{FpRegisters, GeneralRegisters};
use crate::text::{decode_fixed, encode_fixed};

/// Width of the thread-name field.
pub const THREAD_NAME_WIDTH: usize = 40;

/// One trap event (1184 bytes).
///
/// Layout: lwpid u32, status u32, name[40], general registers (176),
/// fp registers (832), debug registers (128).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptPacket {
    pub lwpid: u32,
    /// Raw wait status of the stop.
    pub status: u32,
    pub thread_name: String,
    pub regs: GeneralRegisters,
    pub fp_regs: FpRegisters,
    pub debug_regs: DebugRegisters,
}

impl InterruptPacket {
    pub const SIZE: usize = 0x4A0;

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        w.u32(self.lwpid)
            .u32(self.status)
            .bytes(&encode_fixed(&self.thread_name, THREAD_NAME_WIDTH));
        self.regs.write_to(&mut w);
        self.fp_regs.write_to(&mut w);
        self.debug_regs.write_to(&mut w);
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(data, "interrupt packet");
        r.require(Self::SIZE)?;
        let lwpid = r.u32()?;
        let status = r.u32()?;
        let thread_name = decode_fixed(r.bytes(THREAD_NAME_WIDTH)?);
        Ok(Self {
            lwpid,
            status,
            thread_name,
            regs: GeneralRegisters::read_from(&mut r)?,
            fp_regs: FpRegisters::read_from(&mut r)?,
            debug_regs: DebugRegisters::read_from(&mut r)?,
        })
    }
}
