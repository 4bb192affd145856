//! General-purpose and extended-state register records.
//!
//! Both records are x86-64 layouts transferred byte-for-byte. Every
//! byte has a home in the decoded struct, reserved and padding areas
//! included, so decode followed by encode reproduces the input exactly.

use crate::codec::{ByteReader, ByteWriter};
use crate::error::WireError;

/// General-purpose register record (176 bytes).
///
/// | Offset | Field |
/// |---|---|
/// | 0..120 | r15 r14 r13 r12 r11 r10 r9 r8 rdi rsi rbp rbx rdx rcx rax (u64 each) |
/// | 120 | trapno u32 |
/// | 124 | fs u16 |
/// | 126 | gs u16 |
/// | 128 | err u32 |
/// | 132 | es u16 |
/// | 134 | ds u16 |
/// | 136..176 | rip cs rflags rsp ss (u64 each) |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneralRegisters {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rbp: u64,
    pub rbx: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rax: u64,
    pub trapno: u32,
    pub fs: u16,
    pub gs: u16,
    pub err: u32,
    pub es: u16,
    pub ds: u16,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl GeneralRegisters {
    pub const SIZE: usize = 176;

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        self.write_to(&mut w);
        w.finish()
    }

    pub(crate) fn write_to(&self, w: &mut ByteWriter) {
        for v in [
            self.r15, self.r14, self.r13, self.r12, self.r11, self.r10, self.r9, self.r8,
            self.rdi, self.rsi, self.rbp, self.rbx, self.rdx, self.rcx, self.rax,
        ] {
            w.u64(v);
        }
        w.u32(self.trapno)
            .u16(self.fs)
            .u16(self.gs)
            .u32(self.err)
            .u16(self.es)
            .u16(self.ds);
        for v in [self.rip, self.cs, self.rflags, self.rsp, self.ss] {
            w.u64(v);
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(data, "general registers");
        r.require(Self::SIZE)?;
        Self::read_from(&mut r)
    }

    pub(crate) fn read_from(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            r15: r.u64()?,
            r14: r.u64()?,
            r13: r.u64()?,
            r12: r.u64()?,
            r11: r.u64()?,
            r10: r.u64()?,
            r9: r.u64()?,
            r8: r.u64()?,
            rdi: r.u64()?,
            rsi: r.u64()?,
            rbp: r.u64()?,
            rbx: r.u64()?,
            rdx: r.u64()?,
            rcx: r.u64()?,
            rax: r.u64()?,
            trapno: r.u32()?,
            fs: r.u16()?,
            gs: r.u16()?,
            err: r.u32()?,
            es: r.u16()?,
            ds: r.u16()?,
            rip: r.u64()?,
            cs: r.u64()?,
            rflags: r.u64()?,
            rsp: r.u64()?,
            ss: r.u64()?,
        })
    }
}

/// Legacy FXSAVE environment header (32 bytes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FpEnvironment {
    pub cw: u16,
    pub sw: u16,
    pub tw: u8,
    pub reserved: u8,
    pub opcode: u16,
    pub rip: u64,
    pub rdp: u64,
    pub mxcsr: u32,
    pub mxcsr_mask: u32,
}

/// One x87 accumulator: 80-bit value plus 6 bytes of padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FpAccumulator {
    pub value: [u8; 10],
    pub pad: [u8; 6],
}

/// x87 + SSE + AVX extended state record (832 bytes).
///
/// | Offset | Size | Field |
/// |---|---|---|
/// | 0 | 32 | environment |
/// | 32 | 128 | 8 × x87 accumulator (10 + 6 pad) |
/// | 160 | 256 | 16 × xmm |
/// | 416 | 96 | reserved |
/// | 512 | 8 | xstate_bv |
/// | 520 | 16 | xstate reserved |
/// | 536 | 40 | xstate reserved |
/// | 576 | 256 | 16 × ymm upper halves |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpRegisters {
    pub env: FpEnvironment,
    pub acc: [FpAccumulator; 8],
    pub xmm: [[u8; 16]; 16],
    pub pad: [u8; 96],
    pub xstate_bv: u64,
    pub xstate_reserved0: [u8; 16],
    pub xstate_reserved: [u8; 40],
    pub ymm_hi: [[u8; 16]; 16],
}

impl Default for FpRegisters {
    fn default() -> Self {
        Self {
            env: FpEnvironment::default(),
            acc: [FpAccumulator::default(); 8],
            xmm: [[0; 16]; 16],
            pad: [0; 96],
            xstate_bv: 0,
            xstate_reserved0: [0; 16],
            xstate_reserved: [0; 40],
            ymm_hi: [[0; 16]; 16],
        }
    }
}

impl FpRegisters {
    pub const SIZE: usize = 832;

    /// Size of the FXSAVE-compatible prefix.
    pub const FXSAVE_SIZE: usize = 512;

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        self.write_to(&mut w);
        w.finish()
    }

    pub(crate) fn write_to(&self, w: &mut ByteWriter) {
        let e = &self.env;
        w.u16(e.cw)
            .u16(e.sw)
            .u8(e.tw)
            .u8(e.reserved)
            .u16(e.opcode)
            .u64(e.rip)
            .u64(e.rdp)
            .u32(e.mxcsr)
            .u32(e.mxcsr_mask);
        for acc in &self.acc {
            w.bytes(&acc.value).bytes(&acc.pad);
        }
        for x in &self.xmm {
            w.bytes(x);
        }
        w.bytes(&self.pad)
            .u64(self.xstate_bv)
            .bytes(&self.xstate_reserved0)
            .bytes(&self.xstate_reserved);
        for y in &self.ymm_hi {
            w.bytes(y);
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(data, "fp registers");
        r.require(Self::SIZE)?;
        Self::read_from(&mut r)
    }

    pub(crate) fn read_from(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let env = FpEnvironment {
            cw: r.u16()?,
            sw: r.u16()?,
            tw: r.u8()?,
            reserved: r.u8()?,
            opcode: r.u16()?,
            rip: r.u64()?,
            rdp: r.u64()?,
            mxcsr: r.u32()?,
            mxcsr_mask: r.u32()?,
        };
        let mut acc = [FpAccumulator::default(); 8];
        for slot in acc.iter_mut() {
            slot.value = r.array()?;
            slot.pad = r.array()?;
        }
        let mut xmm = [[0u8; 16]; 16];
        for x in xmm.iter_mut() {
            *x = r.array()?;
        }
        let pad = r.array()?;
        let xstate_bv = r.u64()?;
        let xstate_reserved0 = r.array()?;
        let xstate_reserved = r.array()?;
        let mut ymm_hi = [[0u8; 16]; 16];
        for y in ymm_hi.iter_mut() {
            *y = r.array()?;
        }
        Ok(Self {
            env,
            acc,
            xmm,
            pad,
            xstate_bv,
            xstate_reserved0,
            xstate_reserved,
            ymm_hi,
        })
    }

    /// Build a record from a raw FXSAVE image; the AVX area stays zero.
    pub fn from_fxsave(fxsave: &[u8]) -> Result<Self, WireError> {
        let mut full = vec![0u8; Self::SIZE];
        let src = fxsave.get(..Self::FXSAVE_SIZE).ok_or(WireError::Truncated {
            what: "fxsave image",
            expected: Self::FXSAVE_SIZE,
            actual: fxsave.len(),
        })?;
        full[..Self::FXSAVE_SIZE].copy_from_slice(src);
        Self::decode(&full)
    }

    /// The FXSAVE-compatible prefix of this record.
    pub fn to_fxsave(&self) -> Vec<u8> {
        let mut bytes = self.encode();
        bytes.truncate(Self::FXSAVE_SIZE);
        bytes
    }
}
