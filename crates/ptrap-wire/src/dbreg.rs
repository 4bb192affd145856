//! Hardware debug registers and the DR7 control-register layout.
//!
//! Slot `i` (0..4) owns address register DRi, two enable bits at
//! `2*i` and a four-bit field at `16 + 4*i` holding `len << 2 | access`.

use crate::codec::{ByteReader, ByteWriter};
use crate::error::WireError;
use crate::MAX_WATCHPOINTS;

/// Local-enable bit for a slot.
pub const DR7_LOCAL_ENABLE: u64 = 0x1;
/// Global-enable bit for a slot.
pub const DR7_GLOBAL_ENABLE: u64 = 0x2;

/// Watched-region length, encoded as its DR7 length code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchLength {
    Byte1,
    Byte2,
    Byte4,
    Byte8,
}

impl WatchLength {
    pub fn code(self) -> u8 {
        match self {
            Self::Byte1 => 0,
            Self::Byte2 => 1,
            Self::Byte8 => 2,
            Self::Byte4 => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, WireError> {
        match code {
            0 => Ok(Self::Byte1),
            1 => Ok(Self::Byte2),
            2 => Ok(Self::Byte8),
            3 => Ok(Self::Byte4),
            other => Err(WireError::InvalidField {
                field: "watch length",
                value: u64::from(other),
            }),
        }
    }

    /// Length in bytes.
    pub fn bytes(self) -> usize {
        match self {
            Self::Byte1 => 1,
            Self::Byte2 => 2,
            Self::Byte4 => 4,
            Self::Byte8 => 8,
        }
    }
}

/// Access kind that triggers a watchpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchAccess {
    Execute,
    Write,
    ReadWrite,
}

impl WatchAccess {
    pub fn code(self) -> u8 {
        match self {
            Self::Execute => 0,
            Self::Write => 1,
            Self::ReadWrite => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, WireError> {
        match code {
            0 => Ok(Self::Execute),
            1 => Ok(Self::Write),
            3 => Ok(Self::ReadWrite),
            other => Err(WireError::InvalidField {
                field: "watch access type",
                value: u64::from(other),
            }),
        }
    }
}

/// Decoded view of one DR7 slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSlot {
    pub length: WatchLength,
    pub access: WatchAccess,
    pub local: bool,
    pub global: bool,
}

/// DR7 control-register value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dr7(pub u64);

impl Dr7 {
    /// Bits owned by slot `index`.
    pub fn mask(index: usize) -> u64 {
        (0xF << (16 + 4 * index)) | (0x3 << (2 * index))
    }

    /// Bits that configure slot `index` with the given fields.
    pub fn field(index: usize, len: u8, access: u8, enable: u64) -> u64 {
        ((u64::from(len) << 2 | u64::from(access)) << (16 + 4 * index)) | (enable << (2 * index))
    }

    pub fn clear(&mut self, index: usize) {
        self.0 &= !Self::mask(index);
    }

    /// Enable slot `index` locally and globally.
    pub fn enable(&mut self, index: usize, length: WatchLength, access: WatchAccess) {
        self.clear(index);
        self.0 |= Self::field(
            index,
            length.code(),
            access.code(),
            DR7_LOCAL_ENABLE | DR7_GLOBAL_ENABLE,
        );
    }

    /// Decode slot `index`, or `None` when neither enable bit is set.
    pub fn slot(&self, index: usize) -> Option<WatchSlot> {
        let enable = (self.0 >> (2 * index)) & 0x3;
        if enable == 0 {
            return None;
        }
        let nibble = ((self.0 >> (16 + 4 * index)) & 0xF) as u8;
        Some(WatchSlot {
            length: WatchLength::from_code(nibble >> 2).ok()?,
            access: WatchAccess::from_code(nibble & 0x3).ok()?,
            local: enable & DR7_LOCAL_ENABLE != 0,
            global: enable & DR7_GLOBAL_ENABLE != 0,
        })
    }
}

/// Debug-register block: DR0–DR15 as 16 × u64 (128 bytes).
///
/// Slots 0–3 hold watched addresses and slot 7 holds DR7.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugRegisters {
    pub dr: [u64; 16],
}

impl DebugRegisters {
    pub const SIZE: usize = 128;

    pub fn control(&self) -> Dr7 {
        Dr7(self.dr[7])
    }

    pub fn set_control(&mut self, dr7: Dr7) {
        self.dr[7] = dr7.0;
    }

    /// Arm watch slot `index` at `address`.
    pub fn set_watch(
        &mut self,
        index: usize,
        address: u64,
        length: WatchLength,
        access: WatchAccess,
    ) {
        debug_assert!(index < MAX_WATCHPOINTS);
        let mut dr7 = self.control();
        dr7.enable(index, length, access);
        self.dr[index] = address;
        self.set_control(dr7);
    }

    /// Disarm watch slot `index` and zero its address register.
    pub fn clear_watch(&mut self, index: usize) {
        debug_assert!(index < MAX_WATCHPOINTS);
        let mut dr7 = self.control();
        dr7.clear(index);
        self.dr[index] = 0;
        self.set_control(dr7);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        self.write_to(&mut w);
        w.finish()
    }

    pub(crate) fn write_to(&self, w: &mut ByteWriter) {
        for v in self.dr {
            w.u64(v);
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(data, "debug registers");
        r.require(Self::SIZE)?;
        Self::read_from(&mut r)
    }

    pub(crate) fn read_from(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let mut dr = [0u64; 16];
        for v in dr.iter_mut() {
            *v = r.u64()?;
        }
        Ok(Self { dr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_covers_enable_and_field_bits() {
        assert_eq!(Dr7::mask(0), 0x000F_0003);
        assert_eq!(Dr7::mask(3), 0xF000_00C0);
    }

    #[test]
    fn field_places_length_and_access() {
        // slot 1, 4-byte write, local+global
        let bits = Dr7::field(1, 3, 1, 3);
        assert_eq!(bits, (0xD << 20) | (0x3 << 2));
    }

    #[test]
    fn enabled_slot_decodes_to_requested_fields() {
        for index in 0..MAX_WATCHPOINTS {
            for length in [
                WatchLength::Byte1,
                WatchLength::Byte2,
                WatchLength::Byte4,
                WatchLength::Byte8,
            ] {
                for access in [WatchAccess::Execute, WatchAccess::Write, WatchAccess::ReadWrite] {
                    let mut regs = DebugRegisters::default();
                    regs.set_watch(index, 0x7000_0000, length, access);
                    let slot = regs.control().slot(index).unwrap();
                    assert_eq!(slot.length, length);
                    assert_eq!(slot.access, access);
                    assert!(slot.local && slot.global);
                    assert_eq!(regs.dr[index], 0x7000_0000);
                }
            }
        }
    }

    #[test]
    fn cleared_slot_decodes_disabled_and_zero_address() {
        let mut regs = DebugRegisters::default();
        regs.set_watch(2, 0x1234, WatchLength::Byte8, WatchAccess::ReadWrite);
        regs.clear_watch(2);
        assert_eq!(regs.control().slot(2), None);
        assert_eq!(regs.dr[2], 0);
        assert_eq!(regs.dr[7] & Dr7::mask(2), 0);
    }

    #[test]
    fn slots_do_not_interfere() {
        let mut regs = DebugRegisters::default();
        regs.set_watch(0, 0x10, WatchLength::Byte1, WatchAccess::Execute);
        regs.set_watch(3, 0x40, WatchLength::Byte4, WatchAccess::Write);
        regs.clear_watch(0);
        let slot3 = regs.control().slot(3).unwrap();
        assert_eq!(slot3.length, WatchLength::Byte4);
        assert_eq!(slot3.access, WatchAccess::Write);
        assert_eq!(regs.dr[3], 0x40);
    }

    #[test]
    fn re_enabling_a_slot_replaces_its_fields() {
        let mut regs = DebugRegisters::default();
        regs.set_watch(1, 0x10, WatchLength::Byte8, WatchAccess::ReadWrite);
        regs.set_watch(1, 0x20, WatchLength::Byte1, WatchAccess::Write);
        let slot = regs.control().slot(1).unwrap();
        assert_eq!(slot.length, WatchLength::Byte1);
        assert_eq!(slot.access, WatchAccess::Write);
        assert_eq!(regs.dr[1], 0x20);
    }

    #[test]
    fn raw_codes_are_validated() {
        assert!(WatchLength::from_code(4).is_err());
        assert!(WatchAccess::from_code(2).is_err());
        assert_eq!(WatchLength::from_code(3).unwrap().bytes(), 4);
        assert_eq!(WatchLength::from_code(2).unwrap().bytes(), 8);
    }

    #[test]
    fn block_encodes_sixteen_words() {
        let mut regs = DebugRegisters::default();
        regs.dr[15] = 0xFFFF;
        let bytes = regs.encode();
        assert_eq!(bytes.len(), 128);
        assert_eq!(&bytes[120..], &0xFFFFu64.to_le_bytes());
        assert_eq!(DebugRegisters::decode(&bytes).unwrap(), regs);
    }
}
