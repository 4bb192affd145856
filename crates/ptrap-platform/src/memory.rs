//! Memory-region model shared by backends and the scan engine.

use ptrap_wire::MapEntry;

/// Access permissions of a mapped region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Protection {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl Protection {
    pub const READ: u16 = 0x1;
    pub const WRITE: u16 = 0x2;
    pub const EXECUTE: u16 = 0x4;

    pub const fn new(read: bool, write: bool, execute: bool) -> Self {
        Self {
            read,
            write,
            execute,
        }
    }

    pub const fn read_write() -> Self {
        Self::new(true, true, false)
    }

    pub const fn read_only() -> Self {
        Self::new(true, false, false)
    }

    /// Wire bit set: 1 read, 2 write, 4 execute.
    pub fn bits(self) -> u16 {
        let mut bits = 0;
        if self.read {
            bits |= Self::READ;
        }
        if self.write {
            bits |= Self::WRITE;
        }
        if self.execute {
            bits |= Self::EXECUTE;
        }
        bits
    }

    pub fn from_bits(bits: u16) -> Self {
        Self::new(
            bits & Self::READ != 0,
            bits & Self::WRITE != 0,
            bits & Self::EXECUTE != 0,
        )
    }
}

/// One mapped address range `[start, end)` of a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    /// Offset into the backing object.
    pub offset: u64,
    pub protection: Protection,
    /// Backing path or pseudo-name such as `[heap]`; may be empty.
    pub name: String,
}

impl MemoryRegion {
    pub fn new(start: u64, end: u64, protection: Protection, name: impl Into<String>) -> Self {
        Self {
            start,
            end,
            offset: 0,
            protection,
            name: name.into(),
        }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }

    pub fn is_readable(&self) -> bool {
        self.protection.read
    }

    /// Wire form; the name keeps only its last path component.
    pub fn to_map_entry(&self) -> MapEntry {
        let name = self.name.rsplit('/').next().unwrap_or_default();
        MapEntry {
            name: name.to_string(),
            start: self.start,
            end: self.end,
            offset: self.offset,
            prot: self.protection.bits(),
        }
    }
}
