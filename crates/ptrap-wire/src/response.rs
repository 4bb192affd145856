//! Fixed-layout response payloads.

use crate::codec::{ByteReader, ByteWriter};
use crate::error::WireError;
use crate::text::{decode_fixed, encode_fixed};

/// Reply to ThreadInfo (40 bytes): lwpid u32, priority u32, name[32].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfoResponse {
    pub lwpid: u32,
    pub priority: u32,
    pub name: String,
}

impl ThreadInfoResponse {
    pub const SIZE: usize = 40;
    const NAME_WIDTH: usize = 32;

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        w.u32(self.lwpid)
            .u32(self.priority)
            .bytes(&encode_fixed(&self.name, Self::NAME_WIDTH));
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(data, "thread info");
        r.require(Self::SIZE)?;
        Ok(Self {
            lwpid: r.u32()?,
            priority: r.u32()?,
            name: decode_fixed(r.bytes(Self::NAME_WIDTH)?),
        })
    }
}

/// One memory-map entry (58 bytes): name[32], start, end, offset, prot u16.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub name: String,
    pub start: u64,
    pub end: u64,
    pub offset: u64,
    /// Protection bits: 1 read, 2 write, 4 execute.
    pub prot: u16,
}

impl MapEntry {
    pub const SIZE: usize = 58;
    const NAME_WIDTH: usize = 32;

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        w.bytes(&encode_fixed(&self.name, Self::NAME_WIDTH))
            .u64(self.start)
            .u64(self.end)
            .u64(self.offset)
            .u16(self.prot);
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(data, "map entry");
        r.require(Self::SIZE)?;
        Ok(Self {
            name: decode_fixed(r.bytes(Self::NAME_WIDTH)?),
            start: r.u64()?,
            end: r.u64()?,
            offset: r.u64()?,
            prot: r.u16()?,
        })
    }
}

/// One ProcList entry (36 bytes): name[32], pid u32.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcListEntry {
    pub name: String,
    pub pid: u32,
}

impl ProcListEntry {
    pub const SIZE: usize = 36;
    const NAME_WIDTH: usize = 32;

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        w.bytes(&encode_fixed(&self.name, Self::NAME_WIDTH))
            .u32(self.pid);
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(data, "process list entry");
        r.require(Self::SIZE)?;
        Ok(Self {
            name: decode_fixed(r.bytes(Self::NAME_WIDTH)?),
            pid: r.u32()?,
        })
    }
}

/// Reply to ProcInfo (188 bytes): pid u32, name[40], path[64],
/// title_id[16], content_id[64].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcInfoResponse {
    pub pid: u32,
    pub name: String,
    pub path: String,
    pub title_id: String,
    pub content_id: String,
}

impl ProcInfoResponse {
    pub const SIZE: usize = 188;
    const NAME_WIDTH: usize = 40;
    const PATH_WIDTH: usize = 64;
    const TITLE_ID_WIDTH: usize = 16;
    const CONTENT_ID_WIDTH: usize = 64;

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        w.u32(self.pid)
            .bytes(&encode_fixed(&self.name, Self::NAME_WIDTH))
            .bytes(&encode_fixed(&self.path, Self::PATH_WIDTH))
            .bytes(&encode_fixed(&self.title_id, Self::TITLE_ID_WIDTH))
            .bytes(&encode_fixed(&self.content_id, Self::CONTENT_ID_WIDTH));
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(data, "process info");
        r.require(Self::SIZE)?;
        Ok(Self {
            pid: r.u32()?,
            name: decode_fixed(r.bytes(Self::NAME_WIDTH)?),
            path: decode_fixed(r.bytes(Self::PATH_WIDTH)?),
            title_id: decode_fixed(r.bytes(Self::TITLE_ID_WIDTH)?),
            content_id: decode_fixed(r.bytes(Self::CONTENT_ID_WIDTH)?),
        })
    }
}

/// Encode a ProcList reply body: count u32 then 36-byte entries.
pub fn encode_process_list(entries: &[ProcListEntry]) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(4 + ProcListEntry::SIZE * entries.len());
    w.u32(entries.len() as u32);
    for e in entries {
        w.bytes(&e.encode());
    }
    w.finish()
}

/// Encode a ListThreads reply body: count u32 then one u32 per thread.
pub fn encode_thread_list(lwpids: &[u32]) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(4 + 4 * lwpids.len());
    w.u32(lwpids.len() as u32);
    for &id in lwpids {
        w.u32(id);
    }
    w.finish()
}

/// Encode a ProcMaps reply body: count u32 then 58-byte entries.
pub fn encode_map_entries(entries: &[MapEntry]) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(4 + MapEntry::SIZE * entries.len());
    w.u32(entries.len() as u32);
    for e in entries {
        w.bytes(&e.encode());
    }
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_info_layout() {
        let info = ThreadInfoResponse {
            lwpid: 7,
            priority: 120,
            name: "worker".into(),
        };
        let bytes = info.encode();
        assert_eq!(bytes.len(), ThreadInfoResponse::SIZE);
        assert_eq!(&bytes[0..4], &7u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &120u32.to_le_bytes());
        assert_eq!(&bytes[8..14], b"worker");
        assert_eq!(ThreadInfoResponse::decode(&bytes).unwrap(), info);
    }

    #[test]
    fn map_entry_layout() {
        let entry = MapEntry {
            name: "libc.so.6".into(),
            start: 0x7f00_0000_0000,
            end: 0x7f00_0000_4000,
            offset: 0x1000,
            prot: 5,
        };
        let bytes = entry.encode();
        assert_eq!(bytes.len(), MapEntry::SIZE);
        assert_eq!(&bytes[32..40], &0x7f00_0000_0000u64.to_le_bytes());
        assert_eq!(&bytes[56..58], &5u16.to_le_bytes());
        assert_eq!(MapEntry::decode(&bytes).unwrap(), entry);
    }

    #[test]
    fn thread_list_is_count_prefixed() {
        let bytes = encode_thread_list(&[100, 101]);
        assert_eq!(bytes, [2, 0, 0, 0, 100, 0, 0, 0, 101, 0, 0, 0]);
        assert_eq!(encode_thread_list(&[]), [0, 0, 0, 0]);
    }

    #[test]
    fn map_entries_are_count_prefixed() {
        let entry = MapEntry {
            name: "[heap]".into(),
            start: 1,
            end: 2,
            offset: 0,
            prot: 3,
        };
        let bytes = encode_map_entries(&[entry.clone(), entry]);
        assert_eq!(bytes.len(), 4 + 2 * MapEntry::SIZE);
        assert_eq!(&bytes[..4], &2u32.to_le_bytes());
    }

    #[test]
    fn process_list_entry_puts_pid_after_name() {
        let entry = ProcListEntry {
            name: "eboot.bin".into(),
            pid: 77,
        };
        let bytes = encode_process_list(&[entry.clone()]);
        assert_eq!(bytes.len(), 4 + ProcListEntry::SIZE);
        assert_eq!(&bytes[..4], &1u32.to_le_bytes());
        assert_eq!(&bytes[4..13], b"eboot.bin");
        assert_eq!(&bytes[36..40], &77u32.to_le_bytes());
        assert_eq!(ProcListEntry::decode(&bytes[4..]).unwrap(), entry);
    }

    #[test]
    fn process_info_layout() {
        let info = ProcInfoResponse {
            pid: 9,
            name: "game".into(),
            path: "/app0/eboot.bin".into(),
            title_id: String::new(),
            content_id: String::new(),
        };
        let bytes = info.encode();
        assert_eq!(bytes.len(), ProcInfoResponse::SIZE);
        assert_eq!(&bytes[..4], &9u32.to_le_bytes());
        assert_eq!(&bytes[4..8], b"game");
        assert_eq!(&bytes[44..59], b"/app0/eboot.bin");
        assert!(bytes[108..].iter().all(|&b| b == 0));
        assert_eq!(ProcInfoResponse::decode(&bytes).unwrap(), info);
    }
}
