//! Little-endian cursor helpers shared by every fixed-layout codec.

use crate::error::WireError;

/// Sequential little-endian reader over a byte slice.
///
/// Every read is bounds-checked; running off the end yields
/// [`WireError::Truncated`] naming the record being decoded.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> ByteReader<'a> {
    /// Create a reader for the record called `what`.
    pub fn new(data: &'a [u8], what: &'static str) -> Self {
        Self { data, pos: 0, what }
    }

    /// Fail early unless at least `len` bytes are present in total.
    pub fn require(&self, len: usize) -> Result<(), WireError> {
        if self.data.len() < len {
            return Err(WireError::Truncated {
                what: self.what,
                expected: len,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Current offset from the start of the record.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Take the next `len` raw bytes.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(WireError::Truncated {
                what: self.what,
                expected: end,
                actual: self.data.len(),
            });
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Take the next `N` bytes as an array.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_le_bytes(self.array()?))
    }
}

/// Little-endian writer appending to a growable buffer.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Create a writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer and return the encoded bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_decodes_little_endian_fields() {
        let data = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xAA];
        let mut r = ByteReader::new(&data, "sample");
        assert_eq!(r.u8().unwrap(), 0x01);
        assert_eq!(r.u16().unwrap(), 0x1234);
        assert_eq!(r.u32().unwrap(), 0x12345678);
        assert_eq!(r.position(), 7);
        assert_eq!(r.bytes(1).unwrap(), &[0xAA]);
    }

    #[test]
    fn reader_reports_truncation_with_record_name() {
        let data = [0u8; 3];
        let mut r = ByteReader::new(&data, "breakpoint request");
        let err = r.u32().unwrap_err();
        assert!(
            err.to_string().contains("breakpoint request"),
            "got: {err}"
        );
        assert!(matches!(
            err,
            WireError::Truncated {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn reader_require_checks_total_length() {
        let data = [0u8; 10];
        let r = ByteReader::new(&data, "scan request");
        assert!(r.require(10).is_ok());
        assert!(r.require(11).is_err());
    }

    #[test]
    fn writer_appends_in_order() {
        let mut w = ByteWriter::with_capacity(16);
        w.u32(0xDEADBEEF).u8(7).u16(0x0102).u64(1);
        assert_eq!(w.len(), 15);
        let out = w.finish();
        assert_eq!(&out[..4], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(out[4], 7);
        assert_eq!(&out[5..7], &[0x02, 0x01]);
        assert_eq!(&out[7..], &[1, 0, 0, 0, 0, 0, 0, 0]);
    }
}
