//! Scan value types and the scan-value / reference-value split.

use crate::compare::CompareOp;
use crate::error::ScanError;

/// Type of the value being searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    Float,
    Double,
    ByteArray,
    String,
}

impl ValueType {
    pub fn from_code(code: u8) -> Result<Self, ScanError> {
        Ok(match code {
            0 => Self::U8,
            1 => Self::I8,
            2 => Self::U16,
            3 => Self::I16,
            4 => Self::U32,
            5 => Self::I32,
            6 => Self::U64,
            7 => Self::I64,
            8 => Self::Float,
            9 => Self::Double,
            10 => Self::ByteArray,
            11 => Self::String,
            other => return Err(ScanError::InvalidValueType(other)),
        })
    }

    /// Fixed width in bytes; `None` for byte arrays and strings.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::Float => Some(4),
            Self::U64 | Self::I64 | Self::Double => Some(8),
            Self::ByteArray | Self::String => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Check a payload length before any bytes are received.
    ///
    /// Numeric payloads carry the scan value and optionally a
    /// reference value of the same width; anything after the
    /// reference is ignored. Byte arrays and strings use
    /// the whole payload as the scan value.
    pub fn check_payload_len(self, len: usize) -> Result<(), ScanError> {
        if len == 0 {
            return Err(ScanError::EmptyValue);
        }
        match self.fixed_size() {
            // A partial reference value cannot be compared.
            Some(size) if len < size || (len > size && len < 2 * size) => {
                Err(ScanError::ValueLength {
                    expected: size,
                    actual: len,
                })
            }
            _ => Ok(()),
        }
    }
}

/// A fully decoded scan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanQuery {
    pub pid: u32,
    pub value_type: ValueType,
    pub compare: CompareOp,
    pub scan_value: Vec<u8>,
    /// Previous value for relative comparators.
    pub reference: Option<Vec<u8>>,
}

impl ScanQuery {
    /// Split `payload` into the scan value and optional reference.
    pub fn from_payload(
        pid: u32,
        value_type: ValueType,
        compare: CompareOp,
        payload: &[u8],
    ) -> Result<Self, ScanError> {
        value_type.check_payload_len(payload.len())?;
        let size = value_type.fixed_size().unwrap_or(payload.len());
        let (scan, rest) = payload.split_at(size);
        Ok(Self {
            pid,
            value_type,
            compare,
            scan_value: scan.to_vec(),
            reference: (!rest.is_empty()).then(|| rest[..size].to_vec()),
        })
    }

    /// Width of each compared memory slot.
    pub fn value_size(&self) -> usize {
        self.scan_value.len()
    }

    pub fn matches(&self, memory: &[u8]) -> bool {
        self.compare.matches(
            self.value_type,
            &self.scan_value,
            memory,
            self.reference.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_in_protocol_order() {
        assert_eq!(ValueType::from_code(0).unwrap(), ValueType::U8);
        assert_eq!(ValueType::from_code(8).unwrap(), ValueType::Float);
        assert_eq!(ValueType::from_code(11).unwrap(), ValueType::String);
        assert!(matches!(
            ValueType::from_code(12),
            Err(ScanError::InvalidValueType(12))
        ));
    }

    #[test]
    fn fixed_sizes() {
        assert_eq!(ValueType::I16.fixed_size(), Some(2));
        assert_eq!(ValueType::Float.fixed_size(), Some(4));
        assert_eq!(ValueType::Double.fixed_size(), Some(8));
        assert_eq!(ValueType::ByteArray.fixed_size(), None);
    }

    #[test]
    fn numeric_payload_without_reference() {
        let q = ScanQuery::from_payload(1, ValueType::U32, CompareOp::Exact, &7u32.to_le_bytes())
            .unwrap();
        assert_eq!(q.scan_value, 7u32.to_le_bytes());
        assert!(q.reference.is_none());
        assert_eq!(q.value_size(), 4);
    }

    #[test]
    fn numeric_payload_with_reference() {
        let mut payload = 5u16.to_le_bytes().to_vec();
        payload.extend_from_slice(&9u16.to_le_bytes());
        let q = ScanQuery::from_payload(1, ValueType::U16, CompareOp::Between, &payload).unwrap();
        assert_eq!(q.scan_value, 5u16.to_le_bytes());
        assert_eq!(q.reference.as_deref(), Some(&9u16.to_le_bytes()[..]));
    }

    #[test]
    fn byte_array_uses_whole_payload() {
        let q = ScanQuery::from_payload(1, ValueType::ByteArray, CompareOp::Exact, b"\xDE\xAD\xBE")
            .unwrap();
        assert_eq!(q.value_size(), 3);
        assert!(q.reference.is_none());
    }

    #[test]
    fn bad_lengths_are_rejected() {
        assert!(matches!(
            ValueType::U32.check_payload_len(0),
            Err(ScanError::EmptyValue)
        ));
        assert!(matches!(
            ValueType::U32.check_payload_len(6),
            Err(ScanError::ValueLength {
                expected: 4,
                actual: 6
            })
        ));
        assert!(ValueType::U32.check_payload_len(8).is_ok());
        assert!(ValueType::U32.check_payload_len(11).is_ok());
        assert!(ValueType::U64.check_payload_len(4).is_err());
        assert!(ValueType::String.check_payload_len(13).is_ok());
        assert!(ValueType::String.check_payload_len(0).is_err());
    }

    #[test]
    fn bytes_after_the_reference_are_ignored() {
        let mut payload = 7u32.to_le_bytes().to_vec();
        payload.extend_from_slice(&3u32.to_le_bytes());
        payload.extend_from_slice(&[0xEE, 0xEE]);
        let q = ScanQuery::from_payload(1, ValueType::U32, CompareOp::IncreasedBy, &payload)
            .unwrap();
        assert_eq!(q.scan_value, 7u32.to_le_bytes());
        assert_eq!(q.reference.as_deref(), Some(&3u32.to_le_bytes()[..]));
        assert_eq!(q.value_size(), 4);
    }
}
