//! Response status codes.

/// The 32-bit status word that starts every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Status {
    Success = 0x8000_0000,
    Error = 0xF000_0001,
    TooMuchData = 0xF000_0002,
    DataNull = 0xF000_0003,
    AlreadyDebugging = 0xF000_0004,
    InvalidIndex = 0xF000_0005,
}

impl Status {
    /// Raw wire value.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Parse a raw status word. Unknown words yield `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x8000_0000 => Some(Self::Success),
            0xF000_0001 => Some(Self::Error),
            0xF000_0002 => Some(Self::TooMuchData),
            0xF000_0003 => Some(Self::DataNull),
            0xF000_0004 => Some(Self::AlreadyDebugging),
            0xF000_0005 => Some(Self::InvalidIndex),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    pub fn to_le_bytes(self) -> [u8; 4] {
        self.code().to_le_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_protocol_values() {
        assert_eq!(Status::Success.code(), 0x80000000);
        assert_eq!(Status::Error.code(), 0xF0000001);
        assert_eq!(Status::TooMuchData.code(), 0xF0000002);
        assert_eq!(Status::DataNull.code(), 0xF0000003);
        assert_eq!(Status::AlreadyDebugging.code(), 0xF0000004);
        assert_eq!(Status::InvalidIndex.code(), 0xF0000005);
    }

    #[test]
    fn from_code_inverts_code() {
        for s in [
            Status::Success,
            Status::Error,
            Status::TooMuchData,
            Status::DataNull,
            Status::AlreadyDebugging,
            Status::InvalidIndex,
        ] {
            assert_eq!(Status::from_code(s.code()), Some(s));
        }
        assert_eq!(Status::from_code(0), None);
    }

    #[test]
    fn success_bytes_are_little_endian() {
        assert_eq!(Status::Success.to_le_bytes(), [0, 0, 0, 0x80]);
        assert!(Status::Success.is_success());
        assert!(!Status::Error.is_success());
    }
}
