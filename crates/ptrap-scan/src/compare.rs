//! Comparator family.
//!
//! Each operator is a pure function of the value type, the scan value,
//! the bytes in memory and the optional reference value. Numeric
//! operators decode all three as the same little-endian type first.

use crate::error::ScanError;
use crate::value::ValueType;

/// Fuzzy matches must lie strictly inside this distance.
pub const FUZZY_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Exact,
    Fuzzy,
    GreaterThan,
    SmallerThan,
    Between,
    Increased,
    IncreasedBy,
    Decreased,
    DecreasedBy,
    Changed,
    Unchanged,
    Unknown,
}

impl CompareOp {
    pub fn from_code(code: u8) -> Result<Self, ScanError> {
        Ok(match code {
            0 => Self::Exact,
            1 => Self::Fuzzy,
            2 => Self::GreaterThan,
            3 => Self::SmallerThan,
            4 => Self::Between,
            5 => Self::Increased,
            6 => Self::IncreasedBy,
            7 => Self::Decreased,
            8 => Self::DecreasedBy,
            9 => Self::Changed,
            10 => Self::Unchanged,
            11 => Self::Unknown,
            other => return Err(ScanError::InvalidCompareOp(other)),
        })
    }

    /// Whether the operator reads the reference value.
    pub fn is_relative(self) -> bool {
        matches!(
            self,
            Self::Between
                | Self::Increased
                | Self::IncreasedBy
                | Self::Decreased
                | Self::DecreasedBy
                | Self::Changed
                | Self::Unchanged
        )
    }

    /// Apply the operator to one memory slot.
    ///
    /// `memory` must hold at least `scan.len()` bytes for a match.
    /// Relative operators never match without a reference value.
    pub fn matches(
        self,
        value_type: ValueType,
        scan: &[u8],
        memory: &[u8],
        reference: Option<&[u8]>,
    ) -> bool {
        if self == Self::Unknown {
            return true;
        }
        match value_type {
            ValueType::U8 => self.numeric::<u8>(scan, memory, reference),
            ValueType::I8 => self.numeric::<i8>(scan, memory, reference),
            ValueType::U16 => self.numeric::<u16>(scan, memory, reference),
            ValueType::I16 => self.numeric::<i16>(scan, memory, reference),
            ValueType::U32 => self.numeric::<u32>(scan, memory, reference),
            ValueType::I32 => self.numeric::<i32>(scan, memory, reference),
            ValueType::U64 => self.numeric::<u64>(scan, memory, reference),
            ValueType::I64 => self.numeric::<i64>(scan, memory, reference),
            ValueType::Float => self.numeric::<f32>(scan, memory, reference),
            ValueType::Double => self.numeric::<f64>(scan, memory, reference),
            ValueType::ByteArray | ValueType::String => {
                self == Self::Exact && exact(scan, memory)
            }
        }
    }

    fn numeric<T: Scalar>(self, scan: &[u8], memory: &[u8], reference: Option<&[u8]>) -> bool {
        let (Some(s), Some(m)) = (T::read(scan), T::read(memory)) else {
            return false;
        };
        let r = reference.and_then(T::read);
        match self {
            Self::Exact => exact(&scan[..T::SIZE], memory),
            Self::Fuzzy => T::fuzzy_eq(m, s),
            Self::GreaterThan => m > s,
            Self::SmallerThan => m < s,
            Self::Between => r.is_some_and(|r| {
                if r > s {
                    m > s && m < r
                } else {
                    m < s && m > r
                }
            }),
            Self::Increased => r.is_some_and(|r| m > r),
            Self::IncreasedBy => r.and_then(|r| r.add(s)).is_some_and(|t| m == t),
            Self::Decreased => r.is_some_and(|r| m < r),
            Self::DecreasedBy => r.and_then(|r| r.sub(s)).is_some_and(|t| m == t),
            Self::Changed => r.is_some_and(|r| m != r),
            Self::Unchanged => r.is_some_and(|r| m == r),
            Self::Unknown => true,
        }
    }
}

fn exact(scan: &[u8], memory: &[u8]) -> bool {
    memory.get(..scan.len()) == Some(scan)
}

/// A fixed-width numeric type the comparators can decode.
trait Scalar: Copy + PartialOrd {
    const SIZE: usize;

    /// Decode the leading `SIZE` bytes, or `None` if too short.
    fn read(bytes: &[u8]) -> Option<Self>;

    /// `self + rhs`; `None` on integer overflow.
    fn add(self, rhs: Self) -> Option<Self>;

    /// `self - rhs`; `None` on integer overflow.
    fn sub(self, rhs: Self) -> Option<Self>;

    fn fuzzy_eq(self, _other: Self) -> bool {
        false
    }
}

macro_rules! int_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn read(bytes: &[u8]) -> Option<Self> {
                Some(<$t>::from_le_bytes(bytes.get(..Self::SIZE)?.try_into().ok()?))
            }

            fn add(self, rhs: Self) -> Option<Self> {
                self.checked_add(rhs)
            }

            fn sub(self, rhs: Self) -> Option<Self> {
                self.checked_sub(rhs)
            }
        }
    )*};
}

int_scalar!(u8, i8, u16, i16, u32, i32, u64, i64);

macro_rules! float_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn read(bytes: &[u8]) -> Option<Self> {
                Some(<$t>::from_le_bytes(bytes.get(..Self::SIZE)?.try_into().ok()?))
            }

            fn add(self, rhs: Self) -> Option<Self> {
                Some(self + rhs)
            }

            fn sub(self, rhs: Self) -> Option<Self> {
                Some(self - rhs)
            }

            fn fuzzy_eq(self, other: Self) -> bool {
                let diff = self - other;
                diff < FUZZY_TOLERANCE as $t && diff > -(FUZZY_TOLERANCE as $t)
            }
        }
    )*};
}

float_scalar!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    fn check(op: CompareOp, ty: ValueType, scan: &[u8], mem: &[u8], reference: Option<&[u8]>) -> bool {
        op.matches(ty, scan, mem, reference)
    }

    #[test]
    fn codes_map_in_protocol_order() {
        assert_eq!(CompareOp::from_code(0).unwrap(), CompareOp::Exact);
        assert_eq!(CompareOp::from_code(4).unwrap(), CompareOp::Between);
        assert_eq!(CompareOp::from_code(11).unwrap(), CompareOp::Unknown);
        assert!(CompareOp::from_code(12).is_err());
    }

    #[test]
    fn exact_is_bytewise() {
        let v = 0x1234_5678u32.to_le_bytes();
        assert!(check(CompareOp::Exact, ValueType::U32, &v, &v, None));
        assert!(!check(
            CompareOp::Exact,
            ValueType::U32,
            &v,
            &0x1234_5679u32.to_le_bytes(),
            None
        ));
        // -0.0 and 0.0 compare equal numerically but not bytewise
        assert!(!check(
            CompareOp::Exact,
            ValueType::Float,
            &0.0f32.to_le_bytes(),
            &(-0.0f32).to_le_bytes(),
            None
        ));
    }

    #[test]
    fn fuzzy_bounds_are_strict() {
        let scan = 10.0f32.to_le_bytes();
        for off in [1.0f32, -1.0] {
            let mem = (10.0 + off).to_le_bytes();
            assert!(!check(CompareOp::Fuzzy, ValueType::Float, &scan, &mem, None));
        }
        for off in [0.999f32, -0.999] {
            let mem = (10.0 + off).to_le_bytes();
            assert!(check(CompareOp::Fuzzy, ValueType::Float, &scan, &mem, None));
        }

        let scan = 100.0f64.to_le_bytes();
        assert!(!check(CompareOp::Fuzzy, ValueType::Double, &scan, &101.0f64.to_le_bytes(), None));
        assert!(!check(CompareOp::Fuzzy, ValueType::Double, &scan, &99.0f64.to_le_bytes(), None));
        assert!(check(CompareOp::Fuzzy, ValueType::Double, &scan, &100.999f64.to_le_bytes(), None));
        assert!(check(CompareOp::Fuzzy, ValueType::Double, &scan, &99.001f64.to_le_bytes(), None));
    }

    #[test]
    fn fuzzy_never_matches_integers() {
        let v = 5u32.to_le_bytes();
        assert!(!check(CompareOp::Fuzzy, ValueType::U32, &v, &v, None));
    }

    #[test]
    fn greater_and_smaller_use_scan_as_threshold() {
        let scan = (-5i16).to_le_bytes();
        assert!(check(CompareOp::GreaterThan, ValueType::I16, &scan, &(-4i16).to_le_bytes(), None));
        assert!(!check(CompareOp::GreaterThan, ValueType::I16, &scan, &(-5i16).to_le_bytes(), None));
        assert!(check(CompareOp::SmallerThan, ValueType::I16, &scan, &(-6i16).to_le_bytes(), None));
        // signedness matters: 0xFF is 255 unsigned but -1 signed
        assert!(check(CompareOp::GreaterThan, ValueType::U8, &[1], &[0xFF], None));
        assert!(!check(CompareOp::GreaterThan, ValueType::I8, &[1], &[0xFF], None));
    }

    #[test]
    fn between_is_open_and_direction_independent() {
        let lo = 10u32.to_le_bytes();
        let hi = 20u32.to_le_bytes();
        for m in 0u32..30 {
            let mem = m.to_le_bytes();
            let a = check(CompareOp::Between, ValueType::U32, &lo, &mem, Some(&hi));
            let b = check(CompareOp::Between, ValueType::U32, &hi, &mem, Some(&lo));
            assert_eq!(a, b, "direction changed result for {m}");
            assert_eq!(a, m > 10 && m < 20, "wrong membership for {m}");
        }
    }

    #[test]
    fn relative_operators_compare_against_reference() {
        let prev = 50i32.to_le_bytes();
        let up = 55i32.to_le_bytes();
        let down = 45i32.to_le_bytes();
        let five = 5i32.to_le_bytes();
        let ty = ValueType::I32;

        assert!(check(CompareOp::Increased, ty, &five, &up, Some(&prev)));
        assert!(!check(CompareOp::Increased, ty, &five, &down, Some(&prev)));
        assert!(check(CompareOp::Decreased, ty, &five, &down, Some(&prev)));
        assert!(check(CompareOp::IncreasedBy, ty, &five, &up, Some(&prev)));
        assert!(!check(CompareOp::IncreasedBy, ty, &five, &down, Some(&prev)));
        assert!(check(CompareOp::DecreasedBy, ty, &five, &down, Some(&prev)));
        assert!(check(CompareOp::Changed, ty, &five, &up, Some(&prev)));
        assert!(!check(CompareOp::Changed, ty, &five, &prev, Some(&prev)));
        assert!(check(CompareOp::Unchanged, ty, &five, &prev, Some(&prev)));
    }

    #[test]
    fn relative_operators_without_reference_never_match() {
        let v = 1u8.to_le_bytes();
        for op in [
            CompareOp::Between,
            CompareOp::Increased,
            CompareOp::IncreasedBy,
            CompareOp::Decreased,
            CompareOp::DecreasedBy,
            CompareOp::Changed,
            CompareOp::Unchanged,
        ] {
            assert!(op.is_relative());
            assert!(!check(op, ValueType::U8, &v, &v, None), "{op:?}");
        }
    }

    #[test]
    fn increased_by_overflow_is_a_miss() {
        // 250 + 10 overflows u8; memory 4 must not match the wrapped sum.
        assert!(!check(CompareOp::IncreasedBy, ValueType::U8, &[10], &[4], Some(&[250])));
        assert!(!check(CompareOp::DecreasedBy, ValueType::U8, &[10], &[252], Some(&[6])));
    }

    #[test]
    fn double_increased_by_uses_double_width() {
        let scan = 0.1f64.to_le_bytes();
        let prev = 1.0f64.to_le_bytes();
        let mem = (1.0f64 + 0.1f64).to_le_bytes();
        assert!(check(CompareOp::IncreasedBy, ValueType::Double, &scan, &mem, Some(&prev)));
    }

    #[test]
    fn unknown_always_matches() {
        assert!(check(CompareOp::Unknown, ValueType::U64, &[0; 8], &[1; 8], None));
        assert!(check(CompareOp::Unknown, ValueType::String, b"a", b"b", None));
    }

    #[test]
    fn arrays_and_strings_support_only_exact() {
        let pat = b"hp=100";
        assert!(check(CompareOp::Exact, ValueType::String, pat, b"hp=100!", None));
        assert!(!check(CompareOp::Exact, ValueType::ByteArray, pat, b"hp=10", None));
        assert!(!check(CompareOp::GreaterThan, ValueType::ByteArray, b"\x01", b"\x02", None));
        assert!(!check(CompareOp::Changed, ValueType::String, b"a", b"b", Some(b"a")));
    }

    #[test]
    fn short_memory_never_matches() {
        assert!(!check(CompareOp::Exact, ValueType::U32, &[1, 0, 0, 0], &[1, 0], None));
    }
}
