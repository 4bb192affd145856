//! Bounded, NUL-padded string fields.
//!
//! Thread and region names travel in fixed-width character arrays.
//! Encoding truncates at the field width (on a UTF-8 boundary);
//! decoding stops at the first NUL and never reads past the field.

/// Encode `s` into exactly `width` bytes, NUL-padded.
///
/// Strings longer than the field are truncated at the last full
/// character that fits, so the field always holds valid UTF-8.
pub fn encode_fixed(s: &str, width: usize) -> Vec<u8> {
    let mut end = s.len().min(width);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = Vec::with_capacity(width);
    out.extend_from_slice(&s.as_bytes()[..end]);
    out.resize(width, 0);
    out
}

/// Decode a fixed-width field, stopping at the first NUL.
///
/// Invalid UTF-8 is replaced lossily.
pub fn decode_fixed(field: &[u8]) -> String {
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..len]).into_owned()
}
