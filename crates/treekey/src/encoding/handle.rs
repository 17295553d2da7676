//! Compact encoding of extension coder handles.
//!
//! A handle is written as one to six bytes. The first byte carries the length
//! class in its top five bits and the highest three bits of the handle in its
//! low three bits. Each following byte carries six bits; every byte but the
//! last has its top two bits set to `11`, the last to `10`.
//!
//! ```text
//!   h < 0x7        C0|h
//!   h < 0x1FF      C8|h>>6   80|h
//!   h < 0x7FFF     D0|h>>12  C0|h>>6  80|h
//!   otherwise      D8|h>>30  C0|h>>24 C0|h>>18 C0|h>>12 C0|h>>6 80|h
//! ```
//!
//! Larger handles always use a larger class byte, so the encoding preserves
//! handle order.

use super::tags;
use crate::error::{KeyError, KeyResult};

/// Appends the encoded form of `handle`.
pub fn encode(handle: u32, out: &mut Vec<u8>) {
    // All shifted values are masked to at most 6 bits before the cast.
    let six = |shift: u32| ((handle >> shift) & 0x3F) as u8;
    let three = |shift: u32| ((handle >> shift) & 0x07) as u8;
    if handle < 0x7 {
        out.push(tags::CODER1 | three(0));
    } else if handle < 0x1FF {
        out.extend_from_slice(&[tags::CODER2 | three(6), 0x80 | six(0)]);
    } else if handle < 0x7FFF {
        out.extend_from_slice(&[tags::CODER3 | three(12), 0xC0 | six(6), 0x80 | six(0)]);
    } else {
        out.extend_from_slice(&[
            tags::CODER6 | three(30),
            0xC0 | six(24),
            0xC0 | six(18),
            0xC0 | six(12),
            0xC0 | six(6),
            0x80 | six(0),
        ]);
    }
}

/// Number of bytes following the class byte.
fn continuation_len(class: u8) -> Option<usize> {
    match class {
        tags::CODER1 => Some(0),
        tags::CODER2 => Some(1),
        tags::CODER3 => Some(2),
        tags::CODER6 => Some(5),
        _ => None,
    }
}

/// Decodes the handle at `pos`, returning it and the position after it.
///
/// # Errors
///
/// Returns [`KeyError::Conversion`] if the bytes are not a well-formed handle.
pub fn decode(bytes: &[u8], pos: usize) -> KeyResult<(u32, usize)> {
    let first = *bytes.get(pos).ok_or_else(|| KeyError::conversion(pos, "missing coder handle"))?;
    let extra = continuation_len(first & 0xF8)
        .filter(|_| tags::is_extension(first))
        .ok_or_else(|| {
            KeyError::conversion(pos, format!("invalid coder handle byte {first:#04x}"))
        })?;

    let mut handle = u32::from(first & 0x07);
    for i in 0..extra {
        let index = pos + 1 + i;
        let b = *bytes
            .get(index)
            .ok_or_else(|| KeyError::conversion(index, "truncated coder handle"))?;
        let expected = if i + 1 == extra { 0x80 } else { 0xC0 };
        if b & 0xC0 != expected {
            return Err(KeyError::conversion(index, format!("invalid coder handle byte {b:#04x}")));
        }
        handle = (handle << 6) | u32::from(b & 0x3F);
    }
    Ok((handle, pos + 1 + extra))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn enc(handle: u32) -> Vec<u8> {
        let mut out = Vec::new();
        encode(handle, &mut out);
        out
    }

    #[test]
    fn lengths_by_class() {
        assert_eq!(enc(1), vec![0xC1]);
        assert_eq!(enc(6), vec![0xC6]);
        assert_eq!(enc(7), vec![0xC8, 0x87]);
        assert_eq!(enc(0x1FE), vec![0xCF, 0xBE]);
        assert_eq!(enc(0x1FF).len(), 3);
        assert_eq!(enc(0x7FFE).len(), 3);
        assert_eq!(enc(0x7FFF).len(), 6);
        assert_eq!(enc(u32::MAX).len(), 6);
    }

    #[test]
    fn roundtrip() {
        for h in [1, 5, 6, 7, 63, 64, 0x1FE, 0x1FF, 0x1000, 0x7FFE, 0x7FFF, 0x12_3456, u32::MAX] {
            let bytes = enc(h);
            assert_eq!(decode(&bytes, 0).unwrap(), (h, bytes.len()), "{h:#x}");
        }
    }

    #[test]
    fn order_preserved() {
        let handles = [1u32, 6, 7, 100, 0x1FE, 0x1FF, 0x7FFE, 0x7FFF, 0xFFFF_FFFF];
        let encoded: Vec<_> = handles.iter().map(|h| enc(*h)).collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn rejects_malformed() {
        assert!(decode(&[0xC8, 0xC7], 0).is_err());
        assert!(decode(&[0xD0, 0x81, 0x81], 0).is_err());
        assert!(decode(&[0xD8, 0xC1], 0).is_err());
        assert!(decode(&[0x80], 0).is_err());
        assert!(decode(&[0xE0], 0).is_err());
    }
}
