//! Order-preserving variable-length encoding for integers and floats.
//!
//! # Integers
//!
//! An integer of a given width is split into 7-bit fields, most significant
//! first. Only the fields needed to represent the value are written, each as
//! `0x80 | field` so that payload bytes are never zero. The tag byte records
//! the sign and the number of fields written:
//!
//! ```text
//!   negative, n fields:      base + (E - n)        (1 <= n <= E)
//!   zero:                    base + E
//!   non-negative, n fields:  base + E + n          (1 <= n <= E)
//! ```
//!
//! where `E` is the number of fields in the widest value of that type. More
//! negative values use more fields and therefore a smaller tag, so every
//! negative sorts below zero, which sorts below every positive value. For
//! negative values the fields hold the low `7n` bits of the two's-complement
//! value, which increase with the value for a fixed `n`.
//!
//! | type   | base | E | tags    |
//! |--------|------|---|---------|
//! | `i8`   | 6    | 1 | 6..=8   |
//! | `i16`  | 15   | 3 | 15..=21 |
//! | `char` | 26   | 3 | 26..=29 |
//! | `i32`  | 31   | 5 | 31..=41 |
//! | `i64`  | 55   | 9 | 55..=73 |
//!
//! `char` values are unsigned and only use `base + n`.
//!
//! # Floats
//!
//! The IEEE-754 bit pattern is transformed so that unsigned comparison of the
//! result matches numeric order: negative values have every bit complemented,
//! other values only the sign bit flipped. The transformed bits are written
//! as a stream of 7-bit fields from the top, stopping as soon as the remaining
//! bits are all zero. The segment terminator ends the stream.

use super::tags;
use crate::error::{KeyError, KeyResult};

/// Integer kinds that share the scale encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    /// `i8`
    Byte,
    /// `i16`
    Short,
    /// `char`
    Char,
    /// `i32`
    Int,
    /// `i64`
    Long,
}

impl IntWidth {
    /// All widths, narrowest first.
    pub const ALL: [Self; 5] = [Self::Byte, Self::Short, Self::Char, Self::Int, Self::Long];

    /// First tag of this width's range.
    #[must_use]
    pub const fn base(self) -> u8 {
        match self {
            Self::Byte => tags::BYTE,
            Self::Short => tags::SHORT,
            Self::Char => tags::CHAR,
            Self::Int => tags::INT,
            Self::Long => tags::LONG,
        }
    }

    /// Number of 7-bit fields in the widest value.
    #[must_use]
    pub const fn fields(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Short | Self::Char => 3,
            Self::Int => 5,
            Self::Long => 9,
        }
    }

    /// Whether negative values are representable.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        !matches!(self, Self::Char)
    }

    /// Last tag of this width's range.
    #[must_use]
    pub const fn max_tag(self) -> u8 {
        // fields() is at most 9, so the cast cannot truncate.
        let e = self.fields() as u8;
        if self.is_signed() {
            self.base() + 2 * e
        } else {
            self.base() + e
        }
    }

    /// Smallest value of this width.
    #[must_use]
    pub const fn min_value(self) -> i64 {
        match self {
            Self::Byte => i8::MIN as i64,
            Self::Short => i16::MIN as i64,
            Self::Char => 0,
            Self::Int => i32::MIN as i64,
            Self::Long => i64::MIN,
        }
    }

    /// Largest value of this width.
    #[must_use]
    pub const fn max_value(self) -> i64 {
        match self {
            Self::Byte => i8::MAX as i64,
            Self::Short => i16::MAX as i64,
            Self::Char => char::MAX as i64,
            Self::Int => i32::MAX as i64,
            Self::Long => i64::MAX,
        }
    }

    /// Returns the width whose tag range contains `tag`.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|w| (w.base()..=w.max_tag()).contains(&tag))
    }

    /// Sign and field count encoded by `tag`, which must lie in this width's range.
    fn header(self, tag: u8) -> (bool, u32) {
        let offset = u32::from(tag - self.base());
        let e = self.fields();
        if !self.is_signed() {
            (false, offset)
        } else if offset < e {
            (true, e - offset)
        } else {
            (false, offset - e)
        }
    }

    /// Short type name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Char => "char",
            Self::Int => "int",
            Self::Long => "long",
        }
    }
}

/// Number of 7-bit fields needed for the significant bits of `magnitude`.
fn field_count(magnitude: u64) -> u32 {
    (u64::BITS - magnitude.leading_zeros()).div_ceil(7)
}

fn push_fields(value: u64, count: u32, out: &mut Vec<u8>) {
    for i in (0..count).rev() {
        // Masked to 7 bits.
        out.push(0x80 | ((value >> (7 * i)) & 0x7F) as u8);
    }
}

/// Appends the tag and payload fields of `value` in the given width.
///
/// The caller guarantees that `value` lies within the width's range.
pub fn encode_int(width: IntWidth, value: i64, out: &mut Vec<u8>) {
    debug_assert!(value >= width.min_value() && value <= width.max_value());
    let e = width.fields();
    if value >= 0 {
        let n = field_count(value.unsigned_abs());
        let offset = if width.is_signed() { e + n } else { n };
        // offset <= 2 * 9, always fits in u8.
        out.push(width.base() + offset as u8);
        push_fields(value.unsigned_abs(), n, out);
    } else {
        let n = field_count(value.unsigned_abs()).clamp(1, e);
        out.push(width.base() + (e - n) as u8);
        // Two's-complement bits; the low 7n bits carry the value.
        push_fields(value as u64, n, out);
    }
}

/// Decodes an integer whose tag is at `bytes[pos]`.
///
/// Returns the width named by the tag, the value, and the position of the
/// byte following the payload.
///
/// # Errors
///
/// Returns [`KeyError::Conversion`] if the tag is not an integer tag, the
/// payload is truncated or contains a byte without its high bit set, or the
/// value does not fit the tagged width.
pub fn decode_int(bytes: &[u8], pos: usize) -> KeyResult<(IntWidth, i64, usize)> {
    let tag = *bytes.get(pos).ok_or_else(|| KeyError::conversion(pos, "missing integer tag"))?;
    let width = IntWidth::from_tag(tag)
        .ok_or_else(|| KeyError::conversion(pos, format!("tag {tag} is not an integer tag")))?;
    let (negative, count) = width.header(tag);

    let mut value: i64 = if negative { -1 } else { 0 };
    let mut index = pos + 1;
    for _ in 0..count {
        let b = *bytes
            .get(index)
            .ok_or_else(|| KeyError::conversion(index, "truncated integer payload"))?;
        if b & 0x80 == 0 {
            return Err(KeyError::conversion(
                index,
                format!("invalid {} payload byte {b:#04x}", width.name()),
            ));
        }
        value = (value << 7) | i64::from(b & 0x7F);
        index += 1;
    }

    if value < width.min_value() || value > width.max_value() {
        return Err(KeyError::conversion(
            pos,
            format!("value {value} out of range for {}", width.name()),
        ));
    }
    Ok((width, value, index))
}

/// Decodes an integer at `pos` whose tag must belong to `width`.
///
/// # Errors
///
/// Returns [`KeyError::Conversion`] if the tag belongs to a different width
/// or the payload is malformed.
pub fn decode_int_exact(bytes: &[u8], pos: usize, width: IntWidth) -> KeyResult<(i64, usize)> {
    let (found, value, next) = decode_int(bytes, pos)?;
    if found == width {
        Ok((value, next))
    } else {
        Err(KeyError::conversion(
            pos,
            format!("expected {} encoding, found {}", width.name(), found.name()),
        ))
    }
}

/// Transforms float bits so that unsigned order matches numeric order.
const fn order_bits_64(bits: u64) -> u64 {
    if bits & (1 << 63) != 0 {
        !bits
    } else {
        bits ^ (1 << 63)
    }
}

/// Inverse of [`order_bits_64`].
const fn restore_bits_64(bits: u64) -> u64 {
    if bits & (1 << 63) != 0 {
        bits ^ (1 << 63)
    } else {
        !bits
    }
}

/// Writes the top-aligned bit stream as 7-bit fields until it runs out.
fn push_stream(mut bits: u64, out: &mut Vec<u8>) {
    while bits != 0 {
        // Top seven bits.
        out.push(0x80 | (bits >> 57) as u8);
        bits <<= 7;
    }
}

/// Reads a 7-bit field stream into a top-aligned `u64`, stopping at the
/// terminator. Returns the bits and the terminator's position.
fn read_stream(bytes: &[u8], pos: usize, max_fields: u32) -> KeyResult<(u64, usize)> {
    let mut acc: u64 = 0;
    let mut index = pos;
    let mut fields = 0u32;
    loop {
        let b = *bytes
            .get(index)
            .ok_or_else(|| KeyError::conversion(index, "unterminated float payload"))?;
        if b == tags::END {
            return Ok((acc, index));
        }
        if b & 0x80 == 0 || fields == max_fields {
            return Err(KeyError::conversion(index, format!("unexpected float byte {b:#04x}")));
        }
        let field = u64::from(b & 0x7F);
        let offset = 7 * fields;
        acc |= if offset <= 57 { field << (57 - offset) } else { field >> (offset - 57) };
        fields += 1;
        index += 1;
    }
}

/// Appends the payload (without tag) of an `f32`.
pub fn encode_f32(value: f32, out: &mut Vec<u8>) {
    let bits = value.to_bits();
    let ordered = if bits & (1 << 31) != 0 { !bits } else { bits ^ (1 << 31) };
    push_stream(u64::from(ordered) << 32, out);
}

/// Appends the payload (without tag) of an `f64`.
pub fn encode_f64(value: f64, out: &mut Vec<u8>) {
    push_stream(order_bits_64(value.to_bits()), out);
}

/// Decodes an `f32` payload starting at `pos`. Returns the value and the
/// terminator's position.
///
/// # Errors
///
/// Returns [`KeyError::Conversion`] on a malformed or overlong stream.
pub fn decode_f32(bytes: &[u8], pos: usize) -> KeyResult<(f32, usize)> {
    let (bits, end) = read_stream(bytes, pos, 5)?;
    // The low half only ever holds padding for 32-bit values.
    let high = (bits >> 32) as u32;
    let restored = if high & (1 << 31) != 0 { high ^ (1 << 31) } else { !high };
    Ok((f32::from_bits(restored), end))
}

/// Decodes an `f64` payload starting at `pos`. Returns the value and the
/// terminator's position.
///
/// # Errors
///
/// Returns [`KeyError::Conversion`] on a malformed or overlong stream.
pub fn decode_f64(bytes: &[u8], pos: usize) -> KeyResult<(f64, usize)> {
    let (bits, end) = read_stream(bytes, pos, 10)?;
    Ok((f64::from_bits(restore_bits_64(bits)), end))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn enc(width: IntWidth, v: i64) -> Vec<u8> {
        let mut out = Vec::new();
        encode_int(width, v, &mut out);
        out
    }

    // ========================================================================
    // Integer layout
    // ========================================================================

    #[test]
    fn zero_is_a_single_tag() {
        assert_eq!(enc(IntWidth::Byte, 0), vec![7]);
        assert_eq!(enc(IntWidth::Short, 0), vec![18]);
        assert_eq!(enc(IntWidth::Char, 0), vec![26]);
        assert_eq!(enc(IntWidth::Int, 0), vec![36]);
        assert_eq!(enc(IntWidth::Long, 0), vec![64]);
    }

    #[test]
    fn small_values() {
        assert_eq!(enc(IntWidth::Int, 1), vec![37, 0x81]);
        assert_eq!(enc(IntWidth::Int, -1), vec![35, 0xFF]);
        assert_eq!(enc(IntWidth::Int, 127), vec![37, 0xFF]);
        assert_eq!(enc(IntWidth::Int, 128), vec![38, 0x81, 0x80]);
        assert_eq!(enc(IntWidth::Int, -127), vec![35, 0x81]);
        assert_eq!(enc(IntWidth::Int, -128), vec![34, 0xFF, 0x80]);
        assert_eq!(enc(IntWidth::Byte, -128), vec![6, 0x80]);
        assert_eq!(enc(IntWidth::Byte, 127), vec![8, 0xFF]);
    }

    #[test]
    fn extremes_use_the_outermost_tags() {
        assert_eq!(enc(IntWidth::Long, i64::MIN)[0], 55);
        assert_eq!(enc(IntWidth::Long, i64::MAX)[0], 73);
        assert_eq!(enc(IntWidth::Long, i64::MAX).len(), 10);
        assert_eq!(enc(IntWidth::Int, i32::MIN.into())[0], 31);
        assert_eq!(enc(IntWidth::Int, i32::MAX.into())[0], 41);
        assert_eq!(enc(IntWidth::Short, i16::MIN.into())[0], 15);
        assert_eq!(enc(IntWidth::Short, i16::MAX.into())[0], 21);
        assert_eq!(enc(IntWidth::Char, char::MAX as i64)[0], 29);
    }

    #[test]
    fn width_lookup_by_tag() {
        assert_eq!(IntWidth::from_tag(6), Some(IntWidth::Byte));
        assert_eq!(IntWidth::from_tag(21), Some(IntWidth::Short));
        assert_eq!(IntWidth::from_tag(29), Some(IntWidth::Char));
        assert_eq!(IntWidth::from_tag(41), Some(IntWidth::Int));
        assert_eq!(IntWidth::from_tag(73), Some(IntWidth::Long));
        assert_eq!(IntWidth::from_tag(9), None);
        assert_eq!(IntWidth::from_tag(30), None);
        assert_eq!(IntWidth::from_tag(74), None);
    }

    // ========================================================================
    // Round trip and order
    // ========================================================================

    #[test]
    fn roundtrip_boundaries() {
        for width in IntWidth::ALL {
            let mut values =
                vec![0, 1, 127, 128, 16383, 16384, width.min_value(), width.max_value()];
            if width.is_signed() {
                values.extend([-1, -127, -128, -129, -16383, -16384, -16385]);
            }
            let in_range = |v: &i64| *v >= width.min_value() && *v <= width.max_value();
            for v in values.into_iter().filter(in_range) {
                let bytes = enc(width, v);
                let (w, decoded, next) = decode_int(&bytes, 0).unwrap();
                assert_eq!((w, decoded, next), (width, v, bytes.len()), "{width:?} {v}");
            }
        }
    }

    #[test]
    fn long_order_across_field_counts() {
        let mut values: Vec<i64> = vec![i64::MIN, i64::MAX, 0];
        for shift in 0..63 {
            let p = 1i64 << shift;
            values.extend([p - 1, p, p + 1, -p + 1, -p, -p - 1]);
        }
        values.sort_unstable();
        values.dedup();
        let encoded: Vec<_> = values.iter().map(|v| enc(IntWidth::Long, *v)).collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn decode_rejects_bad_payload() {
        assert!(decode_int(&[37, 0x01], 0).unwrap_err().is_conversion());
        assert!(decode_int(&[38, 0x81], 0).unwrap_err().is_conversion());
        assert!(decode_int(&[98], 0).unwrap_err().is_conversion());
        // Three short fields can hold more than i16::MAX.
        assert!(decode_int(&[21, 0xFF, 0xFF, 0xFF], 0).unwrap_err().is_conversion());
    }

    #[test]
    fn exact_width_required() {
        let bytes = enc(IntWidth::Short, 5);
        assert!(decode_int_exact(&bytes, 0, IntWidth::Short).is_ok());
        assert!(decode_int_exact(&bytes, 0, IntWidth::Int).is_err());
    }

    // ========================================================================
    // Floats
    // ========================================================================

    fn f64_payload(v: f64) -> Vec<u8> {
        let mut out = Vec::new();
        encode_f64(v, &mut out);
        out.push(0);
        out
    }

    fn f32_payload(v: f32) -> Vec<u8> {
        let mut out = Vec::new();
        encode_f32(v, &mut out);
        out.push(0);
        out
    }

    #[test]
    fn double_roundtrip_bit_exact() {
        for v in [
            f64::NEG_INFINITY,
            f64::MIN,
            -1.5,
            -f64::MIN_POSITIVE,
            -0.0,
            0.0,
            5e-324,
            f64::MIN_POSITIVE,
            1.0,
            f64::MAX,
            f64::INFINITY,
            f64::NAN,
        ] {
            let bytes = f64_payload(v);
            let (decoded, end) = decode_f64(&bytes, 0).unwrap();
            assert_eq!(decoded.to_bits(), v.to_bits(), "{v}");
            assert_eq!(end, bytes.len() - 1);
        }
    }

    #[test]
    fn float_roundtrip_bit_exact() {
        for v in [f32::NEG_INFINITY, -1.0, -0.0, 0.0, 1e-45, 0.1, 3.5, f32::MAX, f32::INFINITY] {
            let bytes = f32_payload(v);
            let (decoded, _) = decode_f32(&bytes, 0).unwrap();
            assert_eq!(decoded.to_bits(), v.to_bits(), "{v}");
        }
    }

    #[test]
    fn double_order() {
        let values = [
            f64::NEG_INFINITY,
            -1e300,
            -1.0,
            -5e-324,
            -0.0,
            0.0,
            5e-324,
            1.0,
            1e300,
            f64::INFINITY,
        ];
        let encoded: Vec<_> = values.iter().map(|v| f64_payload(*v)).collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn float_stream_limits() {
        assert!(decode_f32(&[0x81, 0x81, 0x81, 0x81, 0x81, 0x81, 0], 0).is_err());
        assert!(decode_f64(&[0x81, 0x01, 0], 0).is_err());
        assert!(decode_f64(&[0x81, 0x81], 0).is_err());
    }
}
