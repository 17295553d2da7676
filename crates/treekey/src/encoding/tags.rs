//! Type tags for key segments.
//!
//! The first byte of every segment identifies the type of the encoded value.
//! Because keys compare as unsigned byte strings, the tag values also fix the
//! relative order of different types: every `null` sorts before every
//! boolean, every boolean before every integer, and so on.
//!
//! Integer types occupy a range of tags each. The offset within the range
//! records the sign and the number of payload fields (see
//! [`scale`](super::scale)).

/// Left-edge guard byte; sorts before every encoded value.
pub const LEFT_EDGE: u8 = 0;
/// [`EdgeValue::Before`](crate::EdgeValue::Before).
pub const BEFORE: u8 = 1;
/// `null`.
pub const NULL: u8 = 2;
/// Boolean `false`.
pub const BOOL_FALSE: u8 = 3;
/// Boolean `true`.
pub const BOOL_TRUE: u8 = 4;
/// `i8`: 6..=8.
pub const BYTE: u8 = 6;
/// `i16`: 15..=21.
pub const SHORT: u8 = 15;
/// `char`: 26..=29.
pub const CHAR: u8 = 26;
/// `i32`: 31..=41.
pub const INT: u8 = 31;
/// `i64`: 55..=73.
pub const LONG: u8 = 55;
/// `f32`.
pub const FLOAT: u8 = 98;
/// `f64`.
pub const DOUBLE: u8 = 99;
/// Arbitrary-precision integer.
pub const BIG_INTEGER: u8 = 110;
/// Arbitrary-precision decimal.
pub const BIG_DECIMAL: u8 = 111;
/// Byte array.
pub const BYTE_ARRAY: u8 = 126;
/// UTF-8 string.
pub const STRING: u8 = 128;
/// Date as epoch milliseconds.
pub const DATE: u8 = 129;
/// First byte of a one-byte extension handle.
pub const CODER1: u8 = 0xC0;
/// First byte of a two-byte extension handle.
pub const CODER2: u8 = 0xC8;
/// First byte of a three-byte extension handle.
pub const CODER3: u8 = 0xD0;
/// First byte of a six-byte extension handle.
pub const CODER6: u8 = 0xD8;
/// Highest tag of the extension range.
pub const CODER_LAST: u8 = 0xDB;
/// [`EdgeValue::After`](crate::EdgeValue::After).
pub const AFTER: u8 = 254;
/// Right-edge guard byte; sorts after every encoded value.
pub const RIGHT_EDGE: u8 = 255;

/// Segment terminator.
pub const END: u8 = 0;

/// Returns `true` if `tag` starts an extension handle.
#[must_use]
pub const fn is_extension(tag: u8) -> bool {
    tag >= CODER1 && tag <= CODER_LAST
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_ascend_in_type_order() {
        let order = [
            LEFT_EDGE,
            BEFORE,
            NULL,
            BOOL_FALSE,
            BOOL_TRUE,
            BYTE,
            SHORT,
            CHAR,
            INT,
            LONG,
            FLOAT,
            DOUBLE,
            BIG_INTEGER,
            BIG_DECIMAL,
            BYTE_ARRAY,
            STRING,
            DATE,
            CODER1,
            AFTER,
            RIGHT_EDGE,
        ];
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn extension_range() {
        assert!(is_extension(CODER1));
        assert!(is_extension(CODER6 + 3));
        assert!(!is_extension(DATE));
        assert!(!is_extension(AFTER));
    }
}
