//! Binary-coded-decimal encoding for arbitrary-precision numbers.
//!
//! A value `unscaled × 10^-scale` is written as:
//!
//! ```text
//!   signum     0x3F negative, 0x40 zero, 0x41 positive
//!   exponent   e in the `i32` scale encoding (negated for negative values)
//!   digits     d1 d2 … dk packed two per byte, padded with a zero nibble
//!   [trailer]  count of trailing zeros removed from the digits
//!   [guard]    0xFF, negative values only
//! ```
//!
//! where the value equals `0.d1d2…dk × 10^e` with `d1 != 0` and `dk != 0`.
//! Each packed digit byte `b` is stored as `b + 0x11` for positive values and
//! `0xAA - b` for negative values, so digit bytes lie in `0x11..=0xAA` and
//! negative magnitudes sort in reverse. The guard makes a negative value with
//! fewer digits sort after a longer one sharing its prefix, e.g.
//! `-1.05 < -1`.
//!
//! Decimals that carry trailing zeros (`1.50` has unscaled value 150, scale 2)
//! record the number of zeros in a trailer so that the exact scale survives a
//! round trip. The trailer starts with `0x10` for positive values and `0xFE`
//! for negative values, bytes that sort before (respectively after) every
//! digit byte. Neither is a framing byte, so payloads never hold `0x00` or
//! `0x01`. Numerically equal values therefore stay adjacent, and the
//! trailer never changes the order of numerically distinct values. A zero
//! with a non-zero scale carries the scale itself in a positive trailer.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;

use super::scale::{decode_int_exact, encode_int, IntWidth};
use super::tags;
use crate::error::{KeyError, KeyResult};

const SIGNUM_NEGATIVE: u8 = 0x3F;
const SIGNUM_ZERO: u8 = 0x40;
const SIGNUM_POSITIVE: u8 = 0x41;

const TRAILER_POSITIVE: u8 = 0x10;
const TRAILER_NEGATIVE: u8 = 0xFE;
const NEGATIVE_GUARD: u8 = 0xFF;

/// Upper bound on the decimal digits of an encoded magnitude, trailing zeros
/// included.
pub const MAX_DIGITS: usize = 1 << 20;

/// Appends the BCD encoding of `unscaled × 10^-scale`.
///
/// With `keep_scale` set, trailing zeros and the scale of zero are recorded so
/// that [`decode`] returns the same `(unscaled, scale)` pair.
///
/// # Errors
///
/// Returns [`KeyError::OutOfRange`] if the decimal exponent does not fit in
/// an `i32`.
pub fn encode(
    unscaled: &BigInt,
    scale: i64,
    keep_scale: bool,
    out: &mut Vec<u8>,
) -> KeyResult<()> {
    let negative = match unscaled.sign() {
        Sign::NoSign => {
            out.push(SIGNUM_ZERO);
            if keep_scale && scale != 0 {
                out.push(TRAILER_POSITIVE);
                encode_int(IntWidth::Long, scale, out);
            }
            return Ok(());
        }
        Sign::Minus => true,
        Sign::Plus => false,
    };

    let digits = unscaled.magnitude().to_str_radix(10);
    let digits = digits.as_bytes();
    if digits.len() > MAX_DIGITS {
        return Err(KeyError::OutOfRange(format!(
            "{} decimal digits exceed {MAX_DIGITS}",
            digits.len()
        )));
    }
    let significant = digits.iter().rposition(|d| *d != b'0').map_or(0, |p| p + 1);
    let trailing_zeros = digits.len() - significant;

    let exponent = i64::try_from(digits.len())
        .ok()
        .and_then(|len| len.checked_sub(scale))
        .and_then(|e| i32::try_from(e).ok())
        .ok_or_else(|| KeyError::OutOfRange(format!("decimal exponent for scale {scale}")))?;

    out.push(if negative { SIGNUM_NEGATIVE } else { SIGNUM_POSITIVE });
    let exponent = if negative { -exponent } else { exponent };
    encode_int(IntWidth::Int, i64::from(exponent), out);

    for pair in digits[..significant].chunks(2) {
        let high = pair[0] - b'0';
        let low = pair.get(1).map_or(0, |d| d - b'0');
        let packed = (high << 4) | low;
        out.push(if negative { 0xAA - packed } else { packed + 0x11 });
    }

    if keep_scale && trailing_zeros > 0 {
        out.push(if negative { TRAILER_NEGATIVE } else { TRAILER_POSITIVE });
        // A digit string never approaches i64::MAX characters.
        encode_int(IntWidth::Long, trailing_zeros as i64, out);
    }
    if negative {
        out.push(NEGATIVE_GUARD);
    }
    Ok(())
}

/// Decodes a BCD payload starting at the signum byte at `pos`.
///
/// Returns the unscaled value, the scale, and the position following the
/// payload (where the segment terminator is expected).
///
/// # Errors
///
/// Returns [`KeyError::Conversion`] on an invalid signum, exponent, digit
/// byte or trailer, or if the payload is truncated.
pub fn decode(bytes: &[u8], pos: usize) -> KeyResult<(BigInt, i64, usize)> {
    let signum = *bytes.get(pos).ok_or_else(|| KeyError::conversion(pos, "missing signum"))?;
    let negative = match signum {
        SIGNUM_ZERO => {
            return if bytes.get(pos + 1) == Some(&TRAILER_POSITIVE) {
                let (scale, next) = decode_int_exact(bytes, pos + 2, IntWidth::Long)?;
                Ok((BigInt::zero(), scale, next))
            } else {
                Ok((BigInt::zero(), 0, pos + 1))
            };
        }
        SIGNUM_NEGATIVE => true,
        SIGNUM_POSITIVE => false,
        other => {
            return Err(KeyError::conversion(pos, format!("invalid decimal signum {other:#04x}")));
        }
    };

    let (exponent, mut index) = decode_int_exact(bytes, pos + 1, IntWidth::Int)?;
    let exponent = if negative { -exponent } else { exponent };

    let mut digits = Vec::new();
    let mut trailing_zeros = 0i64;
    loop {
        let b = *bytes
            .get(index)
            .ok_or_else(|| KeyError::conversion(index, "unterminated decimal"))?;
        match b {
            tags::END if negative => {
                return Err(KeyError::conversion(index, "missing negative decimal guard"));
            }
            tags::END => break,
            NEGATIVE_GUARD if negative => {
                index += 1;
                break;
            }
            TRAILER_NEGATIVE if negative => {
                let (zeros, next) = decode_int_exact(bytes, index + 1, IntWidth::Long)?;
                trailing_zeros = zeros;
                if bytes.get(next) != Some(&NEGATIVE_GUARD) {
                    return Err(KeyError::conversion(next, "missing negative decimal guard"));
                }
                index = next + 1;
                break;
            }
            TRAILER_POSITIVE if !negative => {
                let (zeros, next) = decode_int_exact(bytes, index + 1, IntWidth::Long)?;
                trailing_zeros = zeros;
                index = next;
                break;
            }
            _ => {
                let packed = if negative { 0xAAu8.checked_sub(b) } else { b.checked_sub(0x11) };
                let (high, low) = packed
                    .map(|p| (p >> 4, p & 0x0F))
                    .filter(|(h, l)| *h <= 9 && *l <= 9)
                    .ok_or_else(|| {
                        KeyError::conversion(index, format!("invalid BCD byte {b:#04x}"))
                    })?;
                digits.push(high);
                digits.push(low);
                index += 1;
            }
        }
    }

    while digits.last() == Some(&0) {
        digits.pop();
    }
    if digits.is_empty() || digits[0] == 0 {
        return Err(KeyError::conversion(pos, "decimal has no significant digits"));
    }
    let zeros = u32::try_from(trailing_zeros)
        .ok()
        .filter(|z| *z as usize + digits.len() <= MAX_DIGITS)
        .ok_or_else(|| {
            KeyError::conversion(pos, format!("invalid trailing zero count {trailing_zeros}"))
        })?;

    let magnitude = BigUint::from_radix_be(&digits, 10)
        .ok_or_else(|| KeyError::conversion(pos, "invalid decimal digits"))?
        * BigUint::from(10u32).pow(zeros);
    // digits.len() is bounded by the key length.
    let scale = digits.len() as i64 - exponent + i64::from(zeros);
    let sign = if negative { Sign::Minus } else { Sign::Plus };
    Ok((BigInt::from_biguint(sign, magnitude), scale, index))
}

/// Converts a decoded `(unscaled, scale)` pair to an integer.
///
/// # Errors
///
/// Returns [`KeyError::Conversion`] if the value has a fractional part.
pub fn to_integer(unscaled: BigInt, scale: i64, offset: usize) -> KeyResult<BigInt> {
    if scale <= 0 {
        let zeros = u32::try_from(-scale)
            .ok()
            .filter(|z| *z as usize <= MAX_DIGITS)
            .ok_or_else(|| KeyError::conversion(offset, "integer exponent too large"))?;
        Ok(unscaled * BigInt::from(10u32).pow(zeros))
    } else {
        Err(KeyError::conversion(offset, "decimal segment has a fractional part"))
    }
}
