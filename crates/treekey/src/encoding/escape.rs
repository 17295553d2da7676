//! NUL/SOH quoting for string, byte-array and extension payloads.
//!
//! Payload bytes `0x00` and `0x01` are replaced by the two-byte sequences
//! `01 20` and `01 21`. The quoted payload never contains a zero byte, so the
//! segment terminator stays unambiguous, and because `01 20 < 01 21 < 02`
//! the quoted form compares exactly like the raw bytes.

use super::tags;
use crate::error::{KeyError, KeyResult};

/// Escape introducer.
pub const ESCAPE: u8 = 0x01;
/// Second byte of an escaped `0x00`.
const ESCAPED_NUL: u8 = 0x20;
/// Second byte of an escaped `0x01`.
const ESCAPED_SOH: u8 = 0x21;

/// Appends `data` to `out` with NUL and SOH bytes escaped.
pub fn quote(data: &[u8], out: &mut Vec<u8>) {
    out.reserve(data.len());
    for &byte in data {
        match byte {
            0x00 => out.extend_from_slice(&[ESCAPE, ESCAPED_NUL]),
            0x01 => out.extend_from_slice(&[ESCAPE, ESCAPED_SOH]),
            _ => out.push(byte),
        }
    }
}

/// Number of bytes `data` occupies once quoted.
#[must_use]
pub fn quoted_len(data: &[u8]) -> usize {
    data.len() + data.iter().filter(|b| **b <= ESCAPE).count()
}

/// Unquotes the payload starting at `pos` up to the next segment terminator.
///
/// Returns the raw bytes and the position of the terminator.
///
/// # Errors
///
/// Returns [`KeyError::Conversion`] if the payload is unterminated or contains
/// an escape introducer not followed by `0x20` or `0x21`.
pub fn unquote(bytes: &[u8], pos: usize) -> KeyResult<(Vec<u8>, usize)> {
    let mut out = Vec::new();
    let mut index = pos;
    loop {
        match bytes.get(index) {
            None => return Err(KeyError::conversion(index, "unterminated quoted segment")),
            Some(&tags::END) => return Ok((out, index)),
            Some(&ESCAPE) => {
                let raw = match bytes.get(index + 1) {
                    Some(&ESCAPED_NUL) => 0x00,
                    Some(&ESCAPED_SOH) => 0x01,
                    _ => return Err(KeyError::conversion(index, "invalid escape sequence")),
                };
                out.push(raw);
                index += 2;
            }
            Some(&byte) => {
                out.push(byte);
                index += 1;
            }
        }
    }
}
