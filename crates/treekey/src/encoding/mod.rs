//! Byte-level codecs used to build key segments.
//!
//! Every function in this module works on a plain byte buffer and a
//! position. The [`Key`](crate::Key) buffer layers segment framing, cursor
//! management and capacity checks on top.
//!
//! - [`tags`] - the type tag table, which also fixes the order between types
//! - [`scale`] - variable-length integers and floats
//! - [`bcd`] - arbitrary-precision integers and decimals
//! - [`escape`] - NUL/SOH quoting of string, byte-array and extension payloads
//! - [`handle`] - compact extension coder handles

pub mod bcd;
pub mod escape;
pub mod handle;
pub mod scale;
pub mod tags;


pub use scale::IntWidth;
