//! `treekey`
//!
//! Order-preserving, multi-segment key encoding for B-tree storage engines.
//!
//! # Overview
//!
//! A [`Key`] is a bounded byte buffer holding a sequence of typed segments.
//! The encoding is chosen so that comparing two keys byte by byte, as
//! unsigned bytes, gives the same result as comparing their decoded
//! segments one after another:
//!
//! - Within a type, values sort in their natural order: integers and floats
//!   numerically, strings by code point, byte arrays lexicographically.
//! - Across types, segments sort by a fixed type rank:
//!   `null < boolean < byte < short < char < int < long < float < double <
//!   BigInteger < BigDecimal < byte[] < String < Date < extension types`.
//! - A key sorts before every key it is a proper prefix of.
//! - [`EdgeValue::Before`] and [`EdgeValue::After`] sort before and after
//!   every other value at their depth, and seed range traversals.
//!
//! Application types take part in keys through a [`KeyCoder`] registered
//! in a [`CoderRegistry`]. String collation can be replaced per key with a
//! [`KeyStringCoder`].
//!
//! # Example
//!
//! ```
//! use treekey::{EdgeValue, Key, KeyValue};
//!
//! let mut low = Key::new();
//! low.append("orders")?.append(2024i32)?.append(EdgeValue::Before)?;
//! let mut high = Key::new();
//! high.append("orders")?.append(2024i32)?.append(EdgeValue::After)?;
//!
//! let mut order = Key::new();
//! order.append("orders")?.append(2024i32)?.append(17i64)?;
//! assert!(low < order && order < high);
//!
//! order.reset();
//! assert_eq!(order.decode_any()?, KeyValue::String("orders".into()));
//! assert_eq!(order.decode::<i32>()?, 2024);
//! assert_eq!(order.decode::<i64>()?, 17);
//! # Ok::<(), treekey::KeyError>(())
//! ```
//!
//! # Modules
//!
//! - [`key`] - The [`Key`] buffer: append, decode, navigation and display
//! - [`encoding`] - Byte-level codecs for every segment type
//! - [`segment`] - [`KeySegment`] and [`DecodeSegment`] conversions
//! - [`value`] - Decoded values ([`KeyValue`], [`EdgeValue`], [`SegmentType`])
//! - [`registry`] - Extension types ([`KeyCoder`], [`CoderRegistry`])
//! - [`collator`] - Pluggable string encoding ([`KeyStringCoder`])
//! - [`state`] - Immutable snapshots ([`KeyState`])
//! - [`config`] - Key construction options ([`KeyConfig`])
//! - [`error`] - Error types ([`KeyError`])

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod collator;
pub mod config;
pub mod encoding;
pub mod error;
pub mod key;
pub mod registry;
pub mod segment;
pub mod state;
pub mod value;

/// Largest encoded size of any key.
pub const MAX_KEY_LENGTH: usize = 2047;

// Re-export commonly used types
pub use collator::{KeyStringCoder, SegmentWriter};
pub use config::KeyConfig;
pub use error::{KeyError, KeyResult};
pub use key::{max_storable_key_size, Direction, Key};
pub use registry::{CoderEntry, CoderRegistry, KeyCoder};
pub use segment::{DecodeSegment, KeySegment};
pub use state::KeyState;
pub use value::{EdgeValue, ExtensionValue, KeyValue, Null, SegmentType};

/// Shorthand for [`EdgeValue::Before`].
pub const BEFORE: EdgeValue = EdgeValue::Before;

/// Shorthand for [`EdgeValue::After`].
pub const AFTER: EdgeValue = EdgeValue::After;
