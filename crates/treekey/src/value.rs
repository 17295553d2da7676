//! Decoded segment values.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::encoding::{tags, IntWidth};

/// Markers that position a key just before or just after every key sharing
/// its prefix.
///
/// An edge value may only be the last segment of a key and is never valid
/// for storage; it exists to seed traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeValue {
    /// Sorts before every other value at its depth.
    Before,
    /// Sorts after every other value at its depth.
    After,
}

impl EdgeValue {
    pub(crate) const fn tag(self) -> u8 {
        match self {
            Self::Before => tags::BEFORE,
            Self::After => tags::AFTER,
        }
    }
}

impl fmt::Display for EdgeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => f.write_str("{before}"),
            Self::After => f.write_str("{after}"),
        }
    }
}

/// The `null` segment value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Null;

/// A value produced by a registered [`KeyCoder`](crate::KeyCoder).
#[derive(Clone)]
pub struct ExtensionValue {
    handle: u32,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl ExtensionValue {
    pub(crate) fn new(
        handle: u32,
        type_name: &'static str,
        value: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self { handle, type_name, value }
    }

    /// Registry handle of the value's type.
    #[must_use]
    pub const fn handle(&self) -> u32 {
        self.handle
    }

    /// Registered name of the value's type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The decoded value.
    #[must_use]
    pub fn value(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.value
    }

    /// Returns the value if it has type `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_ref().downcast_ref::<T>()
    }
}

impl fmt::Debug for ExtensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionValue")
            .field("handle", &self.handle)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Two extension values are equal when they refer to the same decoded object.
impl PartialEq for ExtensionValue {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && Arc::ptr_eq(&self.value, &other.value)
    }
}

/// A decoded key segment.
///
/// Appending a `KeyValue` produces the same bytes as appending the wrapped
/// value directly, so [`Key::decode_any`](crate::Key::decode_any) always
/// returns the variant matching the encoded type.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// 8-bit integer
    Byte(i8),
    /// 16-bit integer
    Short(i16),
    /// Unicode scalar value
    Char(char),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Arbitrary-precision integer
    BigInteger(BigInt),
    /// Arbitrary-precision decimal
    BigDecimal(BigDecimal),
    /// Byte array
    Bytes(Vec<u8>),
    /// String
    String(String),
    /// UTC timestamp with millisecond precision
    Date(DateTime<Utc>),
    /// Value of a registered extension type
    Extension(ExtensionValue),
    /// BEFORE or AFTER
    Edge(EdgeValue),
}

impl KeyValue {
    /// The segment type this value encodes as.
    #[must_use]
    pub fn segment_type(&self) -> SegmentType {
        match self {
            Self::Null => SegmentType::Null,
            Self::Bool(_) => SegmentType::Bool,
            Self::Byte(_) => SegmentType::Byte,
            Self::Short(_) => SegmentType::Short,
            Self::Char(_) => SegmentType::Char,
            Self::Int(_) => SegmentType::Int,
            Self::Long(_) => SegmentType::Long,
            Self::Float(_) => SegmentType::Float,
            Self::Double(_) => SegmentType::Double,
            Self::BigInteger(_) => SegmentType::BigInteger,
            Self::BigDecimal(_) => SegmentType::BigDecimal,
            Self::Bytes(_) => SegmentType::Bytes,
            Self::String(_) => SegmentType::String,
            Self::Date(_) => SegmentType::Date,
            Self::Extension(ext) => {
                SegmentType::Extension { handle: ext.handle, type_name: Some(ext.type_name) }
            }
            Self::Edge(edge) => SegmentType::Edge(*edge),
        }
    }
}

macro_rules! key_value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for KeyValue {
                fn from(v: $t) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

key_value_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    char => Char,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    BigInt => BigInteger,
    BigDecimal => BigDecimal,
    Vec<u8> => Bytes,
    String => String,
    DateTime<Utc> => Date,
    EdgeValue => Edge,
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Null> for KeyValue {
    fn from(_: Null) -> Self {
        Self::Null
    }
}

/// The type of an encoded segment, as identified by its tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    /// The left-edge guard byte.
    LeftEdge,
    /// The right-edge guard byte.
    RightEdge,
    /// BEFORE or AFTER.
    Edge(EdgeValue),
    /// `null`
    Null,
    /// Boolean
    Bool,
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
    /// `f32`
    Float,
    /// `f64`
    Double,
    /// Arbitrary-precision integer
    BigInteger,
    /// Arbitrary-precision decimal
    BigDecimal,
    /// Byte array
    Bytes,
    /// String
    String,
    /// Date
    Date,
    /// Registered extension type; the name is `None` for unknown handles.
    Extension {
        /// Registry handle
        handle: u32,
        /// Registered type name
        type_name: Option<&'static str>,
    },
}

impl SegmentType {
    /// Identifies a built-in segment type from its tag. Extension tags need
    /// the registry and return `None` here, as do unassigned tags.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        if let Some(width) = IntWidth::from_tag(tag) {
            return Some(match width {
                IntWidth::Byte => Self::Byte,
                IntWidth::Short => Self::Short,
                IntWidth::Char => Self::Char,
                IntWidth::Int => Self::Int,
                IntWidth::Long => Self::Long,
            });
        }
        Some(match tag {
            tags::LEFT_EDGE => Self::LeftEdge,
            tags::BEFORE => Self::Edge(EdgeValue::Before),
            tags::NULL => Self::Null,
            tags::BOOL_FALSE | tags::BOOL_TRUE => Self::Bool,
            tags::FLOAT => Self::Float,
            tags::DOUBLE => Self::Double,
            tags::BIG_INTEGER => Self::BigInteger,
            tags::BIG_DECIMAL => Self::BigDecimal,
            tags::BYTE_ARRAY => Self::Bytes,
            tags::STRING => Self::String,
            tags::DATE => Self::Date,
            tags::AFTER => Self::Edge(EdgeValue::After),
            tags::RIGHT_EDGE => Self::RightEdge,
            _ => return None,
        })
    }

    /// Display prefix used by [`Key::decode_displayable`](crate::Key::decode_displayable).
    #[must_use]
    pub(crate) const fn display_prefix(&self) -> &'static str {
        match self {
            Self::Byte => "(byte)",
            Self::Short => "(short)",
            Self::Char => "(char)",
            Self::Long => "(long)",
            Self::Float => "(float)",
            Self::BigInteger => "(BigInteger)",
            Self::BigDecimal => "(BigDecimal)",
            Self::Date => "(Date)",
            Self::Bytes => "(byte[])",
            _ => "",
        }
    }
}
