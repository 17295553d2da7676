//! Conversions between Rust values and key segments.
//!
//! [`KeySegment`] is implemented for every natively supported type, so
//! [`Key::append`] accepts them directly:
//!
//! | Rust type | segment |
//! |-----------|---------|
//! | [`Null`], `Option::None` | null |
//! | `bool` | boolean |
//! | `i8`, `i16`, `i32`, `i64` | byte, short, int, long |
//! | `char` | char |
//! | `f32`, `f64` | float, double |
//! | [`BigInt`], [`BigDecimal`] | arbitrary precision |
//! | `[u8]`, `Vec<u8>`, `[u8; N]` | byte array |
//! | `str`, `String` | string |
//! | `DateTime<Utc>` | date |
//! | [`EdgeValue`] | BEFORE / AFTER |
//! | [`KeyValue`] | the wrapped value |
//!
//! Values of other types are appended with [`Key::append_object`] once a
//! [`KeyCoder`](crate::KeyCoder) is registered for them.

use std::any::Any;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use num_bigint::BigInt;

use crate::encoding::IntWidth;
use crate::error::KeyResult;
use crate::key::Key;
use crate::value::{EdgeValue, KeyValue, Null};

/// A value that can be appended to a [`Key`] as one segment.
pub trait KeySegment {
    /// Appends `self` to `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment cannot be appended; the key is left
    /// unchanged.
    fn append_to(&self, key: &mut Key, context: Option<&dyn Any>) -> KeyResult<()>;
}

impl<T: KeySegment + ?Sized> KeySegment for &T {
    fn append_to(&self, key: &mut Key, context: Option<&dyn Any>) -> KeyResult<()> {
        (**self).append_to(key, context)
    }
}

impl<T: KeySegment> KeySegment for Option<T> {
    fn append_to(&self, key: &mut Key, context: Option<&dyn Any>) -> KeyResult<()> {
        match self {
            Some(value) => value.append_to(key, context),
            None => key.append_null(),
        }
    }
}

impl KeySegment for Null {
    fn append_to(&self, key: &mut Key, _: Option<&dyn Any>) -> KeyResult<()> {
        key.append_null()
    }
}

impl KeySegment for bool {
    fn append_to(&self, key: &mut Key, _: Option<&dyn Any>) -> KeyResult<()> {
        key.append_bool(*self)
    }
}

macro_rules! int_segment {
    ($($t:ty => $width:ident),* $(,)?) => {
        $(
            impl KeySegment for $t {
                fn append_to(&self, key: &mut Key, _: Option<&dyn Any>) -> KeyResult<()> {
                    key.append_int(IntWidth::$width, i64::from(*self))
                }
            }
        )*
    };
}

int_segment! {
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
}

impl KeySegment for char {
    fn append_to(&self, key: &mut Key, _: Option<&dyn Any>) -> KeyResult<()> {
        key.append_char(*self)
    }
}

impl KeySegment for f32 {
    fn append_to(&self, key: &mut Key, _: Option<&dyn Any>) -> KeyResult<()> {
        key.append_f32(*self)
    }
}

impl KeySegment for f64 {
    fn append_to(&self, key: &mut Key, _: Option<&dyn Any>) -> KeyResult<()> {
        key.append_f64(*self)
    }
}

impl KeySegment for BigInt {
    fn append_to(&self, key: &mut Key, _: Option<&dyn Any>) -> KeyResult<()> {
        key.append_big_integer(self)
    }
}

impl KeySegment for BigDecimal {
    fn append_to(&self, key: &mut Key, _: Option<&dyn Any>) -> KeyResult<()> {
        key.append_big_decimal(self)
    }
}

impl KeySegment for [u8] {
    fn append_to(&self, key: &mut Key, _: Option<&dyn Any>) -> KeyResult<()> {
        key.append_bytes(self)
    }
}

impl KeySegment for Vec<u8> {
    fn append_to(&self, key: &mut Key, _: Option<&dyn Any>) -> KeyResult<()> {
        key.append_bytes(self)
    }
}

impl<const N: usize> KeySegment for [u8; N] {
    fn append_to(&self, key: &mut Key, _: Option<&dyn Any>) -> KeyResult<()> {
        key.append_bytes(self)
    }
}

impl KeySegment for str {
    fn append_to(&self, key: &mut Key, context: Option<&dyn Any>) -> KeyResult<()> {
        key.append_str(self, context)
    }
}

impl KeySegment for String {
    fn append_to(&self, key: &mut Key, context: Option<&dyn Any>) -> KeyResult<()> {
        key.append_str(self, context)
    }
}

impl KeySegment for DateTime<Utc> {
    fn append_to(&self, key: &mut Key, _: Option<&dyn Any>) -> KeyResult<()> {
        key.append_date(self)
    }
}

impl KeySegment for EdgeValue {
    fn append_to(&self, key: &mut Key, _: Option<&dyn Any>) -> KeyResult<()> {
        key.append_edge(*self)
    }
}

impl KeySegment for KeyValue {
    fn append_to(&self, key: &mut Key, context: Option<&dyn Any>) -> KeyResult<()> {
        match self {
            Self::Null => key.append_null(),
            Self::Bool(v) => key.append_bool(*v),
            Self::Byte(v) => v.append_to(key, context),
            Self::Short(v) => v.append_to(key, context),
            Self::Char(v) => key.append_char(*v),
            Self::Int(v) => v.append_to(key, context),
            Self::Long(v) => v.append_to(key, context),
            Self::Float(v) => key.append_f32(*v),
            Self::Double(v) => key.append_f64(*v),
            Self::BigInteger(v) => key.append_big_integer(v),
            Self::BigDecimal(v) => key.append_big_decimal(v),
            Self::Bytes(v) => key.append_bytes(v),
            Self::String(v) => key.append_str(v, context),
            Self::Date(v) => key.append_date(v),
            Self::Extension(ext) => {
                let entry = key.registry().lookup_by_handle(ext.handle());
                key.append_extension(entry, ext.type_name(), ext.value().as_ref(), context)
            }
            Self::Edge(edge) => key.append_edge(*edge),
        }
    }
}

/// A value that can be decoded from the segment at a [`Key`]'s cursor.
pub trait DecodeSegment: Sized {
    /// Decodes the next segment of `key`, advancing its cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment does not hold a `Self`; the cursor is
    /// left unchanged.
    fn decode_from(key: &mut Key, context: Option<&dyn Any>) -> KeyResult<Self>;
}

macro_rules! decode_segment {
    ($($t:ty => $method:ident),* $(,)?) => {
        $(
            impl DecodeSegment for $t {
                fn decode_from(key: &mut Key, _: Option<&dyn Any>) -> KeyResult<Self> {
                    key.$method()
                }
            }
        )*
    };
}

decode_segment! {
    bool => decode_bool,
    i8 => decode_i8,
    i16 => decode_i16,
    char => decode_char,
    i32 => decode_i32,
    i64 => decode_i64,
    f32 => decode_f32,
    f64 => decode_f64,
    BigInt => decode_big_integer,
    BigDecimal => decode_big_decimal,
    Vec<u8> => decode_bytes,
    DateTime<Utc> => decode_date,
    EdgeValue => decode_edge,
}

impl DecodeSegment for Null {
    fn decode_from(key: &mut Key, _: Option<&dyn Any>) -> KeyResult<Self> {
        key.decode_null().map(|()| Self)
    }
}

impl DecodeSegment for String {
    fn decode_from(key: &mut Key, context: Option<&dyn Any>) -> KeyResult<Self> {
        key.decode_string_with_context(context)
    }
}

impl DecodeSegment for KeyValue {
    fn decode_from(key: &mut Key, context: Option<&dyn Any>) -> KeyResult<Self> {
        key.decode_any_with_context(context)
    }
}

/// `None` for a null segment, otherwise the decoded `T`.
impl<T: DecodeSegment> DecodeSegment for Option<T> {
    fn decode_from(key: &mut Key, context: Option<&dyn Any>) -> KeyResult<Self> {
        if key.is_null() {
            key.decode_null()?;
            Ok(None)
        } else {
            T::decode_from(key, context).map(Some)
        }
    }
}
