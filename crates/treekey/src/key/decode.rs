//! Decoding segments at the cursor.
//!
//! Every decoder reads the segment starting at [`Key::index`] and, on
//! success, moves the cursor past its terminator. On failure the cursor is
//! left where it was.

use std::any::Any;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use num_bigint::BigInt;

use super::Key;
use crate::encoding::{bcd, escape, handle, scale, tags, IntWidth};
use crate::error::{KeyError, KeyResult};
use crate::registry::{CoderEntry, KeyCoder};
use crate::segment::DecodeSegment;
use crate::value::{EdgeValue, ExtensionValue, KeyValue, SegmentType};

impl Key {
    /// Runs `decode` on the segment at the cursor. `decode` returns the value
    /// and the position where the terminator must be.
    fn decode_with<T>(
        &mut self,
        decode: impl FnOnce(&Self, usize) -> KeyResult<(T, usize)>,
    ) -> KeyResult<T> {
        let start = self.index;
        if start >= self.bytes.len() {
            return Err(KeyError::MissingSegment { index: start, size: self.bytes.len() });
        }
        let (value, end) = decode(self, start)?;
        if self.bytes.get(end) != Some(&tags::END) {
            return Err(KeyError::conversion(end, "missing segment terminator"));
        }
        self.index = end + 1;
        Ok(value)
    }

    /// Tag of the segment at the cursor.
    fn peek_tag(&self) -> KeyResult<u8> {
        self.bytes
            .get(self.index)
            .copied()
            .ok_or(KeyError::MissingSegment { index: self.index, size: self.bytes.len() })
    }

    fn expect_tag(&self, pos: usize, expected: u8, name: &str) -> KeyResult<()> {
        match self.bytes[pos] {
            tag if tag == expected => Ok(()),
            tag => Err(KeyError::conversion(pos, format!("expected {name}, found tag {tag}"))),
        }
    }

    /// Decodes an integer whose width is one of `accepted`.
    fn decode_int_in(&mut self, accepted: &[IntWidth], name: &str) -> KeyResult<i64> {
        self.decode_with(|key, start| {
            let (width, value, end) = scale::decode_int(&key.bytes, start)?;
            if accepted.contains(&width) {
                Ok((value, end))
            } else {
                Err(KeyError::conversion(
                    start,
                    format!("{} segment is not convertible to {name}", width.name()),
                ))
            }
        })
    }

    /// Decodes a boolean.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::MissingSegment`] at the end of the key and
    /// [`KeyError::Conversion`] if the segment is not a boolean.
    pub fn decode_bool(&mut self) -> KeyResult<bool> {
        self.decode_with(|key, start| match key.bytes[start] {
            tags::BOOL_TRUE => Ok((true, start + 1)),
            tags::BOOL_FALSE => Ok((false, start + 1)),
            tag => Err(KeyError::conversion(start, format!("expected boolean, found tag {tag}"))),
        })
    }

    /// Decodes an `i8`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] unless the segment is a byte.
    pub fn decode_i8(&mut self) -> KeyResult<i8> {
        self.decode_with(|key, start| {
            let (value, end) = scale::decode_int_exact(&key.bytes, start, IntWidth::Byte)?;
            // Range checked by the decoder.
            Ok((value as i8, end))
        })
    }

    /// Decodes an `i16` from a byte or short segment.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] for any other segment type.
    pub fn decode_i16(&mut self) -> KeyResult<i16> {
        let value = self.decode_int_in(&[IntWidth::Byte, IntWidth::Short], "short")?;
        Ok(value as i16)
    }

    /// Decodes a `char`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] unless the segment is a char holding
    /// a Unicode scalar value.
    pub fn decode_char(&mut self) -> KeyResult<char> {
        self.decode_with(|key, start| {
            let (code, end) = scale::decode_int_exact(&key.bytes, start, IntWidth::Char)?;
            let c = u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| {
                    KeyError::conversion(start, format!("{code:#x} is not a Unicode scalar value"))
                })?;
            Ok((c, end))
        })
    }

    /// Decodes an `i32` from a byte, short, char or int segment.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] for any other segment type.
    pub fn decode_i32(&mut self) -> KeyResult<i32> {
        let accepted = [IntWidth::Byte, IntWidth::Short, IntWidth::Char, IntWidth::Int];
        let value = self.decode_int_in(&accepted, "int")?;
        Ok(value as i32)
    }

    /// Decodes an `i64` from any integer segment.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] for non-integer segments.
    pub fn decode_i64(&mut self) -> KeyResult<i64> {
        self.decode_int_in(&IntWidth::ALL, "long")
    }

    /// Decodes an `f32`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] unless the segment is a float.
    pub fn decode_f32(&mut self) -> KeyResult<f32> {
        self.decode_with(|key, start| {
            key.expect_tag(start, tags::FLOAT, "float")?;
            scale::decode_f32(&key.bytes, start + 1)
        })
    }

    /// Decodes an `f64` from a float or double segment.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] for any other segment type.
    pub fn decode_f64(&mut self) -> KeyResult<f64> {
        self.decode_with(|key, start| match key.bytes[start] {
            tags::DOUBLE => scale::decode_f64(&key.bytes, start + 1),
            tags::FLOAT => {
                scale::decode_f32(&key.bytes, start + 1).map(|(v, end)| (f64::from(v), end))
            }
            tag => Err(KeyError::conversion(start, format!("expected double, found tag {tag}"))),
        })
    }

    /// Decodes a string, using the attached string coder if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] unless the segment is a string.
    pub fn decode_string(&mut self) -> KeyResult<String> {
        self.decode_string_with_context(None)
    }

    /// Decodes a string, passing `context` to the string coder.
    ///
    /// # Errors
    ///
    /// As for [`decode_string`](Self::decode_string), plus any error raised
    /// by the string coder.
    pub fn decode_string_with_context(&mut self, context: Option<&dyn Any>) -> KeyResult<String> {
        self.decode_with(|key, start| {
            key.expect_tag(start, tags::STRING, "string")?;
            match &key.string_coder {
                Some(coder) => {
                    let payload = &key.bytes[start + 1..];
                    let len = payload
                        .iter()
                        .position(|b| *b == tags::END)
                        .ok_or_else(|| KeyError::conversion(start, "unterminated string segment"))?;
                    let mut out = String::new();
                    coder.render_segment(&payload[..len], &mut out, context)?;
                    Ok((out, start + 1 + len))
                }
                None => {
                    let (raw, end) = escape::unquote(&key.bytes, start + 1)?;
                    let s = String::from_utf8(raw).map_err(|e| {
                        KeyError::conversion(start, format!("invalid UTF-8 in string: {e}"))
                    })?;
                    Ok((s, end))
                }
            }
        })
    }

    /// Decodes a byte array.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] unless the segment is a byte array.
    pub fn decode_bytes(&mut self) -> KeyResult<Vec<u8>> {
        self.decode_with(|key, start| {
            key.expect_tag(start, tags::BYTE_ARRAY, "byte array")?;
            escape::unquote(&key.bytes, start + 1)
        })
    }

    /// Decodes a date, with millisecond precision.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] unless the segment is a date within
    /// the representable range.
    pub fn decode_date(&mut self) -> KeyResult<DateTime<Utc>> {
        self.decode_with(|key, start| {
            key.expect_tag(start, tags::DATE, "date")?;
            let (millis, end) = scale::decode_int_exact(&key.bytes, start + 1, IntWidth::Long)?;
            let date = DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| {
                    KeyError::conversion(start, format!("date {millis}ms out of range"))
                })?;
            Ok((date, end))
        })
    }

    /// Decodes an arbitrary-precision integer.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] unless the segment is a big integer.
    pub fn decode_big_integer(&mut self) -> KeyResult<BigInt> {
        self.decode_with(|key, start| {
            key.expect_tag(start, tags::BIG_INTEGER, "BigInteger")?;
            let (unscaled, scale, end) = bcd::decode(&key.bytes, start + 1)?;
            Ok((bcd::to_integer(unscaled, scale, start)?, end))
        })
    }

    /// Decodes an arbitrary-precision decimal, preserving its scale.
    ///
    /// Big integer segments are accepted and decode with scale zero.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] for any other segment type.
    pub fn decode_big_decimal(&mut self) -> KeyResult<BigDecimal> {
        self.decode_with(|key, start| match key.bytes[start] {
            tags::BIG_DECIMAL => {
                let (unscaled, scale, end) = bcd::decode(&key.bytes, start + 1)?;
                Ok((BigDecimal::new(unscaled, scale), end))
            }
            tags::BIG_INTEGER => {
                let (unscaled, scale, end) = bcd::decode(&key.bytes, start + 1)?;
                Ok((BigDecimal::new(bcd::to_integer(unscaled, scale, start)?, 0), end))
            }
            tag => Err(KeyError::conversion(
                start,
                format!("expected BigDecimal, found tag {tag}"),
            )),
        })
    }

    /// Returns `true` if the segment at the cursor is `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.bytes.get(self.index..self.index + 2) == Some(&[tags::NULL, tags::END][..])
    }

    /// Consumes a `null` segment.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] unless the segment is `null`.
    pub fn decode_null(&mut self) -> KeyResult<()> {
        self.decode_with(|key, start| {
            key.expect_tag(start, tags::NULL, "null")?;
            Ok(((), start + 1))
        })
    }

    /// Consumes a BEFORE or AFTER segment.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] unless the segment is an edge value.
    pub fn decode_edge(&mut self) -> KeyResult<EdgeValue> {
        let start = self.index;
        let edge = match self.peek_tag()? {
            tags::BEFORE => EdgeValue::Before,
            tags::AFTER => EdgeValue::After,
            tag => {
                return Err(KeyError::conversion(
                    start,
                    format!("expected edge value, found tag {tag}"),
                ));
            }
        };
        self.index = start + 1;
        Ok(edge)
    }

    /// Type of the segment at the cursor, without advancing.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::MissingSegment`] at the end of the key and
    /// [`KeyError::Conversion`] for an unassigned tag or malformed handle.
    pub fn decode_type(&self) -> KeyResult<SegmentType> {
        let tag = self.peek_tag()?;
        if tags::is_extension(tag) {
            let (handle, _) = handle::decode(&self.bytes, self.index)?;
            let type_name = self.registry.lookup_by_handle(handle).map(|entry| entry.type_name());
            return Ok(SegmentType::Extension { handle, type_name });
        }
        SegmentType::from_tag(tag)
            .ok_or_else(|| KeyError::conversion(self.index, format!("invalid segment tag {tag}")))
    }

    /// Decodes the segment at the cursor as whatever type it holds.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] if the segment is malformed, is a
    /// guard byte, or belongs to an extension type without a coder.
    pub fn decode_any(&mut self) -> KeyResult<KeyValue> {
        self.decode_any_with_context(None)
    }

    /// Decodes the segment at the cursor, passing `context` to coders.
    ///
    /// # Errors
    ///
    /// As for [`decode_any`](Self::decode_any).
    pub fn decode_any_with_context(&mut self, context: Option<&dyn Any>) -> KeyResult<KeyValue> {
        Ok(match self.decode_type()? {
            SegmentType::LeftEdge | SegmentType::RightEdge => {
                return Err(KeyError::conversion(self.index, "guard byte is not a value"));
            }
            SegmentType::Edge(_) => KeyValue::Edge(self.decode_edge()?),
            SegmentType::Null => {
                self.decode_null()?;
                KeyValue::Null
            }
            SegmentType::Bool => KeyValue::Bool(self.decode_bool()?),
            SegmentType::Byte => KeyValue::Byte(self.decode_i8()?),
            SegmentType::Short => KeyValue::Short(self.decode_i16()?),
            SegmentType::Char => KeyValue::Char(self.decode_char()?),
            SegmentType::Int => KeyValue::Int(self.decode_i32()?),
            SegmentType::Long => KeyValue::Long(self.decode_i64()?),
            SegmentType::Float => KeyValue::Float(self.decode_f32()?),
            SegmentType::Double => KeyValue::Double(self.decode_f64()?),
            SegmentType::BigInteger => KeyValue::BigInteger(self.decode_big_integer()?),
            SegmentType::BigDecimal => KeyValue::BigDecimal(self.decode_big_decimal()?),
            SegmentType::Bytes => KeyValue::Bytes(self.decode_bytes()?),
            SegmentType::String => KeyValue::String(self.decode_string_with_context(context)?),
            SegmentType::Date => KeyValue::Date(self.decode_date()?),
            SegmentType::Extension { .. } => KeyValue::Extension(self.decode_extension(context)?),
        })
    }

    /// Decodes the segment at the cursor as a `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment does not hold a `T`.
    pub fn decode<T: DecodeSegment>(&mut self) -> KeyResult<T> {
        T::decode_from(self, None)
    }

    /// Decodes the segment at the cursor as a `T`, passing `context` to coders.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment does not hold a `T`.
    pub fn decode_with_context<T: DecodeSegment>(
        &mut self,
        context: Option<&dyn Any>,
    ) -> KeyResult<T> {
        T::decode_from(self, context)
    }

    /// Decodes an extension segment holding a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] if the segment is not an extension
    /// segment, its type has no coder, or the coder produced another type.
    pub fn decode_object<T: Any + Send + Sync>(&mut self) -> KeyResult<Arc<T>> {
        self.decode_object_with_context(None)
    }

    /// Decodes an extension segment holding a `T`, passing `context` to its
    /// coder.
    ///
    /// # Errors
    ///
    /// As for [`decode_object`](Self::decode_object).
    pub fn decode_object_with_context<T: Any + Send + Sync>(
        &mut self,
        context: Option<&dyn Any>,
    ) -> KeyResult<Arc<T>> {
        let start = self.index;
        let ext = self.decode_extension(context)?;
        Arc::clone(ext.value()).downcast::<T>().map_err(|_| {
            self.index = start;
            KeyError::conversion(
                start,
                format!(
                    "{} segment does not decode to {}",
                    ext.type_name(),
                    std::any::type_name::<T>()
                ),
            )
        })
    }

    /// Decodes the segment at the cursor into an existing value.
    ///
    /// A [`KeyValue`] target receives any segment and a `String` target has a
    /// string segment appended to it. Any other target is handed to the
    /// extension segment's [`KeyCoder::render_segment`].
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Conversion`] if the segment cannot be decoded into
    /// `target`.
    pub fn decode_into(
        &mut self,
        target: &mut dyn Any,
        context: Option<&dyn Any>,
    ) -> KeyResult<()> {
        if let Some(value) = target.downcast_mut::<KeyValue>() {
            *value = self.decode_any_with_context(context)?;
            return Ok(());
        }
        if let Some(s) = target.downcast_mut::<String>() {
            let decoded = self.decode_string_with_context(context)?;
            s.push_str(&decoded);
            return Ok(());
        }
        self.decode_with(|key, start| {
            let (entry, payload, end) = key.extension_payload(start)?;
            let coder = coder_of(&entry, start)?;
            let mut scratch = key.scratch(payload);
            if coder.render_segment(&mut scratch, target, context)? {
                Ok(((), end))
            } else {
                Err(KeyError::conversion(
                    start,
                    format!("key coder for {} cannot render into the target", entry.type_name()),
                ))
            }
        })
    }

    /// Decodes an extension segment with its registered coder.
    pub(crate) fn decode_extension(
        &mut self,
        context: Option<&dyn Any>,
    ) -> KeyResult<ExtensionValue> {
        self.decode_with(|key, start| {
            let (entry, payload, end) = key.extension_payload(start)?;
            let coder = coder_of(&entry, start)?;
            let mut scratch = key.scratch(payload);
            let value = coder.decode_segment(&mut scratch, context)?;
            Ok((ExtensionValue::new(entry.handle(), entry.type_name(), value), end))
        })
    }

    /// Resolves the handle at `start` and unquotes the coder's bytes.
    ///
    /// Returns the registry entry, the raw bytes, and the terminator position.
    pub(crate) fn extension_payload(
        &self,
        start: usize,
    ) -> KeyResult<(Arc<CoderEntry>, Vec<u8>, usize)> {
        let (handle, next) = handle::decode(&self.bytes, start)?;
        let entry = self
            .registry
            .lookup_by_handle(handle)
            .ok_or_else(|| KeyError::conversion(start, format!("unknown coder handle {handle}")))?;
        let (payload, end) = escape::unquote(&self.bytes, next)?;
        Ok((entry, payload, end))
    }
}

fn coder_of(entry: &CoderEntry, offset: usize) -> KeyResult<Arc<dyn KeyCoder>> {
    entry
        .coder()
        .cloned()
        .ok_or_else(|| {
            KeyError::conversion(offset, format!("no key coder for {}", entry.type_name()))
        })
}
