//! Appending, replacing and removing segments.

use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use tracing::warn;

use super::Key;
use crate::collator::SegmentWriter;
use crate::encoding::{bcd, escape, handle, scale, tags, IntWidth};
use crate::error::{KeyError, KeyResult};
use crate::registry::CoderEntry;
use crate::segment::KeySegment;
use crate::value::EdgeValue;

impl Key {
    /// Appends a segment.
    ///
    /// # Errors
    ///
    /// - [`KeyError::Structural`] if the key ends in an edge value or guard
    /// - [`KeyError::Capacity`] if the key would exceed its maximum size
    /// - [`KeyError::NoCodec`] for an extension type without a coder
    ///
    /// The key is unchanged on error.
    pub fn append<T: KeySegment>(&mut self, value: T) -> KeyResult<&mut Self> {
        self.append_with_context(value, None)
    }

    /// Appends a segment, passing `context` to any string or key coder involved.
    ///
    /// # Errors
    ///
    /// As for [`append`](Self::append).
    pub fn append_with_context<T: KeySegment>(
        &mut self,
        value: T,
        context: Option<&dyn Any>,
    ) -> KeyResult<&mut Self> {
        value.append_to(self, context)?;
        Ok(self)
    }

    /// Appends a value of a type registered with the key's [`CoderRegistry`](crate::CoderRegistry).
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::NoCodec`] if `T` has no coder, or any error raised
    /// by the coder.
    pub fn append_object<T: Any>(&mut self, value: &T) -> KeyResult<&mut Self> {
        self.append_object_with_context(value, None)
    }

    /// Appends a registered value with a coder context.
    ///
    /// # Errors
    ///
    /// As for [`append_object`](Self::append_object).
    pub fn append_object_with_context<T: Any>(
        &mut self,
        value: &T,
        context: Option<&dyn Any>,
    ) -> KeyResult<&mut Self> {
        let entry = self.registry.lookup_by_type(TypeId::of::<T>());
        self.append_extension(entry, type_name::<T>(), value, context)?;
        Ok(self)
    }

    /// Replaces the last segment with `value`. Appends when the key is empty.
    ///
    /// # Errors
    ///
    /// As for [`append`](Self::append); the key is unchanged on error.
    pub fn to<T: KeySegment>(&mut self, value: T) -> KeyResult<&mut Self> {
        self.to_with_context(value, None)
    }

    /// Replaces the last segment, passing `context` to any coder involved.
    ///
    /// # Errors
    ///
    /// As for [`append`](Self::append); the key is unchanged on error.
    pub fn to_with_context<T: KeySegment>(
        &mut self,
        value: T,
        context: Option<&dyn Any>,
    ) -> KeyResult<&mut Self> {
        if self.bytes.is_empty() {
            return self.append_with_context(value, context);
        }
        let start = self.previous_element_index(self.bytes.len()).unwrap_or(0);
        let (depth, generation, index) = (self.depth, self.generation, self.index);
        let tail = self.bytes.split_off(start);
        self.depth -= 1;

        match value.append_to(self, context) {
            Ok(()) => {
                self.index = index.min(start);
                Ok(self)
            }
            Err(err) => {
                self.bytes.truncate(start);
                self.bytes.extend_from_slice(&tail);
                self.depth = depth;
                self.generation = generation;
                Err(err)
            }
        }
    }

    /// Removes the last segment.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Structural`] if the key is empty.
    pub fn cut(&mut self) -> KeyResult<&mut Self> {
        self.cut_n(1)
    }

    /// Removes the last `count` segments.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Structural`] if the key has fewer than `count`
    /// segments.
    pub fn cut_n(&mut self, count: usize) -> KeyResult<&mut Self> {
        if count > self.depth {
            return Err(KeyError::structural(format!(
                "cannot remove {count} segments from key of depth {}",
                self.depth
            )));
        }
        let mut offset = self.bytes.len();
        for _ in 0..count {
            offset = self
                .previous_element_index(offset)
                .ok_or_else(|| KeyError::structural("attempting to remove missing segments"))?;
        }
        self.bytes.truncate(offset);
        self.depth -= count;
        self.index = self.index.min(offset);
        self.bump_generation();
        Ok(self)
    }

    /// Truncates the key to `depth` segments; a negative `depth` removes
    /// `|depth|` segments and zero clears the key. Resets the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Structural`] if `|depth|` exceeds the key's depth.
    pub fn set_depth(&mut self, depth: i32) -> KeyResult<&mut Self> {
        if depth == 0 {
            return Ok(self.clear());
        }
        let offset = self.depth_offset(depth)?;
        self.bytes.truncate(offset);
        self.index = 0;
        self.depth = self.count_segments();
        self.bump_generation();
        Ok(self)
    }

    /// Removes every segment and resets the cursor.
    pub fn clear(&mut self) -> &mut Self {
        self.bytes.clear();
        self.index = 0;
        self.depth = 0;
        self.bump_generation();
        self
    }

    // ------------------------------------------------------------------
    // Segment writers
    // ------------------------------------------------------------------

    /// Fails unless the key is empty or ends with a segment terminator.
    pub(crate) fn check_appendable(&self) -> KeyResult<()> {
        match self.bytes.as_slice() {
            [] => Ok(()),
            [tags::LEFT_EDGE] => Err(KeyError::structural("append to left edge key")),
            [tags::RIGHT_EDGE] => Err(KeyError::structural("append to right edge key")),
            [.., tags::END] => Ok(()),
            [.., tags::BEFORE | tags::AFTER] => {
                Err(KeyError::structural("append after BEFORE or AFTER"))
            }
            [.., last] => Err(KeyError::structural(format!(
                "append to invalid final segment byte {last}"
            ))),
        }
    }

    fn ensure_room(&self, additional: usize) -> KeyResult<()> {
        let requested = self.bytes.len() + additional;
        if requested > self.max_size {
            return Err(KeyError::Capacity { requested, maximum: self.max_size });
        }
        Ok(())
    }

    /// Accounts for a segment written from `start`, or removes it if the key
    /// overflowed.
    fn finish_segment(&mut self, start: usize) -> KeyResult<()> {
        let requested = self.bytes.len();
        if requested > self.max_size {
            self.bytes.truncate(start);
            return Err(KeyError::Capacity { requested, maximum: self.max_size });
        }
        self.depth += 1;
        self.bump_generation();
        Ok(())
    }

    /// Writes tag and payload with `encode`, then the terminator.
    fn write_segment(
        &mut self,
        encode: impl FnOnce(&mut Vec<u8>) -> KeyResult<()>,
    ) -> KeyResult<()> {
        self.check_appendable()?;
        let start = self.bytes.len();
        if let Err(err) = encode(&mut self.bytes) {
            self.bytes.truncate(start);
            return Err(err);
        }
        self.bytes.push(tags::END);
        self.finish_segment(start)
    }

    pub(crate) fn append_null(&mut self) -> KeyResult<()> {
        self.write_segment(|buf| {
            buf.push(tags::NULL);
            Ok(())
        })
    }

    pub(crate) fn append_bool(&mut self, value: bool) -> KeyResult<()> {
        self.write_segment(|buf| {
            buf.push(if value { tags::BOOL_TRUE } else { tags::BOOL_FALSE });
            Ok(())
        })
    }

    pub(crate) fn append_int(&mut self, width: IntWidth, value: i64) -> KeyResult<()> {
        self.write_segment(|buf| {
            scale::encode_int(width, value, buf);
            Ok(())
        })
    }

    pub(crate) fn append_char(&mut self, value: char) -> KeyResult<()> {
        self.append_int(IntWidth::Char, i64::from(u32::from(value)))
    }

    pub(crate) fn append_f32(&mut self, value: f32) -> KeyResult<()> {
        self.write_segment(|buf| {
            buf.push(tags::FLOAT);
            scale::encode_f32(value, buf);
            Ok(())
        })
    }

    pub(crate) fn append_f64(&mut self, value: f64) -> KeyResult<()> {
        self.write_segment(|buf| {
            buf.push(tags::DOUBLE);
            scale::encode_f64(value, buf);
            Ok(())
        })
    }

    pub(crate) fn append_big_integer(&mut self, value: &BigInt) -> KeyResult<()> {
        self.write_segment(|buf| {
            buf.push(tags::BIG_INTEGER);
            bcd::encode(value, 0, false, buf)
        })
    }

    pub(crate) fn append_big_decimal(&mut self, value: &BigDecimal) -> KeyResult<()> {
        let (unscaled, scale) = value.as_bigint_and_exponent();
        self.write_segment(|buf| {
            buf.push(tags::BIG_DECIMAL);
            bcd::encode(&unscaled, scale, true, buf)
        })
    }

    pub(crate) fn append_date(&mut self, value: &DateTime<Utc>) -> KeyResult<()> {
        let millis = value.timestamp_millis();
        self.write_segment(|buf| {
            buf.push(tags::DATE);
            scale::encode_int(IntWidth::Long, millis, buf);
            Ok(())
        })
    }

    pub(crate) fn append_bytes(&mut self, value: &[u8]) -> KeyResult<()> {
        self.check_appendable()?;
        self.ensure_room(escape::quoted_len(value) + 2)?;
        self.write_segment(|buf| {
            buf.push(tags::BYTE_ARRAY);
            escape::quote(value, buf);
            Ok(())
        })
    }

    pub(crate) fn append_str(&mut self, value: &str, context: Option<&dyn Any>) -> KeyResult<()> {
        self.check_appendable()?;
        let Some(coder) = self.string_coder.clone() else {
            self.ensure_room(escape::quoted_len(value.as_bytes()) + 2)?;
            return self.write_segment(|buf| {
                buf.push(tags::STRING);
                escape::quote(value.as_bytes(), buf);
                Ok(())
            });
        };

        let start = self.bytes.len();
        self.bytes.push(tags::STRING);
        let limit = self.max_size.saturating_sub(1);
        let mut writer = SegmentWriter::new(&mut self.bytes, limit);
        let result = coder.append_segment(&mut writer, value, context);
        if let Err(err) = result {
            self.bytes.truncate(start);
            warn!(error = %err, "string coder failed, key rolled back");
            return Err(err);
        }
        self.bytes.push(tags::END);
        self.finish_segment(start)
    }

    /// Appends BEFORE or AFTER. Edge values carry no terminator, so nothing
    /// can be appended after them.
    pub(crate) fn append_edge(&mut self, edge: EdgeValue) -> KeyResult<()> {
        self.check_appendable()?;
        let start = self.bytes.len();
        self.bytes.push(edge.tag());
        self.finish_segment(start)
    }

    /// Encodes `value` with the coder of `entry` and appends the result as a
    /// single quoted segment prefixed by the type's handle.
    pub(crate) fn append_extension(
        &mut self,
        entry: Option<Arc<CoderEntry>>,
        type_name: &str,
        value: &dyn Any,
        context: Option<&dyn Any>,
    ) -> KeyResult<()> {
        self.check_appendable()?;
        let entry = entry.ok_or_else(|| KeyError::NoCodec(type_name.to_owned()))?;
        let coder = Arc::clone(
            entry
                .coder()
                .ok_or_else(|| KeyError::NoCodec(entry.type_name().to_owned()))?,
        );

        let mut scratch = self.scratch(Vec::new());
        if let Err(err) = coder.append_segment(&mut scratch, value, context) {
            warn!(type_name = entry.type_name(), error = %err, "key coder failed, key unchanged");
            return Err(err);
        }

        let start = self.bytes.len();
        handle::encode(entry.handle(), &mut self.bytes);
        escape::quote(scratch.encoded_bytes(), &mut self.bytes);
        self.bytes.push(tags::END);
        self.finish_segment(start)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::KeyConfig;

    #[test]
    fn append_layouts() {
        let mut key = Key::new();
        key.append(true).unwrap().append(crate::Null).unwrap().append(0i32).unwrap();
        assert_eq!(key.encoded_bytes(), &[4, 0, 2, 0, 36, 0]);
        assert_eq!(key.depth(), 3);

        let mut key = Key::new();
        key.append("a\u{0}b").unwrap();
        assert_eq!(key.encoded_bytes(), &[128, b'a', 1, 0x20, b'b', 0]);
    }

    #[test]
    fn edge_values_end_the_key() {
        let mut key = Key::new();
        key.append(1i32).unwrap().append(EdgeValue::After).unwrap();
        assert_eq!(key.encoded_bytes(), &[37, 0x81, 0, 254]);
        assert_eq!(key.depth(), 2);
        let before = key.clone();
        assert!(matches!(key.append(2i32), Err(KeyError::Structural(_))));
        assert_eq!(key, before);
        assert_eq!(key.generation(), before.generation());
    }

    #[test]
    fn to_replaces_last_segment() {
        let mut key = Key::new();
        key.to(1i32).unwrap();
        key.append("x").unwrap().to("y").unwrap();
        let mut expected = Key::new();
        expected.append(1i32).unwrap().append("y").unwrap();
        assert_eq!(key, expected);
        assert_eq!(key.depth(), 2);
    }

    #[test]
    fn to_restores_on_failure() {
        let mut key = Key::with_config(KeyConfig::with_max_size(8)).unwrap();
        key.append(1i32).unwrap().append(2i32).unwrap();
        let snapshot = key.clone();
        assert!(matches!(key.to("too long for this key"), Err(KeyError::Capacity { .. })));
        assert_eq!(key, snapshot);
        assert_eq!(key.depth(), 2);
        assert_eq!(key.generation(), snapshot.generation());
    }

    #[test]
    fn cut_and_set_depth() {
        let mut key = Key::new();
        for i in 0..5i32 {
            key.append(i).unwrap();
        }
        key.cut().unwrap();
        assert_eq!(key.depth(), 4);
        key.cut_n(2).unwrap();
        assert_eq!(key.depth(), 2);
        assert!(matches!(key.cut_n(3), Err(KeyError::Structural(_))));
        key.cut_n(0).unwrap();
        assert_eq!(key.depth(), 2);

        for i in 2..5i32 {
            key.append(i).unwrap();
        }
        key.set_depth(3).unwrap();
        assert_eq!(key.depth(), 3);
        key.set_depth(-1).unwrap();
        assert_eq!(key.depth(), 2);
        assert!(key.set_depth(5).is_err());
        key.set_depth(0).unwrap();
        assert!(key.is_empty());
        assert!(matches!(key.cut(), Err(KeyError::Structural(_))));
    }

    #[test]
    fn capacity_is_enforced_without_partial_writes() {
        let mut key = Key::with_config(KeyConfig::with_max_size(10)).unwrap();
        key.append(1i64).unwrap();
        let size = key.encoded_size();
        let err = key.append(vec![7u8; 20]).unwrap_err();
        assert!(matches!(err, KeyError::Capacity { maximum: 10, .. }));
        assert_eq!(key.encoded_size(), size);
        assert!(key.append(i64::MAX).is_err());
        assert_eq!(key.encoded_size(), size);
        key.append(5i32).unwrap();
        assert_eq!(key.depth(), 2);
    }

    #[test]
    fn unregistered_type_has_no_codec() {
        struct Unregistered;
        let mut key = Key::new();
        let err = key.append_object(&Unregistered).unwrap_err();
        assert!(matches!(err, KeyError::NoCodec(_)));
        assert!(key.is_empty());
    }
}
