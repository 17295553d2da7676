//! Human-readable rendering of keys.
//!
//! A key displays as its segments in braces, e.g. `{"users",(long)42,true}`.
//! Types other than `int`, `double`, `boolean`, `null` and strings carry a
//! parenthesised type prefix so the rendering identifies the encoding.

use std::fmt::{self, Write as _};

use tracing::debug;

use super::Key;
use crate::encoding::handle;
use crate::error::KeyResult;
use crate::value::SegmentType;

impl Key {
    /// Appends a readable form of the segment at the cursor to `out` and
    /// advances past it. Strings are quoted when `quoted` is set.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::MissingSegment`](crate::KeyError::MissingSegment)
    /// at the end of the key, or [`KeyError::Conversion`](crate::KeyError::Conversion)
    /// if the segment is malformed.
    pub fn decode_displayable(&mut self, quoted: bool, out: &mut String) -> KeyResult<()> {
        let start = self.index;
        let segment_type = self.decode_type()?;
        let mut rendered = String::new();
        match segment_type {
            SegmentType::LeftEdge | SegmentType::RightEdge => {
                self.index = start + 1;
                rendered.push_str(if segment_type == SegmentType::LeftEdge {
                    "{left edge}"
                } else {
                    "{right edge}"
                });
            }
            SegmentType::Extension { .. } => return self.display_extension(start, out),
            SegmentType::Edge(_) => write_display(&mut rendered, self.decode_edge()?),
            SegmentType::Null => {
                self.decode_null()?;
                rendered.push_str("null");
            }
            SegmentType::Bool => write_display(&mut rendered, self.decode_bool()?),
            SegmentType::Byte => write_display(&mut rendered, self.decode_i8()?),
            SegmentType::Short => write_display(&mut rendered, self.decode_i16()?),
            SegmentType::Char => write_display(&mut rendered, u32::from(self.decode_char()?)),
            SegmentType::Int => write_display(&mut rendered, self.decode_i32()?),
            SegmentType::Long => write_display(&mut rendered, self.decode_i64()?),
            SegmentType::Float => write_debug(&mut rendered, self.decode_f32()?),
            SegmentType::Double => write_debug(&mut rendered, self.decode_f64()?),
            SegmentType::BigInteger => write_display(&mut rendered, self.decode_big_integer()?),
            SegmentType::BigDecimal => write_display(&mut rendered, self.decode_big_decimal()?),
            SegmentType::Bytes => {
                for b in self.decode_bytes()? {
                    write_display(&mut rendered, format_args!("{b:02X}"));
                }
            }
            SegmentType::String if quoted => push_quoted(&mut rendered, &self.decode_string()?),
            SegmentType::String => rendered = self.decode_string()?,
            SegmentType::Date => {
                let date = self.decode_date()?;
                write_display(&mut rendered, date.format("%Y%m%d%H%M%S%.3f%z"));
            }
        }
        out.push_str(segment_type.display_prefix());
        out.push_str(&rendered);
        Ok(())
    }

    /// Renders an extension segment as `(Name)` followed by the coder's own
    /// rendering, or the nested segments in braces.
    fn display_extension(&mut self, start: usize, out: &mut String) -> KeyResult<()> {
        let (handle, next) = handle::decode(&self.bytes, start)?;
        let Some(entry) = self.registry.lookup_by_handle(handle) else {
            let (payload, end) = crate::encoding::escape::unquote(&self.bytes, next)?;
            write_display(out, format_args!("(?handle={handle})"));
            write_segments(&mut self.scratch(payload), out)?;
            self.index = end + 1;
            return Ok(());
        };

        let (_, payload, end) = self.extension_payload(start)?;
        let mut scratch = self.scratch(payload);
        write_display(out, format_args!("({})", entry.type_name()));
        let mut rendered = String::new();
        let custom = match entry.coder() {
            Some(coder) => coder.display_segment(&mut scratch, &mut rendered, None)?,
            None => false,
        };
        if custom {
            out.push_str(&rendered);
        } else {
            scratch.reset();
            write_segments(&mut scratch, out)?;
        }
        self.index = end + 1;
        Ok(())
    }
}

/// Writes every segment from the cursor onwards as `{a,b,...}`.
fn write_segments(key: &mut Key, out: &mut String) -> KeyResult<()> {
    out.push('{');
    let mut first = true;
    while key.index() < key.encoded_size() {
        if !first {
            out.push(',');
        }
        first = false;
        key.decode_displayable(true, out)?;
    }
    out.push('}');
    Ok(())
}

fn write_display(out: &mut String, value: impl fmt::Display) {
    // Writing to a String cannot fail.
    let _ = write!(out, "{value}");
}

fn write_debug(out: &mut String, value: impl fmt::Debug) {
    let _ = write!(out, "{value:?}");
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_left_edge() {
            return f.write_str("{left edge}");
        }
        if self.is_right_edge() {
            return f.write_str("{right edge}");
        }
        let mut key = self.clone();
        key.reset();
        let mut out = String::new();
        match write_segments(&mut key, &mut out) {
            Ok(()) => f.write_str(&out),
            Err(err) => {
                debug!(error = %err, size = self.bytes.len(), "key is not displayable");
                write!(f, "{err}(size={}): ", self.bytes.len())?;
                for b in &self.bytes {
                    write!(f, "{b:02X}")?;
                }
                Ok(())
            }
        }
    }
}
