//! Pluggable string collation.
//!
//! By default strings are encoded as their UTF-8 bytes with NUL and SOH
//! quoted, which orders them by code point. A [`KeyStringCoder`] attached to a
//! key replaces that scheme for every string segment, for example to produce
//! case-insensitive or locale-aware orderings. The coder's bytes are written
//! through a [`SegmentWriter`], which rejects the segment terminator and
//! enforces the key's size limit.

use std::any::Any;

use crate::error::{KeyError, KeyResult};

/// Custom encoding of string segments.
pub trait KeyStringCoder: Send + Sync {
    /// Writes the payload for `value`. The tag and terminator are written by
    /// the key.
    ///
    /// # Errors
    ///
    /// Any error aborts the append and the key is rolled back to its state
    /// before the call.
    fn append_segment(
        &self,
        out: &mut SegmentWriter<'_>,
        value: &str,
        context: Option<&dyn Any>,
    ) -> KeyResult<()>;

    /// Reconstructs a string from a payload produced by
    /// [`append_segment`](Self::append_segment), appending it to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be decoded.
    fn render_segment(
        &self,
        segment: &[u8],
        target: &mut String,
        context: Option<&dyn Any>,
    ) -> KeyResult<()>;
}

/// Bounded writer over a key's byte buffer.
#[derive(Debug)]
pub struct SegmentWriter<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
    limit: usize,
}

impl<'a> SegmentWriter<'a> {
    /// Wraps `buf`, allowing it to grow up to `limit` bytes in total.
    pub(crate) fn new(buf: &'a mut Vec<u8>, limit: usize) -> Self {
        let start = buf.len();
        Self { buf, start, limit }
    }

    /// Appends one payload byte.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Structural`] for a zero byte and
    /// [`KeyError::Capacity`] when the key is full.
    pub fn push(&mut self, byte: u8) -> KeyResult<()> {
        self.extend_from_slice(&[byte])
    }

    /// Appends payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Structural`] if `bytes` contains a zero byte and
    /// [`KeyError::Capacity`] if the key would overflow. Nothing is written
    /// on error.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> KeyResult<()> {
        if bytes.contains(&0) {
            return Err(KeyError::structural("string coder produced a zero byte"));
        }
        let requested = self.buf.len() + bytes.len();
        if requested > self.limit {
            return Err(KeyError::Capacity { requested: requested + 1, maximum: self.limit + 1 });
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Bytes written so far.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.buf[self.start..]
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes that can still be written.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.buf.len())
    }
}
