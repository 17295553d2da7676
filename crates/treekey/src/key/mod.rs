//! The key buffer.
//!
//! A [`Key`] holds a sequence of encoded segments, a cursor for decoding and
//! a generation counter that changes on every mutation. Keys compare,
//! hash and test equal by their encoded bytes alone.
//!
//! # Example
//!
//! ```
//! use treekey::{EdgeValue, Key};
//!
//! let mut key = Key::new();
//! key.append("users")?.append(42i64)?;
//! assert_eq!(key.depth(), 2);
//! assert_eq!(key.to_string(), r#"{"users",(long)42}"#);
//!
//! let mut upper = key.clone();
//! upper.to(EdgeValue::After)?;
//! assert!(key < upper);
//!
//! key.reset();
//! assert_eq!(key.decode_string()?, "users");
//! assert_eq!(key.decode_i64()?, 42);
//! # Ok::<(), treekey::KeyError>(())
//! ```

mod append;
mod decode;
mod display;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

use crate::collator::KeyStringCoder;
use crate::config::KeyConfig;
use crate::encoding::tags;
use crate::error::{KeyError, KeyResult};
use crate::registry::CoderRegistry;
use crate::MAX_KEY_LENGTH;

/// Qualifier for traversal relative to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// The key itself.
    Eq,
    /// The largest key less than this one.
    Lt,
    /// The key itself, or the largest key less than it.
    LtEq,
    /// The smallest key greater than this one.
    Gt,
    /// The key itself, or the smallest key greater than it.
    GtEq,
}

impl Direction {
    /// Returns `true` if the key itself qualifies.
    #[must_use]
    pub const fn is_inclusive(self) -> bool {
        matches!(self, Self::Eq | Self::LtEq | Self::GtEq)
    }

    /// Returns `true` for directions that move towards larger keys.
    #[must_use]
    pub const fn is_forward(self) -> bool {
        matches!(self, Self::Gt | Self::GtEq)
    }
}

/// Largest key that may be stored in a page of `buffer_size` bytes.
#[must_use]
pub const fn max_storable_key_size(buffer_size: usize) -> usize {
    let quarter = buffer_size / 4;
    if quarter > MAX_KEY_LENGTH {
        MAX_KEY_LENGTH
    } else {
        quarter
    }
}

/// An order-preserving, multi-segment key.
#[derive(Clone)]
pub struct Key {
    /// Encoded segments; the length is the encoded size.
    bytes: Vec<u8>,
    /// Decode cursor.
    index: usize,
    /// Number of segments.
    depth: usize,
    generation: u64,
    max_size: usize,
    string_coder: Option<Arc<dyn KeyStringCoder>>,
    registry: Arc<CoderRegistry>,
}

static LEFT_GUARD: LazyLock<Key> = LazyLock::new(|| Key::guard(tags::LEFT_EDGE));
static RIGHT_GUARD: LazyLock<Key> = LazyLock::new(|| Key::guard(tags::RIGHT_EDGE));

impl Default for Key {
    fn default() -> Self {
        Self::new()
    }
}

impl Key {
    /// Creates an empty key using the global coder registry.
    #[must_use]
    pub fn new() -> Self {
        Self::build(&KeyConfig::default(), CoderRegistry::global())
    }

    /// Creates an empty key that resolves extension types in `registry`.
    #[must_use]
    pub fn with_registry(registry: Arc<CoderRegistry>) -> Self {
        Self::build(&KeyConfig::default(), registry)
    }

    /// Creates an empty key from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Config`] if the configuration is invalid.
    pub fn with_config(config: KeyConfig) -> KeyResult<Self> {
        config.validate()?;
        Ok(Self::build(&config, CoderRegistry::global()))
    }

    fn build(config: &KeyConfig, registry: Arc<CoderRegistry>) -> Self {
        Self {
            bytes: Vec::with_capacity(config.effective_capacity()),
            index: 0,
            depth: 0,
            generation: 0,
            max_size: config.max_size,
            string_coder: None,
            registry,
        }
    }

    fn guard(byte: u8) -> Self {
        let mut key = Self::build(&KeyConfig::with_max_size(1), CoderRegistry::global());
        key.bytes.push(byte);
        key.depth = 1;
        key
    }

    /// The key that sorts before every other key in a tree.
    #[must_use]
    pub fn left_guard() -> &'static Self {
        &LEFT_GUARD
    }

    /// The key that sorts after every other key in a tree.
    #[must_use]
    pub fn right_guard() -> &'static Self {
        &RIGHT_GUARD
    }

    /// Creates a key sharing this key's registry, string coder and maximum
    /// size, holding `bytes`.
    pub(crate) fn scratch(&self, bytes: Vec<u8>) -> Self {
        let mut key = Self {
            bytes,
            index: 0,
            depth: 0,
            generation: 0,
            max_size: self.max_size,
            string_coder: self.string_coder.clone(),
            registry: Arc::clone(&self.registry),
        };
        key.depth = key.count_segments();
        key
    }

    /// Attaches (or with `None`, removes) a string coder.
    ///
    /// Previously encoded bytes are not affected.
    pub fn set_string_coder(&mut self, coder: Option<Arc<dyn KeyStringCoder>>) -> &mut Self {
        self.string_coder = coder;
        self
    }

    /// The attached string coder.
    #[must_use]
    pub fn string_coder(&self) -> Option<&Arc<dyn KeyStringCoder>> {
        self.string_coder.as_ref()
    }

    /// The registry used for extension types.
    #[must_use]
    pub fn registry(&self) -> &Arc<CoderRegistry> {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Raw access
    // ------------------------------------------------------------------

    /// The encoded bytes.
    #[must_use]
    pub fn encoded_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable access to the encoded bytes.
    ///
    /// The caller is responsible for leaving a valid encoding behind. The
    /// generation is bumped and the depth recounted.
    pub fn with_encoded_bytes_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let result = f(&mut self.bytes);
        self.depth = self.count_segments();
        self.bump_generation();
        result
    }

    /// Number of encoded bytes.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        self.bytes.len()
    }

    /// Sets the encoded size, zero-filling when growing.
    ///
    /// Resets the cursor and bumps the generation.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Capacity`] if `size` exceeds the maximum size.
    pub fn set_encoded_size(&mut self, size: usize) -> KeyResult<()> {
        if size > self.max_size {
            return Err(KeyError::Capacity { requested: size, maximum: self.max_size });
        }
        self.bytes.resize(size, 0);
        self.index = 0;
        self.depth = self.count_segments();
        self.bump_generation();
        Ok(())
    }

    /// Replaces the encoded bytes, e.g. with a key read from a log record.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Capacity`] if `bytes` exceeds the maximum size.
    pub fn set_encoded_bytes(&mut self, bytes: &[u8]) -> KeyResult<()> {
        if bytes.len() > self.max_size {
            return Err(KeyError::Capacity { requested: bytes.len(), maximum: self.max_size });
        }
        self.bytes.clear();
        self.bytes.extend_from_slice(bytes);
        self.index = 0;
        self.depth = self.count_segments();
        self.bump_generation();
        Ok(())
    }

    /// Counter incremented by every mutation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Maximum encoded size.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Copies this key's state into `target`, bumping the target's generation.
    pub fn copy_to(&self, target: &mut Self) {
        target.bytes.clear();
        target.bytes.extend_from_slice(&self.bytes);
        target.index = self.index;
        target.depth = self.depth;
        target.max_size = self.max_size;
        target.string_coder = self.string_coder.clone();
        target.registry = Arc::clone(&self.registry);
        target.bump_generation();
    }

    /// Whether the key is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Number of segments.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    fn count_segments(&self) -> usize {
        let terminated = self.bytes.iter().filter(|b| **b == tags::END).count();
        let open = self.bytes.last().is_some_and(|b| *b != tags::END);
        terminated + usize::from(open)
    }

    /// Decode cursor.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Moves the decode cursor.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Structural`] if `index` is past the end.
    pub fn set_index(&mut self, index: usize) -> KeyResult<&mut Self> {
        if index > self.bytes.len() {
            return Err(KeyError::structural(format!(
                "index {index} beyond encoded size {}",
                self.bytes.len()
            )));
        }
        self.index = index;
        Ok(self)
    }

    /// Moves the decode cursor to the first segment.
    pub fn reset(&mut self) -> &mut Self {
        self.index = 0;
        self
    }

    /// Start of the segment following the one containing `index`.
    ///
    /// Returns the encoded size after the last segment and `None` once
    /// `index` is at or past the end.
    #[must_use]
    pub fn next_element_index(&self, index: usize) -> Option<usize> {
        let rest = self.bytes.get(index..).filter(|rest| !rest.is_empty())?;
        Some(rest.iter().position(|b| *b == tags::END).map_or(self.bytes.len(), |p| index + p + 1))
    }

    /// Start of the segment preceding `index`.
    ///
    /// An `index` past the end is treated as the end. Returns `None` at the
    /// start of the key.
    #[must_use]
    pub fn previous_element_index(&self, index: usize) -> Option<usize> {
        let index = index.min(self.bytes.len());
        if index == 0 {
            return None;
        }
        // Skip the terminator of the segment that ends right before `index`.
        let search = &self.bytes[..index - 1];
        Some(search.iter().rposition(|b| *b == tags::END).map_or(0, |p| p + 1))
    }

    /// Positions the cursor at the start of segment `depth`, or for a
    /// negative `depth`, `|depth|` segments before the end.
    ///
    /// `index_to(self.depth())` places the cursor at the end.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Structural`] if `|depth|` exceeds the key's depth.
    pub fn index_to(&mut self, depth: i32) -> KeyResult<&mut Self> {
        self.index = self.depth_offset(depth)?;
        Ok(self)
    }

    /// Byte offset of the segment boundary `depth` segments from the start
    /// (or from the end when negative).
    fn depth_offset(&self, depth: i32) -> KeyResult<usize> {
        let steps = depth.unsigned_abs() as usize;
        if steps > self.depth {
            return Err(KeyError::structural(format!(
                "depth {depth} out of range for key of depth {}",
                self.depth
            )));
        }
        let mut offset = if depth < 0 { self.bytes.len() } else { 0 };
        for _ in 0..steps {
            let next = if depth < 0 {
                self.previous_element_index(offset)
            } else {
                self.next_element_index(offset)
            };
            offset = next.ok_or_else(|| KeyError::structural("segment boundary not found"))?;
        }
        Ok(offset)
    }

    // ------------------------------------------------------------------
    // Comparison
    // ------------------------------------------------------------------

    /// Compares the bytes in `start..start + len` of both keys.
    ///
    /// A key that ends inside the fragment sorts before one that does not.
    #[must_use]
    pub fn compare_key_fragment(&self, other: &Self, start: usize, len: usize) -> Ordering {
        let end = start.saturating_add(len);
        fn fragment(bytes: &[u8], start: usize, end: usize) -> &[u8] {
            let stop = end.min(bytes.len());
            &bytes[start.min(stop)..stop]
        }
        fragment(&self.bytes, start, end).cmp(fragment(&other.bytes, start, end))
    }

    /// Index of the first byte at which the keys differ, or the length of
    /// the shorter key if one is a prefix of the other.
    #[must_use]
    pub fn first_unique_byte_index(&self, other: &Self) -> usize {
        self.bytes
            .iter()
            .zip(&other.bytes)
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| self.bytes.len().min(other.bytes.len()))
    }

    /// Polynomial hash of the encoded bytes, masked to 31 bits.
    ///
    /// Stable across processes; equal for keys and snapshots with equal bytes.
    #[must_use]
    pub fn hash_code(&self) -> i32 {
        hash_code(&self.bytes)
    }

    // ------------------------------------------------------------------
    // Edges and traversal support
    // ------------------------------------------------------------------

    /// Returns `true` if this key holds the left-edge guard.
    #[must_use]
    pub fn is_left_edge(&self) -> bool {
        self.bytes == [tags::LEFT_EDGE]
    }

    /// Returns `true` if this key holds the right-edge guard.
    #[must_use]
    pub fn is_right_edge(&self) -> bool {
        self.bytes == [tags::RIGHT_EDGE]
    }

    /// Returns `true` if the last segment is [`EdgeValue::Before`](crate::EdgeValue::Before).
    #[must_use]
    pub fn is_before(&self) -> bool {
        self.bytes.last() == Some(&tags::BEFORE)
    }

    /// Returns `true` if the last segment is [`EdgeValue::After`](crate::EdgeValue::After).
    #[must_use]
    pub fn is_after(&self) -> bool {
        self.bytes.last() == Some(&tags::AFTER)
    }

    /// Removes a trailing terminator so the key sorts just before every key
    /// it prefixes.
    pub fn nudge_down(&mut self) {
        if self.bytes.last() == Some(&tags::END) {
            self.bytes.pop();
            self.depth = self.count_segments();
            self.bump_generation();
        }
    }

    /// Turns a trailing terminator into `0x01`, placing the key after every
    /// key it prefixes. An empty key becomes `{0x00}`.
    pub fn nudge_up(&mut self) {
        match self.bytes.last_mut() {
            None => self.bytes.push(tags::END),
            Some(last) if *last == tags::END => *last = 1,
            Some(_) => return,
        }
        self.depth = self.count_segments();
        self.bump_generation();
    }

    /// Appends a zero byte, placing the key just after itself.
    pub fn nudge_up2(&mut self) {
        if self.bytes.len() < self.max_size {
            self.bytes.push(tags::END);
            self.depth = self.count_segments();
            self.bump_generation();
        }
    }

    /// Checks that the key may be stored as a record key in a page of
    /// `buffer_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKey`] for an empty key, a key longer than
    /// [`max_storable_key_size`], a key ending in an edge value, or a key
    /// whose last segment is unterminated.
    pub fn validate_for_store(&self, buffer_size: usize) -> KeyResult<()> {
        let last = *self
            .bytes
            .last()
            .ok_or_else(|| KeyError::InvalidKey("empty key not permitted".into()))?;
        if self.bytes.len() > max_storable_key_size(buffer_size) {
            return Err(KeyError::InvalidKey(format!(
                "key of {} bytes too long for buffer of {buffer_size}",
                self.bytes.len()
            )));
        }
        match last {
            tags::END => Ok(()),
            tags::BEFORE | tags::AFTER => {
                Err(KeyError::InvalidKey("BEFORE or AFTER key not permitted".into()))
            }
            other => Err(KeyError::InvalidKey(format!("invalid segment terminator {other}"))),
        }
    }
}

pub(crate) fn hash_code(bytes: &[u8]) -> i32 {
    bytes.iter().fold(0i32, |h, b| h.wrapping_mul(17) ^ i32::from(*b)) & 0x7FFF_FFFF
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.as_slice().cmp(other.bytes.as_slice())
    }
}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.as_slice().hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("bytes", &self.bytes)
            .field("index", &self.index)
            .field("depth", &self.depth)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::EdgeValue;

    fn key_of(parts: &[i32]) -> Key {
        let mut key = Key::new();
        for part in parts {
            key.append(*part).unwrap();
        }
        key
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    #[test]
    fn element_indices() {
        // {1, 2, 3}: three segments of three bytes each.
        let key = key_of(&[1, 2, 3]);
        assert_eq!(key.encoded_size(), 9);
        assert_eq!(key.next_element_index(0), Some(3));
        assert_eq!(key.next_element_index(3), Some(6));
        assert_eq!(key.next_element_index(6), Some(9));
        assert_eq!(key.next_element_index(9), None);
        assert_eq!(key.previous_element_index(9), Some(6));
        assert_eq!(key.previous_element_index(3), Some(0));
        assert_eq!(key.previous_element_index(0), None);
        assert_eq!(key.previous_element_index(100), Some(6));
    }

    #[test]
    fn index_to_positions_cursor() {
        let mut key = key_of(&[10, 20, 30]);
        key.index_to(2).unwrap();
        assert_eq!(key.decode_i32().unwrap(), 30);
        key.index_to(-2).unwrap();
        assert_eq!(key.decode_i32().unwrap(), 20);
        key.index_to(3).unwrap();
        assert_eq!(key.index(), key.encoded_size());
        assert!(key.index_to(4).is_err());
        assert!(key.index_to(-4).is_err());
    }

    #[test]
    fn set_index_bounds() {
        let mut key = key_of(&[1]);
        assert!(key.set_index(3).is_ok());
        assert!(matches!(key.set_index(4), Err(KeyError::Structural(_))));
    }

    // ========================================================================
    // Comparison and hashing
    // ========================================================================

    #[test]
    fn hash_code_matches_polynomial() {
        let mut key = Key::new();
        key.set_encoded_bytes(&[1, 2, 3]).unwrap();
        // ((0*17 ^ 1)*17 ^ 2)*17 ^ 3
        assert_eq!(key.hash_code(), ((17 ^ 2) * 17) ^ 3);
        assert_eq!(Key::new().hash_code(), 0);
    }

    #[test]
    fn fragments_and_unique_index() {
        let a = key_of(&[1, 2]);
        let b = key_of(&[1, 3]);
        assert_eq!(a.first_unique_byte_index(&b), 4);
        assert_eq!(a.first_unique_byte_index(&a.clone()), a.encoded_size());
        assert_eq!(a.compare_key_fragment(&b, 0, 3), Ordering::Equal);
        assert_eq!(a.compare_key_fragment(&b, 3, 3), Ordering::Less);
        let short = key_of(&[1]);
        assert_eq!(short.compare_key_fragment(&a, 0, 6), Ordering::Less);
        assert_eq!(a.compare_key_fragment(&short, 0, 6), Ordering::Greater);
    }

    // ========================================================================
    // Raw access
    // ========================================================================

    #[test]
    fn set_encoded_size_rules() {
        let mut key = key_of(&[1, 2]);
        let generation = key.generation();
        key.set_encoded_size(3).unwrap();
        assert_eq!(key.depth(), 1);
        assert!(key.generation() > generation);
        key.set_encoded_size(5).unwrap();
        assert_eq!(key.encoded_bytes()[3..], [0, 0]);
        assert!(matches!(key.set_encoded_size(3000), Err(KeyError::Capacity { .. })));
    }

    #[test]
    fn copy_to_bumps_target_generation() {
        let source = key_of(&[7]);
        let mut target = key_of(&[1, 2, 3]);
        let generation = target.generation();
        source.copy_to(&mut target);
        assert_eq!(target, source);
        assert_eq!(target.depth(), 1);
        assert!(target.generation() > generation);
    }

    // ========================================================================
    // Edges
    // ========================================================================

    #[test]
    fn guards() {
        assert!(Key::left_guard().is_left_edge());
        assert!(Key::right_guard().is_right_edge());
        assert!(Key::left_guard() < &key_of(&[i32::MIN]));
        assert!(Key::right_guard() > &key_of(&[i32::MAX]));
        let mut copy = Key::left_guard().clone();
        assert!(matches!(copy.append(1), Err(KeyError::Structural(_))));
    }

    #[test]
    fn nudges() {
        let mut key = key_of(&[5]);
        let original = key.clone();
        key.nudge_down();
        assert!(key < original);
        let mut up = original.clone();
        up.nudge_up();
        assert!(up > original);
        assert!(up < key_of(&[6]));
        let mut up2 = original.clone();
        up2.nudge_up2();
        assert!(up2 > original && up2 < up);
        let mut empty = Key::new();
        empty.nudge_up();
        assert!(empty.is_left_edge());
    }

    #[test]
    fn validate_for_store() {
        assert!(matches!(Key::new().validate_for_store(16384), Err(KeyError::InvalidKey(_))));
        let mut key = key_of(&[1]);
        assert!(key.validate_for_store(16384).is_ok());
        assert!(key.validate_for_store(8).is_err());
        key.append(EdgeValue::Before).unwrap();
        assert!(key.is_before());
        assert!(key.validate_for_store(16384).is_err());
        assert_eq!(max_storable_key_size(16384), 2047);
        assert_eq!(max_storable_key_size(1024), 256);
    }

    #[test]
    fn direction_flags() {
        assert!(Direction::GtEq.is_inclusive() && Direction::GtEq.is_forward());
        assert!(!Direction::Lt.is_inclusive() && !Direction::Lt.is_forward());
    }
}
