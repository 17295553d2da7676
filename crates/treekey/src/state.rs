//! Immutable key snapshots.
//!
//! A [`KeyState`] holds a copy of a key's encoded bytes. It is cheap to keep
//! in maps and sets and compares, hashes and tests equal exactly like the
//! [`Key`] it was taken from.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;

use crate::error::KeyResult;
use crate::key::{self, Key};

/// Immutable snapshot of a key's encoded bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyState {
    bytes: Box<[u8]>,
}

impl KeyState {
    /// Takes a snapshot of `key`.
    #[must_use]
    pub fn new(key: &Key) -> Self {
        Self { bytes: key.encoded_bytes().into() }
    }

    /// The encoded bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Same value as [`Key::hash_code`] for a key with these bytes.
    #[must_use]
    pub fn hash_code(&self) -> i32 {
        key::hash_code(&self.bytes)
    }

    /// Loads the snapshot into `key`, resetting its cursor.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Capacity`](crate::KeyError::Capacity) if the
    /// snapshot exceeds the key's maximum size.
    pub fn copy_to(&self, key: &mut Key) -> KeyResult<()> {
        key.set_encoded_bytes(&self.bytes)
    }

    /// Compares with the encoded bytes of `key`.
    #[must_use]
    pub fn compare_to(&self, key: &Key) -> Ordering {
        self.bytes().cmp(key.encoded_bytes())
    }
}

impl From<&Key> for KeyState {
    fn from(key: &Key) -> Self {
        Self::new(key)
    }
}

impl Borrow<[u8]> for KeyState {
    fn borrow(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq<Key> for KeyState {
    fn eq(&self, other: &Key) -> bool {
        self.bytes() == other.encoded_bytes()
    }
}

impl PartialEq<KeyState> for Key {
    fn eq(&self, other: &KeyState) -> bool {
        self.encoded_bytes() == other.bytes()
    }
}

impl fmt::Debug for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyState").field(&self.bytes).finish()
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut key = Key::new();
        match key.set_encoded_bytes(&self.bytes) {
            Ok(()) => fmt::Display::fmt(&key, f),
            Err(err) => write!(f, "{err}"),
        }
    }
}
