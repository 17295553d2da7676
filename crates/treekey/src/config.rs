//! Key buffer configuration.

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};
use crate::MAX_KEY_LENGTH;

/// Configuration for a [`Key`](crate::Key) buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Maximum encoded size in bytes (default: 2047)
    pub max_size: usize,

    /// Bytes reserved up front (default: 64, clamped to `max_size`)
    pub initial_capacity: usize,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            max_size: MAX_KEY_LENGTH,
            initial_capacity: 64,
        }
    }
}

impl KeyConfig {
    /// Creates a configuration with the given maximum key size.
    #[must_use]
    pub fn with_max_size(max_size: usize) -> Self {
        Self { max_size, ..Self::default() }
    }

    /// Checks that the configuration describes a usable key buffer.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Config`] if `max_size` is zero or exceeds
    /// [`MAX_KEY_LENGTH`].
    pub fn validate(&self) -> KeyResult<()> {
        if self.max_size == 0 {
            return Err(KeyError::Config("max_size must be at least 1".into()));
        }
        if self.max_size > MAX_KEY_LENGTH {
            return Err(KeyError::Config(format!(
                "max_size {} exceeds the key length limit of {MAX_KEY_LENGTH}",
                self.max_size
            )));
        }
        Ok(())
    }

    pub(crate) fn effective_capacity(&self) -> usize {
        self.initial_capacity.min(self.max_size)
    }
}
