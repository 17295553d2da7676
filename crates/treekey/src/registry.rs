//! Registry of key coders for application-defined types.
//!
//! Types that are not natively supported can take part in keys by
//! registering a [`KeyCoder`]. Each registered type receives a stable handle,
//! starting at 1, that is written at the start of its segments. Handles are
//! never reassigned: the registry only grows.
//!
//! Extension segments sort after every built-in type and before
//! [`EdgeValue::After`](crate::EdgeValue::After). Among themselves they sort
//! by handle first, then by the bytes the coder produced.
//!
//! # Example
//!
//! ```
//! use std::any::Any;
//! use std::sync::Arc;
//! use treekey::{CoderRegistry, Key, KeyCoder, KeyError, KeyResult};
//!
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! struct PointCoder;
//!
//! impl KeyCoder for PointCoder {
//!     fn append_segment(
//!         &self,
//!         key: &mut Key,
//!         value: &dyn Any,
//!         _: Option<&dyn Any>,
//!     ) -> KeyResult<()> {
//!         let point = value
//!             .downcast_ref::<Point>()
//!             .ok_or_else(|| KeyError::NoCodec("expected Point".into()))?;
//!         key.append(point.x)?.append(point.y)?;
//!         Ok(())
//!     }
//!
//!     fn decode_segment(
//!         &self,
//!         key: &mut Key,
//!         _: Option<&dyn Any>,
//!     ) -> KeyResult<Arc<dyn Any + Send + Sync>> {
//!         let x = key.decode_i32()?;
//!         let y = key.decode_i32()?;
//!         Ok(Arc::new(Point { x, y }))
//!     }
//! }
//!
//! let registry = Arc::new(CoderRegistry::new());
//! registry.register::<Point>(Arc::new(PointCoder)).unwrap();
//!
//! let mut key = Key::with_registry(Arc::clone(&registry));
//! key.append_object(&Point { x: 1, y: 2 }).unwrap();
//! key.reset();
//! let point = key.decode_object::<Point>().unwrap();
//! assert_eq!((point.x, point.y), (1, 2));
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::debug;

use crate::error::{KeyError, KeyResult};
use crate::key::Key;

/// Encodes and decodes values of one application type as key segments.
///
/// The coder works on a scratch [`Key`] that shares the registry and string
/// coder of the key being built. [`append_segment`](Self::append_segment)
/// appends any number of ordinary segments to it; their bytes are then quoted
/// into the outer key as one extension segment. On decode the coder receives
/// a key holding exactly those bytes with its cursor at zero.
pub trait KeyCoder: Send + Sync {
    /// Appends the encoded form of `value` to `key`.
    ///
    /// # Errors
    ///
    /// Any error aborts the append; the outer key is left unchanged.
    fn append_segment(
        &self,
        key: &mut Key,
        value: &dyn Any,
        context: Option<&dyn Any>,
    ) -> KeyResult<()>;

    /// Decodes a value from `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded.
    fn decode_segment(
        &self,
        key: &mut Key,
        context: Option<&dyn Any>,
    ) -> KeyResult<Arc<dyn Any + Send + Sync>>;

    /// Decodes into an existing `target` instead of allocating a value.
    ///
    /// Returns `Ok(false)` when in-place rendering is not supported.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded into `target`.
    fn render_segment(
        &self,
        key: &mut Key,
        target: &mut dyn Any,
        context: Option<&dyn Any>,
    ) -> KeyResult<bool> {
        let _ = (key, target, context);
        Ok(false)
    }

    /// Writes a human-readable form of the segment to `out`.
    ///
    /// Returns `Ok(false)` to fall back to the generic rendering of the
    /// nested segments.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded.
    fn display_segment(
        &self,
        key: &mut Key,
        out: &mut String,
        context: Option<&dyn Any>,
    ) -> KeyResult<bool> {
        let _ = (key, out, context);
        Ok(false)
    }
}

/// A registered type.
pub struct CoderEntry {
    handle: u32,
    type_id: TypeId,
    type_name: &'static str,
    coder: Option<Arc<dyn KeyCoder>>,
}

impl CoderEntry {
    /// Stable handle of the type.
    #[must_use]
    pub const fn handle(&self) -> u32 {
        self.handle
    }

    /// Registered name, used in display output.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Rust type identifier.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The coder, if one has been installed.
    #[must_use]
    pub fn coder(&self) -> Option<&Arc<dyn KeyCoder>> {
        self.coder.as_ref()
    }
}

impl std::fmt::Debug for CoderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoderEntry")
            .field("handle", &self.handle)
            .field("type_name", &self.type_name)
            .field("has_coder", &self.coder.is_some())
            .finish()
    }
}

#[derive(Default)]
struct RegistryInner {
    by_type: HashMap<TypeId, u32>,
    /// Entry for handle `h` lives at index `h - 1`.
    entries: Vec<Arc<CoderEntry>>,
}

/// Thread-safe, append-only map from types to handles and coders.
#[derive(Default)]
pub struct CoderRegistry {
    inner: RwLock<RegistryInner>,
}

static GLOBAL: LazyLock<Arc<CoderRegistry>> = LazyLock::new(|| Arc::new(CoderRegistry::new()));

/// Last path segment of a type name, without generic arguments.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

impl CoderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by keys created without an explicit one.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Registers `coder` for `T` and returns the type's handle.
    ///
    /// Registering a type again keeps its handle and replaces its coder.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::OutOfRange`] if the handle space is exhausted.
    pub fn register<T: Any>(&self, coder: Arc<dyn KeyCoder>) -> KeyResult<u32> {
        self.insert(TypeId::of::<T>(), short_type_name::<T>(), Some(coder))
    }

    /// Registers `coder` for `T` under an explicit display name.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::OutOfRange`] if the handle space is exhausted.
    pub fn register_named<T: Any>(
        &self,
        name: &'static str,
        coder: Arc<dyn KeyCoder>,
    ) -> KeyResult<u32> {
        self.insert(TypeId::of::<T>(), name, Some(coder))
    }

    /// Reserves a handle for `T` without installing a coder.
    ///
    /// Segments of such a type can be recognised but not encoded or decoded.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::OutOfRange`] if the handle space is exhausted.
    pub fn register_type<T: Any>(&self) -> KeyResult<u32> {
        self.insert(TypeId::of::<T>(), short_type_name::<T>(), None)
    }

    fn insert(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        coder: Option<Arc<dyn KeyCoder>>,
    ) -> KeyResult<u32> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(&handle) = inner.by_type.get(&type_id) {
            if coder.is_some() {
                let index = (handle - 1) as usize;
                let name = inner.entries[index].type_name;
                let entry = CoderEntry { handle, type_id, type_name: name, coder };
                inner.entries[index] = Arc::new(entry);
                debug!(handle, type_name = name, "replaced key coder");
            }
            return Ok(handle);
        }

        let handle = u32::try_from(inner.entries.len() + 1)
            .map_err(|_| KeyError::OutOfRange("coder registry handle space exhausted".into()))?;
        inner.entries.push(Arc::new(CoderEntry { handle, type_id, type_name, coder }));
        inner.by_type.insert(type_id, handle);
        debug!(handle, type_name, "registered key type");
        Ok(handle)
    }

    /// Looks up the entry for a type.
    #[must_use]
    pub fn lookup_by_type(&self, type_id: TypeId) -> Option<Arc<CoderEntry>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let handle = *inner.by_type.get(&type_id)?;
        inner.entries.get((handle - 1) as usize).cloned()
    }

    /// Looks up the entry for a handle.
    #[must_use]
    pub fn lookup_by_handle(&self, handle: u32) -> Option<Arc<CoderEntry>> {
        let index = usize::try_from(handle).ok()?.checked_sub(1)?;
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.get(index).cloned()
    }

    /// Handle of `T`, if registered.
    #[must_use]
    pub fn handle_for<T: Any>(&self) -> Option<u32> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    /// Returns `true` if no type has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoderRegistry").field("len", &self.len()).finish()
    }
}
