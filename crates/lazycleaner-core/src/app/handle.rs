//! Handles returned by `LazyCleaner::register*`.
//!
//! - `Cleanable`: explicit release (`leak = false`), cloneable, idempotent.
//! - `PhantomRef`: stands for the owner's reachability. Dropping it posts the
//!   node to the reference queue; the worker then runs the action with
//!   `leak = true`.
//! - `Tracked<T>`: the registered object and its `PhantomRef` in one value.
//!
//! None of them hold the registered object on the cleaner's side, so nothing
//! here keeps an owner alive.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::cleaner_core::CleanerCore;
use crate::domain::NodeKey;

/// Explicit release handle for one registration.
#[derive(Clone)]
pub struct Cleanable {
    key: NodeKey,
    core: Arc<CleanerCore>,
}

impl Cleanable {
    pub(crate) fn new(key: NodeKey, core: Arc<CleanerCore>) -> Self {
        Self { key, core }
    }

    /// Run the cleanup action now with `leak = false`.
    ///
    /// No-op if the action already ran, whichever path triggered it.
    pub fn clean(&self) {
        self.core.fire(self.key, false);
    }

    pub fn is_cleaned(&self) -> bool {
        !self.core.is_watched(self.key)
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }
}

impl fmt::Debug for Cleanable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanable").field("key", &self.key).finish()
    }
}

/// Liveness token of a registered owner.
///
/// Keep it inside the owning struct. When the owner is dropped without calling
/// `clean`, the node is handed to the cleaner's worker, which runs the action
/// with `leak = true`. Dropping it after `clean` does nothing.
///
/// Leaking a `PhantomRef` (e.g. `mem::forget`) leaves its node registered for
/// good, which also keeps the worker alive.
pub struct PhantomRef {
    key: NodeKey,
    core: Arc<CleanerCore>,
}

impl PhantomRef {
    pub(crate) fn new(key: NodeKey, core: Arc<CleanerCore>) -> Self {
        Self { key, core }
    }

    pub fn cleanable(&self) -> Cleanable {
        Cleanable::new(self.key, Arc::clone(&self.core))
    }

    /// Same as `self.cleanable().clean()`.
    pub fn clean(&self) {
        self.core.fire(self.key, false);
    }

    /// Whether the action is still pending.
    pub fn is_watched(&self) -> bool {
        self.core.is_watched(self.key)
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }
}

impl Drop for PhantomRef {
    fn drop(&mut self) {
        self.core.enqueue_unreachable(self.key);
    }
}

impl fmt::Debug for PhantomRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhantomRef").field("key", &self.key).finish()
    }
}

/// A registered object together with its phantom reference.
///
/// Dereferences to the object. When dropped, the object goes first and the
/// phantom reference second.
pub struct Tracked<T> {
    // field order is drop order
    value: T,
    phantom: PhantomRef,
}

impl<T> Tracked<T> {
    pub(crate) fn new(value: T, phantom: PhantomRef) -> Self {
        Self { value, phantom }
    }

    pub fn cleanable(&self) -> Cleanable {
        self.phantom.cleanable()
    }

    /// Release now (`leak = false`). The object itself stays usable.
    pub fn clean(&self) {
        self.phantom.clean();
    }

    pub fn is_watched(&self) -> bool {
        self.phantom.is_watched()
    }

    pub fn phantom(&self) -> &PhantomRef {
        &self.phantom
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Tracked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> AsRef<T> for Tracked<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("value", &self.value)
            .field("key", &self.phantom.key)
            .finish()
    }
}
