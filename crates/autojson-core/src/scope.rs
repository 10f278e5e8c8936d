//! Scoped access with flush-on-exit.
//!
//! An [`AccessScope`] is an exclusive borrow of a
//! [`PersistentObject`](crate::PersistentObject). Reading through it has no
//! side effects. Asking for the value mutably marks the object dirty, even
//! if nothing is changed, and the object is saved when the scope ends.
//!
//! The exclusive borrow makes a second, overlapping scope on the same object
//! a compile error.
//!
//! ```ignore
//! let mut scope = object.enter();
//! scope.write().retain(|k, _| k != "stale");
//! scope.finish()?; // or just let it drop
//! ```

use std::ops::Deref;

use crate::error::PersistError;
use crate::persistable::Persistable;
use crate::persistent::PersistentObject;

/// Guard returned by [`PersistentObject::enter`].
///
/// The exit step runs exactly once: in [`finish`](AccessScope::finish), or
/// in `Drop` on any other path (early return, `?`, panic unwinding). A save
/// failure in `Drop` cannot be returned, so it is logged; use `finish` to
/// observe it.
#[must_use = "the scope flushes as soon as it is dropped"]
pub struct AccessScope<'a, T: Persistable> {
    object: &'a mut PersistentObject<T>,
    finished: bool,
}

impl<'a, T: Persistable> AccessScope<'a, T> {
    pub(crate) fn new(object: &'a mut PersistentObject<T>) -> Self {
        AccessScope {
            object,
            finished: false,
        }
    }

    /// The current value. Never marks the object dirty.
    pub fn read(&self) -> &T {
        self.object.get_object()
    }

    /// The current value, mutably. Marks the object dirty on request.
    pub fn write(&mut self) -> &mut T {
        self.object.mark_dirty();
        self.object.value_mut()
    }

    pub fn is_dirty(&self) -> bool {
        self.object.is_dirty()
    }

    /// End the scope now, saving if dirty, and return the save result.
    pub fn finish(mut self) -> Result<(), PersistError> {
        self.finished = true;
        self.object.flush()
    }
}

impl<T: Persistable> Deref for AccessScope<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.read()
    }
}

impl<T: Persistable> Drop for AccessScope<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.object.flush() {
            log::error!(
                "Failed to save {} on scope exit: {}",
                self.object.path().display(),
                e
            );
        }
    }
}
