//! A single value kept in sync with a JSON file.
//!
//! # Overview
//!
//! [`PersistentObject<T>`] owns one typed value and the path of the file
//! that stores it. Construction loads the file, or writes the default value
//! when there is none yet, so the file exists after every successful open.
//!
//! ```text
//! open(base, descriptor, default)
//!   ├── <base>.json exists  → decode → value, dirty = false
//!   ├── <base>.json missing → value = default → save
//!   └── anything else       → error (never silently replaced)
//! ```
//!
//! # Atomic Writes
//!
//! Every save uses write-then-rename:
//!
//! 1. Write to `<base>.json.tmp`
//! 2. Rename to `<base>.json` (atomic on Unix)
//!
//! A crash between the two steps leaves the previous document in place.
//!
//! # Dirty Tracking
//!
//! `dirty` means the in-memory value may have diverged from the file. It is
//! set by [`set_object_without_saving`](PersistentObject::set_object_without_saving)
//! and by the write accessor of an [`AccessScope`], and cleared by every
//! successful save.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::Level;
use serde_json::Value as JsonValue;

use crate::cast::CastMap;
use crate::codec;
use crate::descriptor::TypeDescriptor;
use crate::error::PersistError;
use crate::logging::ScopeLog;
use crate::paths;
use crate::persistable::Persistable;
use crate::scope::AccessScope;
use crate::value::Value;

// ============================================================================
// BUILDER
// ============================================================================

/// Options for opening a [`PersistentObject`].
pub struct PersistentObjectBuilder {
    base: PathBuf,
    descriptor: TypeDescriptor,
    decode_casts: CastMap,
    encode_casts: CastMap,
    pretty: bool,
    create_dirs: bool,
}

impl PersistentObjectBuilder {
    /// Start building for the document at `<base>.json`.
    pub fn new(base: impl Into<PathBuf>, descriptor: TypeDescriptor) -> Self {
        Self {
            base: base.into(),
            descriptor,
            decode_casts: CastMap::new(),
            encode_casts: CastMap::new(),
            pretty: true,
            create_dirs: true,
        }
    }

    /// Cast map consulted while loading.
    pub fn decode_casts(mut self, casts: CastMap) -> Self {
        self.decode_casts = casts;
        self
    }

    /// Cast map consulted while saving.
    pub fn encode_casts(mut self, casts: CastMap) -> Self {
        self.encode_casts = casts;
        self
    }

    /// Use the same cast map for loading and saving.
    pub fn casts(self, casts: CastMap) -> Self {
        self.decode_casts(casts.clone()).encode_casts(casts)
    }

    /// Pretty-print the document (default) or write it compactly.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Create missing parent directories on save (default on).
    pub fn create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }

    /// Load the document, or persist `default` if there is none.
    pub fn open<T: Persistable>(self, default: T) -> Result<PersistentObject<T>, PersistError> {
        let path = paths::json_path(&self.base);
        let mut object = PersistentObject {
            path,
            descriptor: self.descriptor,
            value: default,
            dirty: false,
            decode_casts: self.decode_casts,
            encode_casts: self.encode_casts,
            pretty: self.pretty,
            create_dirs: self.create_dirs,
        };

        match object.load()? {
            Some(value) => {
                log::debug!("Loaded {}", object.path.display());
                object.value = value;
            }
            None => {
                log::info!(
                    "No document at {}, writing default",
                    object.path.display()
                );
                object.save()?;
            }
        }

        Ok(object)
    }
}

// ============================================================================
// PERSISTENT OBJECT
// ============================================================================

/// A typed value mirrored to `<base>.json`.
///
/// Only one instance per path should be live at a time; concurrent writers
/// to the same path are not coordinated.
pub struct PersistentObject<T: Persistable> {
    path: PathBuf,
    descriptor: TypeDescriptor,
    value: T,
    dirty: bool,
    decode_casts: CastMap,
    encode_casts: CastMap,
    pretty: bool,
    create_dirs: bool,
}

impl<T: Persistable> PersistentObject<T> {
    /// Open with default options and no cast maps.
    ///
    /// # Arguments
    ///
    /// * `base` - Path without extension; the file is `<base>.json`
    /// * `descriptor` - Shape of the stored value
    /// * `default` - Value adopted and saved when the file does not exist
    ///
    /// # Errors
    ///
    /// Any failure other than a missing file: unreadable file, invalid
    /// JSON, a document that does not fit `descriptor`, or a failed save of
    /// the default.
    pub fn open(
        base: impl Into<PathBuf>,
        descriptor: TypeDescriptor,
        default: T,
    ) -> Result<Self, PersistError> {
        PersistentObjectBuilder::new(base, descriptor).open(default)
    }

    /// The document path (`<base>.json`).
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The current in-memory value. No side effects.
    pub fn get_object(&self) -> &T {
        &self.value
    }

    /// Replace the value and save immediately.
    pub fn set_object(&mut self, value: T) -> Result<(), PersistError> {
        self.value = value;
        // stays dirty if the save fails
        self.dirty = true;
        self.save()
    }

    /// Replace the value and mark it dirty without touching the file.
    pub fn set_object_without_saving(&mut self, value: T) {
        self.value = value;
        self.dirty = true;
    }

    /// Enter an access scope. The file is rewritten when the scope ends if
    /// the value was requested mutably.
    pub fn enter(&mut self) -> AccessScope<'_, T> {
        AccessScope::new(self)
    }

    /// Encode the value and atomically replace the document.
    ///
    /// Encoding happens before any I/O, so an encode failure never touches
    /// the file. Safe to call when not dirty.
    pub fn save(&mut self) -> Result<(), PersistError> {
        let _scope = ScopeLog::new(Level::Debug, format!("save {}", self.path.display()));

        let json = self
            .value
            .to_value()
            .and_then(|value| codec::to_jsonable(&value, &self.encode_casts))
            .map_err(|e| PersistError::codec(&self.path, e))?;
        let text = if self.pretty {
            serde_json::to_string_pretty(&json)
        } else {
            serde_json::to_string(&json)
        }
        .map_err(|e| PersistError::io(&self.path, io::Error::new(io::ErrorKind::InvalidData, e)))?;

        if self.create_dirs {
            paths::ensure_parent_dir(&self.path).map_err(|e| PersistError::io(&self.path, e))?;
        }
        write_atomic(&self.path, &text)?;

        self.dirty = false;
        Ok(())
    }

    /// Save only if dirty.
    pub fn flush(&mut self) -> Result<(), PersistError> {
        if self.dirty {
            self.save()
        } else {
            Ok(())
        }
    }

    /// Flush pending changes and release the object.
    pub fn close(mut self) -> Result<(), PersistError> {
        let result = self.flush();
        // the caller gets the error; drop must not retry
        self.dirty = false;
        result
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// `Ok(None)` when the document does not exist.
    fn load(&self) -> Result<Option<T>, PersistError> {
        match read_document(&self.path, &self.descriptor, &self.decode_casts)? {
            Some(value) => T::from_value(value)
                .map(Some)
                .map_err(|e| PersistError::codec(&self.path, e)),
            None => Ok(None),
        }
    }
}

impl<T: Persistable> Drop for PersistentObject<T> {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.save() {
                log::warn!("Failed to flush {} on drop: {}", self.path.display(), e);
            }
        }
    }
}

impl<T: Persistable + std::fmt::Debug> std::fmt::Debug for PersistentObject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentObject")
            .field("path", &self.path)
            .field("descriptor", &self.descriptor.to_string())
            .field("value", &self.value)
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Read and decode the document at `path`.
///
/// Returns `Ok(None)` if the file does not exist; every other failure is an
/// error.
pub fn read_document(
    path: &Path,
    descriptor: &TypeDescriptor,
    casts: &CastMap,
) -> Result<Option<Value>, PersistError> {
    let _scope = ScopeLog::new(Level::Debug, format!("load {}", path.display()));

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistError::io(path, e)),
    };
    let json: JsonValue = serde_json::from_str(&text).map_err(|source| PersistError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })?;
    let value = codec::from_jsonable(&json, descriptor, casts)
        .map_err(|e| PersistError::codec(path, e))?;

    Ok(Some(value))
}

/// Write `text` to `path` through a sibling temp file and a rename.
///
/// If either step fails the temp file is removed (best effort), leaving
/// `path` untouched.
pub fn write_atomic(path: &Path, text: &str) -> Result<(), PersistError> {
    let temp_path = paths::temp_path(path);

    if let Err(e) = fs::write(&temp_path, text) {
        let _ = fs::remove_file(&temp_path);
        return Err(PersistError::io(&temp_path, e));
    }

    // Atomic rename (on Unix, this is guaranteed atomic)
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(PersistError::io(path, e));
    }

    log::debug!("Wrote {} bytes to {}", text.len(), path.display());
    Ok(())
}
