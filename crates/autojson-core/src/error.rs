//! Error types for encoding, decoding, and persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the codec and by [`Persistable`](crate::Persistable)
/// conversions.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CodecError {
    /// No built-in handling, cast-map entry, or capability for this type.
    #[error("unsupported type: {type_name}")]
    UnsupportedType { type_name: String },

    /// A tuple was decoded from an array of the wrong length.
    #[error("tuple arity mismatch: expected {expected} elements, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    /// The JSON shape does not fit the declared type descriptor.
    #[error("malformed document: expected {expected}, found {found}")]
    MalformedDocument { expected: String, found: String },

    /// A decoded value does not fit the Rust type it is converted into.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A cast function rejected its input.
    #[error("cast for `{tag}` failed: {reason}")]
    Cast { tag: String, reason: String },
}

impl CodecError {
    pub(crate) fn unsupported(type_name: impl Into<String>) -> Self {
        CodecError::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    pub(crate) fn malformed(expected: impl Into<String>, found: impl Into<String>) -> Self {
        CodecError::MalformedDocument {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        CodecError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Errors raised while loading or saving a persisted document.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Reading, writing, or renaming failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not valid JSON.
    #[error("{} is not valid JSON: {source}", .path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document could not be encoded or decoded.
    #[error("failed to convert {}: {source}", .path.display())]
    Codec {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn codec(path: impl Into<PathBuf>, source: CodecError) -> Self {
        PersistError::Codec {
            path: path.into(),
            source,
        }
    }

    /// Whether the stored document was unreadable as the declared type.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            PersistError::InvalidJson { .. }
                | PersistError::Codec {
                    source: CodecError::MalformedDocument { .. } | CodecError::ArityMismatch { .. },
                    ..
                }
        )
    }

    /// The file the failed operation was working on.
    pub fn path(&self) -> &std::path::Path {
        match self {
            PersistError::Io { path, .. }
            | PersistError::InvalidJson { path, .. }
            | PersistError::Codec { path, .. } => path,
        }
    }
}
