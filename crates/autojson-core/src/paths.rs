//! Path helpers for persisted documents.
//!
//! A persistent object is addressed by a base path; the document lives at
//! `<base>.json` and is staged at `<base>.json.tmp`. Extensions are appended,
//! never substituted, so `data/v1.2` maps to `data/v1.2.json`.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Append `.{extension}` to a path.
pub fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// `<base>.json`
pub fn json_path(base: &Path) -> PathBuf {
    append_extension(base, "json")
}

/// `<path>.tmp`, the staging file for an atomic replace of `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    append_extension(path, "tmp")
}

/// Create the parent directory of `path` if it is missing.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
