// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datastore existence probe

use super::StoreError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Fixed database file name inside the store directory
pub const DB_FILE_NAME: &str = "goobtool.db";

/// Store directory for this release: the working directory.
pub fn default_store_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Full path of the database file inside `dir`.
pub fn db_path(dir: &Path) -> PathBuf {
    dir.join(DB_FILE_NAME)
}

/// Report whether a datastore file exists in `dir`.
///
/// Absence is `Ok(false)`. A directory or other non-regular node at the
/// database path is [`StoreError::NotAFile`]; any other stat failure is
/// [`StoreError::Probe`] and is never treated as absence.
pub fn probe(dir: &Path) -> Result<bool, StoreError> {
    let path = db_path(dir);
    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() => Ok(true),
        Ok(_) => Err(StoreError::NotAFile(path)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StoreError::Probe { path, source }),
    }
}
