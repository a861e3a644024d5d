// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Embedded datastore
//!
//! ```text
//! probe(dir) --false--> Missing (serve stops, `db create` proceeds)
//!      |
//!     true
//!      v
//! Store::open --> check_state --> Uninitialized | VersionMismatch | Ready
//! ```

pub mod probe;
pub mod sqlite;
pub mod state;

pub use probe::{db_path, default_store_dir, probe, DB_FILE_NAME};
pub use sqlite::{create_store, verify_store, Store, StoreReport, SAFE_DEFAULTS};
pub use state::SchemaState;

use std::path::PathBuf;
use thiserror::Error;

/// Datastore errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("datastore path is a directory, expected file: {0}")]
    NotAFile(PathBuf),

    #[error("failed to check store existence at {path}: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("datastore already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("failed to open database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to set pragma {pragma:?}: {source}")]
    Pragma {
        pragma: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to query schema state: {0}")]
    Query(#[source] rusqlite::Error),

    #[error("failed to initialize schema: {0}")]
    Init(#[source] rusqlite::Error),

    #[error("failed to close database: {0}")]
    Close(#[source] rusqlite::Error),

    #[error("database not opened")]
    Closed,
}
