// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SQLite datastore
//!
//! Owns the single connection used for the lifetime of a `serve` run (or a
//! one-shot `db` command).
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE schema_migrations (
//!     version TEXT PRIMARY KEY,
//!     applied_at INTEGER NOT NULL
//! );
//! ```

use super::probe::{db_path, probe};
use super::state::SchemaState;
use super::StoreError;
use crate::logging::Logger;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Pragmas applied, in order, to every connection.
pub const SAFE_DEFAULTS: [(&str, &str); 4] = [
    ("journal_mode", "WAL"),
    ("synchronous", "NORMAL"),
    ("foreign_keys", "ON"),
    ("busy_timeout", "5000"),
];

const SCHEMA_TABLE: &str = "schema_migrations";

const INITIAL_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
)";

/// Open datastore handle
///
/// Thread-safe via internal Mutex (SQLite Connection is not Sync). The slot
/// is emptied by [`Store::close`], after which every operation returns
/// [`StoreError::Closed`].
pub struct Store {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
    logger: Arc<dyn Logger>,
}

impl Store {
    /// Open the database at `path` and apply [`SAFE_DEFAULTS`].
    ///
    /// A connection whose pragmas fail is closed before the error is
    /// returned.
    pub fn open(path: impl AsRef<Path>, logger: Arc<dyn Logger>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;

        if let Err(e) = apply_pragmas(&conn, &SAFE_DEFAULTS) {
            if let Err((_, close_err)) = conn.close() {
                logger.warn(format_args!(
                    "closing {} after pragma failure: {}",
                    path.display(),
                    close_err
                ));
            }
            return Err(e);
        }

        logger.debug(format_args!("opened datastore {}", path.display()));

        Ok(Self {
            path,
            conn: Mutex::new(Some(conn)),
            logger,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Close the connection. Safe to call any number of times.
    pub fn close(&self) -> Result<(), StoreError> {
        let Some(conn) = self.lock().take() else {
            return Ok(());
        };

        match conn.close() {
            Ok(()) => {
                self.logger
                    .debug(format_args!("closed datastore {}", self.path.display()));
                Ok(())
            }
            // The connection is dropped here either way; its Drop finalizes it.
            Err((_, e)) => Err(StoreError::Close(e)),
        }
    }

    /// Classify the datastore against `expected` schema version.
    pub fn check_state(&self, expected: &str) -> Result<SchemaState, StoreError> {
        self.with_conn(|conn| {
            let recorded = recorded_version(conn)?;
            Ok(SchemaState::classify(recorded.as_deref(), expected))
        })
    }

    /// Most recently applied schema version, `None` if nothing is recorded.
    pub fn schema_version(&self) -> Result<Option<String>, StoreError> {
        self.with_conn(recorded_version)
    }

    /// Create the version-tracking table and record `version`, atomically.
    pub fn init_schema(&self, version: &str) -> Result<(), StoreError> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;

        let tx = conn.transaction().map_err(StoreError::Init)?;
        tx.execute(INITIAL_SCHEMA, []).map_err(StoreError::Init)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at)
             VALUES (?1, CAST(strftime('%s', 'now') AS INTEGER))",
            params![version],
        )
        .map_err(StoreError::Init)?;
        tx.commit().map_err(StoreError::Init)?;

        self.logger
            .info(format_args!("recorded schema version {}", version));
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;
        f(conn)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            self.logger.warn(format_args!("{}", e));
        }
    }
}

fn apply_pragmas(conn: &Connection, pragmas: &[(&str, &str)]) -> Result<(), StoreError> {
    for (name, value) in pragmas {
        let sql = format!("PRAGMA {}={}", name, value);
        // journal_mode and busy_timeout answer with a row; drain it.
        let run = || -> rusqlite::Result<()> {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            while rows.next()?.is_some() {}
            Ok(())
        };
        run().map_err(|source| StoreError::Pragma {
            pragma: sql.clone(),
            source,
        })?;
    }
    Ok(())
}

fn recorded_version(conn: &Connection) -> Result<Option<String>, StoreError> {
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![SCHEMA_TABLE],
            |row| row.get(0),
        )
        .map_err(StoreError::Query)?;

    if tables == 0 {
        return Ok(None);
    }

    conn.query_row(
        "SELECT version FROM schema_migrations
         ORDER BY applied_at DESC, rowid DESC
         LIMIT 1",
        [],
        |row| row.get(0),
    )
    .optional()
    .map_err(StoreError::Query)
}

/// Create and initialize a datastore in `dir`.
///
/// Fails with [`StoreError::AlreadyExists`] if one is present. On any failure
/// after the file was created, the partial database (and its WAL/SHM
/// companions) is removed so a retry starts clean.
pub fn create_store(
    dir: &Path,
    version: &str,
    logger: Arc<dyn Logger>,
) -> Result<PathBuf, StoreError> {
    create_store_with(dir, logger, |store| store.init_schema(version))
}

fn create_store_with(
    dir: &Path,
    logger: Arc<dyn Logger>,
    init: impl FnOnce(&Store) -> Result<(), StoreError>,
) -> Result<PathBuf, StoreError> {
    let path = db_path(dir);
    if probe(dir)? {
        return Err(StoreError::AlreadyExists(path));
    }

    let store = match Store::open(&path, Arc::clone(&logger)) {
        Ok(store) => store,
        Err(e) => {
            remove_partial(&path, logger.as_ref());
            return Err(e);
        }
    };

    let result = init(&store).and_then(|()| store.close());
    if let Err(e) = result {
        drop(store);
        remove_partial(&path, logger.as_ref());
        return Err(e);
    }

    logger.info(format_args!("created datastore {}", path.display()));
    Ok(path)
}

fn remove_partial(path: &Path, logger: &dyn Logger) {
    let mut candidates = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        candidates.push(PathBuf::from(name));
    }

    for candidate in candidates {
        match std::fs::remove_file(&candidate) {
            Ok(()) => logger.warn(format_args!(
                "removed partial datastore file {}",
                candidate.display()
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => logger.error(format_args!(
                "failed to remove partial datastore file {}: {}",
                candidate.display(),
                e
            )),
        }
    }
}

/// Datastore summary printed by `db verify`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreReport {
    pub path: PathBuf,
    pub state: SchemaState,
    pub schema_version: Option<String>,
    pub expected_schema: String,
}

/// Inspect the datastore in `dir` without modifying its schema.
pub fn verify_store(
    dir: &Path,
    expected: &str,
    logger: Arc<dyn Logger>,
) -> Result<StoreReport, StoreError> {
    let path = db_path(dir);
    if !probe(dir)? {
        return Ok(StoreReport {
            path,
            state: SchemaState::Missing,
            schema_version: None,
            expected_schema: expected.to_string(),
        });
    }

    let store = Store::open(&path, logger)?;
    let state = store.check_state(expected)?;
    let schema_version = store.schema_version()?;
    store.close()?;

    Ok(StoreReport {
        path,
        state,
        schema_version,
        expected_schema: expected.to_string(),
    })
}
