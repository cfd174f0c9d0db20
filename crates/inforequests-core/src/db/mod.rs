//! SQLite persistence for inforequests.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so report readers do not block the expiration sweep
//! - `busy_timeout = 5s` to ride out short lock contention between writers
//! - `foreign_keys = ON` for cascade deletes and the non-null relations

pub mod migrations;
pub mod prefetch;
pub mod query;
pub mod records;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// File name of the database inside a data directory.
pub const DATABASE_FILE: &str = "inforequests.sqlite3";

/// Failures opening a data directory's database.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no database at {}", .path.display())]
    NotInitialized { path: PathBuf },
}

/// A migrated database connection plus a read-query counter.
///
/// The counter lets callers (and tests) verify that cached accessors do not
/// touch the database and that batch loaders issue a fixed number of queries.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
    reads: Cell<u64>,
}

impl Store {
    /// Open (or create) the database at `path`, apply runtime pragmas, and
    /// migrate the schema to the latest version.
    ///
    /// # Errors
    ///
    /// Returns an error if opening, configuring, or migrating fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create database directory {}", parent.display()))?;
        }

        let mut conn = Connection::open(path)
            .with_context(|| format!("open database {}", path.display()))?;

        configure_connection(&conn).context("configure sqlite pragmas")?;
        migrations::migrate(&mut conn).context("apply schema migrations")?;

        Ok(Self::from_connection(conn))
    }

    /// Open the database at `path`, which must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotInitialized`] when the file is missing, or
    /// the errors of [`Store::open`].
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StoreError::NotInitialized {
                path: path.to_path_buf(),
            }
            .into());
        }
        Self::open(path)
    }

    /// Open a private in-memory database with the full schema.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database or a
    /// migration fails.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("open in-memory database")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("enable foreign keys")?;
        migrations::migrate(&mut conn).context("apply schema migrations")?;
        Ok(Self::from_connection(conn))
    }

    const fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            reads: Cell::new(0),
        }
    }

    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Number of read queries issued through this store so far.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.reads.get()
    }

    pub(crate) fn count_read(&self) {
        self.reads.set(self.reads.get() + 1);
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken up front, so a read of the branch tail and the
    /// insert that depends on it cannot interleave with another writer. When
    /// a transaction is already open, `f` joins it.
    ///
    /// # Errors
    ///
    /// Returns the error from `f` (after rolling back) or from BEGIN/COMMIT.
    pub fn immediate<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if !self.conn.is_autocommit() {
            return f();
        }

        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .context("begin immediate transaction")?;

        match f() {
            Ok(value) => {
                self.conn
                    .execute_batch("COMMIT")
                    .context("commit transaction")?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %rollback, "rollback after failed transaction");
                }
                Err(err)
            }
        }
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// Most ids bound into one `IN (...)` list; longer key lists are loaded in
/// chunks of this size.
pub const MAX_IDS_PER_QUERY: usize = 5_000;

/// `?1, ?2, …` placeholder list for an `IN (...)` clause of `len` values.
pub(crate) fn placeholders(len: usize) -> String {
    (1..=len)
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, Store, placeholders};
    use crate::db::migrations;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join(super::DATABASE_FILE);
        (dir, path)
    }

    #[test]
    fn open_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let store = Store::open(&path).expect("open store");
        let conn = store.conn();

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(
            u128::from(busy_timeout_ms),
            DEFAULT_BUSY_TIMEOUT.as_millis()
        );

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn open_runs_migrations() {
        let (_dir, path) = temp_db_path();
        let store = Store::open(&path).expect("open store");
        let version = migrations::current_schema_version(store.conn()).expect("schema version");
        assert_eq!(version, migrations::LATEST_SCHEMA_VERSION);
    }

    #[test]
    fn open_existing_requires_the_file() {
        let (_dir, path) = temp_db_path();
        let err = Store::open_existing(&path).expect_err("missing database");
        assert!(matches!(
            err.downcast_ref::<super::StoreError>(),
            Some(super::StoreError::NotInitialized { .. })
        ));

        drop(Store::open(&path).expect("create"));
        Store::open_existing(&path).expect("reopen");
    }

    #[test]
    fn immediate_rolls_back_on_error() {
        let store = Store::open_in_memory().expect("open store");
        let result: anyhow::Result<()> = store.immediate(|| {
            store.conn().execute(
                "INSERT INTO obligees (name, emails, updated_at_us) VALUES ('Town', '', 1)",
                [],
            )?;
            anyhow::bail!("abort");
        });
        assert!(result.is_err());
        assert!(store.conn().is_autocommit());

        let count: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM obligees", [], |row| row.get(0))
            .expect("count obligees");
        assert_eq!(count, 0);
    }

    #[test]
    fn nested_immediate_joins_outer_transaction() {
        let store = Store::open_in_memory().expect("open store");
        store
            .immediate(|| store.immediate(|| Ok(())))
            .expect("nested transaction");
        assert!(store.conn().is_autocommit());
    }

    #[test]
    fn placeholders_are_numbered() {
        assert_eq!(placeholders(3), "?1, ?2, ?3");
        assert_eq!(placeholders(0), "");
    }
}
