//! Request-scoped connection handles.
//!
//! There is no pool and no process-wide handle: each unit of work opens its
//! own [`ScopedConnection`] and closes it when done. Dropping a handle closes
//! it too, so early returns and `?` release the connection on every path.

use std::ops::Deref;
use std::path::PathBuf;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

use super::config::SqliteConfig;
use super::error::{CrudError, CrudResult};

/// Opens connections to the configured store.
#[derive(Debug, Clone)]
pub struct ConnectionProvider {
    config: SqliteConfig,
}

impl ConnectionProvider {
    pub fn new(config: SqliteConfig) -> Self {
        Self { config }
    }

    /// Open a handle. Creates the database file if it does not exist yet;
    /// opening an existing file leaves it untouched.
    pub fn acquire(&self) -> CrudResult<ScopedConnection> {
        let path = self.config.db_path.clone();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&path, flags).map_err(|e| {
            warn!(path = %path.display(), error = %e, "failed to open database");
            CrudError::StoreUnavailable(format!("{}: {}", path.display(), e))
        })?;

        conn.busy_timeout(self.config.busy_timeout())?;
        if self.config.foreign_keys {
            conn.pragma_update(None, "foreign_keys", true)?;
        }

        debug!(path = %path.display(), "opened connection");
        Ok(ScopedConnection { conn, path })
    }

    /// Run `f` with a fresh handle and release it afterwards, whatever `f`
    /// returned.
    pub fn with_connection<T, F>(&self, f: F) -> CrudResult<T>
    where
        F: FnOnce(&Connection) -> CrudResult<T>,
    {
        let handle = self.acquire()?;
        let result = f(&handle);
        match handle.release() {
            Ok(()) => result,
            // the work's own error is more useful than the close failure
            Err(close_err) => result.and(Err(close_err)),
        }
    }
}

/// A connection owned by one unit of work.
#[derive(Debug)]
pub struct ScopedConnection {
    conn: Connection,
    path: PathBuf,
}

impl ScopedConnection {
    /// Close the handle, reporting a failed close instead of swallowing it.
    pub fn release(self) -> CrudResult<()> {
        let path = self.path;
        self.conn.close().map_err(|(_, e)| {
            warn!(path = %path.display(), error = %e, "failed to close connection");
            CrudError::from(e)
        })?;
        debug!(path = %path.display(), "released connection");
        Ok(())
    }
}

impl Deref for ScopedConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.db");
        let provider = ConnectionProvider::new(SqliteConfig::new(&path));

        let handle = provider.acquire().unwrap();
        handle.execute_batch("CREATE TABLE t (a INTEGER)").unwrap();
        handle.release().unwrap();
        assert!(path.exists());

        // reopening is idempotent and keeps the data
        let handle = provider.acquire().unwrap();
        let count: i64 = handle
            .query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn acquire_reports_unavailable_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("x.db");
        let provider = ConnectionProvider::new(SqliteConfig::new(path));
        assert!(matches!(provider.acquire(), Err(CrudError::StoreUnavailable(_))));
    }

    #[test]
    fn with_connection_applies_foreign_keys_pragma() {
        let dir = TempDir::new().unwrap();
        let provider = ConnectionProvider::new(SqliteConfig::new(dir.path().join("fk.db")));
        let enabled: i64 = provider
            .with_connection(|conn| {
                Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn with_connection_propagates_work_error() {
        let dir = TempDir::new().unwrap();
        let provider = ConnectionProvider::new(SqliteConfig::new(dir.path().join("e.db")));
        let result: CrudResult<()> =
            provider.with_connection(|_| Err(CrudError::Validation("nope".into())));
        assert!(matches!(result, Err(CrudError::Validation(_))));
    }
}
