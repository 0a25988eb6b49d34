//! Read side of the redirect store, used by the engine.
//!
//! # Responsibilities
//! - Create the home directory and database file on first start
//! - Hold a small pool of reader connections for concurrent lookups
//! - Map SQLite outcomes onto `Lookup` / `StoreError`
//!
//! # Design Decisions
//! - One `Mutex<Connection>` per reader slot, picked round-robin; a busy slot
//!   is skipped so concurrent lookups spread across the pool
//! - Every read is a single statement, so it sees exactly the snapshot that
//!   was committed when it began
//! - `busy_timeout` bounds how long a lookup may wait on the writer

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::config::StoreConfig;
use crate::store::{Lookup, RedirectLookup, StoreError, StoreResult, DB_FILE};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS redirects (
    path   BLOB PRIMARY KEY NOT NULL,
    target TEXT NOT NULL
) WITHOUT ROWID;";

const SELECT_TARGET: &str = "SELECT target FROM redirects WHERE path = ?1";

/// Validate the home directory, creating it if needed, and return the path of
/// the database file inside it.
pub(crate) fn prepare_home(home_dir: &Path) -> StoreResult<PathBuf> {
    if home_dir.as_os_str().is_empty() {
        return Err(StoreError::InvalidHome);
    }
    fs::create_dir_all(home_dir).map_err(|source| StoreError::CreateHome {
        path: home_dir.to_path_buf(),
        source,
    })?;
    Ok(home_dir.join(DB_FILE))
}

/// Open a read-write connection, switch the file to WAL and make sure the
/// schema exists.
pub(crate) fn open_primary(db_path: &Path, busy_timeout: Duration) -> rusqlite::Result<Connection> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(busy_timeout)?;
    let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(journal_mode = %mode, "Store did not switch to WAL journaling");
    }
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

fn open_reader(db_path: &Path, busy_timeout: Duration) -> rusqlite::Result<Connection> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "query_only", true)?;
    Ok(conn)
}

/// The engine's handle on the redirect mapping.
///
/// Opened once at startup and shared read-only between request handlers.
/// `close` consumes the store, so no lookup can follow it.
#[derive(Debug)]
pub struct RedirectStore {
    db_path: PathBuf,
    readers: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl RedirectStore {
    /// Open (creating if needed) `<home_dir>/red-engine.db`.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let db_path = prepare_home(&config.home_dir)?;
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let open_err = |source| StoreError::Open {
            path: db_path.clone(),
            source,
        };

        // The schema connection only lives long enough to prepare the file.
        let primary = open_primary(&db_path, busy_timeout).map_err(open_err)?;

        let mut readers = Vec::with_capacity(config.readers.max(1));
        for _ in 0..config.readers.max(1) {
            let conn = open_reader(&db_path, busy_timeout).map_err(open_err)?;
            readers.push(Mutex::new(conn));
        }

        primary
            .close()
            .map_err(|(_, source)| open_err(source))?;

        tracing::info!(
            path = %db_path.display(),
            readers = readers.len(),
            "Opened redirect store"
        );

        Ok(Self {
            db_path,
            readers,
            next: AtomicUsize::new(0),
        })
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Number of pooled reader connections.
    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    /// Release every reader connection.
    ///
    /// All connections are closed even if one fails; the first failure is
    /// returned.
    pub fn close(self) -> StoreResult<()> {
        let mut first_error = None;
        for slot in self.readers {
            let result = match slot.into_inner() {
                Ok(conn) => conn.close().map_err(|(_, e)| StoreError::Close(e)),
                Err(_) => Err(StoreError::Poisoned),
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to close reader connection");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!(path = %self.db_path.display(), "Closed redirect store");
                Ok(())
            }
        }
    }

    /// Take a reader connection, preferring one that is idle.
    fn checkout(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        let len = self.readers.len();

        for i in 0..len {
            match self.readers[(start + i) % len].try_lock() {
                Ok(conn) => return Ok(conn),
                Err(TryLockError::WouldBlock) => continue,
                Err(TryLockError::Poisoned(_)) => return Err(StoreError::Poisoned),
            }
        }

        // Every slot is busy: queue on the one this call was assigned.
        self.readers[start % len]
            .lock()
            .map_err(|_| StoreError::Poisoned)
    }
}

impl RedirectLookup for RedirectStore {
    fn lookup(&self, path: &[u8]) -> StoreResult<Lookup> {
        let conn = self.checkout()?;
        let mut stmt = conn.prepare_cached(SELECT_TARGET).map_err(StoreError::Lookup)?;
        let target: Option<String> = stmt
            .query_row([path], |row| row.get(0))
            .optional()
            .map_err(StoreError::Lookup)?;

        match target {
            Some(target) if target.is_empty() => Err(StoreError::EmptyTarget {
                path: String::from_utf8_lossy(path).into_owned(),
            }),
            Some(target) => Ok(Lookup::Found(target)),
            None => Ok(Lookup::NotFound),
        }
    }
}
