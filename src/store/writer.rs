//! Write side of the redirect store, used by the `red-admin` tool.
//!
//! The engine only ever reads; this writer runs in a separate process and
//! shares the file through WAL journaling. Each mutation is a single
//! autocommit statement, so readers see either the old or the new target.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension};

use crate::store::redirect::{open_primary, prepare_home};
use crate::store::{RedirectEntry, StoreError, StoreResult};

const WRITER_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Administrative handle that creates, updates and removes entries.
#[derive(Debug)]
pub struct RedirectWriter {
    conn: Connection,
}

impl RedirectWriter {
    /// Open `<home_dir>/red-engine.db` for writing, creating it if needed.
    pub fn open(home_dir: &Path) -> StoreResult<Self> {
        let db_path = prepare_home(home_dir)?;
        let conn = open_primary(&db_path, WRITER_BUSY_TIMEOUT).map_err(|source| {
            StoreError::Open {
                path: db_path.clone(),
                source,
            }
        })?;
        Ok(Self { conn })
    }

    /// Insert or replace the target for `path`.
    pub fn put(&self, path: &str, target: &str) -> StoreResult<()> {
        if path.is_empty() {
            return Err(StoreError::InvalidEntry("path must not be empty"));
        }
        if target.is_empty() {
            return Err(StoreError::InvalidEntry("target must not be empty"));
        }

        self.conn
            .execute(
                "INSERT INTO redirects (path, target) VALUES (?1, ?2)
                 ON CONFLICT(path) DO UPDATE SET target = excluded.target",
                rusqlite::params![path.as_bytes(), target],
            )
            .map_err(StoreError::Write)?;
        Ok(())
    }

    /// Remove the entry for `path`. Returns whether an entry existed.
    pub fn remove(&self, path: &str) -> StoreResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM redirects WHERE path = ?1", [path.as_bytes()])
            .map_err(StoreError::Write)?;
        Ok(removed > 0)
    }

    /// Read back the target for `path`, if any.
    pub fn get(&self, path: &str) -> StoreResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT target FROM redirects WHERE path = ?1",
                [path.as_bytes()],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Lookup)
    }

    /// All entries, ordered by path.
    pub fn list(&self) -> StoreResult<Vec<RedirectEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, target FROM redirects ORDER BY path")
            .map_err(StoreError::Lookup)?;
        let rows = stmt
            .query_map([], |row| {
                let path: Vec<u8> = row.get(0)?;
                Ok(RedirectEntry {
                    path: String::from_utf8_lossy(&path).into_owned(),
                    target: row.get(1)?,
                })
            })
            .map_err(StoreError::Lookup)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Lookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RedirectWriter::open(dir.path()).unwrap();

        assert_eq!(writer.get("/foo").unwrap(), None);
        writer.put("/foo", "http://example.com").unwrap();
        assert_eq!(writer.get("/foo").unwrap().as_deref(), Some("http://example.com"));

        assert!(writer.remove("/foo").unwrap());
        assert!(!writer.remove("/foo").unwrap());
        assert_eq!(writer.get("/foo").unwrap(), None);
    }

    #[test]
    fn put_keeps_one_target_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RedirectWriter::open(dir.path()).unwrap();

        writer.put("/b", "http://b.example").unwrap();
        writer.put("/a", "http://a.example").unwrap();
        writer.put("/a", "http://a2.example").unwrap();

        assert_eq!(
            writer.list().unwrap(),
            vec![
                RedirectEntry {
                    path: "/a".into(),
                    target: "http://a2.example".into()
                },
                RedirectEntry {
                    path: "/b".into(),
                    target: "http://b.example".into()
                },
            ]
        );
    }

    #[test]
    fn rejects_empty_path_or_target() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RedirectWriter::open(dir.path()).unwrap();

        assert!(matches!(
            writer.put("", "http://example.com"),
            Err(StoreError::InvalidEntry(_))
        ));
        assert!(matches!(
            writer.put("/foo", ""),
            Err(StoreError::InvalidEntry(_))
        ));
        assert!(writer.list().unwrap().is_empty());
    }
}
