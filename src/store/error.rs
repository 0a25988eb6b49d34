//! Redirect store error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while opening, reading, writing or closing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The configured home directory is empty or unset.
    #[error("store home directory is not set")]
    InvalidHome,

    /// The home directory does not exist and could not be created.
    #[error("cannot create store home {}: {source}", path.display())]
    CreateHome {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The database file could not be created, opened or prepared.
    #[error("cannot open store {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A lookup failed for a reason other than "not found".
    #[error("lookup failed: {0}")]
    Lookup(#[source] rusqlite::Error),

    /// An entry exists but holds no usable target.
    #[error("entry for '{path}' has an empty target")]
    EmptyTarget { path: String },

    /// A reader connection was poisoned by a panicking lookup.
    #[error("reader connection poisoned")]
    Poisoned,

    /// A write from the administrative tool failed.
    #[error("write failed: {0}")]
    Write(#[source] rusqlite::Error),

    /// An entry was rejected before reaching the database.
    #[error("invalid entry: {0}")]
    InvalidEntry(&'static str),

    /// The store is still referenced by in-flight requests.
    #[error("store still referenced by {references} handle(s)")]
    InUse { references: usize },

    /// Closing a connection failed.
    #[error("close failed: {0}")]
    Close(#[source] rusqlite::Error),
}

impl StoreError {
    /// True for failures that happen while serving a lookup.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            StoreError::Lookup(_) | StoreError::EmptyTarget { .. } | StoreError::Poisoned
        )
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
