//! Persistent path → target store.
//!
//! # Data Flow
//! ```text
//! red-admin (writer.rs)          red-engine (redirect.rs)
//!     put/remove ──┐                 ┌── lookup (pooled readers)
//!                  ▼                 ▼
//!             <home_dir>/red-engine.db  (SQLite, WAL journal)
//! ```
//!
//! # Design Decisions
//! - WAL journaling: readers never block each other and never observe a
//!   half-committed write from the external writer
//! - The engine opens the file for reading only; all mutation goes through
//!   `RedirectWriter`, which the engine never instantiates
//! - Keys are raw path bytes; no normalization of case or trailing slashes

pub mod error;
pub mod redirect;
pub mod writer;

use serde::Serialize;

pub use error::{StoreError, StoreResult};
pub use redirect::RedirectStore;
pub use writer::RedirectWriter;

/// File name of the store inside the configured home directory.
pub const DB_FILE: &str = "red-engine.db";

/// Outcome of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The path maps to this target.
    Found(String),
    /// No entry exists for the path.
    NotFound,
}

/// Read access to the redirect mapping.
///
/// Implementations must be safe to call from many request contexts at once.
pub trait RedirectLookup: Send + Sync {
    /// Resolve a request path to its redirect target.
    fn lookup(&self, path: &[u8]) -> StoreResult<Lookup>;
}

/// A single path → target mapping, as listed by the administrative tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectEntry {
    pub path: String,
    pub target: String,
}
