//! Persistence error taxonomy.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Creating the data directory or database file failed.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A JSON column no longer decodes into its domain type; points at
    /// the offending submission rather than failing the whole read
    /// anonymously.
    #[error("Corrupt JSON in column '{column}' for submission '{id}': {source}")]
    CorruptColumn {
        id: String,
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Database lock poisoned")]
    LockPoisoned,
}
