//! Record store: SQLite connections, schema and the shared store handle.
//!
//! # Responsibility
//! - Open and configure connections for every library record collection.
//! - Keep the on-disk schema at the version this build understands.
//! - Provide the `RecordStore` handle that services borrow connections from.
//!
//! # Invariants
//! - Nothing reads or writes library records before migrations succeed.
//! - The store holds no business rules; those live in `repo` and `service`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
mod store;

pub use open::{open_db, open_db_in_memory};
pub use store::RecordStore;

pub type DbResult<T> = Result<T, DbError>;

/// Storage-level failure below the repository layer.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A schema step failed; the whole upgrade was rolled back.
    Migration {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
    /// A thread panicked while holding the store connection.
    Poisoned,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "store schema v{db_version} is newer than this build (v{latest_supported})"
            ),
            Self::Migration { version, name, .. } => {
                write!(f, "schema step v{version} ({name}) failed")
            }
            Self::Poisoned => write!(f, "record store connection lock is poisoned"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::Poisoned => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
