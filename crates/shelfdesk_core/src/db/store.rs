//! Process-scoped record store handle.
//!
//! # Responsibility
//! - Own exactly one migrated connection for the lifetime of the handle.
//! - Hand out exclusive, scoped access to that connection.
//!
//! # Invariants
//! - A `RecordStore` is only constructed after migrations succeed.
//! - `close` consumes the handle; no access is possible afterwards.
//! - Several stores may point at the same file; SQLite locking coordinates
//!   their writers.

use super::{open_db, open_db_in_memory, DbError, DbResult};
use log::{info, warn};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Explicitly constructed persistent store shared by core services.
#[derive(Debug)]
pub struct RecordStore {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl RecordStore {
    /// Opens (or creates) a file-backed store at `path`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let conn = open_db(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: Some(path.to_path_buf()),
        })
    }

    /// Opens a private in-memory store, mainly for tests.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = open_db_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: None,
        })
    }

    /// Backing file path, `None` for in-memory stores.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Locks the underlying connection for one unit of work.
    ///
    /// Repositories borrow the returned guard; drop it before the next call
    /// on the same thread to avoid self-deadlock.
    pub fn connection(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Flushes and closes the store.
    pub fn close(self) -> DbResult<()> {
        let mode = if self.location.is_some() { "file" } else { "memory" };
        let conn = self.conn.into_inner().map_err(|_| DbError::Poisoned)?;
        match conn.close() {
            Ok(()) => {
                info!("event=db_close module=db status=ok mode={mode}");
                Ok(())
            }
            Err((_, err)) => {
                warn!("event=db_close module=db status=error mode={mode} error={err}");
                Err(err.into())
            }
        }
    }
}
