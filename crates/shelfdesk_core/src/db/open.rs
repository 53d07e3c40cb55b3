//! Connection bootstrap for the record store.
//!
//! # Invariants
//! - Returned connections enforce foreign keys.
//! - Returned connections wait up to `BUSY_TIMEOUT` for a competing writer.
//! - File connections run in WAL mode.
//! - Returned connections are migrated to the latest schema.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// How long a writer waits for the lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backing {
    File,
    Memory,
}

impl Backing {
    fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens (creating if needed) the store file at `path`.
///
/// Emits `db_open` start/ok/error events with elapsed milliseconds.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_backing(Backing::File, || Connection::open(path))
}

/// Opens a private in-memory store; its contents vanish with the connection.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_backing(Backing::Memory, Connection::open_in_memory)
}

fn open_backing(
    backing: Backing,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = backing.label();
    info!("event=db_open module=db status=start mode={mode}");

    let outcome = connect()
        .map_err(|err| ("db_open_failed", DbError::from(err)))
        .and_then(|mut conn| match configure(&mut conn, backing) {
            Ok(()) => Ok(conn),
            Err(err) => Err(("db_bootstrap_failed", err)),
        });

    let elapsed_ms = started_at.elapsed().as_millis();
    match outcome {
        Ok(conn) => {
            info!("event=db_open module=db status=ok mode={mode} duration_ms={elapsed_ms}");
            Ok(conn)
        }
        Err((error_code, err)) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={elapsed_ms} error_code={error_code} error={err}"
            );
            Err(err)
        }
    }
}

fn configure(conn: &mut Connection, backing: Backing) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if backing == Backing::File {
        // journal_mode answers with the resulting mode, so it must be queried.
        let _journal: String =
            conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    }
    apply_migrations(conn)
}
