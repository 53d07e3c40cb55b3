use shelfdesk_core::db::migrations::latest_version;
use shelfdesk_core::db::{open_db, open_db_in_memory, DbError};
use shelfdesk_core::RecordStore;
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "books");
    assert_table_exists(&conn, "members");
    assert_table_exists(&conn, "loans");
    assert_table_exists(&conn, "notifications");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shelfdesk.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "loans");
}

#[test]
fn file_backed_store_uses_write_ahead_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal.db");

    let store = RecordStore::open(&path).unwrap();
    assert_eq!(store.location(), Some(path.as_path()));
    let mode: String = store
        .connection()
        .unwrap()
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
    store.close().unwrap();
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn schema_rejects_availability_outside_copy_bounds() {
    let conn = open_db_in_memory().unwrap();
    let insert = |total: i64, available: i64| {
        conn.execute(
            "INSERT INTO books (id, title, author, total_copies, available_copies, created_at)
             VALUES (lower(hex(randomblob(16))), 'T', 'A', ?1, ?2, 0);",
            [total, available],
        )
    };

    assert!(insert(2, 2).is_ok());
    assert!(insert(2, 3).is_err());
    assert!(insert(2, -1).is_err());
    assert!(insert(0, 0).is_err());
}

#[test]
fn schema_requires_return_date_exactly_for_returned_loans() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO members (id, name, membership_date) VALUES ('m-1', 'Reader', 0);",
        [],
    )
    .unwrap();
    let insert = |id: &str, status: &str, return_date: Option<i64>| {
        conn.execute(
            "INSERT INTO loans (id, book_id, member_id, borrow_date, due_date, status, return_date)
             VALUES (?1, 'b-1', 'm-1', 0, 1, ?2, ?3);",
            rusqlite::params![id, status, return_date],
        )
    };

    assert!(insert("l-1", "borrowed", None).is_ok());
    assert!(insert("l-2", "returned", Some(5)).is_ok());
    assert!(insert("l-3", "returned", None).is_err());
    assert!(insert("l-4", "borrowed", Some(5)).is_err());
    assert!(insert("l-5", "overdue", None).is_err());
}

#[test]
fn loans_must_reference_an_existing_member() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO loans (id, book_id, member_id, borrow_date, due_date, status)
         VALUES ('l-1', 'b-1', 'nobody', 0, 1, 'borrowed');",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
