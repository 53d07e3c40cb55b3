//! Book repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide catalog CRUD and lookup over the `books` collection.
//! - Keep copy-count edits consistent with the `loans` collection.
//!
//! # Invariants
//! - Listing order is store (insertion) order.
//! - `update_book` never writes `available_copies` directly; a new total is
//!   applied against the open-loan count inside the same transaction.
//! - `delete_book` refuses while open loans exist.

use crate::model::book::{Book, BookId, BookPatch};
use crate::repo::{parse_count, parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const BOOK_SELECT_SQL: &str = "SELECT
    id,
    title,
    author,
    category,
    publish_year,
    isbn,
    description,
    total_copies,
    available_copies,
    created_at
FROM books";

/// Query options for listing books.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookListQuery {
    /// Case-insensitive substring over title, author and category.
    pub search: Option<String>,
    /// Exact category match.
    pub category: Option<String>,
}

/// Repository interface for book records.
pub trait BookRepository {
    fn create_book(&self, book: &Book) -> RepoResult<BookId>;
    fn get_book(&self, id: BookId) -> RepoResult<Option<Book>>;
    fn list_books(&self, query: &BookListQuery) -> RepoResult<Vec<Book>>;
    /// Merges `patch` and returns the stored result.
    fn update_book(&self, id: BookId, patch: &BookPatch) -> RepoResult<Book>;
    fn delete_book(&self, id: BookId) -> RepoResult<()>;
}

/// SQLite-backed book repository.
pub struct SqliteBookRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBookRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl BookRepository for SqliteBookRepository<'_> {
    fn create_book(&self, book: &Book) -> RepoResult<BookId> {
        book.validate()?;

        self.conn.execute(
            "INSERT INTO books (
                id,
                title,
                author,
                category,
                publish_year,
                isbn,
                description,
                total_copies,
                available_copies,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                book.id.to_string(),
                book.title.as_str(),
                book.author.as_str(),
                book.category.as_deref(),
                book.publish_year,
                book.isbn.as_deref(),
                book.description.as_deref(),
                book.total_copies,
                book.available_copies,
                book.created_at,
            ],
        )?;

        Ok(book.id)
    }

    fn get_book(&self, id: BookId) -> RepoResult<Option<Book>> {
        load_book(self.conn, id)
    }

    fn list_books(&self, query: &BookListQuery) -> RepoResult<Vec<Book>> {
        let mut sql = format!("{BOOK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(category) = query.category.as_ref() {
            sql.push_str(" AND category = ?");
            bind_values.push(Value::Text(category.clone()));
        }
        sql.push_str(" ORDER BY seq ASC");

        let needle = query.search.as_deref().map(str::to_lowercase);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut books = Vec::new();
        while let Some(row) = rows.next()? {
            let book = parse_book_row(row)?;
            // SQLite `lower()` only folds ASCII, so text matching stays in Rust.
            if needle
                .as_deref()
                .map_or(true, |needle| book.matches_search(needle))
            {
                books.push(book);
            }
        }

        Ok(books)
    }

    fn update_book(&self, id: BookId, patch: &BookPatch) -> RepoResult<Book> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut book = load_book(&tx, id)?.ok_or(RepoError::NotFound(id))?;

        book.apply_patch(patch);
        if let Some(total_copies) = patch.total_copies {
            let open_loans = count_open_loans(&tx, id)?;
            book.resize(total_copies, open_loans)?;
        }
        book.validate()?;

        tx.execute(
            "UPDATE books
             SET
                title = ?2,
                author = ?3,
                category = ?4,
                publish_year = ?5,
                isbn = ?6,
                description = ?7,
                total_copies = ?8,
                available_copies = ?9
             WHERE id = ?1;",
            params![
                id.to_string(),
                book.title.as_str(),
                book.author.as_str(),
                book.category.as_deref(),
                book.publish_year,
                book.isbn.as_deref(),
                book.description.as_deref(),
                book.total_copies,
                book.available_copies,
            ],
        )?;
        tx.commit()?;

        Ok(book)
    }

    fn delete_book(&self, id: BookId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if load_book(&tx, id)?.is_none() {
            return Err(RepoError::NotFound(id));
        }

        let open_loans = count_open_loans(&tx, id)?;
        if open_loans > 0 {
            return Err(RepoError::HasOpenLoans {
                book_id: id,
                open_loans,
            });
        }

        tx.execute("DELETE FROM books WHERE id = ?1;", [id.to_string()])?;
        tx.commit()?;
        Ok(())
    }
}

pub(crate) fn load_book(conn: &Connection, id: BookId) -> RepoResult<Option<Book>> {
    let mut stmt = conn.prepare(&format!("{BOOK_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_book_row(row)?));
    }
    Ok(None)
}

pub(crate) fn count_open_loans(conn: &Connection, id: BookId) -> RepoResult<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM loans WHERE book_id = ?1 AND status = 'borrowed';",
        [id.to_string()],
        |row| row.get(0),
    )?;
    parse_count(count, "loans.count")
}

fn parse_book_row(row: &Row<'_>) -> RepoResult<Book> {
    let id_text: String = row.get("id")?;
    let book = Book {
        id: parse_uuid(&id_text, "books.id")?,
        title: row.get("title")?,
        author: row.get("author")?,
        category: row.get("category")?,
        publish_year: row.get("publish_year")?,
        isbn: row.get("isbn")?,
        description: row.get("description")?,
        total_copies: parse_count(row.get("total_copies")?, "books.total_copies")?,
        available_copies: parse_count(row.get("available_copies")?, "books.available_copies")?,
        created_at: row.get("created_at")?,
    };
    book.validate()
        .map_err(|err| RepoError::InvalidData(format!("book {id_text}: {err}")))?;
    Ok(book)
}
