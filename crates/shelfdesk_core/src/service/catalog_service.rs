//! Catalog use-case service.
//!
//! # Responsibility
//! - Add, edit, remove and search books.
//! - Announce catalog changes through the event publisher.
//!
//! # Invariants
//! - Catalog edits never set `available_copies` directly.
//! - Removal is refused while any copy is on loan.

use crate::events::{EventPublisher, LibraryEvent};
use crate::model::book::{Book, BookId, BookPatch, NewBook};
use crate::model::ValidationError;
use crate::repo::book_repo::{BookListQuery, BookRepository};
use crate::repo::RepoError;
use crate::service::ErrorKind;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Service error for catalog use-cases.
#[derive(Debug)]
pub enum CatalogError {
    Validation(ValidationError),
    BookNotFound(BookId),
    HasOpenLoans { book_id: BookId, open_loans: u32 },
    Repo(RepoError),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::BookNotFound(_) => ErrorKind::NotFound,
            Self::HasOpenLoans { .. } => ErrorKind::Conflict,
            Self::Repo(_) => ErrorKind::StorageError,
        }
    }
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::BookNotFound(id) => write!(f, "book not found: {id}"),
            Self::HasOpenLoans {
                book_id,
                open_loans,
            } => write!(
                f,
                "book {book_id} cannot be removed while {open_loans} copy(ies) are on loan"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::BookNotFound(_) | Self::HasOpenLoans { .. } => None,
        }
    }
}

impl From<ValidationError> for CatalogError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for CatalogError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::BookNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::HasOpenLoans {
                book_id,
                open_loans,
            } => Self::HasOpenLoans {
                book_id,
                open_loans,
            },
            other => Self::Repo(other),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog facade over a book repository.
pub struct CatalogService<R: BookRepository> {
    repo: R,
    events: Arc<dyn EventPublisher>,
}

impl<R: BookRepository> CatalogService<R> {
    pub fn new(repo: R, events: Arc<dyn EventPublisher>) -> Self {
        Self { repo, events }
    }

    /// Adds a book with every copy available.
    pub fn create_book(&self, input: NewBook) -> CatalogResult<Book> {
        let book = Book::create(input)?;
        self.repo.create_book(&book)?;
        info!(
            "event=book_create module=catalog status=ok book_id={} total_copies={}",
            book.id, book.total_copies
        );
        self.events
            .publish(&LibraryEvent::BookAdded { book: book.clone() });
        Ok(book)
    }

    pub fn get_book(&self, id: BookId) -> CatalogResult<Option<Book>> {
        Ok(self.repo.get_book(id)?)
    }

    /// All books in store order.
    pub fn list_books(&self) -> CatalogResult<Vec<Book>> {
        Ok(self.repo.list_books(&BookListQuery::default())?)
    }

    /// Merges `patch` into the stored book.
    ///
    /// A new `total_copies` must cover the copies currently on loan.
    pub fn update_book(&self, id: BookId, patch: &BookPatch) -> CatalogResult<Book> {
        let book = self.repo.update_book(id, patch).map_err(|err| {
            warn!("event=book_update module=catalog status=error book_id={id} error={err}");
            CatalogError::from(err)
        })?;
        info!(
            "event=book_update module=catalog status=ok book_id={} total_copies={} available_copies={}",
            book.id, book.total_copies, book.available_copies
        );
        self.events
            .publish(&LibraryEvent::BookUpdated { book: book.clone() });
        Ok(book)
    }

    /// Removes a book that has no copies on loan.
    pub fn delete_book(&self, id: BookId) -> CatalogResult<()> {
        self.repo.delete_book(id).map_err(|err| {
            warn!("event=book_delete module=catalog status=error book_id={id} error={err}");
            CatalogError::from(err)
        })?;
        info!("event=book_delete module=catalog status=ok book_id={id}");
        self.events.publish(&LibraryEvent::BookDeleted { id });
        Ok(())
    }

    /// Case-insensitive substring search over title, author and category.
    pub fn search_books(&self, query: &str) -> CatalogResult<Vec<Book>> {
        Ok(self.repo.list_books(&BookListQuery {
            search: Some(query.to_string()),
            category: None,
        })?)
    }

    /// Exact category filter.
    pub fn list_by_category(&self, category: &str) -> CatalogResult<Vec<Book>> {
        Ok(self.repo.list_books(&BookListQuery {
            search: None,
            category: Some(category.to_string()),
        })?)
    }
}
