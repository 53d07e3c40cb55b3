//! Book catalog record.
//!
//! # Invariants
//! - `total_copies >= 1`.
//! - `0 <= available_copies <= total_copies`.
//! - `available_copies` is only moved by circulation, or shifted together with
//!   `total_copies` by a catalog edit.

use super::{now_epoch_ms, require_text, EpochMs, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type BookId = Uuid;

/// Canonical book record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub category: Option<String>,
    pub publish_year: Option<i32>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub total_copies: u32,
    pub available_copies: u32,
    pub created_at: EpochMs,
}

/// Input for adding a book to the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub category: Option<String>,
    pub publish_year: Option<i32>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    /// Defaults to one copy when absent.
    pub total_copies: Option<u32>,
}

/// Partial catalog edit. `None` keeps the stored value.
///
/// There is deliberately no `available_copies` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub publish_year: Option<i32>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub total_copies: Option<u32>,
}

impl Book {
    /// Builds a fresh book with every copy on the shelf.
    pub fn create(input: NewBook) -> Result<Self, ValidationError> {
        let total_copies = input.total_copies.unwrap_or(1);
        let book = Self {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            author: input.author.trim().to_string(),
            category: input.category,
            publish_year: input.publish_year,
            isbn: input.isbn,
            description: input.description,
            total_copies,
            available_copies: total_copies,
            created_at: now_epoch_ms(),
        };
        book.validate()?;
        Ok(book)
    }

    /// Validates record-level invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::NilId);
        }
        require_text("title", &self.title)?;
        require_text("author", &self.author)?;
        if self.total_copies == 0 {
            return Err(ValidationError::ZeroCopies);
        }
        if self.available_copies > self.total_copies {
            return Err(ValidationError::AvailableOutOfRange {
                available: self.available_copies,
                total: self.total_copies,
            });
        }
        Ok(())
    }

    /// Copies currently lent out according to the materialized count.
    pub fn copies_on_loan(&self) -> u32 {
        self.total_copies.saturating_sub(self.available_copies)
    }

    /// Merges descriptive fields from `patch`.
    ///
    /// `total_copies` is resized separately through [`Book::resize`] because it
    /// needs the authoritative open-loan count.
    pub fn apply_patch(&mut self, patch: &BookPatch) {
        if let Some(title) = patch.title.as_deref() {
            self.title = title.trim().to_string();
        }
        if let Some(author) = patch.author.as_deref() {
            self.author = author.trim().to_string();
        }
        if patch.category.is_some() {
            self.category.clone_from(&patch.category);
        }
        if patch.publish_year.is_some() {
            self.publish_year = patch.publish_year;
        }
        if patch.isbn.is_some() {
            self.isbn.clone_from(&patch.isbn);
        }
        if patch.description.is_some() {
            self.description.clone_from(&patch.description);
        }
    }

    /// Sets a new copy total and re-derives availability from `open_loans`.
    pub fn resize(&mut self, total_copies: u32, open_loans: u32) -> Result<(), ValidationError> {
        if total_copies == 0 {
            return Err(ValidationError::ZeroCopies);
        }
        if total_copies < open_loans {
            return Err(ValidationError::CopiesBelowOpenLoans {
                total: total_copies,
                open_loans,
            });
        }
        self.total_copies = total_copies;
        self.available_copies = total_copies - open_loans;
        Ok(())
    }

    /// Case-insensitive substring match on title, author and category.
    pub fn matches_search(&self, needle_lowercase: &str) -> bool {
        let contains = |value: &str| value.to_lowercase().contains(needle_lowercase);
        contains(self.title.as_str())
            || contains(self.author.as_str())
            || self.category.as_deref().is_some_and(contains)
    }
}
