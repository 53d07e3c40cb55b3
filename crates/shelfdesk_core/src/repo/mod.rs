//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per record collection.
//! - Isolate SQLite query details from service orchestration.
//! - Own multi-collection transactions (borrow/return, guarded deletes).
//!
//! # Invariants
//! - Write paths call the model `validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Every multi-row mutation runs in one `IMMEDIATE` transaction.

mod error;

pub mod book_repo;
pub mod loan_repo;
pub mod member_repo;
pub mod notification_repo;

pub use error::{RepoError, RepoResult};
pub(crate) use error::{parse_count, parse_uuid};
