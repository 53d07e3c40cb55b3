//! Inbound request payloads.
//!
//! Identifiers arrive as free text and are parsed at the boundary so a
//! malformed id is a client error, not a missing record.

use serde::{Deserialize, Serialize};
use shelfdesk_core::ValidationError;
use uuid::Uuid;

/// `POST /loans/borrow` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BorrowRequest {
    pub book_id: String,
    pub member_id: String,
}

/// `POST /loans/return` body.
///
/// `member_id` is accepted for compatibility; the notice always goes to the
/// member recorded on the loan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReturnRequest {
    pub loan_id: String,
    pub member_id: Option<String>,
}

impl BorrowRequest {
    pub fn new(book_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            member_id: member_id.into(),
        }
    }
}

impl ReturnRequest {
    pub fn new(loan_id: impl Into<String>) -> Self {
        Self {
            loan_id: loan_id.into(),
            member_id: None,
        }
    }
}

pub(crate) fn parse_id(field: &'static str, raw: &str) -> Result<Uuid, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Uuid::parse_str(trimmed).map_err(|_| ValidationError::MalformedId(trimmed.to_string()))
}
