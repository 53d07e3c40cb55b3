//! Library domain model.
//!
//! # Responsibility
//! - Define the canonical records for books, members, loans and notifications.
//! - Keep record-level invariants next to the data they protect.
//!
//! # Invariants
//! - Every record is identified by a stable, non-nil UUID.
//! - Timestamps are Unix epoch milliseconds.
//! - Loan "overdue" is derived at read time and never stored.

pub mod book;
pub mod loan;
pub mod member;
pub mod notification;
mod validation;

pub use validation::ValidationError;

use std::time::{SystemTime, UNIX_EPOCH};

/// Unix epoch milliseconds.
pub type EpochMs = i64;

/// Milliseconds in one calendar day.
pub const DAY_MS: EpochMs = 24 * 60 * 60 * 1000;

/// Display value for a loan whose book or member no longer resolves.
pub const UNKNOWN_REFERENCE: &str = "Unknown";

/// Current wall-clock time in epoch milliseconds.
///
/// Clocks set before 1970 collapse to `0` rather than failing.
pub fn now_epoch_ms() -> EpochMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            EpochMs::try_from(elapsed.as_millis()).unwrap_or(EpochMs::MAX)
        })
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(())
}
