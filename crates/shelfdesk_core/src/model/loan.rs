//! Loan record and circulation read models.
//!
//! # Invariants
//! - A loan moves `Borrowed -> Returned` exactly once.
//! - `return_date` is `Some` iff `status == Returned`.
//! - `due_date` is fixed at borrow time.
//! - Overdue is computed by [`is_overdue`], never persisted.

use super::book::BookId;
use super::member::MemberId;
use super::{EpochMs, ValidationError, DAY_MS};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type LoanId = Uuid;

/// Default lending window.
pub const DEFAULT_LOAN_PERIOD_DAYS: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Borrowed,
    Returned,
}

impl LoanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Borrowed => "borrowed",
            Self::Returned => "returned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "borrowed" => Some(Self::Borrowed),
            "returned" => Some(Self::Returned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub borrow_date: EpochMs,
    pub due_date: EpochMs,
    pub status: LoanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_date: Option<EpochMs>,
}

impl Loan {
    /// Opens a loan at `borrowed_at`, due `loan_period_days` later.
    pub fn open(
        book_id: BookId,
        member_id: MemberId,
        borrowed_at: EpochMs,
        loan_period_days: u32,
    ) -> Result<Self, ValidationError> {
        if loan_period_days == 0 {
            return Err(ValidationError::InvalidLoanPeriod(loan_period_days));
        }
        let loan = Self {
            id: Uuid::new_v4(),
            book_id,
            member_id,
            borrow_date: borrowed_at,
            due_date: borrowed_at.saturating_add(DAY_MS.saturating_mul(i64::from(loan_period_days))),
            status: LoanStatus::Borrowed,
            return_date: None,
        };
        loan.validate()?;
        Ok(loan)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() || self.book_id.is_nil() || self.member_id.is_nil() {
            return Err(ValidationError::NilId);
        }
        if self.due_date < self.borrow_date {
            return Err(ValidationError::DueBeforeBorrow {
                borrow_date: self.borrow_date,
                due_date: self.due_date,
            });
        }
        let returned = self.status == LoanStatus::Returned;
        if returned != self.return_date.is_some() {
            return Err(ValidationError::ReturnDateMismatch);
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.status == LoanStatus::Borrowed
    }

    pub fn is_overdue(&self, now: EpochMs) -> bool {
        is_overdue(self.status, self.due_date, now)
    }
}

/// Overdue predicate: still borrowed and strictly past the due date.
pub fn is_overdue(status: LoanStatus, due_date: EpochMs, now: EpochMs) -> bool {
    status == LoanStatus::Borrowed && now > due_date
}

/// Loan joined with display fields of its book and member.
///
/// Dangling references resolve to [`super::UNKNOWN_REFERENCE`] (email to an
/// empty string) rather than failing the read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedLoan {
    #[serde(flatten)]
    pub loan: Loan,
    pub title: String,
    pub author: String,
    #[serde(rename = "name")]
    pub member_name: String,
    #[serde(rename = "email")]
    pub member_email: String,
}

impl EnrichedLoan {
    pub fn is_overdue(&self, now: EpochMs) -> bool {
        self.loan.is_overdue(now)
    }
}

/// Result of a successful borrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanReceipt {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub due_date: EpochMs,
}

/// Result of a successful return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnReceipt {
    pub success: bool,
    pub loan_id: LoanId,
}

/// Snapshot counters for the circulation dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CirculationStats {
    pub total_books: u32,
    pub total_members: u32,
    pub active_loans: u32,
    pub overdue_loans: u32,
}

/// A book whose stored availability disagrees with its open loans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityDrift {
    pub book_id: BookId,
    pub total_copies: u32,
    pub available_copies: u32,
    pub open_loans: u32,
}

impl AvailabilityDrift {
    /// Availability implied by the open loans.
    pub fn expected_available(&self) -> i64 {
        i64::from(self.total_copies) - i64::from(self.open_loans)
    }
}
