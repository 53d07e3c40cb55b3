//! Circulation engine: borrow/return orchestration and loan queries.
//!
//! # Responsibility
//! - Drive the borrow and return protocols against a loan repository.
//! - Translate repository outcomes into caller-facing errors.
//! - Publish `book_borrowed` / `book_returned` after commit.
//!
//! # Invariants
//! - A failed precondition leaves every record untouched.
//! - A loan is returned at most once; availability is restored at most once.
//! - Event publication cannot fail or roll back a committed mutation.

use crate::events::{EventPublisher, LibraryEvent};
use crate::model::book::BookId;
use crate::model::loan::{
    AvailabilityDrift, CirculationStats, EnrichedLoan, Loan, LoanId, LoanReceipt, ReturnReceipt,
    DEFAULT_LOAN_PERIOD_DAYS,
};
use crate::model::member::MemberId;
use crate::model::{now_epoch_ms, EpochMs, ValidationError};
use crate::repo::loan_repo::{BorrowOutcome, LoanRepository, ReturnOutcome};
use crate::repo::RepoError;
use crate::service::ErrorKind;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Service error for circulation use-cases.
#[derive(Debug)]
pub enum CirculationError {
    BookNotFound(BookId),
    MemberNotFound(MemberId),
    LoanNotFound(LoanId),
    BookUnavailable(BookId),
    AlreadyReturned { loan_id: LoanId, returned_at: EpochMs },
    Validation(ValidationError),
    Storage(RepoError),
}

impl CirculationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BookNotFound(_) | Self::MemberNotFound(_) | Self::LoanNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::BookUnavailable(_) => ErrorKind::BookUnavailable,
            Self::AlreadyReturned { .. } => ErrorKind::AlreadyReturned,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Storage(_) => ErrorKind::StorageError,
        }
    }
}

impl Display for CirculationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BookNotFound(id) => write!(f, "book not found: {id}"),
            Self::MemberNotFound(id) => write!(f, "member not found: {id}"),
            Self::LoanNotFound(id) => write!(f, "loan record not found: {id}"),
            Self::BookUnavailable(id) => write!(f, "no copies of book {id} are available"),
            Self::AlreadyReturned { loan_id, .. } => {
                write!(f, "loan {loan_id} has already been returned")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CirculationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for CirculationError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for CirculationError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Storage(other),
        }
    }
}

pub type CirculationResult<T> = Result<T, CirculationError>;

/// Circulation facade over a loan repository.
pub struct CirculationService<R: LoanRepository> {
    repo: R,
    events: Arc<dyn EventPublisher>,
    loan_period_days: u32,
}

impl<R: LoanRepository> CirculationService<R> {
    /// Creates a service lending for [`DEFAULT_LOAN_PERIOD_DAYS`].
    pub fn new(repo: R, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            repo,
            events,
            loan_period_days: DEFAULT_LOAN_PERIOD_DAYS,
        }
    }

    /// Overrides the lending window used for new loans.
    pub fn with_loan_period_days(mut self, days: u32) -> Self {
        self.loan_period_days = days;
        self
    }

    /// Lends one copy of `book_id` to `member_id`.
    ///
    /// # Errors
    /// - `BookNotFound` / `MemberNotFound` when a reference does not resolve.
    /// - `BookUnavailable` when every copy is already on loan.
    /// - `Storage` on store failures; nothing is committed in that case.
    pub fn borrow(&mut self, book_id: BookId, member_id: MemberId) -> CirculationResult<LoanReceipt> {
        let loan = Loan::open(book_id, member_id, now_epoch_ms(), self.loan_period_days)?;

        let borrowed = match self.repo.borrow_copy(&loan) {
            Ok(BorrowOutcome::Borrowed(borrowed)) => borrowed,
            Ok(BorrowOutcome::BookNotFound(id)) => {
                warn!("event=loan_borrow module=circulation status=rejected reason=book_not_found book_id={id}");
                return Err(CirculationError::BookNotFound(id));
            }
            Ok(BorrowOutcome::MemberNotFound(id)) => {
                warn!("event=loan_borrow module=circulation status=rejected reason=member_not_found member_id={id}");
                return Err(CirculationError::MemberNotFound(id));
            }
            Ok(BorrowOutcome::NoCopiesAvailable(id)) => {
                info!("event=loan_borrow module=circulation status=rejected reason=unavailable book_id={id}");
                return Err(CirculationError::BookUnavailable(id));
            }
            Err(err) => {
                error!("event=loan_borrow module=circulation status=error book_id={book_id} member_id={member_id} error={err}");
                return Err(err.into());
            }
        };

        info!(
            "event=loan_borrow module=circulation status=ok loan_id={} book_id={} member_id={} available_copies={}",
            borrowed.loan.id, book_id, member_id, borrowed.book.available_copies
        );
        let receipt = LoanReceipt {
            loan_id: borrowed.loan.id,
            book_id,
            member_id,
            due_date: borrowed.loan.due_date,
        };
        self.events.publish(&LibraryEvent::BookBorrowed {
            loan: borrowed.loan,
            member_name: borrowed.member_name,
            book_title: borrowed.book.title,
        });
        Ok(receipt)
    }

    /// Closes an open loan and puts the copy back on the shelf.
    ///
    /// # Errors
    /// - `LoanNotFound` when no loan has this id.
    /// - `AlreadyReturned` when the loan was closed before; availability is
    ///   not touched again.
    pub fn return_loan(&mut self, loan_id: LoanId) -> CirculationResult<ReturnReceipt> {
        let returned = match self.repo.return_loan(loan_id, now_epoch_ms()) {
            Ok(ReturnOutcome::Returned(returned)) => returned,
            Ok(ReturnOutcome::LoanNotFound(id)) => {
                warn!("event=loan_return module=circulation status=rejected reason=loan_not_found loan_id={id}");
                return Err(CirculationError::LoanNotFound(id));
            }
            Ok(ReturnOutcome::AlreadyReturned {
                loan_id,
                returned_at,
            }) => {
                warn!("event=loan_return module=circulation status=rejected reason=already_returned loan_id={loan_id}");
                return Err(CirculationError::AlreadyReturned {
                    loan_id,
                    returned_at,
                });
            }
            Err(err) => {
                error!("event=loan_return module=circulation status=error loan_id={loan_id} error={err}");
                return Err(err.into());
            }
        };

        info!(
            "event=loan_return module=circulation status=ok loan_id={} book_id={} restocked={}",
            loan_id, returned.loan.book_id, returned.book_restocked
        );
        self.events.publish(&LibraryEvent::BookReturned {
            loan_id,
            book_id: returned.loan.book_id,
            member_id: returned.loan.member_id,
        });
        Ok(ReturnReceipt {
            success: true,
            loan_id,
        })
    }

    pub fn get_loan(&self, loan_id: LoanId) -> CirculationResult<Option<Loan>> {
        Ok(self.repo.get_loan(loan_id)?)
    }

    /// Open loans joined with display fields, soonest due first.
    pub fn active_loans(&self) -> CirculationResult<Vec<EnrichedLoan>> {
        Ok(self.repo.list_active_loans()?)
    }

    /// All loans of one member in insertion order (not sorted by date).
    pub fn borrowing_history(&self, member_id: MemberId) -> CirculationResult<Vec<EnrichedLoan>> {
        Ok(self.repo.list_member_loans(member_id)?)
    }

    /// Dashboard counters; overdue is evaluated against `now`.
    pub fn dashboard_stats(&self, now: EpochMs) -> CirculationResult<CirculationStats> {
        Ok(self.repo.circulation_stats(now)?)
    }

    /// Books violating the availability invariant. Empty in a healthy store.
    pub fn audit_availability(&self) -> CirculationResult<Vec<AvailabilityDrift>> {
        let drift = self.repo.availability_drift()?;
        if drift.is_empty() {
            info!("event=availability_audit module=circulation status=ok drifted=0");
        } else {
            error!(
                "event=availability_audit module=circulation status=inconsistent drifted={}",
                drift.len()
            );
        }
        Ok(drift)
    }
}
