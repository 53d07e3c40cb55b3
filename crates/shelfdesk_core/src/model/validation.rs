use std::error::Error;
use std::fmt::{Display, Formatter};

/// Record-level validation failures shared by every domain model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Identity must never be the nil UUID.
    NilId,
    /// A required text field is missing or whitespace only.
    BlankField(&'static str),
    /// A book must own at least one physical copy.
    ZeroCopies,
    /// `available_copies` escaped `0..=total_copies`.
    AvailableOutOfRange { available: u32, total: u32 },
    /// A catalog edit would leave fewer copies than outstanding loans.
    CopiesBelowOpenLoans { total: u32, open_loans: u32 },
    /// A loan cannot fall due before it was borrowed.
    DueBeforeBorrow { borrow_date: i64, due_date: i64 },
    /// `return_date` must be present exactly when the loan is returned.
    ReturnDateMismatch,
    /// Loan period must be at least one day.
    InvalidLoanPeriod(u32),
    /// Free-form identifier text did not parse as a UUID.
    MalformedId(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "id must not be nil"),
            Self::BlankField(field) => write!(f, "`{field}` is required"),
            Self::ZeroCopies => write!(f, "total copies must be at least 1"),
            Self::AvailableOutOfRange { available, total } => write!(
                f,
                "available copies {available} out of range for total copies {total}"
            ),
            Self::CopiesBelowOpenLoans { total, open_loans } => write!(
                f,
                "total copies {total} is below the {open_loans} copies currently on loan"
            ),
            Self::DueBeforeBorrow {
                borrow_date,
                due_date,
            } => write!(
                f,
                "due date {due_date} is earlier than borrow date {borrow_date}"
            ),
            Self::ReturnDateMismatch => {
                write!(f, "return date must be set exactly when a loan is returned")
            }
            Self::InvalidLoanPeriod(days) => {
                write!(f, "loan period must be at least one day, got {days}")
            }
            Self::MalformedId(value) => write!(f, "malformed id `{value}`"),
        }
    }
}

impl Error for ValidationError {}
