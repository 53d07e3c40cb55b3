use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Caller-facing error classification shared by every service error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NotFound,
    BookUnavailable,
    AlreadyReturned,
    ValidationError,
    /// The request is well-formed but conflicts with current state.
    Conflict,
    StorageError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::BookUnavailable => "BookUnavailable",
            Self::AlreadyReturned => "AlreadyReturned",
            Self::ValidationError => "ValidationError",
            Self::Conflict => "Conflict",
            Self::StorageError => "StorageError",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
