//! Response envelope and error-to-status mapping.
//!
//! # Invariants
//! - Every failure body is `{"error": <message>, "kind": <ErrorKind>}`.
//! - Status codes depend only on [`ErrorKind`].

use log::error;
use serde::Serialize;
use serde_json::{json, Value};
use shelfdesk_core::{
    CatalogError, CirculationError, DbError, ErrorKind, MemberError, RepoError, ValidationError,
};
use std::fmt::Display;

/// Transport-agnostic response: an HTTP-style status plus a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: &impl Serialize) -> Self {
        Self::json(200, body)
    }

    pub fn created(body: &impl Serialize) -> Self {
        Self::json(201, body)
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: status_for(kind),
            body: json!({ "error": message.into(), "kind": kind.as_str() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `kind` of a failure body, `None` for successes.
    pub fn error_kind(&self) -> Option<&str> {
        if self.is_success() {
            return None;
        }
        self.body.get("kind").and_then(Value::as_str)
    }

    fn json(status: u16, body: &impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status, body },
            Err(err) => {
                error!("event=api_encode module=api status=error error={err}");
                Self::failure(
                    ErrorKind::StorageError,
                    format!("failed to encode response: {err}"),
                )
            }
        }
    }
}

/// HTTP-style status for an error classification.
pub fn status_for(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::ValidationError => 400,
        ErrorKind::NotFound => 404,
        ErrorKind::BookUnavailable | ErrorKind::AlreadyReturned | ErrorKind::Conflict => 409,
        ErrorKind::StorageError => 500,
    }
}

/// Errors that know their caller-facing classification.
pub(crate) trait Classified: Display {
    fn classify(&self) -> ErrorKind;
}

impl Classified for CatalogError {
    fn classify(&self) -> ErrorKind {
        self.kind()
    }
}

impl Classified for MemberError {
    fn classify(&self) -> ErrorKind {
        self.kind()
    }
}

impl Classified for CirculationError {
    fn classify(&self) -> ErrorKind {
        self.kind()
    }
}

impl Classified for RepoError {
    fn classify(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::HasOpenLoans { .. } => ErrorKind::Conflict,
            Self::Db(_) | Self::InvalidData(_) => ErrorKind::StorageError,
        }
    }
}

impl Classified for ValidationError {
    fn classify(&self) -> ErrorKind {
        ErrorKind::ValidationError
    }
}

impl Classified for DbError {
    fn classify(&self) -> ErrorKind {
        ErrorKind::StorageError
    }
}

pub(crate) fn from_error(err: &impl Classified) -> ApiResponse {
    ApiResponse::failure(err.classify(), err.to_string())
}
