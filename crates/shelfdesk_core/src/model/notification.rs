//! Per-member notification feed entries.
//!
//! # Invariants
//! - Entries are append-only.
//! - `is_read` is always `false` when created.

use super::book::Book;
use super::member::MemberId;
use super::{require_text, EpochMs, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotificationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Borrow,
    Return,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Borrow => "borrow",
            Self::Return => "return",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "info" => Some(Self::Info),
            "borrow" => Some(Self::Borrow),
            "return" => Some(Self::Return),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub member_id: MemberId,
    pub message: String,
    /// Serialized as `type` to match the feed wire shape.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: EpochMs,
}

impl Notification {
    pub fn new(
        member_id: MemberId,
        message: impl Into<String>,
        kind: NotificationKind,
        created_at: EpochMs,
    ) -> Result<Self, ValidationError> {
        let notification = Self {
            id: Uuid::new_v4(),
            member_id,
            message: message.into(),
            kind,
            is_read: false,
            created_at,
        };
        notification.validate()?;
        Ok(notification)
    }

    /// Feed entry written alongside a new loan.
    pub fn borrow_notice(
        member_id: MemberId,
        book: &Book,
        created_at: EpochMs,
    ) -> Result<Self, ValidationError> {
        Self::new(
            member_id,
            format!("You borrowed \"{}\" by {}", book.title, book.author),
            NotificationKind::Borrow,
            created_at,
        )
    }

    /// Feed entry written alongside a return.
    pub fn return_notice(member_id: MemberId, created_at: EpochMs) -> Result<Self, ValidationError> {
        Self::new(
            member_id,
            "Book returned successfully",
            NotificationKind::Return,
            created_at,
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() || self.member_id.is_nil() {
            return Err(ValidationError::NilId);
        }
        require_text("message", &self.message)
    }
}
