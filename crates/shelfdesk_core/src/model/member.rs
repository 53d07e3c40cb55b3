//! Library member record.
//!
//! # Invariants
//! - `membership_date` is stamped once at creation and never rewritten.
//! - Only `MemberStatus::Active` is produced by core flows.

use super::{now_epoch_ms, require_text, EpochMs, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MemberId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    Inactive,
}

impl MemberStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub membership_date: EpochMs,
    pub status: MemberStatus,
}

/// Input for registering a member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewMember {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

impl Member {
    /// Registers a new active member as of now.
    pub fn register(input: NewMember) -> Result<Self, ValidationError> {
        let member = Self {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            email: input.email,
            phone: input.phone,
            address: input.address,
            city: input.city,
            state: input.state,
            zip_code: input.zip_code,
            membership_date: now_epoch_ms(),
            status: MemberStatus::Active,
        };
        member.validate()?;
        Ok(member)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::NilId);
        }
        require_text("name", &self.name)
    }
}
