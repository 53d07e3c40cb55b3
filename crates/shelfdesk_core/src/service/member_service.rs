//! Membership use-case service.

use crate::events::{EventPublisher, LibraryEvent};
use crate::model::member::{Member, MemberId, NewMember};
use crate::model::ValidationError;
use crate::repo::member_repo::MemberRepository;
use crate::repo::RepoError;
use crate::service::ErrorKind;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Service error for membership use-cases.
#[derive(Debug)]
pub enum MemberError {
    Validation(ValidationError),
    Repo(RepoError),
}

impl MemberError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Repo(_) => ErrorKind::StorageError,
        }
    }
}

impl Display for MemberError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MemberError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ValidationError> for MemberError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for MemberError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Membership facade over a member repository.
pub struct MemberService<R: MemberRepository> {
    repo: R,
    events: Arc<dyn EventPublisher>,
}

impl<R: MemberRepository> MemberService<R> {
    pub fn new(repo: R, events: Arc<dyn EventPublisher>) -> Self {
        Self { repo, events }
    }

    /// Registers an active member stamped with the current date.
    pub fn create_member(&self, input: NewMember) -> Result<Member, MemberError> {
        let member = Member::register(input)?;
        self.repo.create_member(&member)?;
        info!(
            "event=member_create module=membership status=ok member_id={}",
            member.id
        );
        self.events.publish(&LibraryEvent::MemberAdded {
            member: member.clone(),
        });
        Ok(member)
    }

    pub fn get_member(&self, id: MemberId) -> Result<Option<Member>, MemberError> {
        Ok(self.repo.get_member(id)?)
    }

    pub fn list_members(&self) -> Result<Vec<Member>, MemberError> {
        Ok(self.repo.list_members()?)
    }
}
