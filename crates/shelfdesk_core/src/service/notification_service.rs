//! Notification log service.
//!
//! Circulation writes its own notices inside the loan transaction; this
//! service covers direct appends (e.g. `info` messages) and feed reads.

use crate::model::member::MemberId;
use crate::model::notification::{Notification, NotificationKind};
use crate::model::now_epoch_ms;
use crate::repo::notification_repo::NotificationRepository;
use crate::repo::RepoResult;

pub struct NotificationService<R: NotificationRepository> {
    repo: R,
}

impl<R: NotificationRepository> NotificationService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Appends one unread entry to the member's feed.
    pub fn append(
        &self,
        member_id: MemberId,
        message: impl Into<String>,
        kind: NotificationKind,
    ) -> RepoResult<Notification> {
        let notification = Notification::new(member_id, message, kind, now_epoch_ms())?;
        self.repo.append_notification(&notification)?;
        Ok(notification)
    }

    /// Member feed, newest first.
    pub fn list(&self, member_id: MemberId) -> RepoResult<Vec<Notification>> {
        self.repo.list_notifications(member_id)
    }
}
