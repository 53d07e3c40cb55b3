//! Notification feed repository.
//!
//! # Invariants
//! - The feed is append-only; there is no update or delete path.
//! - Per-member listing is newest first, ties broken by reverse insertion.

use crate::model::member::MemberId;
use crate::model::notification::{Notification, NotificationKind};
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

/// Repository interface for the notification log.
pub trait NotificationRepository {
    fn append_notification(&self, notification: &Notification) -> RepoResult<()>;
    fn list_notifications(&self, member_id: MemberId) -> RepoResult<Vec<Notification>>;
}

/// SQLite-backed notification repository.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn append_notification(&self, notification: &Notification) -> RepoResult<()> {
        insert_notification(self.conn, notification)
    }

    fn list_notifications(&self, member_id: MemberId) -> RepoResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, member_id, message, kind, is_read, created_at
             FROM notifications
             WHERE member_id = ?1
             ORDER BY created_at DESC, seq DESC;",
        )?;
        let mut rows = stmt.query([member_id.to_string()])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }
}

/// Inserts one feed entry; callers inside a transaction pass the transaction.
pub(crate) fn insert_notification(
    conn: &Connection,
    notification: &Notification,
) -> RepoResult<()> {
    notification.validate()?;
    conn.execute(
        "INSERT INTO notifications (id, member_id, message, kind, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            notification.id.to_string(),
            notification.member_id.to_string(),
            notification.message.as_str(),
            notification.kind.as_str(),
            i64::from(notification.is_read),
            notification.created_at,
        ],
    )?;
    Ok(())
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let kind_text: String = row.get("kind")?;
    let kind = NotificationKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid notification kind `{kind_text}` in notifications.kind"
        ))
    })?;
    let is_read = match row.get::<_, i64>("is_read")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_read value `{other}` in notifications.is_read"
            )));
        }
    };

    Ok(Notification {
        id: parse_uuid(&row.get::<_, String>("id")?, "notifications.id")?,
        member_id: parse_uuid(&row.get::<_, String>("member_id")?, "notifications.member_id")?,
        message: row.get("message")?,
        kind,
        is_read,
        created_at: row.get("created_at")?,
    })
}
