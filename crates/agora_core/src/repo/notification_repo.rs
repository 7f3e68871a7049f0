//! Notification repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Listing and mutation are always scoped to one recipient.
//! - Unread notifications sort before read ones, newest first within each.

use super::{count_to_u64, ensure_tables, int_to_bool, RepoError, RepoResult};
use crate::model::notification::{NewNotification, Notification, NotificationId, TargetType};
use crate::model::user::{UserId, UserSummary};
use rusqlite::{params, Connection, Row};

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    n.id AS id,
    n.verb AS verb,
    n.target_type AS target_type,
    n.target_id AS target_id,
    n.is_read AS is_read,
    n.created_at AS created_at,
    r.id AS recipient_id,
    r.username AS recipient_username,
    a.id AS actor_id,
    a.username AS actor_username
FROM notifications n
INNER JOIN users r ON r.id = n.recipient_id
INNER JOIN users a ON a.id = n.actor_id";

/// Repository interface for notification reads and state changes.
pub trait NotificationRepository {
    fn create_notification(&self, notification: &NewNotification) -> RepoResult<NotificationId>;
    fn list_notifications(
        &self,
        recipient_id: UserId,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<Notification>>;
    fn count_notifications(&self, recipient_id: UserId, unread_only: bool) -> RepoResult<u64>;
    /// Returns `NotFound` when the id does not belong to `recipient_id`.
    fn mark_read(&self, recipient_id: UserId, id: NotificationId) -> RepoResult<()>;
    /// Returns the number of notifications that flipped to read.
    fn mark_all_read(&self, recipient_id: UserId) -> RepoResult<u64>;
}

/// SQLite-backed notification repository.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["notifications", "users"])?;
        Ok(Self { conn })
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn create_notification(&self, notification: &NewNotification) -> RepoResult<NotificationId> {
        insert_notification(self.conn, notification)
    }

    fn list_notifications(
        &self,
        recipient_id: UserId,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE n.recipient_id = ?1
               AND (?2 = 0 OR n.is_read = 0)
             ORDER BY n.is_read ASC, n.created_at DESC, n.id DESC
             LIMIT ?3 OFFSET ?4;"
        ))?;
        let mut rows = stmt.query(params![recipient_id, i64::from(unread_only), limit, offset])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_notification_row(row)?);
        }
        Ok(items)
    }

    fn count_notifications(&self, recipient_id: UserId, unread_only: bool) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM notifications
             WHERE recipient_id = ?1
               AND (?2 = 0 OR is_read = 0);",
            params![recipient_id, i64::from(unread_only)],
            |row| row.get(0),
        )?;
        Ok(count_to_u64(count))
    }

    fn mark_read(&self, recipient_id: UserId, id: NotificationId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notifications
             SET is_read = 1
             WHERE id = ?1 AND recipient_id = ?2;",
            params![id, recipient_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "notification",
                id,
            });
        }
        Ok(())
    }

    fn mark_all_read(&self, recipient_id: UserId) -> RepoResult<u64> {
        let changed = self.conn.execute(
            "UPDATE notifications
             SET is_read = 1
             WHERE recipient_id = ?1 AND is_read = 0;",
            [recipient_id],
        )?;
        Ok(changed as u64)
    }
}

/// Inserts one notification on any connection or open transaction.
pub(crate) fn insert_notification(
    conn: &Connection,
    notification: &NewNotification,
) -> RepoResult<NotificationId> {
    conn.execute(
        "INSERT INTO notifications (recipient_id, actor_id, verb, target_type, target_id)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            notification.recipient_id,
            notification.actor_id,
            notification.verb,
            notification.target.map(|target| target.kind.as_db()),
            notification.target.map(|target| target.id),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Whether an identical notification (recipient, actor, verb, target) was
/// already stored, read or not.
pub(crate) fn notification_exists(
    conn: &Connection,
    notification: &NewNotification,
) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM notifications
            WHERE recipient_id = ?1 AND actor_id = ?2 AND verb = ?3
              AND target_type IS ?4 AND target_id IS ?5
        );",
        params![
            notification.recipient_id,
            notification.actor_id,
            notification.verb,
            notification.target.map(|target| target.kind.as_db()),
            notification.target.map(|target| target.id),
        ],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let target_type = match row.get::<_, Option<String>>("target_type")? {
        Some(value) => Some(TargetType::from_db(&value).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid target type `{value}` in notifications.target_type"
            ))
        })?),
        None => None,
    };

    Ok(Notification {
        id: row.get("id")?,
        recipient: UserSummary {
            id: row.get("recipient_id")?,
            username: row.get("recipient_username")?,
        },
        actor: UserSummary {
            id: row.get("actor_id")?,
            username: row.get("actor_username")?,
        },
        verb: row.get("verb")?,
        target_type,
        target_id: row.get("target_id")?,
        timestamp: row.get("created_at")?,
        read: int_to_bool("notifications.is_read", row.get("is_read")?)?,
    })
}
