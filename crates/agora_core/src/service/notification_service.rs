//! Notification use-cases for the recipient's inbox.

use super::ServiceResult;
use crate::model::notification::{
    NewNotification, Notification, NotificationId, NotificationTarget,
};
use crate::model::page::{Page, PageRequest, DEFAULT_PAGE_SIZE};
use crate::model::user::UserId;
use crate::repo::notification_repo::NotificationRepository;

/// Returns `recipient` unless it is the actor; nobody is notified of their
/// own activity.
pub(crate) fn other_recipient(recipient: UserId, actor: UserId) -> Option<UserId> {
    (recipient != actor).then_some(recipient)
}

/// Builds the notification `actor` owes `recipient`, or `None` for self-activity.
pub(crate) fn notification_for(
    recipient: UserId,
    actor: UserId,
    verb: &'static str,
    target: Option<NotificationTarget>,
) -> Option<NewNotification> {
    other_recipient(recipient, actor).map(|recipient_id| NewNotification {
        recipient_id,
        actor_id: actor,
        verb,
        target,
    })
}

pub struct NotificationService<R: NotificationRepository> {
    repo: R,
}

impl<R: NotificationRepository> NotificationService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Stores a notification unless the actor is also the recipient.
    /// Returns the new id, or `None` when skipped.
    pub fn notify(&self, notification: &NewNotification) -> ServiceResult<Option<NotificationId>> {
        if other_recipient(notification.recipient_id, notification.actor_id).is_none() {
            return Ok(None);
        }
        Ok(Some(self.repo.create_notification(notification)?))
    }

    /// Lists the inbox with unread entries first, then newest first.
    pub fn list(
        &self,
        recipient: UserId,
        unread_only: bool,
        page: &PageRequest,
    ) -> ServiceResult<Page<Notification>> {
        let (limit, offset) = page.window(DEFAULT_PAGE_SIZE);
        let count = self.repo.count_notifications(recipient, unread_only)?;
        let results = self
            .repo
            .list_notifications(recipient, unread_only, limit, offset)?;
        Ok(Page::new(page, DEFAULT_PAGE_SIZE, count, results))
    }

    pub fn unread_count(&self, recipient: UserId) -> ServiceResult<u64> {
        Ok(self.repo.count_notifications(recipient, true)?)
    }

    pub fn mark_read(&self, recipient: UserId, id: NotificationId) -> ServiceResult<()> {
        Ok(self.repo.mark_read(recipient, id)?)
    }

    pub fn mark_all_read(&self, recipient: UserId) -> ServiceResult<u64> {
        Ok(self.repo.mark_all_read(recipient)?)
    }
}
