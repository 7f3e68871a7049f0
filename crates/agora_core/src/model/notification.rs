//! Notification model with a polymorphic target reference.
//!
//! The target is stored as `(target_type, target_id)` without a foreign key;
//! a notification outlives the post or comment it points at.

use super::user::{UserId, UserSummary};
use serde::{Deserialize, Serialize};

pub type NotificationId = i64;

pub const VERB_LIKED: &str = "liked your post";
pub const VERB_COMMENTED: &str = "commented on your post";
pub const VERB_FOLLOWED: &str = "started following you";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Post,
    Comment,
    User,
}

impl TargetType {
    pub(crate) fn as_db(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
            Self::User => "user",
        }
    }

    pub(crate) fn from_db(value: &str) -> Option<Self> {
        match value {
            "post" => Some(Self::Post),
            "comment" => Some(Self::Comment),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationTarget {
    pub kind: TargetType,
    pub id: i64,
}

impl NotificationTarget {
    pub fn post(id: i64) -> Self {
        Self {
            kind: TargetType::Post,
            id,
        }
    }

    pub fn comment(id: i64) -> Self {
        Self {
            kind: TargetType::Comment,
            id,
        }
    }

    pub fn user(id: UserId) -> Self {
        Self {
            kind: TargetType::User,
            id,
        }
    }
}

/// Insert model for a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient_id: UserId,
    pub actor_id: UserId,
    pub verb: &'static str,
    pub target: Option<NotificationTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserSummary,
    pub actor: UserSummary,
    pub verb: String,
    pub target_type: Option<TargetType>,
    pub target_id: Option<i64>,
    pub timestamp: i64,
    pub read: bool,
}
