//! Social model: short posts, comments and likes.
//!
//! # Invariants
//! - A user likes a given post at most once.
//! - Comments and likes disappear with their post.

use super::user::UserSummary;
use super::{require_text, ValidationError};
use serde::{Deserialize, Serialize};

pub type PostId = i64;
pub type CommentId = i64;

pub const TITLE_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: PostId,
    pub author: UserSummary,
    pub title: String,
    pub content: String,
    pub likes_count: u64,
    pub comments_count: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub content: String,
}

impl PostInput {
    pub fn normalized(self) -> Result<Self, ValidationError> {
        let title = self.title.trim().to_string();
        require_text("title", &title, TITLE_MAX_CHARS)?;
        if self.content.trim().is_empty() {
            return Err(ValidationError::new("content", "this field may not be blank"));
        }
        Ok(Self {
            title,
            content: self.content,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl PostPatch {
    pub fn apply_to(self, post: &Post) -> PostInput {
        PostInput {
            title: self.title.unwrap_or_else(|| post.title.clone()),
            content: self.content.unwrap_or_else(|| post.content.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post: PostId,
    pub author: UserSummary,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommentInput {
    pub post: PostId,
    pub content: String,
}

pub fn validate_comment_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::new("content", "this field may not be blank"));
    }
    Ok(())
}

/// Result of a like request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeOutcome {
    /// `false` when the like already existed.
    pub created: bool,
    pub likes_count: u64,
}

/// Result of an unlike request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnlikeOutcome {
    /// `false` when there was nothing to remove.
    pub removed: bool,
    pub likes_count: u64,
}
