//! Blog model: long-form posts with slugs, excerpts, status and tags.
//!
//! # Invariants
//! - `(slug, published_on)` is unique; `published_on` is the UTC day of
//!   `published_at`.
//! - `view_count` never decreases and is never negative.
//! - Tags are lowercase, trimmed and unique per post.

use super::user::UserSummary;
use super::{require_text, ValidationError};
use serde::{Deserialize, Serialize};

pub type BlogPostId = i64;

pub const TITLE_MAX_CHARS: usize = 200;
pub const SLUG_MAX_CHARS: usize = 250;
pub const EXCERPT_MAX_CHARS: usize = 500;
pub const BLOG_PAGE_SIZE: u32 = 5;
/// Last millisecond of 9999-12-31 UTC; later instants have no calendar day.
pub const PUBLISHED_AT_MAX_MS: i64 = 253_402_300_799_999;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

impl PostStatus {
    pub(crate) fn as_db(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    pub(crate) fn from_db(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlogPost {
    pub id: BlogPostId,
    pub author: UserSummary,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub status: PostStatus,
    pub published_at: i64,
    pub allow_comments: bool,
    pub view_count: u64,
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BlogPost {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

/// Create payload. Optional fields are derived when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BlogPostDraft {
    pub title: String,
    pub content: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<PostStatus>,
    pub allow_comments: Option<bool>,
    /// Epoch milliseconds; defaults to now.
    pub published_at: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl BlogPostDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title, TITLE_MAX_CHARS)?;
        if self.content.trim().is_empty() {
            return Err(ValidationError::new("content", "this field may not be blank"));
        }
        if let Some(slug) = self.slug.as_deref() {
            validate_slug(slug)?;
        }
        if let Some(excerpt) = self.excerpt.as_deref() {
            validate_excerpt(excerpt)?;
        }
        if let Some(published_at) = self.published_at {
            if !(0..=PUBLISHED_AT_MAX_MS).contains(&published_at) {
                return Err(ValidationError::new(
                    "published_at",
                    "datetime is outside the supported range",
                ));
            }
        }
        Ok(())
    }
}

/// Insert model with every derived field resolved. `slug` is the base
/// slug; storage appends a numeric suffix on a same-day clash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlogPost {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub status: PostStatus,
    pub allow_comments: bool,
    pub published_at: i64,
    pub tags: Vec<String>,
}

/// Partial update payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BlogPostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<PostStatus>,
    pub allow_comments: Option<bool>,
}

impl BlogPostPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = self.title.as_deref() {
            require_text("title", title, TITLE_MAX_CHARS)?;
        }
        if let Some(content) = self.content.as_deref() {
            if content.trim().is_empty() {
                return Err(ValidationError::new("content", "this field may not be blank"));
            }
        }
        if let Some(excerpt) = self.excerpt.as_deref() {
            validate_excerpt(excerpt)?;
        }
        Ok(())
    }
}

/// List options for blog posts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlogListQuery {
    pub tag: Option<String>,
    pub author_id: Option<i64>,
}

/// Tag with the number of published posts carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name: String,
    pub posts: u64,
}

pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let valid = !slug.is_empty()
        && slug.chars().count() <= SLUG_MAX_CHARS
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new(
            "slug",
            "enter a valid slug of lowercase letters, numbers, underscores or hyphens",
        ))
    }
}

fn validate_excerpt(excerpt: &str) -> Result<(), ValidationError> {
    if excerpt.chars().count() > EXCERPT_MAX_CHARS {
        return Err(ValidationError::new(
            "excerpt",
            format!("ensure this field has no more than {EXCERPT_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}
