//! Blog use-cases: authoring, visibility, view counting, tags and search.
//!
//! # Invariants
//! - Drafts are visible only to their author and to staff.
//! - Every successful read of a published post adds one view.
//! - Stored tags are trimmed, lowercase and unique per post.

use super::{ServiceError, ServiceResult};
use crate::model::blog::{
    BlogListQuery, BlogPost, BlogPostDraft, BlogPostId, BlogPostPatch, NewBlogPost, PostStatus,
    TagCount, BLOG_PAGE_SIZE, EXCERPT_MAX_CHARS, SLUG_MAX_CHARS,
};
use crate::model::page::{Page, PageRequest};
use crate::model::user::User;
use crate::repo::blog_repo::BlogRepository;
use crate::search::fts::{search_posts, SearchHit, SearchQuery};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use std::time::{SystemTime, UNIX_EPOCH};

pub const TAG_MAX_CHARS: usize = 50;
const FALLBACK_SLUG: &str = "post";

static MARKUP_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

pub struct BlogService<R: BlogRepository> {
    repo: R,
}

impl<R: BlogRepository> BlogService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a post, deriving slug, excerpt, status and publish time
    /// when the draft leaves them out.
    pub fn create_post(&mut self, author: &User, draft: BlogPostDraft) -> ServiceResult<BlogPost> {
        draft.validate()?;
        let title = draft.title.trim().to_string();
        let slug = match draft.slug {
            Some(slug) => slug,
            None => slugify(&title),
        };
        let excerpt = match draft.excerpt.as_deref().map(str::trim) {
            Some(excerpt) if !excerpt.is_empty() => excerpt.to_string(),
            _ => derive_excerpt(&draft.content),
        };
        let new_post = NewBlogPost {
            title,
            slug,
            content: draft.content,
            excerpt,
            status: draft.status.unwrap_or_default(),
            allow_comments: draft.allow_comments.unwrap_or(true),
            published_at: draft.published_at.unwrap_or_else(now_ms),
            tags: normalize_tags(&draft.tags)?,
        };

        let post = self.repo.create_post(author.id, &new_post)?;
        log::info!(
            "event=blog_post_create module=blog status=ok post_id={} slug={} published={}",
            post.id,
            post.slug,
            post.is_published()
        );
        Ok(post)
    }

    /// Reads one post. Hidden drafts read as not found; published posts
    /// get their view counter bumped.
    pub fn get_post(&self, viewer: Option<&User>, id: BlogPostId) -> ServiceResult<BlogPost> {
        let mut post = self.visible_post(viewer, id)?;
        if post.is_published() {
            post.view_count = self.repo.increment_view_count(id)?;
        }
        Ok(post)
    }

    pub fn list_posts(
        &self,
        viewer: Option<&User>,
        query: &BlogListQuery,
        page: &PageRequest,
    ) -> ServiceResult<Page<BlogPost>> {
        let viewer_id = viewer.map(|user| user.id);
        let (limit, offset) = page.window(BLOG_PAGE_SIZE);
        let count = self.repo.count_posts(viewer_id, query)?;
        let results = self.repo.list_posts(viewer_id, query, limit, offset)?;
        Ok(Page::new(page, BLOG_PAGE_SIZE, count, results))
    }

    pub fn update_post(
        &self,
        actor: &User,
        id: BlogPostId,
        patch: BlogPostPatch,
    ) -> ServiceResult<BlogPost> {
        self.editable_post(actor, id)?;
        patch.validate()?;
        let patch = BlogPostPatch {
            title: patch.title.map(|title| title.trim().to_string()),
            excerpt: patch.excerpt.map(|excerpt| excerpt.trim().to_string()),
            ..patch
        };
        Ok(self.repo.update_post(id, &patch)?)
    }

    pub fn delete_post(&self, actor: &User, id: BlogPostId) -> ServiceResult<()> {
        self.editable_post(actor, id)?;
        self.repo.delete_post(id)?;
        log::info!("event=blog_post_delete module=blog status=ok post_id={id}");
        Ok(())
    }

    /// Atomically replaces the tag set of a post.
    pub fn set_tags(
        &mut self,
        actor: &User,
        id: BlogPostId,
        tags: &[String],
    ) -> ServiceResult<BlogPost> {
        self.editable_post(actor, id)?;
        let normalized = normalize_tags(tags)?;
        self.repo.set_tags(id, &normalized)?;
        self.repo
            .get_post(id)?
            .ok_or(ServiceError::InconsistentState(
                "blog post missing after tag replacement",
            ))
    }

    pub fn popular_tags(&self, limit: u32) -> ServiceResult<Vec<TagCount>> {
        Ok(self.repo.popular_tags(i64::from(limit))?)
    }

    pub fn total_published(&self) -> ServiceResult<u64> {
        Ok(self.repo.total_published()?)
    }

    fn visible_post(&self, viewer: Option<&User>, id: BlogPostId) -> ServiceResult<BlogPost> {
        let post = self
            .repo
            .get_post(id)?
            .ok_or(ServiceError::NotFound { entity: "blog post", id })?;
        let can_see_draft =
            viewer.is_some_and(|user| user.is_staff || user.id == post.author.id);
        if post.status == PostStatus::Draft && !can_see_draft {
            return Err(ServiceError::NotFound { entity: "blog post", id });
        }
        Ok(post)
    }

    fn editable_post(&self, actor: &User, id: BlogPostId) -> ServiceResult<BlogPost> {
        let post = self.visible_post(Some(actor), id)?;
        if !actor.is_staff && actor.id != post.author.id {
            return Err(ServiceError::PermissionDenied(
                "only the author or staff may modify this post",
            ));
        }
        Ok(post)
    }
}

/// Full-text search over published posts.
pub fn search_published(conn: &Connection, text: &str, limit: u32) -> ServiceResult<Vec<SearchHit>> {
    let query = SearchQuery {
        text: text.to_string(),
        limit,
    };
    Ok(search_posts(conn, &query)?)
}

/// Lowercase ASCII slug; runs of other characters collapse into one `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(SLUG_MAX_CHARS);
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// First characters of the content with markup tags removed.
pub fn derive_excerpt(content: &str) -> String {
    let stripped = MARKUP_TAG_RE.replace_all(content, "");
    let collapsed = WHITESPACE_RE.replace_all(stripped.trim(), " ");
    collapsed.chars().take(EXCERPT_MAX_CHARS).collect()
}

/// Trims, lowercases and deduplicates tags, keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> ServiceResult<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for raw in tags {
        let tag = raw.trim().to_lowercase();
        if tag.is_empty() {
            return Err(ServiceError::validation("tags", "tags may not be blank"));
        }
        if tag.chars().count() > TAG_MAX_CHARS {
            return Err(ServiceError::validation(
                "tags",
                format!("ensure each tag has no more than {TAG_MAX_CHARS} characters"),
            ));
        }
        if !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    Ok(normalized)
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| i64::try_from(elapsed.as_millis()).ok())
        .unwrap_or_default()
}
