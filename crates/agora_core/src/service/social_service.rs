//! Social use-cases: posts, comments, likes and the feed.
//!
//! # Invariants
//! - Only the author may update or delete a post or comment.
//! - A like notifies the post author once, and never for self-likes.
//! - The feed never contains posts by authors the reader does not follow.

use super::notification_service::{notification_for, other_recipient};
use super::{ServiceError, ServiceResult};
use crate::model::notification::{NotificationTarget, VERB_LIKED};
use crate::model::page::{Page, PageRequest, DEFAULT_PAGE_SIZE};
use crate::model::social::{
    validate_comment_content, Comment, CommentId, CommentInput, LikeOutcome, Post, PostId,
    PostInput, PostPatch, UnlikeOutcome,
};
use crate::model::user::UserId;
use crate::repo::social_repo::SocialRepository;

pub struct SocialService<R: SocialRepository> {
    repo: R,
}

impl<R: SocialRepository> SocialService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_post(&self, author: UserId, input: PostInput) -> ServiceResult<Post> {
        let input = input.normalized()?;
        let post = self.repo.create_post(author, &input)?;
        log::info!(
            "event=post_create module=social status=ok post_id={} author={author}",
            post.id
        );
        Ok(post)
    }

    pub fn get_post(&self, id: PostId) -> ServiceResult<Post> {
        self.repo
            .get_post(id)?
            .ok_or(ServiceError::NotFound { entity: "post", id })
    }

    pub fn list_posts(&self, search: Option<&str>, page: &PageRequest) -> ServiceResult<Page<Post>> {
        let search = search.map(str::trim).filter(|term| !term.is_empty());
        let (limit, offset) = page.window(DEFAULT_PAGE_SIZE);
        let count = self.repo.count_posts(search)?;
        let results = self.repo.list_posts(search, limit, offset)?;
        Ok(Page::new(page, DEFAULT_PAGE_SIZE, count, results))
    }

    /// Applies a partial update. Full replacement is a patch with every
    /// field set.
    pub fn update_post(&self, actor: UserId, id: PostId, patch: PostPatch) -> ServiceResult<Post> {
        let current = self.get_post(id)?;
        ensure_author(actor, current.author.id, "only the author may edit this post")?;
        let input = patch.apply_to(&current).normalized()?;
        Ok(self.repo.update_post(id, &input)?)
    }

    pub fn delete_post(&self, actor: UserId, id: PostId) -> ServiceResult<()> {
        let current = self.get_post(id)?;
        ensure_author(actor, current.author.id, "only the author may delete this post")?;
        self.repo.delete_post(id)?;
        log::info!("event=post_delete module=social status=ok post_id={id}");
        Ok(())
    }

    pub fn feed(&self, reader: UserId, page: &PageRequest) -> ServiceResult<Page<Post>> {
        let (limit, offset) = page.window(DEFAULT_PAGE_SIZE);
        let count = self.repo.count_feed(reader)?;
        let results = self.repo.feed(reader, limit, offset)?;
        Ok(Page::new(page, DEFAULT_PAGE_SIZE, count, results))
    }

    pub fn create_comment(&mut self, author: UserId, input: CommentInput) -> ServiceResult<Comment> {
        validate_comment_content(&input.content)?;
        let post = self
            .repo
            .get_post(input.post)?
            .ok_or_else(|| ServiceError::validation("post", "invalid pk - object does not exist"))?;
        let notify = other_recipient(post.author.id, author);
        let comment = self
            .repo
            .create_comment(post.id, author, input.content.trim(), notify)?;
        log::info!(
            "event=comment_create module=social status=ok comment_id={} post_id={}",
            comment.id,
            post.id
        );
        Ok(comment)
    }

    pub fn get_comment(&self, id: CommentId) -> ServiceResult<Comment> {
        self.repo
            .get_comment(id)?
            .ok_or(ServiceError::NotFound { entity: "comment", id })
    }

    pub fn list_comments(
        &self,
        post: Option<PostId>,
        page: &PageRequest,
    ) -> ServiceResult<Page<Comment>> {
        let (limit, offset) = page.window(DEFAULT_PAGE_SIZE);
        let count = self.repo.count_comments(post)?;
        let results = self.repo.list_comments(post, limit, offset)?;
        Ok(Page::new(page, DEFAULT_PAGE_SIZE, count, results))
    }

    pub fn update_comment(
        &self,
        actor: UserId,
        id: CommentId,
        content: &str,
    ) -> ServiceResult<Comment> {
        let current = self.get_comment(id)?;
        ensure_author(actor, current.author.id, "only the author may edit this comment")?;
        validate_comment_content(content)?;
        Ok(self.repo.update_comment(id, content.trim())?)
    }

    pub fn delete_comment(&self, actor: UserId, id: CommentId) -> ServiceResult<()> {
        let current = self.get_comment(id)?;
        ensure_author(actor, current.author.id, "only the author may delete this comment")?;
        Ok(self.repo.delete_comment(id)?)
    }

    /// Get-or-create like.
    pub fn like_post(&mut self, user: UserId, post_id: PostId) -> ServiceResult<LikeOutcome> {
        let post = self.get_post(post_id)?;
        let notification = notification_for(
            post.author.id,
            user,
            VERB_LIKED,
            Some(NotificationTarget::post(post_id)),
        );
        let created = self
            .repo
            .like_post(post_id, user, notification.as_ref())?;
        let likes_count = self.repo.likes_count(post_id)?;
        log::debug!(
            "event=post_like module=social status=ok post_id={post_id} user={user} created={created}"
        );
        Ok(LikeOutcome {
            created,
            likes_count,
        })
    }

    pub fn unlike_post(&self, user: UserId, post_id: PostId) -> ServiceResult<UnlikeOutcome> {
        self.get_post(post_id)?;
        let removed = self.repo.unlike_post(post_id, user)?;
        let likes_count = self.repo.likes_count(post_id)?;
        Ok(UnlikeOutcome {
            removed,
            likes_count,
        })
    }
}

fn ensure_author(actor: UserId, author: UserId, reason: &'static str) -> ServiceResult<()> {
    if actor == author {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(reason))
    }
}
