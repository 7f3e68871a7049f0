//! Blog repository: posts, tag links and view counters.
//!
//! # Invariants
//! - `published_on` is always derived in SQL from `published_at`.
//! - A post and its tag links are written in one transaction.
//! - `view_count` only moves through `increment_view_count`.

use super::{
    bool_to_int, count_to_u64, ensure_tables, int_to_bool, map_unique_violation, RepoError,
    RepoResult, NOW_MS_SQL,
};
use crate::model::blog::{
    BlogListQuery, BlogPost, BlogPostId, BlogPostPatch, NewBlogPost, PostStatus, TagCount,
    SLUG_MAX_CHARS,
};
use crate::model::user::{UserId, UserSummary};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, TransactionBehavior};

const BLOG_POST_SELECT_SQL: &str = "SELECT
    bp.id AS id,
    bp.title AS title,
    bp.slug AS slug,
    bp.content AS content,
    bp.excerpt AS excerpt,
    bp.status AS status,
    bp.published_at AS published_at,
    bp.allow_comments AS allow_comments,
    bp.view_count AS view_count,
    bp.created_at AS created_at,
    bp.updated_at AS updated_at,
    u.id AS author_id,
    u.username AS author_username
FROM blog_posts bp
INNER JOIN users u ON u.id = bp.author_id";

/// Published posts plus the viewer's own drafts. Binds the viewer id.
const VISIBLE_CLAUSE_SQL: &str = "(bp.status = 'published' OR bp.author_id = ?)";

const TAG_FILTER_SQL: &str = "EXISTS (
    SELECT 1
    FROM blog_post_tags bpt
    INNER JOIN tags t ON t.id = bpt.tag_id
    WHERE bpt.post_id = bp.id AND t.name = ?
)";

/// Repository interface for blog posts and tags.
pub trait BlogRepository {
    /// Inserts a post with its tags. A slug already used on the same
    /// publish day is suffixed with `-2`, `-3`, ...
    fn create_post(&mut self, author_id: UserId, post: &NewBlogPost) -> RepoResult<BlogPost>;
    fn get_post(&self, id: BlogPostId) -> RepoResult<Option<BlogPost>>;
    /// Lists posts visible to `viewer`, newest `published_at` first.
    fn list_posts(
        &self,
        viewer: Option<UserId>,
        query: &BlogListQuery,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<BlogPost>>;
    fn count_posts(&self, viewer: Option<UserId>, query: &BlogListQuery) -> RepoResult<u64>;
    /// Applies the set fields of `patch`; unset fields are kept.
    fn update_post(&self, id: BlogPostId, patch: &BlogPostPatch) -> RepoResult<BlogPost>;
    fn delete_post(&self, id: BlogPostId) -> RepoResult<()>;
    /// Adds one view and returns the new count.
    fn increment_view_count(&self, id: BlogPostId) -> RepoResult<u64>;
    /// Replaces the tag set of a post. `tags` must already be normalized.
    fn set_tags(&mut self, id: BlogPostId, tags: &[String]) -> RepoResult<Vec<String>>;
    fn popular_tags(&self, limit: i64) -> RepoResult<Vec<TagCount>>;
    fn total_published(&self) -> RepoResult<u64>;
}

/// SQLite-backed blog repository.
pub struct SqliteBlogRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteBlogRepository<'conn> {
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_tables(
            conn,
            &["blog_posts", "tags", "blog_post_tags", "blog_posts_fts"],
        )?;
        Ok(Self { conn })
    }
}

impl BlogRepository for SqliteBlogRepository<'_> {
    fn create_post(&mut self, author_id: UserId, post: &NewBlogPost) -> RepoResult<BlogPost> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let slug = free_slug(&tx, &post.slug, post.published_at)?;
        tx.execute(
            "INSERT INTO blog_posts (
                author_id, title, slug, content, excerpt, status,
                published_at, published_on, allow_comments
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, date(?7 / 1000, 'unixepoch'), ?8);",
            params![
                author_id,
                post.title,
                slug,
                post.content,
                post.excerpt,
                post.status.as_db(),
                post.published_at,
                bool_to_int(post.allow_comments)
            ],
        )
        .map_err(|err| map_unique_violation(err, "slug already used on this publish date"))?;
        let id = tx.last_insert_rowid();
        link_tags(&tx, id, &post.tags)?;
        tx.commit()?;

        self.get_post(id)?
            .ok_or(RepoError::NotFound { entity: "blog post", id })
    }

    fn get_post(&self, id: BlogPostId) -> RepoResult<Option<BlogPost>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BLOG_POST_SELECT_SQL} WHERE bp.id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => {
                let mut post = parse_blog_post_row(row)?;
                post.tags = tags_for(self.conn, post.id)?;
                Ok(Some(post))
            }
            None => Ok(None),
        }
    }

    fn list_posts(
        &self,
        viewer: Option<UserId>,
        query: &BlogListQuery,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<BlogPost>> {
        let mut sql = format!("{BLOG_POST_SELECT_SQL} WHERE {VISIBLE_CLAUSE_SQL}");
        let mut bind_values = list_bindings(&mut sql, viewer, query);
        sql.push_str(" ORDER BY bp.published_at DESC, bp.id DESC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(limit));
        bind_values.push(Value::Integer(offset));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut posts = Vec::new();
        while let Some(row) = rows.next()? {
            posts.push(parse_blog_post_row(row)?);
        }
        for post in &mut posts {
            post.tags = tags_for(self.conn, post.id)?;
        }
        Ok(posts)
    }

    fn count_posts(&self, viewer: Option<UserId>, query: &BlogListQuery) -> RepoResult<u64> {
        let mut sql = format!("SELECT COUNT(*) FROM blog_posts bp WHERE {VISIBLE_CLAUSE_SQL}");
        let bind_values = list_bindings(&mut sql, viewer, query);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(count_to_u64(count))
    }

    fn update_post(&self, id: BlogPostId, patch: &BlogPostPatch) -> RepoResult<BlogPost> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE blog_posts
                 SET title = COALESCE(?2, title),
                     content = COALESCE(?3, content),
                     excerpt = COALESCE(?4, excerpt),
                     status = COALESCE(?5, status),
                     allow_comments = COALESCE(?6, allow_comments),
                     updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                id,
                patch.title,
                patch.content,
                patch.excerpt,
                patch.status.map(PostStatus::as_db),
                patch.allow_comments.map(bool_to_int)
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "blog post", id });
        }
        self.get_post(id)?
            .ok_or(RepoError::NotFound { entity: "blog post", id })
    }

    fn delete_post(&self, id: BlogPostId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM blog_posts WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "blog post", id });
        }
        Ok(())
    }

    fn increment_view_count(&self, id: BlogPostId) -> RepoResult<u64> {
        let changed = self.conn.execute(
            "UPDATE blog_posts SET view_count = view_count + 1 WHERE id = ?1;",
            [id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "blog post", id });
        }
        let count: i64 = self.conn.query_row(
            "SELECT view_count FROM blog_posts WHERE id = ?1;",
            [id],
            |row| row.get(0),
        )?;
        Ok(count_to_u64(count))
    }

    fn set_tags(&mut self, id: BlogPostId, tags: &[String]) -> RepoResult<Vec<String>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM blog_posts WHERE id = ?1);",
            [id],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::NotFound { entity: "blog post", id });
        }
        tx.execute("DELETE FROM blog_post_tags WHERE post_id = ?1;", [id])?;
        link_tags(&tx, id, tags)?;
        tx.execute(
            &format!("UPDATE blog_posts SET updated_at = {NOW_MS_SQL} WHERE id = ?1;"),
            [id],
        )?;
        tx.commit()?;
        tags_for(self.conn, id)
    }

    fn popular_tags(&self, limit: i64) -> RepoResult<Vec<TagCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name AS name, COUNT(bp.id) AS posts
             FROM tags t
             INNER JOIN blog_post_tags bpt ON bpt.tag_id = t.id
             INNER JOIN blog_posts bp ON bp.id = bpt.post_id AND bp.status = 'published'
             GROUP BY t.id
             ORDER BY posts DESC, t.name ASC
             LIMIT ?1;",
        )?;
        let tags = stmt
            .query_map([limit], |row| {
                Ok(TagCount {
                    name: row.get("name")?,
                    posts: count_to_u64(row.get("posts")?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn total_published(&self) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM blog_posts WHERE status = 'published';",
            [],
            |row| row.get(0),
        )?;
        Ok(count_to_u64(count))
    }
}

/// First slug in `base`, `base-2`, `base-3`, ... unused on the publish day.
fn free_slug(conn: &Connection, base: &str, published_at: i64) -> RepoResult<String> {
    let mut candidate = base.to_string();
    let mut suffix = 1_u32;
    loop {
        let taken: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM blog_posts
                WHERE slug = ?1 AND published_on = date(?2 / 1000, 'unixepoch')
            );",
            params![candidate, published_at],
            |row| row.get(0),
        )?;
        if taken == 0 {
            return Ok(candidate);
        }
        suffix += 1;
        let tail = format!("-{suffix}");
        // Slugs are ASCII, so byte truncation stays on a char boundary.
        let keep = base.len().min(SLUG_MAX_CHARS.saturating_sub(tail.len()));
        candidate = format!("{}{tail}", &base[..keep]);
    }
}

fn link_tags(conn: &Connection, post_id: BlogPostId, tags: &[String]) -> RepoResult<()> {
    for tag in tags {
        conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1);", [tag])?;
        conn.execute(
            "INSERT OR IGNORE INTO blog_post_tags (post_id, tag_id)
             SELECT ?1, id FROM tags WHERE name = ?2;",
            params![post_id, tag],
        )?;
    }
    Ok(())
}

fn tags_for(conn: &Connection, post_id: BlogPostId) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name
         FROM tags t
         INNER JOIN blog_post_tags bpt ON bpt.tag_id = t.id
         WHERE bpt.post_id = ?1
         ORDER BY t.name ASC;",
    )?;
    let tags = stmt
        .query_map([post_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

fn list_bindings(sql: &mut String, viewer: Option<UserId>, query: &BlogListQuery) -> Vec<Value> {
    let mut bind_values = vec![viewer.map_or(Value::Null, Value::Integer)];
    if let Some(tag) = query.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        sql.push_str(" AND ");
        sql.push_str(TAG_FILTER_SQL);
        bind_values.push(Value::Text(tag.to_lowercase()));
    }
    if let Some(author_id) = query.author_id {
        sql.push_str(" AND bp.author_id = ?");
        bind_values.push(Value::Integer(author_id));
    }
    bind_values
}

fn parse_blog_post_row(row: &Row<'_>) -> RepoResult<BlogPost> {
    let status_text: String = row.get("status")?;
    let status = PostStatus::from_db(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid blog post status `{status_text}`"))
    })?;
    let allow_comments = int_to_bool("blog_posts.allow_comments", row.get("allow_comments")?)?;

    Ok(BlogPost {
        id: row.get("id")?,
        author: UserSummary {
            id: row.get("author_id")?,
            username: row.get("author_username")?,
        },
        title: row.get("title")?,
        slug: row.get("slug")?,
        content: row.get("content")?,
        excerpt: row.get("excerpt")?,
        status,
        published_at: row.get("published_at")?,
        allow_comments,
        view_count: count_to_u64(row.get("view_count")?),
        tags: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
