//! Social repository: posts, comments, likes and the follow-scoped feed.
//!
//! # Invariants
//! - Post lists are ordered `created_at DESC, id DESC`.
//! - The feed only contains posts whose author is followed by the reader.
//! - `(post_id, user_id)` is unique in `likes`; a like and its notification
//!   are committed together.

use super::notification_repo::insert_notification;
use super::{count_to_u64, ensure_tables, like_pattern, RepoError, RepoResult, NOW_MS_SQL};
use crate::model::notification::{NewNotification, NotificationTarget, VERB_COMMENTED};
use crate::model::social::{Comment, CommentId, Post, PostId, PostInput};
use crate::model::user::{UserId, UserSummary};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, TransactionBehavior};

const POST_SELECT_SQL: &str = "SELECT
    p.id AS id,
    p.title AS title,
    p.content AS content,
    p.created_at AS created_at,
    p.updated_at AS updated_at,
    u.id AS author_id,
    u.username AS author_username,
    (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count,
    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count
FROM posts p
INNER JOIN users u ON u.id = p.author_id";

const COMMENT_SELECT_SQL: &str = "SELECT
    c.id AS id,
    c.post_id AS post_id,
    c.content AS content,
    c.created_at AS created_at,
    c.updated_at AS updated_at,
    u.id AS author_id,
    u.username AS author_username
FROM comments c
INNER JOIN users u ON u.id = c.author_id";

const SEARCH_CLAUSE_SQL: &str = "(p.title LIKE ? ESCAPE '\\'
    OR p.content LIKE ? ESCAPE '\\'
    OR u.username LIKE ? ESCAPE '\\')";

/// Repository interface for social posts, comments and likes.
pub trait SocialRepository {
    fn create_post(&self, author_id: UserId, input: &PostInput) -> RepoResult<Post>;
    fn get_post(&self, id: PostId) -> RepoResult<Option<Post>>;
    /// Lists posts, optionally filtered by a case-insensitive search term
    /// matched against title, content and author username.
    fn list_posts(&self, search: Option<&str>, limit: i64, offset: i64) -> RepoResult<Vec<Post>>;
    fn count_posts(&self, search: Option<&str>) -> RepoResult<u64>;
    fn update_post(&self, id: PostId, input: &PostInput) -> RepoResult<Post>;
    fn delete_post(&self, id: PostId) -> RepoResult<()>;
    fn feed(&self, reader: UserId, limit: i64, offset: i64) -> RepoResult<Vec<Post>>;
    fn count_feed(&self, reader: UserId) -> RepoResult<u64>;

    /// Inserts a comment; when `notify` is set, the recipient gets a
    /// notification pointing at the new comment in the same transaction.
    fn create_comment(
        &mut self,
        post_id: PostId,
        author_id: UserId,
        content: &str,
        notify: Option<UserId>,
    ) -> RepoResult<Comment>;
    fn get_comment(&self, id: CommentId) -> RepoResult<Option<Comment>>;
    fn list_comments(
        &self,
        post_id: Option<PostId>,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<Comment>>;
    fn count_comments(&self, post_id: Option<PostId>) -> RepoResult<u64>;
    fn update_comment(&self, id: CommentId, content: &str) -> RepoResult<Comment>;
    fn delete_comment(&self, id: CommentId) -> RepoResult<()>;

    /// Get-or-create a like. Returns `true` when a new row was inserted;
    /// `notification` is stored only in that case.
    fn like_post(
        &mut self,
        post_id: PostId,
        user_id: UserId,
        notification: Option<&NewNotification>,
    ) -> RepoResult<bool>;
    fn unlike_post(&self, post_id: PostId, user_id: UserId) -> RepoResult<bool>;
    fn likes_count(&self, post_id: PostId) -> RepoResult<u64>;
}

/// SQLite-backed social repository.
pub struct SqliteSocialRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteSocialRepository<'conn> {
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["posts", "comments", "likes", "follows", "notifications"])?;
        Ok(Self { conn })
    }
}

impl SocialRepository for SqliteSocialRepository<'_> {
    fn create_post(&self, author_id: UserId, input: &PostInput) -> RepoResult<Post> {
        self.conn.execute(
            "INSERT INTO posts (author_id, title, content) VALUES (?1, ?2, ?3);",
            params![author_id, input.title, input.content],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_post(id)?
            .ok_or(RepoError::NotFound { entity: "post", id })
    }

    fn get_post(&self, id: PostId) -> RepoResult<Option<Post>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{POST_SELECT_SQL} WHERE p.id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_post_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_posts(&self, search: Option<&str>, limit: i64, offset: i64) -> RepoResult<Vec<Post>> {
        let mut sql = format!("{POST_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values = search_bindings(&mut sql, search);
        sql.push_str(" ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(limit));
        bind_values.push(Value::Integer(offset));
        query_posts(self.conn, &sql, bind_values)
    }

    fn count_posts(&self, search: Option<&str>) -> RepoResult<u64> {
        let mut sql = String::from(
            "SELECT COUNT(*)
             FROM posts p
             INNER JOIN users u ON u.id = p.author_id
             WHERE 1 = 1",
        );
        let bind_values = search_bindings(&mut sql, search);
        let count: i64 =
            self.conn
                .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(count_to_u64(count))
    }

    fn update_post(&self, id: PostId, input: &PostInput) -> RepoResult<Post> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE posts
                 SET title = ?2, content = ?3, updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![id, input.title, input.content],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "post", id });
        }
        self.get_post(id)?
            .ok_or(RepoError::NotFound { entity: "post", id })
    }

    fn delete_post(&self, id: PostId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM posts WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "post", id });
        }
        Ok(())
    }

    fn feed(&self, reader: UserId, limit: i64, offset: i64) -> RepoResult<Vec<Post>> {
        let sql = format!(
            "{POST_SELECT_SQL}
             WHERE p.author_id IN (
                SELECT followee_id FROM follows WHERE follower_id = ?
             )
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ? OFFSET ?"
        );
        query_posts(
            self.conn,
            &sql,
            vec![
                Value::Integer(reader),
                Value::Integer(limit),
                Value::Integer(offset),
            ],
        )
    }

    fn count_feed(&self, reader: UserId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM posts
             WHERE author_id IN (
                SELECT followee_id FROM follows WHERE follower_id = ?1
             );",
            [reader],
            |row| row.get(0),
        )?;
        Ok(count_to_u64(count))
    }

    fn create_comment(
        &mut self,
        post_id: PostId,
        author_id: UserId,
        content: &str,
        notify: Option<UserId>,
    ) -> RepoResult<Comment> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO comments (post_id, author_id, content) VALUES (?1, ?2, ?3);",
            params![post_id, author_id, content],
        )?;
        let id = tx.last_insert_rowid();
        if let Some(recipient_id) = notify {
            insert_notification(
                &tx,
                &NewNotification {
                    recipient_id,
                    actor_id: author_id,
                    verb: VERB_COMMENTED,
                    target: Some(NotificationTarget::comment(id)),
                },
            )?;
        }
        tx.commit()?;
        self.get_comment(id)?
            .ok_or(RepoError::NotFound { entity: "comment", id })
    }

    fn get_comment(&self, id: CommentId) -> RepoResult<Option<Comment>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COMMENT_SELECT_SQL} WHERE c.id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_comment_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_comments(
        &self,
        post_id: Option<PostId>,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<Comment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COMMENT_SELECT_SQL}
             WHERE (?1 IS NULL OR c.post_id = ?1)
             ORDER BY c.created_at ASC, c.id ASC
             LIMIT ?2 OFFSET ?3;"
        ))?;
        let mut rows = stmt.query(params![post_id, limit, offset])?;
        let mut comments = Vec::new();
        while let Some(row) = rows.next()? {
            comments.push(parse_comment_row(row)?);
        }
        Ok(comments)
    }

    fn count_comments(&self, post_id: Option<PostId>) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE (?1 IS NULL OR post_id = ?1);",
            [post_id],
            |row| row.get(0),
        )?;
        Ok(count_to_u64(count))
    }

    fn update_comment(&self, id: CommentId, content: &str) -> RepoResult<Comment> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE comments
                 SET content = ?2, updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![id, content],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "comment", id });
        }
        self.get_comment(id)?
            .ok_or(RepoError::NotFound { entity: "comment", id })
    }

    fn delete_comment(&self, id: CommentId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM comments WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "comment", id });
        }
        Ok(())
    }

    fn like_post(
        &mut self,
        post_id: PostId,
        user_id: UserId,
        notification: Option<&NewNotification>,
    ) -> RepoResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO likes (post_id, user_id) VALUES (?1, ?2);",
            params![post_id, user_id],
        )?;
        let created = inserted == 1;
        if created {
            if let Some(notification) = notification {
                insert_notification(&tx, notification)?;
            }
        }
        tx.commit()?;
        Ok(created)
    }

    fn unlike_post(&self, post_id: PostId, user_id: UserId) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2;",
            params![post_id, user_id],
        )?;
        Ok(removed == 1)
    }

    fn likes_count(&self, post_id: PostId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE post_id = ?1;",
            [post_id],
            |row| row.get(0),
        )?;
        Ok(count_to_u64(count))
    }
}

fn search_bindings(sql: &mut String, search: Option<&str>) -> Vec<Value> {
    let mut bind_values = Vec::new();
    if let Some(term) = search.map(str::trim).filter(|term| !term.is_empty()) {
        sql.push_str(" AND ");
        sql.push_str(SEARCH_CLAUSE_SQL);
        let pattern = like_pattern(term);
        for _ in 0..3 {
            bind_values.push(Value::Text(pattern.clone()));
        }
    }
    bind_values
}

fn query_posts(conn: &Connection, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Post>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut posts = Vec::new();
    while let Some(row) = rows.next()? {
        posts.push(parse_post_row(row)?);
    }
    Ok(posts)
}

fn parse_post_row(row: &Row<'_>) -> RepoResult<Post> {
    Ok(Post {
        id: row.get("id")?,
        author: UserSummary {
            id: row.get("author_id")?,
            username: row.get("author_username")?,
        },
        title: row.get("title")?,
        content: row.get("content")?,
        likes_count: count_to_u64(row.get("likes_count")?),
        comments_count: count_to_u64(row.get("comments_count")?),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_comment_row(row: &Row<'_>) -> RepoResult<Comment> {
    Ok(Comment {
        id: row.get("id")?,
        post: row.get("post_id")?,
        author: UserSummary {
            id: row.get("author_id")?,
            username: row.get("author_username")?,
        },
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
