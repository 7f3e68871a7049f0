//! Account repository: users, auth tokens and the follow graph.
//!
//! # Invariants
//! - Each user owns at most one auth token; token creation is get-or-create.
//! - A follow edge is unique per ordered pair and never points at oneself.
//! - A follow and the notification it triggers are committed together.

use super::notification_repo::{insert_notification, notification_exists};
use super::{count_to_u64, ensure_tables, int_to_bool, map_unique_violation, RepoError, RepoResult};
use crate::model::notification::NewNotification;
use crate::model::user::{NewUser, ProfileUpdate, User, UserId, UserSummary};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

const USER_COLUMNS_SQL: &str = "
    users.id AS id,
    users.username AS username,
    users.email AS email,
    users.bio AS bio,
    users.location AS location,
    users.website AS website,
    users.is_staff AS is_staff,
    users.date_joined AS date_joined";

/// Follower/following/post counters for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileCounts {
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
}

/// Repository interface for account and follow-graph operations.
pub trait UserRepository {
    fn create_user(&self, user: &NewUser) -> RepoResult<User>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Returns the user together with the stored password hash.
    fn find_credentials(&self, username: &str) -> RepoResult<Option<(User, String)>>;
    fn username_exists(&self, username: &str) -> RepoResult<bool>;
    /// Checks email uniqueness, optionally ignoring one user's own row.
    fn email_exists(&self, email: &str, exclude: Option<UserId>) -> RepoResult<bool>;
    fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> RepoResult<User>;
    /// Returns the existing token or stores `candidate_key` as the new one.
    fn get_or_create_token(&self, user_id: UserId, candidate_key: &str) -> RepoResult<String>;
    fn user_for_token(&self, key: &str) -> RepoResult<Option<User>>;
    /// Adds a follow edge; `notification` is stored only when the edge is new
    /// and the same notification was never stored before (re-follows stay quiet).
    fn follow(
        &mut self,
        follower: UserId,
        followee: UserId,
        notification: Option<&NewNotification>,
    ) -> RepoResult<bool>;
    fn unfollow(&self, follower: UserId, followee: UserId) -> RepoResult<bool>;
    fn is_following(&self, follower: UserId, followee: UserId) -> RepoResult<bool>;
    fn list_followers(&self, id: UserId) -> RepoResult<Vec<UserSummary>>;
    fn list_following(&self, id: UserId) -> RepoResult<Vec<UserSummary>>;
    fn profile_counts(&self, id: UserId) -> RepoResult<ProfileCounts>;
}

/// SQLite-backed account repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["users", "auth_tokens", "follows"])?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &NewUser) -> RepoResult<User> {
        self.conn
            .execute(
                "INSERT INTO users (username, email, password_hash, bio, is_staff)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    user.username,
                    user.email,
                    user.password_hash,
                    user.bio,
                    i64::from(user.is_staff),
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, "a user with that username or email already exists")
            })?;

        let id = self.conn.last_insert_rowid();
        self.get_user(id)?.ok_or(RepoError::NotFound { entity: "user", id })
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS_SQL} FROM users WHERE users.id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_credentials(&self, username: &str) -> RepoResult<Option<(User, String)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS_SQL}, users.password_hash AS password_hash
             FROM users
             WHERE users.username = ?1;"
        ))?;
        let mut rows = stmt.query([username])?;
        match rows.next()? {
            Some(row) => {
                let user = parse_user_row(row)?;
                let hash: String = row.get("password_hash")?;
                Ok(Some((user, hash)))
            }
            None => Ok(None),
        }
    }

    fn username_exists(&self, username: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1);",
            [username],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn email_exists(&self, email: &str, exclude: Option<UserId>) -> RepoResult<bool> {
        if email.is_empty() {
            return Ok(false);
        }
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM users
                WHERE email = ?1 COLLATE NOCASE
                  AND (?2 IS NULL OR id <> ?2)
            );",
            params![email, exclude],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> RepoResult<User> {
        let changed = self
            .conn
            .execute(
                "UPDATE users
                 SET
                    email = COALESCE(?2, email),
                    bio = COALESCE(?3, bio),
                    location = COALESCE(?4, location),
                    website = COALESCE(?5, website)
                 WHERE id = ?1;",
                params![
                    id,
                    update.email.as_deref(),
                    update.bio.as_deref(),
                    update.location.as_deref(),
                    update.website.as_deref(),
                ],
            )
            .map_err(|err| map_unique_violation(err, "a user with that email already exists"))?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "user", id });
        }
        self.get_user(id)?.ok_or(RepoError::NotFound { entity: "user", id })
    }

    fn get_or_create_token(&self, user_id: UserId, candidate_key: &str) -> RepoResult<String> {
        self.conn.execute(
            "INSERT INTO auth_tokens (key, user_id)
             VALUES (?1, ?2)
             ON CONFLICT (user_id) DO NOTHING;",
            params![candidate_key, user_id],
        )?;
        let key = self
            .conn
            .query_row(
                "SELECT key FROM auth_tokens WHERE user_id = ?1;",
                [user_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        key.ok_or(RepoError::NotFound {
            entity: "user",
            id: user_id,
        })
    }

    fn user_for_token(&self, key: &str) -> RepoResult<Option<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS_SQL}
             FROM users
             INNER JOIN auth_tokens t ON t.user_id = users.id
             WHERE t.key = ?1;"
        ))?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn follow(
        &mut self,
        follower: UserId,
        followee: UserId,
        notification: Option<&NewNotification>,
    ) -> RepoResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO follows (follower_id, followee_id) VALUES (?1, ?2);",
            params![follower, followee],
        )?;
        let created = inserted == 1;
        if created {
            if let Some(notification) = notification {
                if !notification_exists(&tx, notification)? {
                    insert_notification(&tx, notification)?;
                }
            }
        }
        tx.commit()?;
        Ok(created)
    }

    fn unfollow(&self, follower: UserId, followee: UserId) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2;",
            params![follower, followee],
        )?;
        Ok(removed == 1)
    }

    fn is_following(&self, follower: UserId, followee: UserId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2
            );",
            params![follower, followee],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_followers(&self, id: UserId) -> RepoResult<Vec<UserSummary>> {
        query_summaries(
            self.conn,
            "SELECT u.id, u.username
             FROM follows f
             INNER JOIN users u ON u.id = f.follower_id
             WHERE f.followee_id = ?1
             ORDER BY u.username COLLATE NOCASE ASC;",
            id,
        )
    }

    fn list_following(&self, id: UserId) -> RepoResult<Vec<UserSummary>> {
        query_summaries(
            self.conn,
            "SELECT u.id, u.username
             FROM follows f
             INNER JOIN users u ON u.id = f.followee_id
             WHERE f.follower_id = ?1
             ORDER BY u.username COLLATE NOCASE ASC;",
            id,
        )
    }

    fn profile_counts(&self, id: UserId) -> RepoResult<ProfileCounts> {
        let (followers, following, posts): (i64, i64, i64) = self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM follows WHERE followee_id = ?1),
                (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
                (SELECT COUNT(*) FROM posts WHERE author_id = ?1);",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(ProfileCounts {
            followers: count_to_u64(followers),
            following: count_to_u64(following),
            posts: count_to_u64(posts),
        })
    }
}

fn query_summaries(conn: &Connection, sql: &str, id: UserId) -> RepoResult<Vec<UserSummary>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([id])?;
    let mut users = Vec::new();
    while let Some(row) = rows.next()? {
        users.push(UserSummary {
            id: row.get(0)?,
            username: row.get(1)?,
        });
    }
    Ok(users)
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        bio: row.get("bio")?,
        location: row.get("location")?,
        website: row.get("website")?,
        is_staff: int_to_bool("users.is_staff", row.get("is_staff")?)?,
        date_joined: row.get("date_joined")?,
    })
}
