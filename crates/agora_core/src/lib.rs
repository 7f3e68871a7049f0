//! Core domain logic for Agora: accounts, social posts, the library
//! catalog and the blog.
//! This crate is the single source of truth for business invariants.

pub mod auth;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogSink};
pub use model::page::{Page, PageRequest};
pub use model::ValidationError;
pub use repo::blog_repo::{BlogRepository, SqliteBlogRepository};
pub use repo::library_repo::{LibraryRepository, SqliteLibraryRepository};
pub use repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
pub use repo::social_repo::{SocialRepository, SqliteSocialRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use search::fts::{search_posts, SearchError, SearchHit, SearchQuery, SearchResult};
pub use service::account_service::{AccountService, AuthSession, Registration};
pub use service::blog_service::BlogService;
pub use service::library_service::LibraryService;
pub use service::notification_service::NotificationService;
pub use service::social_service::SocialService;
pub use service::{ServiceError, ServiceResult};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
