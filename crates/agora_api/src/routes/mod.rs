//! Route tables and the service constructors shared by handlers.

use agora_core::model::page::PageRequest;
use agora_core::{
    AccountService, BlogService, LibraryService, NotificationService, ServiceResult,
    SocialService, SqliteBlogRepository, SqliteLibraryRepository, SqliteNotificationRepository,
    SqliteSocialRepository, SqliteUserRepository,
};
use axum::Router;
use rusqlite::Connection;
use serde::Serialize;

use crate::state::AppState;

mod accounts;
mod blog;
mod library;
mod notifications;
mod posts;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/accounts", accounts::routes())
        .nest("/blog", blog::routes())
        .merge(posts::routes())
        .merge(notifications::routes())
        .merge(library::routes())
}

/// `{"detail": ...}` acknowledgement body.
#[derive(Debug, Serialize)]
pub(crate) struct Detail {
    pub detail: String,
}

impl Detail {
    pub(crate) fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

pub(crate) fn page_request(page: Option<u32>, page_size: Option<u32>) -> PageRequest {
    PageRequest { page, page_size }
}

pub(crate) fn account_service(
    conn: &mut Connection,
) -> ServiceResult<AccountService<SqliteUserRepository<'_>>> {
    Ok(AccountService::new(SqliteUserRepository::try_new(conn)?))
}

pub(crate) fn social_service(
    conn: &mut Connection,
) -> ServiceResult<SocialService<SqliteSocialRepository<'_>>> {
    Ok(SocialService::new(SqliteSocialRepository::try_new(conn)?))
}

pub(crate) fn notification_service(
    conn: &Connection,
) -> ServiceResult<NotificationService<SqliteNotificationRepository<'_>>> {
    Ok(NotificationService::new(SqliteNotificationRepository::try_new(conn)?))
}

pub(crate) fn library_service(
    conn: &Connection,
) -> ServiceResult<LibraryService<SqliteLibraryRepository<'_>>> {
    Ok(LibraryService::new(SqliteLibraryRepository::try_new(conn)?))
}

pub(crate) fn blog_service(
    conn: &mut Connection,
) -> ServiceResult<BlogService<SqliteBlogRepository<'_>>> {
    Ok(BlogService::new(SqliteBlogRepository::try_new(conn)?))
}
