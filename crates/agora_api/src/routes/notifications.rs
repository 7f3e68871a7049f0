//! `/api/notifications`: the caller's inbox.

use super::{notification_service, page_request};
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::extract::{ApiPath, ApiQuery};
use crate::state::AppState;
use agora_core::model::notification::{Notification, NotificationId};
use agora_core::model::page::Page;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}/read", post(mark_read))
}

#[derive(Debug, Default, Deserialize)]
struct InboxParams {
    #[serde(default)]
    unread: bool,
    page: Option<u32>,
    page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
struct UnreadCount {
    unread: u64,
}

#[derive(Debug, Serialize)]
struct Marked {
    marked: u64,
}

async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(params): ApiQuery<InboxParams>,
) -> ApiResult<Json<Page<Notification>>> {
    let page = page_request(params.page, params.page_size);
    let inbox = state
        .run(move |conn| notification_service(conn)?.list(user.id, params.unread, &page))
        .await?;
    Ok(Json(inbox))
}

async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<UnreadCount>> {
    let unread = state
        .run(move |conn| notification_service(conn)?.unread_count(user.id))
        .await?;
    Ok(Json(UnreadCount { unread }))
}

async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<NotificationId>,
) -> ApiResult<Json<Marked>> {
    state
        .run(move |conn| notification_service(conn)?.mark_read(user.id, id))
        .await?;
    Ok(Json(Marked { marked: 1 }))
}

async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Marked>> {
    let marked = state
        .run(move |conn| notification_service(conn)?.mark_all_read(user.id))
        .await?;
    Ok(Json(Marked { marked }))
}
