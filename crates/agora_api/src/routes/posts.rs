//! `/api/posts`, `/api/comments` and `/api/feed`. Every endpoint needs a
//! token; only the author may change or remove what they wrote.

use super::{page_request, social_service};
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;
use agora_core::model::page::Page;
use agora_core::model::social::{
    Comment, CommentId, CommentInput, LikeOutcome, Post, PostId, PostInput, PostPatch,
    UnlikeOutcome,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post)
                .put(update_post)
                .patch(update_post)
                .delete(delete_post),
        )
        .route("/posts/{id}/like", post(like_post))
        .route("/posts/{id}/unlike", post(unlike_post))
        .route("/comments", get(list_comments).post(create_comment))
        .route(
            "/comments/{id}",
            get(get_comment)
                .put(update_comment)
                .patch(update_comment)
                .delete(delete_comment),
        )
        .route("/feed", get(feed))
}

#[derive(Debug, Default, Deserialize)]
struct PostListParams {
    search: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CommentListParams {
    post: Option<PostId>,
    page: Option<u32>,
    page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PageParams {
    page: Option<u32>,
    page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CommentUpdate {
    content: String,
}

async fn list_posts(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    ApiQuery(params): ApiQuery<PostListParams>,
) -> ApiResult<Json<Page<Post>>> {
    let page = page_request(params.page, params.page_size);
    let posts = state
        .run(move |conn| social_service(conn)?.list_posts(params.search.as_deref(), &page))
        .await?;
    Ok(Json(posts))
}

async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<PostInput>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let post = state
        .run(move |conn| social_service(conn)?.create_post(user.id, input))
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    ApiPath(id): ApiPath<PostId>,
) -> ApiResult<Json<Post>> {
    let post = state
        .run(move |conn| social_service(conn)?.get_post(id))
        .await?;
    Ok(Json(post))
}

async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<PostId>,
    ApiJson(patch): ApiJson<PostPatch>,
) -> ApiResult<Json<Post>> {
    let post = state
        .run(move |conn| social_service(conn)?.update_post(user.id, id, patch))
        .await?;
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<PostId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |conn| social_service(conn)?.delete_post(user.id, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn like_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<PostId>,
) -> ApiResult<(StatusCode, Json<LikeOutcome>)> {
    let outcome = state
        .run(move |conn| social_service(conn)?.like_post(user.id, id))
        .await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

async fn unlike_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<PostId>,
) -> ApiResult<Json<UnlikeOutcome>> {
    let outcome = state
        .run(move |conn| social_service(conn)?.unlike_post(user.id, id))
        .await?;
    Ok(Json(outcome))
}

async fn list_comments(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    ApiQuery(params): ApiQuery<CommentListParams>,
) -> ApiResult<Json<Page<Comment>>> {
    let page = page_request(params.page, params.page_size);
    let comments = state
        .run(move |conn| social_service(conn)?.list_comments(params.post, &page))
        .await?;
    Ok(Json(comments))
}

async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<CommentInput>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = state
        .run(move |conn| social_service(conn)?.create_comment(user.id, input))
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn get_comment(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    ApiPath(id): ApiPath<CommentId>,
) -> ApiResult<Json<Comment>> {
    let comment = state
        .run(move |conn| social_service(conn)?.get_comment(id))
        .await?;
    Ok(Json(comment))
}

async fn update_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<CommentId>,
    ApiJson(update): ApiJson<CommentUpdate>,
) -> ApiResult<Json<Comment>> {
    let comment = state
        .run(move |conn| social_service(conn)?.update_comment(user.id, id, &update.content))
        .await?;
    Ok(Json(comment))
}

async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<CommentId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |conn| social_service(conn)?.delete_comment(user.id, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn feed(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<Post>>> {
    let page = page_request(params.page, params.page_size);
    let posts = state
        .run(move |conn| social_service(conn)?.feed(user.id, &page))
        .await?;
    Ok(Json(posts))
}
