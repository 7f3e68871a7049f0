//! `/api/blog`: posts with tags and full-text search. Anonymous callers
//! see published posts only.

use super::{blog_service, page_request};
use crate::auth::{CurrentUser, MaybeUser};
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;
use agora_core::model::blog::{
    BlogListQuery, BlogPost, BlogPostDraft, BlogPostId, BlogPostPatch, TagCount,
};
use agora_core::model::page::{Page, MAX_PAGE_SIZE};
use agora_core::search::fts::DEFAULT_SEARCH_LIMIT;
use agora_core::service::blog_service::search_published;
use agora_core::SearchHit;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

const DEFAULT_TAG_LIMIT: u32 = 10;

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
        .route("/posts/{id}/tags", put(set_tags))
        .route("/tags", get(popular_tags))
        .route("/search", get(search))
        .route("/stats", get(stats))
}

#[derive(Debug, Default, Deserialize)]
struct BlogListParams {
    tag: Option<String>,
    author: Option<i64>,
    page: Option<u32>,
    page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TagsBody {
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TagParams {
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct BlogStats {
    published: u64,
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    limit: Option<u32>,
}

async fn list_posts(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    ApiQuery(params): ApiQuery<BlogListParams>,
) -> ApiResult<Json<Page<BlogPost>>> {
    let query = BlogListQuery {
        tag: params
            .tag
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty()),
        author_id: params.author,
    };
    let page = page_request(params.page, params.page_size);
    let posts = state
        .run(move |conn| blog_service(conn)?.list_posts(viewer.as_ref(), &query, &page))
        .await?;
    Ok(Json(posts))
}

async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(draft): ApiJson<BlogPostDraft>,
) -> ApiResult<(StatusCode, Json<BlogPost>)> {
    let post = state
        .run(move |conn| blog_service(conn)?.create_post(&user, draft))
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    ApiPath(id): ApiPath<BlogPostId>,
) -> ApiResult<Json<BlogPost>> {
    let post = state
        .run(move |conn| blog_service(conn)?.get_post(viewer.as_ref(), id))
        .await?;
    Ok(Json(post))
}

async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<BlogPostId>,
    ApiJson(patch): ApiJson<BlogPostPatch>,
) -> ApiResult<Json<BlogPost>> {
    let post = state
        .run(move |conn| blog_service(conn)?.update_post(&user, id, patch))
        .await?;
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<BlogPostId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |conn| blog_service(conn)?.delete_post(&user, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_tags(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<BlogPostId>,
    ApiJson(body): ApiJson<TagsBody>,
) -> ApiResult<Json<BlogPost>> {
    let post = state
        .run(move |conn| blog_service(conn)?.set_tags(&user, id, &body.tags))
        .await?;
    Ok(Json(post))
}

async fn popular_tags(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<TagParams>,
) -> ApiResult<Json<Vec<TagCount>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_TAG_LIMIT)
        .min(MAX_PAGE_SIZE);
    let tags = state
        .run(move |conn| blog_service(conn)?.popular_tags(limit))
        .await?;
    Ok(Json(tags))
}

async fn search(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<Json<Vec<SearchHit>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .min(MAX_PAGE_SIZE);
    let hits = state
        .run(move |conn| search_published(conn, &params.q, limit))
        .await?;
    Ok(Json(hits))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<BlogStats>> {
    let published = state
        .run(|conn| blog_service(conn)?.total_published())
        .await?;
    Ok(Json(BlogStats { published }))
}
