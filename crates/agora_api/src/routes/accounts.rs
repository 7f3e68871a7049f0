//! `/api/accounts`: registration, login, profiles and the follow graph.

use super::{account_service, Detail};
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;
use agora_core::model::user::{
    ProfileUpdate, PublicProfile, User, UserId, UserProfile, UserSummary,
};
use agora_core::{AuthSession, Registration};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route(
            "/profile",
            get(get_profile).put(update_profile).patch(update_profile),
        )
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/followers", get(followers))
        .route("/users/{id}/following", get(following))
        .route("/follow/{id}", post(follow))
        .route("/unfollow/{id}", post(unfollow))
}

#[derive(Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct SessionBody {
    user: User,
    token: String,
}

impl From<AuthSession> for SessionBody {
    fn from(value: AuthSession) -> Self {
        Self {
            user: value.user,
            token: value.token,
        }
    }
}

async fn register(
    State(state): State<AppState>,
    ApiJson(registration): ApiJson<Registration>,
) -> ApiResult<(StatusCode, Json<SessionBody>)> {
    let session = state
        .run(move |conn| account_service(conn)?.register(registration))
        .await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<Json<SessionBody>> {
    let session = state
        .run(move |conn| {
            account_service(conn)?.login(&credentials.username, &credentials.password)
        })
        .await?;
    Ok(Json(session.into()))
}

async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<UserProfile>> {
    let profile = state
        .run(move |conn| account_service(conn)?.profile(user.id))
        .await?;
    Ok(Json(profile))
}

async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<UserProfile>> {
    let profile = state
        .run(move |conn| account_service(conn)?.update_profile(user.id, update))
        .await?;
    Ok(Json(profile))
}

async fn get_user(
    State(state): State<AppState>,
    CurrentUser(_viewer): CurrentUser,
    ApiPath(id): ApiPath<UserId>,
) -> ApiResult<Json<PublicProfile>> {
    let profile = state
        .run(move |conn| account_service(conn)?.public_profile(id))
        .await?;
    Ok(Json(profile))
}

async fn followers(
    State(state): State<AppState>,
    CurrentUser(_viewer): CurrentUser,
    ApiPath(id): ApiPath<UserId>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let users = state
        .run(move |conn| account_service(conn)?.followers(id))
        .await?;
    Ok(Json(users))
}

async fn following(
    State(state): State<AppState>,
    CurrentUser(_viewer): CurrentUser,
    ApiPath(id): ApiPath<UserId>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let users = state
        .run(move |conn| account_service(conn)?.following(id))
        .await?;
    Ok(Json(users))
}

async fn follow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<UserId>,
) -> ApiResult<Json<Detail>> {
    let (_, target) = state
        .run(move |conn| account_service(conn)?.follow(user.id, id))
        .await?;
    Ok(Json(Detail::new(format!("Now following {}.", target.username))))
}

async fn unfollow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<UserId>,
) -> ApiResult<Json<Detail>> {
    let (_, target) = state
        .run(move |conn| account_service(conn)?.unfollow(user.id, id))
        .await?;
    Ok(Json(Detail::new(format!("Unfollowed {}.", target.username))))
}
