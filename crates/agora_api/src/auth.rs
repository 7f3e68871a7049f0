//! Token authentication extractors.
//!
//! Clients send `Authorization: Token <key>`; `Bearer <key>` is accepted
//! too. A header carrying an unknown key is rejected even on endpoints
//! that allow anonymous reads.

use crate::error::ApiError;
use crate::state::AppState;
use agora_core::model::user::User;
use agora_core::{AccountService, SqliteUserRepository};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

const TOKEN_SCHEMES: [&str; 2] = ["Token", "Bearer"];

/// Authenticated caller; rejects with 401 when absent or unknown.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Optional caller for endpoints with anonymous reads.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await? {
            MaybeUser(Some(user)) => Ok(Self(user)),
            MaybeUser(None) => Err(ApiError::Unauthenticated),
        }
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = token_from_headers(&parts.headers)? else {
            return Ok(Self(None));
        };
        let user = state
            .run(move |conn| {
                AccountService::new(SqliteUserRepository::try_new(conn)?).authenticate(&token)
            })
            .await?;
        Ok(Self(Some(user)))
    }
}

/// Returns the token key, `None` without a header, or 401 for a header in
/// an unknown scheme.
fn token_from_headers(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| ApiError::Unauthenticated)?;
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(key), None)
            if TOKEN_SCHEMES
                .iter()
                .any(|known| known.eq_ignore_ascii_case(scheme)) =>
        {
            Ok(Some(key.to_string()))
        }
        _ => Err(ApiError::Unauthenticated),
    }
}

#[cfg(test)]
mod tests {
    use super::token_from_headers;
    use axum::http::header::AUTHORIZATION;
    use axum::http::{HeaderMap, HeaderValue};

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn accepts_token_and_bearer_schemes() {
        assert_eq!(
            token_from_headers(&headers("Token abc123")).unwrap(),
            Some("abc123".to_string())
        );
        assert_eq!(
            token_from_headers(&headers("bearer abc123")).unwrap(),
            Some("abc123".to_string())
        );
        assert_eq!(token_from_headers(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn rejects_other_schemes_and_malformed_values() {
        assert!(token_from_headers(&headers("Basic dXNlcjpwYXNz")).is_err());
        assert!(token_from_headers(&headers("Token")).is_err());
        assert!(token_from_headers(&headers("Token a b")).is_err());
    }
}
