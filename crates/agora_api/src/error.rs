//! HTTP error mapping.
//!
//! Every failure leaves the API as `{"detail": ..., "field"?: ...}` with a
//! status derived from the service error kind. Storage failures are logged
//! and answered with a generic 500 body.

use agora_core::ServiceError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    /// Malformed body, query string or path segment.
    BadRequest(String),
    Unauthenticated,
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl ApiError {
    fn status_and_body(&self) -> (StatusCode, ErrorBody) {
        let plain = |status: StatusCode, detail: String| {
            (status, ErrorBody { detail, field: None })
        };
        match self {
            Self::Service(err) => match err {
                ServiceError::Validation(invalid) => (
                    StatusCode::BAD_REQUEST,
                    ErrorBody {
                        detail: invalid.message.clone(),
                        field: Some(invalid.field),
                    },
                ),
                ServiceError::InvalidCredentials => {
                    plain(StatusCode::BAD_REQUEST, err.to_string())
                }
                ServiceError::NotFound { .. } => plain(StatusCode::NOT_FOUND, err.to_string()),
                ServiceError::PermissionDenied(reason) => {
                    plain(StatusCode::FORBIDDEN, (*reason).to_string())
                }
                ServiceError::Unauthenticated => {
                    plain(StatusCode::UNAUTHORIZED, err.to_string())
                }
                ServiceError::Conflict(message) => plain(StatusCode::CONFLICT, message.clone()),
                ServiceError::Auth(_)
                | ServiceError::Search(_)
                | ServiceError::Repo(_)
                | ServiceError::InconsistentState(_) => internal_body(),
            },
            Self::BadRequest(detail) => plain(StatusCode::BAD_REQUEST, detail.clone()),
            Self::Unauthenticated => plain(
                StatusCode::UNAUTHORIZED,
                "authentication credentials were not provided".to_string(),
            ),
            Self::Internal(_) => internal_body(),
        }
    }
}

fn internal_body() -> (StatusCode, ErrorBody) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorBody {
            detail: "internal server error".to_string(),
            field: None,
        },
    )
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service(err) => write!(f, "{err}"),
            Self::BadRequest(detail) => write!(f, "bad request: {detail}"),
            Self::Unauthenticated => write!(f, "authentication credentials were not provided"),
            Self::Internal(detail) => write!(f, "internal error: {detail}"),
        }
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Service(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(value: PathRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            log::error!(
                "event=http_error module=api status=error http_status={} error={self}",
                status.as_u16()
            );
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::ValidationError;

    #[test]
    fn validation_errors_carry_the_field() {
        let err = ApiError::from(ServiceError::Validation(ValidationError::new(
            "title",
            "this field may not be blank",
        )));
        let (status, body) = err.status_and_body();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.field, Some("title"));
    }

    #[test]
    fn storage_failures_do_not_leak_details() {
        let err = ApiError::Internal("disk I/O error at /var/db".to_string());
        let (status, body) = err.status_and_body();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.detail, "internal server error");
    }

    #[test]
    fn service_kinds_map_to_statuses() {
        let cases = [
            (ServiceError::NotFound { entity: "post", id: 1 }, StatusCode::NOT_FOUND),
            (ServiceError::PermissionDenied("no"), StatusCode::FORBIDDEN),
            (ServiceError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (ServiceError::Conflict("dup".to_string()), StatusCode::CONFLICT),
            (ServiceError::InvalidCredentials, StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_and_body().0, expected);
        }
    }
}
