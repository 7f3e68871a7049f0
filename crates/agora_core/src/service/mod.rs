//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own permission rules and derived fields so the HTTP layer stays thin.
//!
//! # Invariants
//! - Services never see SQL; every storage failure arrives as `RepoError`.
//! - Permission checks run before any write reaches storage.

use crate::auth::AuthError;
use crate::model::ValidationError;
use crate::repo::RepoError;
use crate::search::fts::SearchError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod account_service;
pub mod blog_service;
pub mod library_service;
pub mod notification_service;
pub mod social_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Use-case level error shared by all services.
#[derive(Debug)]
pub enum ServiceError {
    Validation(ValidationError),
    NotFound { entity: &'static str, id: i64 },
    /// Caller is authenticated but not allowed to perform the action.
    PermissionDenied(&'static str),
    /// Username/password pair did not match. Deliberately unspecific.
    InvalidCredentials,
    /// Token missing, unknown or revoked.
    Unauthenticated,
    Conflict(String),
    Auth(AuthError),
    Search(SearchError),
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl ServiceError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(field, message))
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::PermissionDenied(reason) => write!(f, "permission denied: {reason}"),
            Self::InvalidCredentials => {
                write!(f, "unable to log in with provided credentials")
            }
            Self::Unauthenticated => write!(f, "invalid or missing authentication token"),
            Self::Conflict(message) => write!(f, "{message}"),
            Self::Auth(err) => write!(f, "{err}"),
            Self::Search(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Auth(err) => Some(err),
            Self::Search(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<AuthError> for ServiceError {
    fn from(value: AuthError) -> Self {
        Self::Auth(value)
    }
}

impl From<SearchError> for ServiceError {
    fn from(value: SearchError) -> Self {
        match value {
            SearchError::InvalidQuery { message, .. } => Self::validation("q", message),
            other => Self::Search(other),
        }
    }
}
