//! Account model: users, their public summaries and profile projections.
//!
//! # Invariants
//! - `username` is unique case-insensitively and matches `[\w.@+-]{1,150}`.
//! - A non-empty `email` is unique case-insensitively.
//! - Password hashes never leave the repository layer.

use super::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub type UserId = i64;

pub const USERNAME_MAX_CHARS: usize = 150;
pub const BIO_MAX_CHARS: usize = 500;
pub const LOCATION_MAX_CHARS: usize = 100;
pub const WEBSITE_MAX_CHARS: usize = 200;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});
static WEBSITE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("valid url regex"));

/// Full account record as exposed to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub location: String,
    pub website: String,
    pub is_staff: bool,
    pub date_joined: i64,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

/// Minimal author/actor reference embedded in other records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
}

/// User plus social-graph counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub followers_count: u64,
    pub following_count: u64,
    pub posts_count: u64,
}

/// Profile as shown to other accounts; the email address stays private.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicProfile {
    pub id: UserId,
    pub username: String,
    pub bio: String,
    pub location: String,
    pub website: String,
    pub is_staff: bool,
    pub date_joined: i64,
    pub followers_count: u64,
    pub following_count: u64,
    pub posts_count: u64,
}

impl From<UserProfile> for PublicProfile {
    fn from(profile: UserProfile) -> Self {
        let UserProfile {
            user,
            followers_count,
            following_count,
            posts_count,
        } = profile;
        Self {
            id: user.id,
            username: user.username,
            bio: user.bio,
            location: user.location,
            website: user.website,
            is_staff: user.is_staff,
            date_joined: user.date_joined,
            followers_count,
            following_count,
            posts_count,
        }
    }
}

/// Insert model for a new account. `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub bio: String,
    pub is_staff: bool,
}

/// Partial profile update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
}

impl ProfileUpdate {
    /// Trims every provided value and validates it.
    pub fn normalized(self) -> Result<Self, ValidationError> {
        let email = self.email.map(|value| normalize_email(&value));
        if let Some(email) = email.as_deref() {
            validate_email(email)?;
        }
        let bio = self.bio.map(|value| value.trim().to_string());
        if let Some(bio) = bio.as_deref() {
            validate_max("bio", bio, BIO_MAX_CHARS)?;
        }
        let location = self.location.map(|value| value.trim().to_string());
        if let Some(location) = location.as_deref() {
            validate_max("location", location, LOCATION_MAX_CHARS)?;
        }
        let website = self.website.map(|value| value.trim().to_string());
        if let Some(website) = website.as_deref() {
            validate_website(website)?;
        }
        Ok(Self {
            email,
            bio,
            location,
            website,
        })
    }
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::new("username", "this field may not be blank"));
    }
    if username.chars().count() > USERNAME_MAX_CHARS {
        return Err(ValidationError::new(
            "username",
            format!("ensure this field has no more than {USERNAME_MAX_CHARS} characters"),
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ValidationError::new(
            "username",
            "may contain only letters, numbers, and @/./+/-/_ characters",
        ));
    }
    Ok(())
}

/// Empty email is allowed; anything else must look like an address.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() || EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::new("email", "enter a valid email address"))
    }
}

pub fn validate_website(website: &str) -> Result<(), ValidationError> {
    validate_max("website", website, WEBSITE_MAX_CHARS)?;
    if website.is_empty() || WEBSITE_RE.is_match(website) {
        Ok(())
    } else {
        Err(ValidationError::new("website", "enter a valid URL"))
    }
}

/// Lowercases the domain part, keeps the local part as typed.
pub fn normalize_email(email: &str) -> String {
    let trimmed = email.trim();
    match trimmed.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => trimmed.to_string(),
    }
}

fn validate_max(field: &'static str, value: &str, max_chars: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max_chars {
        return Err(ValidationError::new(
            field,
            format!("ensure this field has no more than {max_chars} characters"),
        ));
    }
    Ok(())
}
