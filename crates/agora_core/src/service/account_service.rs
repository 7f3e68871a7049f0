//! Account use-cases: registration, login, token auth, profiles, follows.
//!
//! # Invariants
//! - Login failures never reveal whether the username exists.
//! - Self-follow and self-unfollow are rejected before touching storage.
//! - Only a newly created follow edge notifies its target.

use super::notification_service::notification_for;
use super::{ServiceError, ServiceResult};
use crate::auth::{generate_token_key, hash_password, validate_password, verify_password};
use crate::model::notification::{NotificationTarget, VERB_FOLLOWED};
use crate::model::user::{
    normalize_email, validate_email, validate_username, NewUser, ProfileUpdate, User, UserId,
    PublicProfile, UserProfile, UserSummary, BIO_MAX_CHARS,
};
use crate::repo::user_repo::UserRepository;
use serde::Deserialize;

/// Registration payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub bio: String,
}

/// User paired with their API token key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

pub struct AccountService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> AccountService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a regular account and returns it with a fresh token.
    pub fn register(&self, registration: Registration) -> ServiceResult<AuthSession> {
        let user = self.create_account(registration, false)?;
        self.session_for(user)
    }

    /// Creates a staff account. No token is issued until first login.
    pub fn create_staff(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ServiceResult<User> {
        self.create_account(
            Registration {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                bio: String::new(),
            },
            true,
        )
    }

    pub fn login(&self, username: &str, password: &str) -> ServiceResult<AuthSession> {
        let Some((user, hash)) = self.repo.find_credentials(username.trim())? else {
            return Err(ServiceError::InvalidCredentials);
        };
        if !verify_password(password, &hash)? {
            return Err(ServiceError::InvalidCredentials);
        }
        self.session_for(user)
    }

    /// Resolves a token key to its user.
    pub fn authenticate(&self, token: &str) -> ServiceResult<User> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ServiceError::Unauthenticated);
        }
        self.repo
            .user_for_token(token)?
            .ok_or(ServiceError::Unauthenticated)
    }

    pub fn get_user(&self, id: UserId) -> ServiceResult<User> {
        self.repo
            .get_user(id)?
            .ok_or(ServiceError::NotFound { entity: "user", id })
    }

    pub fn profile(&self, id: UserId) -> ServiceResult<UserProfile> {
        let user = self.get_user(id)?;
        let counts = self.repo.profile_counts(id)?;
        Ok(UserProfile {
            user,
            followers_count: counts.followers,
            following_count: counts.following,
            posts_count: counts.posts,
        })
    }

    /// Profile of `id` as another account sees it.
    pub fn public_profile(&self, id: UserId) -> ServiceResult<PublicProfile> {
        Ok(self.profile(id)?.into())
    }

    pub fn update_profile(&self, id: UserId, update: ProfileUpdate) -> ServiceResult<UserProfile> {
        let update = update.normalized()?;
        if let Some(email) = update.email.as_deref() {
            if !email.is_empty() && self.repo.email_exists(email, Some(id))? {
                return Err(ServiceError::validation(
                    "email",
                    "a user with that email already exists",
                ));
            }
        }
        self.repo.update_profile(id, &update)?;
        self.profile(id)
    }

    /// Follows `target`. Returns `false` when the edge already existed.
    pub fn follow(&mut self, actor: UserId, target: UserId) -> ServiceResult<(bool, User)> {
        if actor == target {
            return Err(ServiceError::validation("user", "you cannot follow yourself"));
        }
        let target_user = self.get_user(target)?;
        let notification = notification_for(
            target,
            actor,
            VERB_FOLLOWED,
            Some(NotificationTarget::user(actor)),
        );
        let created = self.repo.follow(actor, target, notification.as_ref())?;
        if created {
            log::info!("event=user_follow module=accounts status=ok actor={actor} target={target}");
        }
        Ok((created, target_user))
    }

    /// Unfollows `target`. Returns `false` when there was no edge.
    pub fn unfollow(&self, actor: UserId, target: UserId) -> ServiceResult<(bool, User)> {
        if actor == target {
            return Err(ServiceError::validation("user", "you cannot unfollow yourself"));
        }
        let target_user = self.get_user(target)?;
        let removed = self.repo.unfollow(actor, target)?;
        Ok((removed, target_user))
    }

    pub fn is_following(&self, actor: UserId, target: UserId) -> ServiceResult<bool> {
        Ok(self.repo.is_following(actor, target)?)
    }

    pub fn followers(&self, id: UserId) -> ServiceResult<Vec<UserSummary>> {
        self.get_user(id)?;
        Ok(self.repo.list_followers(id)?)
    }

    pub fn following(&self, id: UserId) -> ServiceResult<Vec<UserSummary>> {
        self.get_user(id)?;
        Ok(self.repo.list_following(id)?)
    }

    fn create_account(&self, registration: Registration, is_staff: bool) -> ServiceResult<User> {
        let username = registration.username.trim().to_string();
        validate_username(&username)?;
        let email = normalize_email(&registration.email);
        validate_email(&email)?;
        validate_password(&registration.password)?;
        let bio = registration.bio.trim().to_string();
        if bio.chars().count() > BIO_MAX_CHARS {
            return Err(ServiceError::validation(
                "bio",
                format!("ensure this field has no more than {BIO_MAX_CHARS} characters"),
            ));
        }

        if self.repo.username_exists(&username)? {
            return Err(ServiceError::validation(
                "username",
                "a user with that username already exists",
            ));
        }
        if !email.is_empty() && self.repo.email_exists(&email, None)? {
            return Err(ServiceError::validation(
                "email",
                "a user with that email already exists",
            ));
        }

        let password_hash = hash_password(&registration.password)?;
        let user = self.repo.create_user(&NewUser {
            username,
            email,
            password_hash,
            bio,
            is_staff,
        })?;
        log::info!(
            "event=user_register module=accounts status=ok user_id={} is_staff={is_staff}",
            user.id
        );
        Ok(user)
    }

    fn session_for(&self, user: User) -> ServiceResult<AuthSession> {
        let token = self.repo.get_or_create_token(user.id, &generate_token_key())?;
        Ok(AuthSession { user, token })
    }
}
