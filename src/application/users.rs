//! Account lifecycle: registration, login, profiles, password resets.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::warn;
use uuid::Uuid;

use crate::application::auth::{
    AuthError, AuthPrincipal, JwtAuthenticator, TokenKind, TokenPair, hash_password,
    verify_password,
};
use crate::application::mailer::Mailer;
use crate::application::repos::{
    CreateResetTokenParams, CreateUserParams, RepoError, UpdateUserProfileParams, UsersRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::domain::password::validate_password;
use crate::domain::sanitize::strip_html;

static PHONE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?1?\d{9,15}$").expect("valid regex"));

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("account not found")]
    AccountNotFound,
    #[error("password reset token is invalid or expired")]
    InvalidResetToken,
}

#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub phone_number: Option<String>,
    pub is_agent: bool,
    pub agency_name: Option<String>,
    pub license_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateProfileCommand {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub agency_name: Option<String>,
    pub license_number: Option<String>,
}

pub struct UserService {
    repo: Arc<dyn UsersRepo>,
    jwt: Arc<JwtAuthenticator>,
    mailer: Arc<dyn Mailer>,
    reset_token_ttl: Duration,
    frontend_url: String,
}

impl UserService {
    pub fn new(
        repo: Arc<dyn UsersRepo>,
        jwt: Arc<JwtAuthenticator>,
        mailer: Arc<dyn Mailer>,
        reset_token_ttl: Duration,
        frontend_url: String,
    ) -> Self {
        Self {
            repo,
            jwt,
            mailer,
            reset_token_ttl,
            frontend_url,
        }
    }

    pub async fn register(&self, command: RegisterCommand) -> Result<UserRecord, UserError> {
        let email = command.email.trim().to_lowercase();
        if !email.contains('@') || email.len() < 5 {
            return Err(DomainError::validation("email address is not valid").into());
        }

        let username = strip_html(command.username.trim());
        if username.is_empty() {
            return Err(DomainError::validation("username must not be empty").into());
        }

        if let Some(phone) = command.phone_number.as_deref() {
            validate_phone(phone)?;
        }

        let local_part = email.split('@').next().unwrap_or_default();
        validate_password(
            &command.password,
            &[
                local_part,
                &username,
                &command.first_name,
                &command.last_name,
            ],
        )?;

        let password_hash = hash_password(&command.password)?;

        let params = CreateUserParams {
            email,
            username,
            first_name: strip_html(command.first_name.trim()),
            last_name: strip_html(command.last_name.trim()),
            password_hash,
            phone_number: command.phone_number,
            is_agent: command.is_agent,
            agency_name: command.agency_name,
            license_number: command.license_number,
        };

        match self.repo.create_user(params).await {
            Ok(user) => Ok(user),
            Err(RepoError::Duplicate { .. }) => Err(UserError::EmailTaken),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, UserError> {
        let email = email.trim().to_lowercase();
        let user = self.repo.find_by_email(&email).await?;

        let Some(user) = user else {
            warn!(target = "immob::auth", email = %email, "login attempt for unknown account");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !verify_password(password, &user.password_hash) {
            warn!(target = "immob::auth", email = %email, "login attempt with bad password");
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(self.jwt.issue_pair(user.id)?)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, UserError> {
        let claims = self.jwt.verify(refresh_token, TokenKind::Refresh)?;
        let user = self
            .repo
            .find_by_id(claims.sub)
            .await?
            .ok_or(UserError::AccountNotFound)?;
        Ok(self.jwt.issue_pair(user.id)?)
    }

    /// Resolve a bearer access token to a request principal.
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthPrincipal, UserError> {
        let claims = self.jwt.verify(access_token, TokenKind::Access)?;
        let user = self
            .repo
            .find_by_id(claims.sub)
            .await?
            .ok_or(UserError::AccountNotFound)?;
        Ok(AuthPrincipal {
            user_id: user.id,
            email: user.email,
            is_staff: user.is_staff,
            is_agent: user.is_agent,
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserRecord, UserError> {
        self.repo
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::AccountNotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        command: UpdateProfileCommand,
    ) -> Result<UserRecord, UserError> {
        let username = strip_html(command.username.trim());
        if username.is_empty() {
            return Err(DomainError::validation("username must not be empty").into());
        }
        if let Some(phone) = command.phone_number.as_deref() {
            validate_phone(phone)?;
        }

        let params = UpdateUserProfileParams {
            id: user_id,
            username,
            first_name: strip_html(command.first_name.trim()),
            last_name: strip_html(command.last_name.trim()),
            phone_number: command.phone_number,
            agency_name: command.agency_name,
            license_number: command.license_number,
        };

        self.repo.update_profile(params).await.map_err(Into::into)
    }

    pub async fn delete_account(&self, user_id: Uuid) -> Result<(), UserError> {
        self.repo
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::AccountNotFound)?;
        self.repo.delete_user(user_id).await?;
        warn!(target = "immob::auth", user_id = %user_id, "account deleted");
        Ok(())
    }

    /// Issue a password reset token and mail the reset link.
    ///
    /// Always succeeds from the caller's perspective so that account
    /// existence is not revealed.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), UserError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.repo.find_by_email(&email).await? else {
            return Ok(());
        };

        self.repo.delete_unused_reset_tokens(user.id).await?;

        let token = generate_reset_token();
        let expires_at = OffsetDateTime::now_utc() + self.reset_token_ttl;
        self.repo
            .create_reset_token(CreateResetTokenParams {
                user_id: user.id,
                token_digest: digest_token(&token),
                expires_at,
            })
            .await?;

        let reset_url = format!("{}/reset-password?token={token}", self.frontend_url);
        let body = format!(
            "Hello {},\n\nA password reset was requested for your account. \
             Follow this link to choose a new password:\n\n{reset_url}\n\n\
             The link expires in one hour. If you did not request a reset you \
             can ignore this message.",
            user.full_name()
        );

        if let Err(err) = self
            .mailer
            .send(&user.email, "Reset your IMMOB password", &body)
            .await
        {
            warn!(target = "immob::mail", error = %err, "password reset mail failed");
        }

        warn!(target = "immob::auth", email = %email, "password reset requested");
        Ok(())
    }

    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), UserError> {
        let record = self
            .repo
            .find_reset_token(&digest_token(token))
            .await?
            .ok_or(UserError::InvalidResetToken)?;

        if !record.is_valid(OffsetDateTime::now_utc()) {
            return Err(UserError::InvalidResetToken);
        }

        let user = self
            .repo
            .find_by_id(record.user_id)
            .await?
            .ok_or(UserError::AccountNotFound)?;

        let local_part = user.email.split('@').next().unwrap_or_default();
        validate_password(
            new_password,
            &[
                local_part,
                &user.username,
                &user.first_name,
                &user.last_name,
            ],
        )?;

        let password_hash = hash_password(new_password)?;
        self.repo.update_password(user.id, &password_hash).await?;
        self.repo.mark_reset_token_used(record.id).await?;

        warn!(target = "immob::auth", email = %user.email, "password reset completed");
        Ok(())
    }
}

fn validate_phone(phone: &str) -> Result<(), DomainError> {
    if PHONE_NUMBER.is_match(phone) {
        Ok(())
    } else {
        Err(DomainError::validation(
            "phone number must match the format '+237XXXXXXXXX'",
        ))
    }
}

fn generate_reset_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn digest_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_validation() {
        assert!(validate_phone("+237699112233").is_ok());
        assert!(validate_phone("699112233").is_ok());
        assert!(validate_phone("12ab34").is_err());
        assert!(validate_phone("+23").is_err());
    }

    #[test]
    fn reset_token_digests_are_stable_and_opaque() {
        let token = generate_reset_token();
        assert_eq!(digest_token(&token), digest_token(&token));
        assert_ne!(digest_token(&token), token);
        assert_eq!(digest_token(&token).len(), 64);
    }
}
