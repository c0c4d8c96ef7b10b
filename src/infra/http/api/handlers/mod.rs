//! JSON API handlers.

mod auth;
mod favorites;
mod feedback;
mod notifications;
mod properties;
mod reviews;
mod users;

pub use auth::*;
pub use favorites::*;
pub use feedback::*;
pub use notifications::*;
pub use properties::*;
pub use reviews::*;
pub use users::*;

use axum::http::StatusCode;

use crate::application::auth::{AuthError, AuthPrincipal};
use crate::application::favorites::FavoriteError;
use crate::application::feedback::FeedbackError;
use crate::application::notifications::NotificationError;
use crate::application::properties::PropertyError;
use crate::application::repos::RepoError;
use crate::application::reviews::ReviewError;
use crate::application::users::UserError;

use super::error::{ApiError, codes};

/// Gate for endpoints that demand an authenticated caller.
pub(super) fn require_auth(principal: Option<AuthPrincipal>) -> Result<AuthPrincipal, ApiError> {
    principal.ok_or_else(ApiError::unauthorized)
}

pub(super) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => {
            ApiError::conflict("Duplicate record", Some(constraint))
        }
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Pagination(err) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_CURSOR,
            "Invalid cursor",
            Some(err.to_string()),
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(message),
        ),
    }
}

pub(super) fn user_to_api(err: UserError) -> ApiError {
    match err {
        UserError::Repo(err) => repo_to_api(err),
        UserError::Auth(AuthError::InvalidCredentials) => ApiError::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Invalid credentials",
            None,
        ),
        UserError::Auth(AuthError::TokenExpired) => ApiError::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Token expired",
            None,
        ),
        UserError::Auth(AuthError::Hashing(detail)) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Credential processing failed",
            Some(detail),
        ),
        UserError::Auth(_) => ApiError::unauthorized(),
        UserError::Domain(err) => ApiError::bad_request("Validation failed", Some(err.to_string())),
        UserError::EmailTaken => {
            ApiError::conflict("An account with this email already exists", None)
        }
        UserError::AccountNotFound => ApiError::not_found("account not found"),
        UserError::InvalidResetToken => {
            ApiError::bad_request("Password reset token is invalid or expired", None)
        }
    }
}

pub(super) fn property_to_api(err: PropertyError) -> ApiError {
    match err {
        PropertyError::Repo(err) => repo_to_api(err),
        PropertyError::Domain(err) => {
            ApiError::bad_request("Validation failed", Some(err.to_string()))
        }
        PropertyError::NotFound => ApiError::not_found("property not found"),
        PropertyError::Forbidden => ApiError::forbidden(),
    }
}

pub(super) fn favorite_to_api(err: FavoriteError) -> ApiError {
    match err {
        FavoriteError::Repo(err) => repo_to_api(err),
        FavoriteError::PropertyNotFound => ApiError::not_found("property not found"),
        FavoriteError::NotFound => ApiError::not_found("favorite not found"),
        FavoriteError::Forbidden => ApiError::forbidden(),
    }
}

pub(super) fn review_to_api(err: ReviewError) -> ApiError {
    match err {
        ReviewError::Repo(err) => repo_to_api(err),
        ReviewError::Domain(err) => {
            ApiError::bad_request("Validation failed", Some(err.to_string()))
        }
        ReviewError::NotFound => ApiError::not_found("review not found"),
        ReviewError::PropertyNotFound => ApiError::not_found("property not found"),
        ReviewError::AlreadyReviewed => {
            ApiError::conflict("User already reviewed this property", None)
        }
        ReviewError::Forbidden => ApiError::forbidden(),
    }
}

pub(super) fn notification_to_api(err: NotificationError) -> ApiError {
    match err {
        NotificationError::Repo(err) => repo_to_api(err),
        NotificationError::Domain(err) => {
            ApiError::bad_request("Validation failed", Some(err.to_string()))
        }
        NotificationError::NotFound => ApiError::not_found("notification not found"),
        NotificationError::Forbidden => ApiError::forbidden(),
    }
}

pub(super) fn feedback_to_api(err: FeedbackError) -> ApiError {
    match err {
        FeedbackError::Repo(err) => repo_to_api(err),
        FeedbackError::Domain(err) => {
            ApiError::bad_request("Validation failed", Some(err.to_string()))
        }
        FeedbackError::NotFound => ApiError::not_found("feedback not found"),
        FeedbackError::Forbidden => ApiError::forbidden(),
    }
}
