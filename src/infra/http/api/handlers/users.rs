//! Profile handlers.

use axum::Json;
use axum::extract::{Extension, State};
use axum::response::IntoResponse;

use crate::application::auth::AuthPrincipal;
use crate::application::users::UpdateProfileCommand;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::UpdateProfileRequest;
use crate::infra::http::api::state::ApiState;

use super::{require_auth, user_to_api};

pub async fn profile(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let user = state
        .users
        .profile(principal.user_id)
        .await
        .map_err(user_to_api)?;

    Ok(Json(user))
}

pub async fn delete_account(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    state
        .users
        .delete_account(principal.user_id)
        .await
        .map_err(user_to_api)?;

    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn update_profile(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let command = UpdateProfileCommand {
        username: payload.username,
        first_name: payload.first_name,
        last_name: payload.last_name,
        phone_number: payload.phone_number,
        agency_name: payload.agency_name,
        license_number: payload.license_number,
    };

    let user = state
        .users
        .update_profile(principal.user_id, command)
        .await
        .map_err(user_to_api)?;

    Ok(Json(user))
}
