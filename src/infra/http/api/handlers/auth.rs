//! Registration, token, and password-reset handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::application::users::RegisterCommand;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{
    LoginRequest, PasswordResetConfirmRequest, PasswordResetRequest, RefreshRequest,
    RegisterRequest,
};
use crate::infra::http::api::state::ApiState;

use super::user_to_api;

pub async fn register(
    State(state): State<ApiState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = RegisterCommand {
        email: payload.email,
        username: payload.username,
        first_name: payload.first_name,
        last_name: payload.last_name,
        password: payload.password,
        phone_number: payload.phone_number,
        is_agent: payload.is_agent,
        agency_name: payload.agency_name,
        license_number: payload.license_number,
    };

    let user = state.users.register(command).await.map_err(user_to_api)?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<ApiState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pair = state
        .users
        .login(&payload.email, &payload.password)
        .await
        .map_err(user_to_api)?;

    Ok(Json(pair))
}

pub async fn refresh_token(
    State(state): State<ApiState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pair = state
        .users
        .refresh(&payload.refresh_token)
        .await
        .map_err(user_to_api)?;

    Ok(Json(pair))
}

pub async fn password_reset(
    State(state): State<ApiState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .users
        .request_password_reset(&payload.email)
        .await
        .map_err(user_to_api)?;

    Ok(Json(json!({
        "message": "A reset email has been sent if the account exists."
    })))
}

pub async fn password_reset_confirm(
    State(state): State<ApiState>,
    Json(payload): Json<PasswordResetConfirmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .users
        .confirm_password_reset(&payload.token, &payload.new_password)
        .await
        .map_err(user_to_api)?;

    Ok(Json(json!({ "message": "Password reset successfully." })))
}
