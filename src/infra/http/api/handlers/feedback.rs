//! Application feedback handlers.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::auth::AuthPrincipal;
use crate::application::feedback::SubmitFeedbackCommand;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{FeedbackCreateRequest, FeedbackRespondRequest};
use crate::infra::http::api::state::ApiState;

use super::{feedback_to_api, require_auth};

/// Anonymous submissions are allowed; authenticated callers are attributed.
pub async fn submit_feedback(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Json(payload): Json<FeedbackCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = SubmitFeedbackCommand {
        kind: payload.kind,
        rating: payload.rating,
        title: payload.title,
        message: payload.message,
        email: payload.email,
    };

    let feedback = state
        .feedback
        .submit(principal.map(|p| p.user_id), command)
        .await
        .map_err(feedback_to_api)?;

    Ok((StatusCode::CREATED, Json(feedback)))
}

pub async fn list_feedback(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let feedback = state
        .feedback
        .list(principal.user_id, principal.is_staff)
        .await
        .map_err(feedback_to_api)?;

    Ok(Json(feedback))
}

pub async fn respond_feedback(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FeedbackRespondRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let feedback = state
        .feedback
        .respond(principal.is_staff, id, &payload.response)
        .await
        .map_err(feedback_to_api)?;

    Ok(Json(feedback))
}
