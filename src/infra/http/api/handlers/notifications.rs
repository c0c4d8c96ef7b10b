//! Notification handlers.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use uuid::Uuid;

use crate::application::auth::AuthPrincipal;
use crate::application::notifications::CreateNotificationCommand;
use crate::application::repos::NotificationQueryFilter;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{
    MarkReadRequest, NotificationCreateRequest, NotificationListQuery,
};
use crate::infra::http::api::state::ApiState;

use super::{notification_to_api, require_auth};

pub async fn list_notifications(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Query(query): Query<NotificationListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let filter = NotificationQueryFilter {
        is_read: query.is_read,
        kind: query.kind,
    };

    let listing = state
        .notifications
        .list(principal.user_id, filter)
        .await
        .map_err(notification_to_api)?;

    Ok(Json(listing))
}

pub async fn get_notification(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let notification = state
        .notifications
        .retrieve(principal.user_id, id)
        .await
        .map_err(notification_to_api)?;

    Ok(Json(notification))
}

pub async fn create_notification(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Json(payload): Json<NotificationCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let command = CreateNotificationCommand {
        title: payload.title,
        message: payload.message,
        kind: payload.kind,
        link: payload.link,
    };

    let notification = state
        .notifications
        .create(principal.user_id, command)
        .await
        .map_err(notification_to_api)?;

    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn unread_count(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let count = state
        .notifications
        .unread_count(principal.user_id)
        .await
        .map_err(notification_to_api)?;

    Ok(Json(json!({ "count": count })))
}

pub async fn mark_read(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Json(payload): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let outcome = state
        .notifications
        .mark_read(principal.user_id, &payload.notification_ids)
        .await
        .map_err(notification_to_api)?;

    Ok(Json(outcome))
}

pub async fn mark_all_read(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let outcome = state
        .notifications
        .mark_all_read(principal.user_id)
        .await
        .map_err(notification_to_api)?;

    Ok(Json(outcome))
}

pub async fn delete_notification(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    state
        .notifications
        .delete(principal.user_id, id)
        .await
        .map_err(notification_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}
