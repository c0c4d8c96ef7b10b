//! Favorite handlers.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use uuid::Uuid;

use crate::application::auth::AuthPrincipal;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{FavoriteCheckQuery, FavoriteToggleRequest};
use crate::infra::http::api::state::ApiState;

use super::{favorite_to_api, require_auth};

pub async fn list_favorites(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let favorites = state
        .favorites
        .list(principal.user_id)
        .await
        .map_err(favorite_to_api)?;

    Ok(Json(favorites))
}

pub async fn toggle_favorite(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Json(payload): Json<FavoriteToggleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let outcome = state
        .favorites
        .toggle(principal.user_id, payload.property_id)
        .await
        .map_err(favorite_to_api)?;

    let status = if outcome.is_favorited {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(outcome)))
}

pub async fn check_favorite(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Query(query): Query<FavoriteCheckQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let is_favorited = state
        .favorites
        .check(principal.user_id, query.property_id)
        .await
        .map_err(favorite_to_api)?;

    Ok(Json(json!({ "is_favorited": is_favorited })))
}

pub async fn remove_favorite(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    state
        .favorites
        .remove(principal.user_id, id)
        .await
        .map_err(favorite_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}
