//! Review handlers.

use axum::Json;
use axum::extract::{Extension, Path, Query, RawQuery, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::auth::AuthPrincipal;
use crate::application::pagination::{PageRequest, ReviewCursor};
use crate::application::repos::ReviewQueryFilter;
use crate::application::reviews::{CreateReviewCommand, UpdateReviewCommand};
use crate::infra::http::api::error::{ApiError, codes};
use crate::infra::http::api::models::{
    ReviewCreateRequest, ReviewListQuery, ReviewStatsQuery, ReviewUpdateRequest,
};
use crate::infra::http::api::state::ApiState;

use super::properties::raw_params;
use super::{require_auth, review_to_api};

const DEFAULT_PAGE_SIZE: u32 = 20;

pub async fn list_reviews(
    State(state): State<ApiState>,
    Query(query): Query<ReviewListQuery>,
    RawQuery(raw_query): RawQuery,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    let cursor = match query.cursor.as_deref().map(ReviewCursor::decode).transpose() {
        Ok(cursor) => cursor,
        Err(err) => {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_CURSOR,
                "Invalid cursor",
                Some(err.to_string()),
            ));
        }
    };

    let filter = ReviewQueryFilter {
        property_id: query.property,
        user_id: query.user,
        min_rating: query.min_rating,
    };

    let payload = state
        .reviews
        .list(&filter, PageRequest::new(limit, cursor), &raw_params(raw_query))
        .await
        .map_err(review_to_api)?;

    Ok(Json(payload))
}

pub async fn create_review(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Json(payload): Json<ReviewCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let command = CreateReviewCommand {
        property_id: payload.property_id,
        rating: payload.rating,
        title: payload.title,
        comment: payload.comment,
    };

    let review = state
        .reviews
        .create(principal.user_id, command)
        .await
        .map_err(review_to_api)?;

    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn update_review(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let command = UpdateReviewCommand {
        rating: payload.rating,
        title: payload.title,
        comment: payload.comment,
    };

    let review = state
        .reviews
        .update(principal.user_id, principal.is_staff, id, command)
        .await
        .map_err(review_to_api)?;

    Ok(Json(review))
}

pub async fn delete_review(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    state
        .reviews
        .delete(principal.user_id, principal.is_staff, id)
        .await
        .map_err(review_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_review_like(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let outcome = state
        .reviews
        .toggle_like(principal.user_id, id)
        .await
        .map_err(review_to_api)?;

    Ok(Json(outcome))
}

pub async fn my_reviews(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let reviews = state
        .reviews
        .my_reviews(principal.user_id)
        .await
        .map_err(review_to_api)?;

    Ok(Json(reviews))
}

pub async fn review_stats(
    State(state): State<ApiState>,
    Query(query): Query<ReviewStatsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = state
        .reviews
        .property_stats(query.property_id)
        .await
        .map_err(review_to_api)?;

    Ok(Json(payload))
}
