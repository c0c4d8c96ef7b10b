//! Property handlers.

use axum::Json;
use axum::extract::{Extension, Multipart, Path, Query, RawQuery, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::TryStreamExt;
use tracing::warn;
use uuid::Uuid;

use crate::application::auth::AuthPrincipal;
use crate::application::pagination::{PageRequest, PropertyCursor};
use crate::application::properties::{AttachImageCommand, PropertyCommand};
use crate::application::repos::PropertyQueryFilter;
use crate::infra::http::api::error::{ApiError, codes};
use crate::infra::http::api::models::{PropertyCreateRequest, PropertyListQuery};
use crate::infra::http::api::state::ApiState;
use crate::infra::media::MediaStorageError;

use super::{property_to_api, require_auth};

const DEFAULT_PAGE_SIZE: u32 = 20;

pub async fn list_properties(
    State(state): State<ApiState>,
    Query(query): Query<PropertyListQuery>,
    RawQuery(raw_query): RawQuery,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    let cursor = match query
        .cursor
        .as_deref()
        .map(PropertyCursor::decode)
        .transpose()
    {
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

    let filter = PropertyQueryFilter {
        status: query.status,
        kind: query.kind,
        featured: query.featured,
        verified: query.verified,
        city: query.city,
        region: query.region,
        min_price: query.min_price,
        max_price: query.max_price,
        min_area: query.min_area,
        max_area: query.max_area,
        min_bedrooms: query.min_bedrooms,
        max_bedrooms: query.max_bedrooms,
        min_bathrooms: query.min_bathrooms,
        max_bathrooms: query.max_bathrooms,
        search: query.search,
    };

    let payload = state
        .properties
        .list(&filter, PageRequest::new(limit, cursor), &raw_params(raw_query))
        .await
        .map_err(property_to_api)?;

    Ok(Json(payload))
}

pub async fn get_property(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = state.properties.detail(id).await.map_err(property_to_api)?;
    Ok(Json(payload))
}

pub async fn featured_properties(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = state.properties.featured().await.map_err(property_to_api)?;
    Ok(Json(payload))
}

pub async fn property_stats(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = state.properties.stats().await.map_err(property_to_api)?;
    Ok(Json(payload))
}

pub async fn create_property(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Json(payload): Json<PropertyCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let property = state
        .properties
        .create(principal.user_id, command_from_request(payload))
        .await
        .map_err(property_to_api)?;

    Ok((StatusCode::CREATED, Json(property)))
}

pub async fn update_property(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PropertyCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let property = state
        .properties
        .update(
            principal.user_id,
            principal.is_staff,
            id,
            command_from_request(payload),
        )
        .await
        .map_err(property_to_api)?;

    Ok(Json(property))
}

pub async fn delete_property(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    state
        .properties
        .delete(principal.user_id, principal.is_staff, id)
        .await
        .map_err(property_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_property_image(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let mut caption: Option<String> = None;
    let mut is_primary = false;
    let mut stored: Option<(crate::infra::media::StoredMedia, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request("Malformed multipart body", Some(err.to_string())))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("image") => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        mime_guess::from_path(&file_name)
                            .first_or_octet_stream()
                            .to_string()
                    });

                let stream = field.map_err(|err| MediaStorageError::PayloadStream {
                    source: Box::new(err),
                });
                let media = state
                    .media_storage
                    .store_stream(&file_name, stream)
                    .await
                    .map_err(media_to_api)?;
                stored = Some((media, content_type));
            }
            Some("caption") => {
                let text = field.text().await.map_err(|err| {
                    ApiError::bad_request("Malformed multipart body", Some(err.to_string()))
                })?;
                caption = (!text.trim().is_empty()).then(|| text);
            }
            Some("is_primary") => {
                let text = field.text().await.map_err(|err| {
                    ApiError::bad_request("Malformed multipart body", Some(err.to_string()))
                })?;
                is_primary = matches!(text.trim(), "true" | "1" | "on");
            }
            _ => {}
        }
    }

    let Some((media, content_type)) = stored else {
        return Err(ApiError::bad_request(
            "Multipart body must contain an `image` field",
            None,
        ));
    };

    let command = AttachImageCommand {
        stored_path: media.stored_path,
        content_type,
        size_bytes: media.size_bytes,
        caption,
        is_primary,
    };

    let image = state
        .properties
        .attach_image(principal.user_id, id, command)
        .await
        .map_err(property_to_api)?;

    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn delete_property_image(
    State(state): State<ApiState>,
    Extension(principal): Extension<Option<AuthPrincipal>>,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(principal)?;

    let image = state
        .properties
        .remove_image(principal.user_id, id, image_id)
        .await
        .map_err(property_to_api)?;

    // Row is gone; file removal is best effort.
    if let Err(err) = state.media_storage.delete(&image.stored_path).await {
        warn!(
            target = "immob::media",
            stored_path = %image.stored_path,
            error = %err,
            "stored image removal failed"
        );
    }

    Ok(StatusCode::NO_CONTENT)
}

fn command_from_request(payload: PropertyCreateRequest) -> PropertyCommand {
    PropertyCommand {
        title: payload.title,
        description: payload.description,
        kind: payload.kind,
        status: payload.status,
        price: payload.price,
        currency: payload.currency,
        area_m2: payload.area_m2,
        bedrooms: payload.bedrooms,
        bathrooms: payload.bathrooms,
        city: payload.city,
        region: payload.region,
        quarter: payload.quarter,
        address: payload.address,
        is_featured: payload.is_featured,
    }
}

fn media_to_api(err: MediaStorageError) -> ApiError {
    match err {
        MediaStorageError::EmptyPayload => {
            ApiError::bad_request("Uploaded file is empty", None)
        }
        MediaStorageError::PayloadTooLarge { .. } => ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            codes::UPLOAD,
            "Uploaded file exceeds the size limit",
            None,
        ),
        other => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::UPLOAD,
            "Upload failed",
            Some(other.to_string()),
        ),
    }
}

pub(super) fn raw_params(raw_query: Option<String>) -> Vec<(String, String)> {
    raw_query
        .as_deref()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}
