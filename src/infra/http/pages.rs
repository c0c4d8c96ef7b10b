//! Public page routes: template stubs, media serving, health.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use uuid::Uuid;

use crate::application::error::{ErrorReport, HttpError};
use crate::infra::db::PostgresRepositories;
use crate::infra::http::middleware::{log_responses, security_headers, set_request_context};
use crate::infra::media::MediaStorage;
use crate::presentation::views::{
    ContactPage, FavoritesPage, IndexPage, LoginPage, ProfilePage, PropertiesPage,
    PropertyDetailPage, RegisterPage, ReviewsPage, render_template,
};

#[derive(Clone)]
pub struct PagesState {
    pub db: Arc<PostgresRepositories>,
    pub media_storage: Arc<MediaStorage>,
}

pub fn build_pages_router(state: PagesState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login/", get(login))
        .route("/register/", get(register))
        .route("/properties/", get(properties))
        .route("/properties/{id}/", get(property_detail))
        .route("/profile/", get(profile))
        .route("/favorites/", get(favorites))
        .route("/reviews/", get(reviews))
        .route("/contact/", get(contact))
        .route("/media/{*path}", get(serve_media))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(security_headers))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn index() -> Result<impl IntoResponse, HttpError> {
    render_template(IndexPage)
}

async fn login() -> Result<impl IntoResponse, HttpError> {
    render_template(LoginPage)
}

async fn register() -> Result<impl IntoResponse, HttpError> {
    render_template(RegisterPage)
}

async fn properties() -> Result<impl IntoResponse, HttpError> {
    render_template(PropertiesPage)
}

async fn property_detail(Path(id): Path<Uuid>) -> Result<impl IntoResponse, HttpError> {
    render_template(PropertyDetailPage { property_id: id })
}

async fn profile() -> Result<impl IntoResponse, HttpError> {
    render_template(ProfilePage)
}

async fn favorites() -> Result<impl IntoResponse, HttpError> {
    render_template(FavoritesPage)
}

async fn reviews() -> Result<impl IntoResponse, HttpError> {
    render_template(ReviewsPage)
}

async fn contact() -> Result<impl IntoResponse, HttpError> {
    render_template(ContactPage)
}

async fn serve_media(
    State(state): State<PagesState>,
    Path(path): Path<String>,
) -> Result<Response, HttpError> {
    let data = state.media_storage.read(&path).await.map_err(|err| {
        HttpError::from_error(
            "infra::http::pages::serve_media",
            StatusCode::NOT_FOUND,
            "Media not found",
            &err,
        )
    })?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        data,
    )
        .into_response())
}

async fn health(State(state): State<PagesState>) -> Response {
    match state.db.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::pages::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
