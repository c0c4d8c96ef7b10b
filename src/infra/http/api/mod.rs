pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
};

use crate::infra::http::middleware::{log_responses, security_headers, set_request_context};

pub fn build_api_router(state: ApiState, upload_body_limit: usize) -> Router {
    let auth_state = state.clone();
    let rate_state = state.clone();

    Router::new()
        .route("/api/v1/auth/register", post(handlers::register))
        .route("/api/v1/auth/token", post(handlers::login))
        .route("/api/v1/auth/token/refresh", post(handlers::refresh_token))
        .route("/api/v1/auth/password-reset", post(handlers::password_reset))
        .route(
            "/api/v1/auth/password-reset/confirm",
            post(handlers::password_reset_confirm),
        )
        .route(
            "/api/v1/users/me",
            get(handlers::profile)
                .patch(handlers::update_profile)
                .delete(handlers::delete_account),
        )
        .route(
            "/api/v1/properties",
            get(handlers::list_properties).post(handlers::create_property),
        )
        .route(
            "/api/v1/properties/featured",
            get(handlers::featured_properties),
        )
        .route("/api/v1/properties/stats", get(handlers::property_stats))
        .route(
            "/api/v1/properties/{id}",
            get(handlers::get_property)
                .patch(handlers::update_property)
                .delete(handlers::delete_property),
        )
        .route(
            "/api/v1/properties/{id}/images",
            post(handlers::upload_property_image),
        )
        .route(
            "/api/v1/properties/{id}/images/{image_id}",
            delete(handlers::delete_property_image),
        )
        .route("/api/v1/favorites", get(handlers::list_favorites))
        .route("/api/v1/favorites/toggle", post(handlers::toggle_favorite))
        .route("/api/v1/favorites/check", get(handlers::check_favorite))
        .route("/api/v1/favorites/{id}", delete(handlers::remove_favorite))
        .route(
            "/api/v1/reviews",
            get(handlers::list_reviews).post(handlers::create_review),
        )
        .route("/api/v1/reviews/mine", get(handlers::my_reviews))
        .route("/api/v1/reviews/stats", get(handlers::review_stats))
        .route(
            "/api/v1/reviews/{id}",
            axum::routing::patch(handlers::update_review).delete(handlers::delete_review),
        )
        .route(
            "/api/v1/reviews/{id}/like",
            post(handlers::toggle_review_like),
        )
        .route(
            "/api/v1/notifications",
            get(handlers::list_notifications).post(handlers::create_notification),
        )
        .route(
            "/api/v1/notifications/unread-count",
            get(handlers::unread_count),
        )
        .route("/api/v1/notifications/mark-read", post(handlers::mark_read))
        .route(
            "/api/v1/notifications/mark-all-read",
            post(handlers::mark_all_read),
        )
        .route(
            "/api/v1/notifications/{id}",
            get(handlers::get_notification).delete(handlers::delete_notification),
        )
        .route(
            "/api/v1/feedback",
            get(handlers::list_feedback).post(handlers::submit_feedback),
        )
        .route(
            "/api/v1/feedback/{id}/respond",
            post(handlers::respond_feedback),
        )
        .layer(DefaultBodyLimit::max(upload_body_limit))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            rate_state,
            middleware::api_rate_limit,
        ))
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::auth_context,
        ))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(security_headers))
        .layer(axum_middleware::from_fn(set_request_context))
}
