use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::application::auth::AuthPrincipal;

use super::error::ApiError;
use super::state::ApiState;

/// Resolve an optional bearer token into an [`AuthPrincipal`] extension.
///
/// Public endpoints tolerate anonymous callers, so a missing header passes
/// through as `None`; a header that is present but does not verify is
/// rejected outright.
pub async fn auth_context(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = extract_token(request.headers().get(axum::http::header::AUTHORIZATION));

    let principal: Option<AuthPrincipal> = match token {
        Some(token) => match state.users.authenticate(&token).await {
            Ok(principal) => Some(principal),
            Err(_) => return ApiError::unauthorized().into_response(),
        },
        None => None,
    };

    request.extensions_mut().insert(principal);
    next.run(request).await
}

pub async fn api_rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let key = request
        .extensions()
        .get::<Option<AuthPrincipal>>()
        .and_then(|principal| principal.as_ref())
        .map(|principal| principal.user_id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if !state.rate_limiter.allow(&key, &path) {
        return ApiError::rate_limited(state.rate_limiter.retry_after_secs());
    }

    next.run(request).await
}

fn extract_token(header: Option<&axum::http::HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?;
    Some(bearer.to_string())
}
