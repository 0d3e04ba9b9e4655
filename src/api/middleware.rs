//! Authorization middleware. Both run before any handler logic.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::api::AppState;
use crate::services::Principal;
use crate::ShopError;

const BEARER_PREFIX: &str = "Bearer ";

/// Resolves the bearer token and stores the caller's [`Principal`] in the request extensions.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ShopError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .ok_or(ShopError::Unauthorized)?;

    let principal = state.identity.resolve(token.trim())?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Must be layered inside [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ShopError> {
    match request.extensions().get::<Principal>() {
        Some(principal) if principal.is_admin() => Ok(next.run(request).await),
        Some(principal) => {
            tracing::warn!(user_id = %principal.user_id, path = %request.uri().path(), "admin route refused");
            Err(ShopError::AdminRequired)
        }
        None => Err(ShopError::Unauthorized),
    }
}
