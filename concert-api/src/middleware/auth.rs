use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::{error::AppError, state::AppState};

/// Caller identity injected into request extensions once the bearer token checks out.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
}

// ============================================================================
// User Authentication Middleware
// ============================================================================

pub async fn user_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, req.headers()).await?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, req.headers()).await?;

    if !state.is_admin(&user.username) {
        tracing::warn!(username = %user.username, "Non-admin attempted an admin operation");
        return Err(AppError::AuthorizationError("Not permitted".to_string()));
    }

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthenticatedUser, AppError> {
    // 1. A request without the header is unauthenticated, not badly authenticated
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthenticated("Unauthenticated request".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::AuthenticationError("Bad authentication token".to_string()))?
        .trim();

    // 2. Look the token up and check its age
    let stored = state
        .users
        .find_token(token)
        .await?
        .ok_or_else(|| AppError::AuthenticationError("Bad authentication token".to_string()))?;

    if stored.is_expired(Utc::now(), state.token_ttl()) {
        return Err(AppError::AuthenticationError("Bad authentication token".to_string()));
    }

    Ok(AuthenticatedUser {
        username: stored.username,
    })
}
