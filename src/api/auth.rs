use axum::{
    Json,
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tower_sessions::Session;

use super::validation::validate_email;
use super::{ApiError, AppState, TokenDto};
use crate::domain::UserId;
use crate::entities::users;

const SESSION_USER_KEY: &str = "user_id";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The authenticated user, attached to the request by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub users::Model);

impl CurrentUser {
    #[must_use]
    pub const fn id(&self) -> UserId {
        UserId::new(self.0.id)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(ApiError::unauthenticated)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned())
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the caller from, in order:
/// 1. Session cookie (from login)
/// 2. `Authorization: Token <token>` header
/// 3. `Authorization: Bearer <token>` header
/// 4. `X-Api-Key` header
///
/// Anonymous requests pass through untouched; handlers that need a user
/// extract [`CurrentUser`] and get a 401 without one.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let auth = state.auth();

    let mut user = None;

    if let Ok(Some(user_id)) = session.get::<i32>(SESSION_USER_KEY).await {
        match auth.authenticate_session(UserId::new(user_id)).await {
            Ok(found) => user = found,
            Err(e) => tracing::warn!(error = %e, "Session lookup failed"),
        }
    }

    if user.is_none()
        && let Some(token) = extract_token(&headers)
    {
        match auth.authenticate_token(&token).await {
            Ok(Some(found)) => user = Some(found),
            Ok(None) => {
                return ApiError::Unauthorized("Invalid token".to_string()).into_response();
            }
            Err(e) => return ApiError::from(e).into_response(),
        }
    }

    if let Some(user) = user {
        tracing::Span::current().record("user_id", user.id);
        request.extensions_mut().insert(CurrentUser(user));
    }

    next.run(request).await
}

/// Extract a token from the request headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
    {
        if let Some(token) = auth_str.strip_prefix("Token ") {
            return Some(token.trim().to_string());
        }
        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    if let Some(api_key) = headers.get("X-Api-Key")
        && let Ok(key_str) = api_key.to_str()
    {
        return Some(key_str.trim().to_string());
    }

    None
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/token/login
/// Authenticate with email and password, returns the auth token
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenDto>, ApiError> {
    let email = validate_email(&payload.email)?;
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let result = state.auth().login(email, &payload.password).await?;

    if let Err(e) = session
        .insert(SESSION_USER_KEY, result.user_id.value())
        .await
    {
        return Err(ApiError::internal(format!("Failed to create session: {e}")));
    }

    Ok(Json(TokenDto {
        auth_token: result.auth_token,
    }))
}

/// POST /auth/token/logout
/// Revoke the token and end the session
pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: Session,
    user: CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.auth().logout(user.id()).await?;
    let _ = session.flush().await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn token_scheme_is_accepted() {
        let h = headers("authorization", "Token abc123");
        assert_eq!(extract_token(&h).as_deref(), Some("abc123"));
    }

    #[test]
    fn bearer_and_api_key_are_accepted() {
        let h = headers("authorization", "Bearer xyz");
        assert_eq!(extract_token(&h).as_deref(), Some("xyz"));

        let h = headers("x-api-key", "key-1");
        assert_eq!(extract_token(&h).as_deref(), Some("key-1"));
    }

    #[test]
    fn unknown_scheme_is_ignored() {
        let h = headers("authorization", "Basic dXNlcjpwYXNz");
        assert_eq!(extract_token(&h), None);
        assert_eq!(extract_token(&HeaderMap::new()), None);
    }
}
