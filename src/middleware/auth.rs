use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::{authorize, DecodedClaim, Decision, Role};
use crate::error::ApiError;
use crate::services::ServiceError;
use crate::state::AppState;

/// Verify the bearer token and attach its `DecodedClaim` to the request.
/// Untrusted tokens stop here with 401; whether the claim itself is usable
/// is left to `require_role`.
pub async fn authenticate(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&headers).map_err(|msg| {
        tracing::warn!("Rejected request to {}: {}", request.uri().path(), msg);
        ApiError::unauthorized(msg)
    })?;

    let claim: DecodedClaim = state.tokens.verify(token).map_err(|e| {
        tracing::warn!("Rejected token on {}: {}", request.uri().path(), e);
        ApiError::from(e)
    })?;

    request.extensions_mut().insert(claim);
    Ok(next.run(request).await)
}

/// Allow the request only when the attached claim holds `required`
pub async fn require_role(State(required): State<Role>, request: Request, next: Next) -> Result<Response, ApiError> {
    let decision = match request.extensions().get::<DecodedClaim>() {
        Some(claim) => authorize(claim, required),
        None => return Err(ApiError::unauthorized("Missing Authorization header")),
    };

    match decision {
        Decision::Allow => Ok(next.run(request).await),
        Decision::Deny(reason) => {
            tracing::warn!("Denied {} to {}: {}", required, request.uri().path(), reason.message());
            Err(ServiceError::from(reason).into())
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err("Empty bearer token"),
        None => Err("Authorization header must use Bearer token format"),
    }
}
