// handlers/public/auth.rs - POST /register and POST /login

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::auth::IssuedToken;
use crate::database::models::UserSummary;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{LoginRequest, RegisterRequest};
use crate::state::AppState;

/// POST /register - Create an account while registration is open
///
/// Body: `{ "username", "password", "role": "admin" | "user" }`
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<UserSummary> {
    let Json(request) = payload?;
    let user = state.auth_service().register(&request).await?;
    Ok(ApiResponse::created(user))
}

/// POST /login - Exchange credentials for an access token
///
/// Returns `{ access_token, token_type: "Bearer", expires_in }`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<IssuedToken> {
    let Json(request) = payload?;
    let token = state.auth_service().login(&request).await?;
    Ok(ApiResponse::success(token))
}
