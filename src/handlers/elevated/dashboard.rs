// handlers/elevated/dashboard.rs - GET /admin/dashboard

use axum::Extension;
use serde_json::{json, Value};

use crate::auth::DecodedClaim;
use crate::middleware::{ApiResponse, ApiResult};

pub async fn dashboard(Extension(claim): Extension<DecodedClaim>) -> ApiResult<Value> {
    let username = claim.map(|c| c.username).unwrap_or_default();
    Ok(ApiResponse::success(json!({
        "message": "Welcome Admin!",
        "username": username
    })))
}
