// handlers/elevated/analytics.rs - GET /analytics

use axum::extract::State;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::AnalyticsSummary;
use crate::state::AppState;

pub async fn analytics(State(state): State<AppState>) -> ApiResult<AnalyticsSummary> {
    let summary = state.analytics_service().summary(state.today()).await?;
    Ok(ApiResponse::success(summary))
}
