// handlers/protected/drives.rs - GET /drives

use axum::extract::State;

use crate::database::models::VaccinationDrive;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /drives - All drives, ordered by creation
pub async fn list_drives(State(state): State<AppState>) -> ApiResult<Vec<VaccinationDrive>> {
    let drives = state.drive_service().list().await?;
    Ok(ApiResponse::success(drives))
}
