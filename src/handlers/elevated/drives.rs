// handlers/elevated/drives.rs - POST /drives, PUT and DELETE /drives/:id

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::database::models::VaccinationDrive;
use crate::middleware::{ApiResponse, ApiResult};
use crate::rules::DriveCandidate;
use crate::state::AppState;

/// POST /drives - Schedule a drive
///
/// `classes` may be `"5,6"` or `["5", "6"]`. A future date needs 16 days of
/// lead time; a past date must come with `is_completed: true`.
pub async fn create_drive(
    State(state): State<AppState>,
    payload: Result<Json<DriveCandidate>, JsonRejection>,
) -> ApiResult<VaccinationDrive> {
    let Json(candidate) = payload?;
    let drive = state.drive_service().create(&candidate, state.today()).await?;
    Ok(ApiResponse::created(drive))
}

/// PUT /drives/:id - Change any subset of a drive's fields
pub async fn update_drive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<DriveCandidate>, JsonRejection>,
) -> ApiResult<VaccinationDrive> {
    let Json(candidate) = payload?;
    let drive = state.drive_service().update(&id, &candidate, state.today()).await?;
    Ok(ApiResponse::success(drive))
}

/// DELETE /drives/:id
pub async fn delete_drive(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let deleted = state.drive_service().delete(&id).await?;
    Ok(ApiResponse::success(json!({ "id": deleted, "deleted": true })))
}
