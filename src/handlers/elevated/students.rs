// handlers/elevated/students.rs - /students routes

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    Json,
};

use crate::database::models::Student;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::rules::VaccinateRequest;
use crate::services::{BulkImportReport, NewStudentRequest, StudentPatch, StudentQuery};
use crate::state::AppState;

/// GET /students - List students, optionally by `class_grade` and `is_vaccinated`
pub async fn list_students(
    State(state): State<AppState>,
    query: Result<Query<StudentQuery>, QueryRejection>,
) -> ApiResult<Vec<Student>> {
    let Query(query) = query?;
    let students = state.student_service().list(&query).await?;
    Ok(ApiResponse::success(students))
}

/// POST /students - Add one unvaccinated student
pub async fn add_student(
    State(state): State<AppState>,
    payload: Result<Json<NewStudentRequest>, JsonRejection>,
) -> ApiResult<Student> {
    let Json(request) = payload?;
    let student = state.student_service().add(&request).await?;
    Ok(ApiResponse::created(student))
}

/// POST /students/bulk - CSV upload in multipart field `file`
pub async fn bulk_upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<BulkImportReport> {
    let mut csv = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            csv = Some(field.bytes().await?);
            break;
        }
    }
    let csv = csv.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let report = state.student_service().bulk_import(&csv).await?;
    Ok(ApiResponse::success(report))
}

/// PUT /students/:id - Update name, class_grade or student_id
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StudentPatch>, JsonRejection>,
) -> ApiResult<Student> {
    let Json(patch) = payload?;
    let student = state.student_service().update(&id, patch).await?;
    Ok(ApiResponse::success(student))
}

/// PUT /students/:id/vaccinate - Record a vaccination, once
pub async fn vaccinate_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<VaccinateRequest>, JsonRejection>,
) -> ApiResult<Student> {
    let Json(request) = payload?;
    let student = state.student_service().vaccinate(&id, &request).await?;
    Ok(ApiResponse::success(student))
}
