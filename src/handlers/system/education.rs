// handlers/system/education.rs - /system/education handlers

use axum::extract::{
    rejection::{JsonRejection, PathRejection, QueryRejection},
    Path, Query, State,
};
use axum::Json;
use serde_json::json;

use crate::database::models::Education;
use crate::middleware::{ApiResponse, ApiResult, JsonResult};
use crate::services::education_service::{BulkActionPayload, EducationPayload, EducationQuery};
use crate::services::{AuditContext, Page};
use crate::state::AppState;

/// GET /system/education - 15 per page
///
/// Query: `search` (titles and descriptions), `category`, `status=published|draft`, `page`.
pub async fn education_index(
    State(state): State<AppState>,
    query: Result<Query<EducationQuery>, QueryRejection>,
) -> ApiResult<Page<Education>> {
    let Query(query) = query?;
    let page = state.education.admin_list(query, chrono::Utc::now()).await?;
    Ok(ApiResponse::bare(page))
}

/// POST /system/education
pub async fn education_store(
    State(state): State<AppState>,
    ctx: AuditContext,
    payload: Result<Json<EducationPayload>, JsonRejection>,
) -> ApiResult<Education> {
    let Json(payload) = payload?;
    let education = state.education.create(&ctx, payload).await?;
    Ok(ApiResponse::created("Education content created successfully", education))
}

/// GET /system/education/:id
pub async fn education_show(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Education> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.education.show(id).await?))
}

/// PUT /system/education/:id
pub async fn education_update(
    State(state): State<AppState>,
    ctx: AuditContext,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<EducationPayload>, JsonRejection>,
) -> ApiResult<Education> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let education = state.education.update(&ctx, id, payload).await?;
    Ok(ApiResponse::with_message("Education content updated successfully", education))
}

/// DELETE /system/education/:id - soft delete
pub async fn education_delete(
    State(state): State<AppState>,
    ctx: AuditContext,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = id?;
    state.education.delete(&ctx, id).await?;
    Ok(ApiResponse::message("Education content deleted successfully"))
}

/// POST /system/education/bulk-action
///
/// ```json
/// { "action": "publish", "ids": [1, 2, 3] }
/// ```
pub async fn education_bulk_action(
    State(state): State<AppState>,
    payload: Result<Json<BulkActionPayload>, JsonRejection>,
) -> ApiResult<()> {
    let Json(payload) = payload?;
    let action = state.education.bulk_action(payload).await?;
    Ok(ApiResponse::message(action.message()))
}

/// POST /system/education/:id/view
pub async fn education_view(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> JsonResult {
    let Path(id) = id?;
    let view_count = state.education.increment_views(id).await?;
    Ok(ApiResponse::bare(json!({
        "message": "View count updated successfully",
        "view_count": view_count,
    })))
}
