// handlers/system/permissions.rs - /system/roles-permissions/permissions handlers

use axum::extract::{
    rejection::{JsonRejection, PathRejection},
    Path, State,
};
use axum::Json;

use crate::database::models::Permission;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::role_service::PermissionPayload;
use crate::services::AuditContext;
use crate::state::AppState;

/// GET /system/roles-permissions/permissions - ordered by group, then name
pub async fn permissions_index(State(state): State<AppState>) -> ApiResult<Vec<Permission>> {
    Ok(ApiResponse::success(state.roles.list_permissions().await?))
}

pub async fn permission_store(
    State(state): State<AppState>,
    ctx: AuditContext,
    payload: Result<Json<PermissionPayload>, JsonRejection>,
) -> ApiResult<Permission> {
    let Json(payload) = payload?;
    let permission = state.roles.create_permission(&ctx, payload).await?;
    Ok(ApiResponse::created("Permission created successfully", permission))
}

pub async fn permission_show(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Permission> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.roles.show_permission(id).await?))
}

pub async fn permission_update(
    State(state): State<AppState>,
    ctx: AuditContext,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<PermissionPayload>, JsonRejection>,
) -> ApiResult<Permission> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let permission = state.roles.update_permission(&ctx, id, payload).await?;
    Ok(ApiResponse::with_message("Permission updated successfully", permission))
}

/// DELETE /system/roles-permissions/permissions/:id - also detaches it from roles
pub async fn permission_delete(
    State(state): State<AppState>,
    ctx: AuditContext,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = id?;
    state.roles.delete_permission(&ctx, id).await?;
    Ok(ApiResponse::message("Permission deleted successfully"))
}
