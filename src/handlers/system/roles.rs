// handlers/system/roles.rs - /system/roles-permissions/roles handlers

use axum::extract::{
    rejection::{JsonRejection, PathRejection},
    Path, State,
};
use axum::Json;

use crate::database::models::RoleWithPermissions;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::role_service::RolePayload;
use crate::services::AuditContext;
use crate::state::AppState;

/// GET /system/roles-permissions/roles - every role with its permissions
pub async fn roles_index(State(state): State<AppState>) -> ApiResult<Vec<RoleWithPermissions>> {
    Ok(ApiResponse::success(state.roles.list_roles().await?))
}

/// POST /system/roles-permissions/roles
///
/// ```json
/// { "name": "editor", "display_name": "Editor", "permissions": [1, 2] }
/// ```
pub async fn role_store(
    State(state): State<AppState>,
    ctx: AuditContext,
    payload: Result<Json<RolePayload>, JsonRejection>,
) -> ApiResult<RoleWithPermissions> {
    let Json(payload) = payload?;
    let role = state.roles.create_role(&ctx, payload).await?;
    Ok(ApiResponse::created("Role created successfully", role))
}

pub async fn role_show(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<RoleWithPermissions> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.roles.show_role(id).await?))
}

/// PUT /system/roles-permissions/roles/:id - omitted `permissions` detaches all
pub async fn role_update(
    State(state): State<AppState>,
    ctx: AuditContext,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<RolePayload>, JsonRejection>,
) -> ApiResult<RoleWithPermissions> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let role = state.roles.update_role(&ctx, id, payload).await?;
    Ok(ApiResponse::with_message("Role updated successfully", role))
}

pub async fn role_delete(
    State(state): State<AppState>,
    ctx: AuditContext,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = id?;
    state.roles.delete_role(&ctx, id).await?;
    Ok(ApiResponse::message("Role deleted successfully"))
}
