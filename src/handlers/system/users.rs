// handlers/system/users.rs - /system/users handlers
//
// Self-protection: the authenticated user cannot delete, toggle or
// bulk-update their own account (422 with only a message).

use axum::extract::{
    rejection::{JsonRejection, PathRejection, QueryRejection},
    Path, Query, State,
};
use axum::Json;

use crate::database::models::UserStats;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::user_service::{
    UserBulkActionPayload, UserPayload, UserQuery, UserStatus, UserView,
};
use crate::services::{AuditContext, Page};
use crate::state::AppState;

/// GET /system/users - 15 per page, newest first
///
/// Query: `search` (name, email, phone), `status=active|inactive`, `role` (role name), `page`.
pub async fn users_index(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<Page<UserView>> {
    let Query(query) = query?;
    Ok(ApiResponse::bare(state.users.list(query).await?))
}

/// POST /system/users
///
/// ```json
/// { "name": "Ana", "email": "ana@example.com", "password": "Secret#123",
///   "password_confirmation": "Secret#123", "roles": [1] }
/// ```
pub async fn user_store(
    State(state): State<AppState>,
    ctx: AuditContext,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> ApiResult<UserView> {
    let Json(payload) = payload?;
    let user = state.users.create(&ctx, payload).await?;
    Ok(ApiResponse::created("User created successfully", user))
}

pub async fn user_show(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<UserView> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.users.show(id).await?))
}

/// PUT /system/users/:id - blank `password` keeps the current one, omitted `roles` keeps them
pub async fn user_update(
    State(state): State<AppState>,
    ctx: AuditContext,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> ApiResult<UserView> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let user = state.users.update(&ctx, id, payload).await?;
    Ok(ApiResponse::with_message("User updated successfully", user))
}

pub async fn user_delete(
    State(state): State<AppState>,
    ctx: AuditContext,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = id?;
    state.users.delete(&ctx, id).await?;
    Ok(ApiResponse::message("User deleted successfully"))
}

/// POST /system/users/:id/toggle-status
pub async fn user_toggle_status(
    State(state): State<AppState>,
    ctx: AuditContext,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<UserStatus> {
    let Path(id) = id?;
    let status = state.users.toggle_status(&ctx, id).await?;
    Ok(ApiResponse::with_message("User status updated successfully", status))
}

/// POST /system/users/bulk-action
///
/// ```json
/// { "action": "assign_role", "user_ids": [2, 3], "role_id": 1 }
/// ```
pub async fn users_bulk_action(
    State(state): State<AppState>,
    ctx: AuditContext,
    payload: Result<Json<UserBulkActionPayload>, JsonRejection>,
) -> ApiResult<()> {
    let Json(payload) = payload?;
    let message = state.users.bulk_action(&ctx, payload).await?;
    Ok(ApiResponse::message(message))
}

pub async fn users_stats(State(state): State<AppState>) -> ApiResult<UserStats> {
    Ok(ApiResponse::success(state.users.stats(chrono::Utc::now()).await?))
}
