// handlers/system/menu.rs - /system/menu/items handlers

use axum::extract::{
    rejection::{JsonRejection, PathRejection},
    Path, State,
};
use axum::Json;

use crate::database::models::{MenuItem, MenuNode};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::menu_service::{MenuItemPayload, ReorderPayload};
use crate::services::AuditContext;
use crate::state::AppState;

/// GET /system/menu/items/all - active items, flat, in display order
pub async fn items_all(State(state): State<AppState>) -> ApiResult<Vec<MenuItem>> {
    Ok(ApiResponse::success(state.menu.all_active().await?))
}

/// POST /system/menu/items
pub async fn item_create(
    State(state): State<AppState>,
    ctx: AuditContext,
    payload: Result<Json<MenuItemPayload>, JsonRejection>,
) -> ApiResult<MenuNode> {
    let Json(payload) = payload?;
    let node = state.menu.create(&ctx, payload).await?;
    Ok(ApiResponse::created("Menu item created successfully", node))
}

/// GET /system/menu/items/:id - item with all children, inactive included
pub async fn item_show(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<MenuNode> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.menu.show(id).await?))
}

/// PUT /system/menu/items/:id
pub async fn item_update(
    State(state): State<AppState>,
    ctx: AuditContext,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<MenuItemPayload>, JsonRejection>,
) -> ApiResult<MenuNode> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let node = state.menu.update(&ctx, id, payload).await?;
    Ok(ApiResponse::with_message("Menu item updated successfully", node))
}

/// DELETE /system/menu/items/:id - removes the whole subtree
pub async fn item_delete(
    State(state): State<AppState>,
    ctx: AuditContext,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = id?;
    state.menu.delete(&ctx, id).await?;
    Ok(ApiResponse::message("Menu item deleted successfully"))
}

/// POST /system/menu/items/reorder
///
/// ```json
/// { "items": [ { "id": 3, "position": 0 }, { "id": 1, "position": 1 } ] }
/// ```
pub async fn items_reorder(
    State(state): State<AppState>,
    payload: Result<Json<ReorderPayload>, JsonRejection>,
) -> ApiResult<()> {
    let Json(payload) = payload?;
    state.menu.reorder(payload).await?;
    Ok(ApiResponse::message("Menu items reordered successfully"))
}
