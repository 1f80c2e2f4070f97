// handlers/public/menu.rs - GET /menu-items handler

use axum::extract::State;

use crate::database::models::MenuNode;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /menu-items - active navigation tree
pub async fn menu_tree(State(state): State<AppState>) -> ApiResult<Vec<MenuNode>> {
    let tree = state.menu.tree().await?;
    Ok(ApiResponse::success(tree))
}
