// handlers/public/configurations.rs - GET /configurations/public handler

use axum::extract::State;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /configurations/public - key → typed value for public entries
pub async fn public_configurations(
    State(state): State<AppState>,
) -> ApiResult<BTreeMap<String, Value>> {
    let values = state.configurations.public().await?;
    Ok(ApiResponse::success(values))
}
