// handlers/system/configurations.rs - /system/configurations handlers

use axum::extract::{
    rejection::{JsonRejection, PathRejection},
    Path, State,
};
use axum::Json;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::configuration_service::{
    BulkConfigurationPayload, BulkResult, ConfigurationPayload, ConfigurationView, GroupedEntry,
};
use crate::services::AuditContext;
use crate::state::AppState;

/// GET /system/configurations - group → key → entry
pub async fn configurations_index(
    State(state): State<AppState>,
) -> ApiResult<BTreeMap<String, BTreeMap<String, GroupedEntry>>> {
    Ok(ApiResponse::success(state.configurations.grouped().await?))
}

/// GET /system/configurations/group/:group - key → typed value
pub async fn configurations_group(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> ApiResult<BTreeMap<String, Value>> {
    Ok(ApiResponse::success(state.configurations.by_group(&group).await?))
}

/// POST /system/configurations - upsert by key
pub async fn configuration_store(
    State(state): State<AppState>,
    ctx: AuditContext,
    payload: Result<Json<ConfigurationPayload>, JsonRejection>,
) -> ApiResult<ConfigurationView> {
    let Json(payload) = payload?;
    let saved = state.configurations.store(&ctx, payload).await?;
    Ok(ApiResponse::created("Configuration saved successfully", saved))
}

/// GET /system/configurations/:id
pub async fn configuration_show(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<ConfigurationView> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.configurations.show(id).await?))
}

/// PUT /system/configurations/:id
pub async fn configuration_update(
    State(state): State<AppState>,
    ctx: AuditContext,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ConfigurationPayload>, JsonRejection>,
) -> ApiResult<ConfigurationView> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let updated = state.configurations.update(&ctx, id, payload).await?;
    Ok(ApiResponse::with_message("Configuration updated successfully", updated))
}

/// DELETE /system/configurations/:id
pub async fn configuration_delete(
    State(state): State<AppState>,
    ctx: AuditContext,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = id?;
    state.configurations.delete(&ctx, id).await?;
    Ok(ApiResponse::message("Configuration deleted successfully"))
}

/// POST /system/configurations/bulk-update
pub async fn configurations_bulk_update(
    State(state): State<AppState>,
    ctx: AuditContext,
    payload: Result<Json<BulkConfigurationPayload>, JsonRejection>,
) -> ApiResult<Vec<BulkResult>> {
    let Json(payload) = payload?;
    let results = state.configurations.bulk_update(&ctx, payload).await?;
    Ok(ApiResponse::with_message("Configurations updated successfully", results))
}
