// handlers/system/audit_log.rs - GET /system/audit-log, GET /system/audit-log/stats handlers

use axum::extract::{rejection::QueryRejection, Query, State};

use crate::database::models::AuditStats;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::audit_service::{AuditEntry, AuditQuery};
use crate::services::Page;
use crate::state::AppState;

/// GET /system/audit-log - newest first, filtered
///
/// Query: `auditable_type`, `event`, `date_from`, `date_to` (YYYY-MM-DD, inclusive),
/// `user_id`, `page`, `per_page` (5..=100, default 20).
pub async fn audit_index(
    State(state): State<AppState>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> ApiResult<Page<AuditEntry>> {
    let Query(query) = query?;
    Ok(ApiResponse::bare(state.audit.list(query).await?))
}

/// GET /system/audit-log/stats
pub async fn audit_stats(State(state): State<AppState>) -> ApiResult<AuditStats> {
    let stats = state.audit.stats(chrono::Utc::now()).await?;
    Ok(ApiResponse::success(stats))
}
