// handlers/public/education.rs - GET /education, GET /education/categories handlers

use axum::extract::{rejection::QueryRejection, Query, State};
use std::collections::BTreeMap;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::education_service::{EducationQuery, PublicArticle};
use crate::services::{EducationService, Page};
use crate::state::AppState;

/// GET /education - published articles, 12 per page
///
/// Query: `category`, `search` (titles), `lang=id|en` for a single-language projection, `page`.
pub async fn education_list(
    State(state): State<AppState>,
    query: Result<Query<EducationQuery>, QueryRejection>,
) -> ApiResult<Page<PublicArticle>> {
    let Query(query) = query?;
    let page = state.education.public_list(query, chrono::Utc::now()).await?;
    Ok(ApiResponse::bare(page))
}

/// GET /education/categories - slug → label
pub async fn education_categories() -> ApiResult<BTreeMap<&'static str, &'static str>> {
    Ok(ApiResponse::success(EducationService::categories()))
}
