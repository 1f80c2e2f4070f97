use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::collections::HashSet;

use super::{like_pattern, PgStore};
use crate::database::manager::DatabaseError;
use crate::database::models::{
    Category, Education, EducationFilter, EducationInput, EducationStatus,
};
use crate::database::repository::EducationRepository;

const EDUCATION_COLUMNS: &str = "id, title_id, title_en, description_id, description_en, \
     content_id, content_en, image, category, tags, is_published, published_at, meta_title_id, \
     meta_title_en, meta_description_id, meta_description_en, sort_order, view_count, \
     deleted_at, created_at, updated_at";

#[derive(FromRow)]
struct EducationRow {
    id: i64,
    title_id: Option<String>,
    title_en: Option<String>,
    description_id: Option<String>,
    description_en: Option<String>,
    content_id: Option<String>,
    content_en: Option<String>,
    image: Option<String>,
    category: String,
    tags: Json<Vec<String>>,
    is_published: bool,
    published_at: Option<DateTime<Utc>>,
    meta_title_id: Option<String>,
    meta_title_en: Option<String>,
    meta_description_id: Option<String>,
    meta_description_en: Option<String>,
    sort_order: i32,
    view_count: i32,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EducationRow> for Education {
    type Error = DatabaseError;

    fn try_from(row: EducationRow) -> Result<Self, Self::Error> {
        let category = Category::parse(&row.category).ok_or_else(|| {
            DatabaseError::QueryError(format!("unknown education category '{}'", row.category))
        })?;
        Ok(Education {
            id: row.id,
            title_id: row.title_id,
            title_en: row.title_en,
            description_id: row.description_id,
            description_en: row.description_en,
            content_id: row.content_id,
            content_en: row.content_en,
            image: row.image,
            category,
            tags: row.tags.0,
            is_published: row.is_published,
            published_at: row.published_at,
            meta_title_id: row.meta_title_id,
            meta_title_en: row.meta_title_en,
            meta_description_id: row.meta_description_id,
            meta_description_en: row.meta_description_en,
            sort_order: row.sort_order,
            view_count: row.view_count,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_education_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &EducationFilter) {
    builder.push(" WHERE deleted_at IS NULL");
    if let Some(category) = filter.category {
        builder.push(" AND category = ").push_bind(category.as_str());
    }
    match filter.status {
        Some(EducationStatus::Published) => {
            builder
                .push(" AND is_published AND published_at IS NOT NULL AND published_at <= ")
                .push_bind(filter.now);
        }
        Some(EducationStatus::Draft) => {
            builder.push(" AND NOT is_published");
        }
        None => {}
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        let columns: &[&str] = if filter.search_descriptions {
            &["title_id", "title_en", "description_id", "description_en"]
        } else {
            &["title_id", "title_en"]
        };
        builder.push(" AND (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder
                .push(*column)
                .push(" ILIKE ")
                .push_bind(pattern.clone());
        }
        builder.push(")");
    }
}

fn convert(rows: Vec<EducationRow>) -> Result<Vec<Education>, DatabaseError> {
    rows.into_iter().map(Education::try_from).collect()
}

#[async_trait]
impl EducationRepository for PgStore {
    async fn list_education(
        &self,
        filter: &EducationFilter,
    ) -> Result<(Vec<Education>, i64), DatabaseError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM education");
        push_education_filter(&mut count, filter);
        let (total,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(self.pool())
            .await?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM education", EDUCATION_COLUMNS));
        push_education_filter(&mut select, filter);
        if filter.order_by_published {
            select.push(" ORDER BY sort_order ASC, published_at DESC NULLS LAST, id DESC");
        } else {
            select.push(" ORDER BY sort_order ASC, created_at DESC, id DESC");
        }
        select
            .push(" LIMIT ")
            .push_bind(i64::from(filter.per_page))
            .push(" OFFSET ")
            .push_bind(filter.offset() as i64);
        let rows = select
            .build_query_as::<EducationRow>()
            .fetch_all(self.pool())
            .await?;

        Ok((convert(rows)?, total))
    }

    async fn find_education(&self, id: i64) -> Result<Option<Education>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM education WHERE id = $1 AND deleted_at IS NULL",
            EDUCATION_COLUMNS
        );
        sqlx::query_as::<_, EducationRow>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .map(Education::try_from)
            .transpose()
    }

    async fn existing_education_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT id FROM education WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn create_education(&self, input: &EducationInput) -> Result<Education, DatabaseError> {
        let query = format!(
            "INSERT INTO education (title_id, title_en, description_id, description_en, \
             content_id, content_en, image, category, tags, is_published, published_at, \
             meta_title_id, meta_title_en, meta_description_id, meta_description_en, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {}",
            EDUCATION_COLUMNS
        );
        let row = sqlx::query_as::<_, EducationRow>(&query)
            .bind(&input.title_id)
            .bind(&input.title_en)
            .bind(&input.description_id)
            .bind(&input.description_en)
            .bind(&input.content_id)
            .bind(&input.content_en)
            .bind(&input.image)
            .bind(input.category.as_str())
            .bind(Json(&input.tags))
            .bind(input.is_published)
            .bind(input.published_at)
            .bind(&input.meta_title_id)
            .bind(&input.meta_title_en)
            .bind(&input.meta_description_id)
            .bind(&input.meta_description_en)
            .bind(input.sort_order)
            .fetch_one(self.pool())
            .await?;
        row.try_into()
    }

    async fn update_education(
        &self,
        id: i64,
        input: &EducationInput,
    ) -> Result<Option<Education>, DatabaseError> {
        let query = format!(
            "UPDATE education SET title_id = $2, title_en = $3, description_id = $4, \
             description_en = $5, content_id = $6, content_en = $7, image = $8, category = $9, \
             tags = $10, is_published = $11, published_at = $12, meta_title_id = $13, \
             meta_title_en = $14, meta_description_id = $15, meta_description_en = $16, \
             sort_order = $17, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            EDUCATION_COLUMNS
        );
        sqlx::query_as::<_, EducationRow>(&query)
            .bind(id)
            .bind(&input.title_id)
            .bind(&input.title_en)
            .bind(&input.description_id)
            .bind(&input.description_en)
            .bind(&input.content_id)
            .bind(&input.content_en)
            .bind(&input.image)
            .bind(input.category.as_str())
            .bind(Json(&input.tags))
            .bind(input.is_published)
            .bind(input.published_at)
            .bind(&input.meta_title_id)
            .bind(&input.meta_title_en)
            .bind(&input.meta_description_id)
            .bind(&input.meta_description_en)
            .bind(input.sort_order)
            .fetch_optional(self.pool())
            .await?
            .map(Education::try_from)
            .transpose()
    }

    async fn soft_delete_education(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        Ok(self.soft_delete_education_many(&[id], now).await? > 0)
    }

    async fn publish_education(
        &self,
        ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE education SET is_published = TRUE, published_at = $2, updated_at = $2 \
             WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(ids)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn unpublish_education(&self, ids: &[i64]) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE education SET is_published = FALSE, updated_at = NOW() \
             WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(ids)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn soft_delete_education_many(
        &self,
        ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE education SET deleted_at = $2 WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(ids)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn increment_education_views(&self, id: i64) -> Result<Option<i32>, DatabaseError> {
        let row = sqlx::query_as::<_, (i32,)>(
            "UPDATE education SET view_count = view_count + 1 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING view_count",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(count,)| count))
    }
}
