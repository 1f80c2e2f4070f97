use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::{AuditContext, AuditService, Page, ServiceError};
use crate::database::models::configuration::loose_bool;
use crate::database::models::{
    Category, Education, EducationFilter, EducationInput, EducationStatus,
};
use crate::database::Store;
use crate::validation::{check, deserialize_id_list, normalize, FieldErrors};

pub const PUBLIC_PER_PAGE: u32 = 12;
pub const ADMIN_PER_PAGE: u32 = 15;
pub const BILINGUAL_KEY: &str = "bilingual_enabled";

const NOT_FOUND: &str = "Education content not found.";

/// Create/update body; English fields only count in bilingual mode
#[derive(Debug, Default, Deserialize, Validate)]
pub struct EducationPayload {
    #[validate(
        required(message = "The title id field is required."),
        length(max = 255, message = "The title id field must not be greater than 255 characters.")
    )]
    pub title_id: Option<String>,
    pub title_en: Option<String>,
    pub description_id: Option<String>,
    pub description_en: Option<String>,
    pub content_id: Option<String>,
    pub content_en: Option<String>,
    #[validate(length(max = 60, message = "The meta title id field must not be greater than 60 characters."))]
    pub meta_title_id: Option<String>,
    pub meta_title_en: Option<String>,
    #[validate(length(
        max = 160,
        message = "The meta description id field must not be greater than 160 characters."
    ))]
    pub meta_description_id: Option<String>,
    pub meta_description_en: Option<String>,
    #[validate(length(max = 255, message = "The image field must not be greater than 255 characters."))]
    pub image: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_published: Option<bool>,
    pub published_at: Option<String>,
    #[validate(range(min = 0, message = "The sort order field must be at least 0."))]
    pub sort_order: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EducationQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub lang: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkActionPayload {
    pub action: Option<String>,
    #[serde(default, deserialize_with = "deserialize_id_list")]
    pub ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Id,
    En,
}

impl Language {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "id" => Some(Language::Id),
            "en" => Some(Language::En),
            _ => None,
        }
    }

    fn pick(self, id: &Option<String>, en: &Option<String>) -> Option<String> {
        match self {
            Language::Id => id.clone(),
            Language::En => en.clone(),
        }
    }
}

/// Single-language view of an article for public consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalizedEducation {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub image: Option<String>,
    pub category: Category,
    pub category_label: &'static str,
    pub tags: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: i32,
    pub sort_order: i32,
}

impl LocalizedEducation {
    pub fn new(item: &Education, lang: Language) -> Self {
        Self {
            id: item.id,
            title: lang.pick(&item.title_id, &item.title_en),
            description: lang.pick(&item.description_id, &item.description_en),
            content: lang.pick(&item.content_id, &item.content_en),
            meta_title: lang.pick(&item.meta_title_id, &item.meta_title_en),
            meta_description: lang.pick(&item.meta_description_id, &item.meta_description_en),
            image: item.image.clone(),
            category: item.category,
            category_label: item.category.label(),
            tags: item.tags.clone(),
            published_at: item.published_at,
            view_count: item.view_count,
            sort_order: item.sort_order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PublicArticle {
    Full(Education),
    Localized(LocalizedEducation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Publish,
    Unpublish,
    Delete,
}

impl BulkAction {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "publish" => Some(BulkAction::Publish),
            "unpublish" => Some(BulkAction::Unpublish),
            "delete" => Some(BulkAction::Delete),
            _ => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            BulkAction::Publish => "Education content published successfully",
            BulkAction::Unpublish => "Education content unpublished successfully",
            BulkAction::Delete => "Education content deleted successfully",
        }
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` or a bare date (midnight UTC)
pub fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(at.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

fn max_chars(errors: &mut FieldErrors, field: &str, value: &Option<String>, max: usize) {
    if value.as_ref().is_some_and(|v| v.chars().count() > max) {
        errors.add(
            field,
            format!(
                "The {} field must not be greater than {} characters.",
                field.replace('_', " "),
                max
            ),
        );
    }
}

#[derive(Clone)]
pub struct EducationService {
    store: Arc<dyn Store>,
    audit: AuditService,
}

impl EducationService {
    pub fn new(store: Arc<dyn Store>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    /// Current value of the `bilingual_enabled` configuration key
    pub async fn bilingual_enabled(&self) -> Result<bool, ServiceError> {
        Ok(self
            .store
            .find_configuration_by_key(BILINGUAL_KEY)
            .await?
            .is_some_and(|c| loose_bool(&c.value)))
    }

    pub fn categories() -> BTreeMap<&'static str, &'static str> {
        Category::ALL.iter().map(|c| (c.as_str(), c.label())).collect()
    }

    /// Published articles, optionally projected into one language
    pub async fn public_list(
        &self,
        query: EducationQuery,
        now: DateTime<Utc>,
    ) -> Result<Page<PublicArticle>, ServiceError> {
        let lang = match normalize(query.lang) {
            Some(raw) => Some(
                Language::parse(&raw)
                    .ok_or_else(|| ServiceError::field("lang", "The selected lang is invalid."))?,
            ),
            None => None,
        };
        let page = query.page.unwrap_or(1).max(1);
        let Some(category) = Self::category_filter(query.category) else {
            return Ok(Page::new(Vec::new(), page, PUBLIC_PER_PAGE, 0));
        };

        let filter = EducationFilter {
            search: normalize(query.search),
            search_descriptions: false,
            category,
            status: Some(EducationStatus::Published),
            order_by_published: true,
            now,
            page,
            per_page: PUBLIC_PER_PAGE,
        };
        let (items, total) = self.store.list_education(&filter).await?;
        let page = Page::new(items, page, PUBLIC_PER_PAGE, total);
        Ok(page.map(|item| match lang {
            Some(lang) => PublicArticle::Localized(LocalizedEducation::new(&item, lang)),
            None => PublicArticle::Full(item),
        }))
    }

    /// Back-office listing; unknown status values are ignored
    pub async fn admin_list(
        &self,
        query: EducationQuery,
        now: DateTime<Utc>,
    ) -> Result<Page<Education>, ServiceError> {
        let page = query.page.unwrap_or(1).max(1);
        let Some(category) = Self::category_filter(query.category) else {
            return Ok(Page::new(Vec::new(), page, ADMIN_PER_PAGE, 0));
        };
        let status = match normalize(query.status).as_deref() {
            Some("published") => Some(EducationStatus::Published),
            Some("draft") => Some(EducationStatus::Draft),
            _ => None,
        };

        let filter = EducationFilter {
            search: normalize(query.search),
            search_descriptions: true,
            category,
            status,
            order_by_published: false,
            now,
            page,
            per_page: ADMIN_PER_PAGE,
        };
        let (items, total) = self.store.list_education(&filter).await?;
        Ok(Page::new(items, page, ADMIN_PER_PAGE, total))
    }

    /// `None` when a category was given that can never match
    fn category_filter(raw: Option<String>) -> Option<Option<Category>> {
        match normalize(raw) {
            Some(raw) => Category::parse(&raw).map(Some),
            None => Some(None),
        }
    }

    pub async fn show(&self, id: i64) -> Result<Education, ServiceError> {
        self.store
            .find_education(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.to_string()))
    }

    pub async fn create(
        &self,
        ctx: &AuditContext,
        payload: EducationPayload,
    ) -> Result<Education, ServiceError> {
        let bilingual = self.bilingual_enabled().await?;
        let input = Self::validate(payload, bilingual, None, Utc::now())?;
        let education = self.store.create_education(&input).await?;
        info!(id = education.id, category = education.category.as_str(), "Education content created");
        self.audit.record_created(ctx, &education).await?;
        Ok(education)
    }

    pub async fn update(
        &self,
        ctx: &AuditContext,
        id: i64,
        payload: EducationPayload,
    ) -> Result<Education, ServiceError> {
        let existing = self.show(id).await?;
        let bilingual = self.bilingual_enabled().await?;
        let input = Self::validate(payload, bilingual, Some(&existing), Utc::now())?;
        let updated = self
            .store
            .update_education(id, &input)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.to_string()))?;
        self.audit.record_updated(ctx, &existing, &updated).await?;
        Ok(updated)
    }

    pub async fn delete(&self, ctx: &AuditContext, id: i64) -> Result<(), ServiceError> {
        let existing = self.show(id).await?;
        if !self.store.soft_delete_education(id, Utc::now()).await? {
            return Err(ServiceError::NotFound(NOT_FOUND.to_string()));
        }
        info!(id, "Education content deleted");
        self.audit.record_deleted(ctx, &existing).await?;
        Ok(())
    }

    /// Applies one action to every id; all ids must exist
    pub async fn bulk_action(&self, payload: BulkActionPayload) -> Result<BulkAction, ServiceError> {
        let mut errors = FieldErrors::new();
        let action = match normalize(payload.action) {
            None => {
                errors.add("action", "The action field is required.");
                None
            }
            Some(raw) => {
                let action = BulkAction::parse(&raw);
                if action.is_none() {
                    errors.add("action", "The selected action is invalid.");
                }
                action
            }
        };
        let ids = payload.ids.unwrap_or_default();
        if ids.is_empty() {
            errors.add("ids", "The ids field is required.");
        }
        let existing = self.store.existing_education_ids(&ids).await?;
        for (index, id) in ids.iter().enumerate() {
            if !existing.contains(id) {
                errors.add(format!("ids.{}", index), format!("The selected ids.{} is invalid.", index));
            }
        }
        errors.into_result()?;
        let Some(action) = action else {
            return Err(ServiceError::field("action", "The action field is required."));
        };

        let now = Utc::now();
        let affected = match action {
            BulkAction::Publish => self.store.publish_education(&ids, now).await?,
            BulkAction::Unpublish => self.store.unpublish_education(&ids).await?,
            BulkAction::Delete => self.store.soft_delete_education_many(&ids, now).await?,
        };
        info!(?action, affected, "Education bulk action applied");
        Ok(action)
    }

    pub async fn increment_views(&self, id: i64) -> Result<i32, ServiceError> {
        self.store
            .increment_education_views(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.to_string()))
    }

    /// Absent flags, tags, image, order and date keep stored values on update
    fn validate(
        payload: EducationPayload,
        bilingual: bool,
        existing: Option<&Education>,
        now: DateTime<Utc>,
    ) -> Result<EducationInput, ServiceError> {
        let payload = EducationPayload {
            title_id: normalize(payload.title_id),
            title_en: normalize(payload.title_en),
            description_id: normalize(payload.description_id),
            description_en: normalize(payload.description_en),
            content_id: normalize(payload.content_id),
            content_en: normalize(payload.content_en),
            meta_title_id: normalize(payload.meta_title_id),
            meta_title_en: normalize(payload.meta_title_en),
            meta_description_id: normalize(payload.meta_description_id),
            meta_description_en: normalize(payload.meta_description_en),
            image: normalize(payload.image),
            category: normalize(payload.category),
            published_at: normalize(payload.published_at),
            ..payload
        };
        let mut errors = check(&payload);

        if bilingual {
            if payload.title_en.is_none() {
                errors.add("title_en", "The title en field is required.");
            }
            max_chars(&mut errors, "title_en", &payload.title_en, 255);
            max_chars(&mut errors, "meta_title_en", &payload.meta_title_en, 60);
            max_chars(&mut errors, "meta_description_en", &payload.meta_description_en, 160);
        }

        let category = match &payload.category {
            None => {
                errors.add("category", "The category field is required.");
                None
            }
            Some(raw) => {
                let category = Category::parse(raw);
                if category.is_none() {
                    errors.add("category", "The selected category is invalid.");
                }
                category
            }
        };

        let published_at = match &payload.published_at {
            Some(raw) => {
                let parsed = parse_published_at(raw);
                if parsed.is_none() {
                    errors.add("published_at", "The published at field must be a valid date.");
                }
                parsed
            }
            None => existing.and_then(|e| e.published_at),
        };
        errors.into_result()?;
        let Some(category) = category else {
            return Err(ServiceError::field("category", "The category field is required."));
        };

        let is_published = payload
            .is_published
            .unwrap_or_else(|| existing.is_some_and(|e| e.is_published));
        let published_at = match published_at {
            None if is_published => Some(now),
            other => other,
        };
        let sort_order = match payload.sort_order {
            Some(order) => i32::try_from(order).unwrap_or(i32::MAX),
            None => existing.map_or(0, |e| e.sort_order),
        };
        let tags = payload
            .tags
            .map(|tags| tags.into_iter().filter_map(|t| normalize(Some(t))).collect())
            .unwrap_or_else(|| existing.map(|e| e.tags.clone()).unwrap_or_default());
        let image = payload
            .image
            .or_else(|| existing.and_then(|e| e.image.clone()));

        let english = |given: Option<String>, stored: fn(&Education) -> &Option<String>| {
            if bilingual {
                given
            } else {
                existing.and_then(|e| stored(e).clone())
            }
        };

        Ok(EducationInput {
            title_id: payload.title_id,
            title_en: english(payload.title_en, |e| &e.title_en),
            description_id: payload.description_id,
            description_en: english(payload.description_en, |e| &e.description_en),
            content_id: payload.content_id,
            content_en: english(payload.content_en, |e| &e.content_en),
            image,
            category,
            tags,
            is_published,
            published_at,
            meta_title_id: payload.meta_title_id,
            meta_title_en: english(payload.meta_title_en, |e| &e.meta_title_en),
            meta_description_id: payload.meta_description_id,
            meta_description_en: english(payload.meta_description_en, |e| &e.meta_description_en),
            sort_order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{ConfigGroup, ConfigType, ConfigurationInput};
    use crate::database::MemoryStore;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    async fn service(bilingual: bool) -> EducationService {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        store
            .upsert_configuration(&ConfigurationInput {
                key: BILINGUAL_KEY.into(),
                value: json!(bilingual),
                config_type: ConfigType::Boolean,
                group: ConfigGroup::Language,
                description: None,
                is_public: true,
            })
            .await
            .unwrap();
        let audit = AuditService::new(store.clone(), true);
        EducationService::new(store, audit)
    }

    fn article(title: &str, category: &str) -> EducationPayload {
        EducationPayload {
            title_id: Some(title.into()),
            category: Some(category.into()),
            ..Default::default()
        }
    }

    fn validation(err: ServiceError) -> FieldErrors {
        match err {
            ServiceError::Validation(errors) => errors,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn published_at_accepts_common_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 7, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_published_at("2025-07-01T08:30:00Z"), Some(expected));
        assert_eq!(parse_published_at("2025-07-01 08:30:00"), Some(expected));
        assert_eq!(
            parse_published_at("2025-07-01"),
            Some(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_published_at("next tuesday"), None);
    }

    #[tokio::test]
    async fn english_title_required_only_in_bilingual_mode() {
        let ctx = AuditContext::default();
        let errors = validation(
            service(true).await.create(&ctx, article("Panduan", "guide")).await.unwrap_err(),
        );
        assert_eq!(errors.get("title_en"), Some("The title en field is required."));

        let monolingual = service(false).await;
        let created = monolingual
            .create(&ctx, EducationPayload {
                title_en: Some("Guide".into()),
                ..article("Panduan", "guide")
            })
            .await
            .unwrap();
        assert_eq!(created.title_en, None);
    }

    #[tokio::test]
    async fn category_and_meta_lengths_are_checked() {
        let ctx = AuditContext::default();
        let errors = validation(
            service(false)
                .await
                .create(&ctx, EducationPayload {
                    meta_title_id: Some("x".repeat(61)),
                    ..article("Judul", "recipes")
                })
                .await
                .unwrap_err(),
        );
        assert_eq!(errors.get("category"), Some("The selected category is invalid."));
        assert!(errors.contains("meta_title_id"));
    }

    #[tokio::test]
    async fn publishing_stamps_published_at_once() {
        let education = service(false).await;
        let ctx = AuditContext::default();
        let draft = education.create(&ctx, article("Draf", "news")).await.unwrap();
        assert_eq!(draft.published_at, None);

        let published = education
            .update(&ctx, draft.id, EducationPayload {
                is_published: Some(true),
                ..article("Draf", "news")
            })
            .await
            .unwrap();
        let stamped = published.published_at.expect("published_at stamped");

        let again = education
            .update(&ctx, draft.id, article("Draf lagi", "news"))
            .await
            .unwrap();
        assert!(again.is_published);
        assert_eq!(again.published_at, Some(stamped));
    }

    #[tokio::test]
    async fn public_listing_hides_drafts_and_future_articles() {
        let education = service(true).await;
        let ctx = AuditContext::default();
        let now = Utc::now();
        let visible = education
            .create(&ctx, EducationPayload {
                title_en: Some("Visible".into()),
                is_published: Some(true),
                ..article("Terlihat", "tips")
            })
            .await
            .unwrap();
        education
            .create(&ctx, EducationPayload {
                title_en: Some("Draft".into()),
                ..article("Draf", "tips")
            })
            .await
            .unwrap();
        education
            .create(&ctx, EducationPayload {
                title_en: Some("Later".into()),
                is_published: Some(true),
                published_at: Some((now + Duration::days(3)).to_rfc3339()),
                ..article("Nanti", "tips")
            })
            .await
            .unwrap();

        let page = education
            .public_list(EducationQuery { lang: Some("en".into()), ..Default::default() }, now + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.per_page, PUBLIC_PER_PAGE);
        match &page.data[0] {
            PublicArticle::Localized(item) => {
                assert_eq!(item.id, visible.id);
                assert_eq!(item.title.as_deref(), Some("Visible"));
                assert_eq!(item.category_label, "Tips & Tricks");
            }
            other => panic!("expected localized article, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bulk_action_requires_existing_ids() {
        let education = service(false).await;
        let ctx = AuditContext::default();
        let item = education.create(&ctx, article("Satu", "tutorial")).await.unwrap();

        let errors = validation(
            education
                .bulk_action(BulkActionPayload {
                    action: Some("archive".into()),
                    ids: Some(vec![item.id, 99]),
                })
                .await
                .unwrap_err(),
        );
        assert_eq!(errors.get("action"), Some("The selected action is invalid."));
        assert_eq!(errors.get("ids.1"), Some("The selected ids.1 is invalid."));

        let action = education
            .bulk_action(BulkActionPayload {
                action: Some("publish".into()),
                ids: Some(vec![item.id]),
            })
            .await
            .unwrap();
        assert_eq!(action.message(), "Education content published successfully");
        assert!(education.show(item.id).await.unwrap().is_published);
    }

    #[tokio::test]
    async fn deleted_articles_disappear_and_views_count_up() {
        let education = service(false).await;
        let ctx = AuditContext::default();
        let item = education.create(&ctx, article("Satu", "tutorial")).await.unwrap();

        assert_eq!(education.increment_views(item.id).await.unwrap(), 1);
        assert_eq!(education.increment_views(item.id).await.unwrap(), 2);

        education.delete(&ctx, item.id).await.unwrap();
        assert!(matches!(education.show(item.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(
            education.increment_views(item.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
