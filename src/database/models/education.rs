use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::audit::Auditable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tutorial,
    Guide,
    Tips,
    News,
    Announcement,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Tutorial,
        Category::Guide,
        Category::Tips,
        Category::News,
        Category::Announcement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tutorial => "tutorial",
            Category::Guide => "guide",
            Category::Tips => "tips",
            Category::News => "news",
            Category::Announcement => "announcement",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Tutorial => "Tutorial",
            Category::Guide => "Guide",
            Category::Tips => "Tips & Tricks",
            Category::News => "News",
            Category::Announcement => "Announcement",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

/// Bilingual article; `*_id` fields are Indonesian, `*_en` English
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Education {
    pub id: i64,
    pub title_id: Option<String>,
    pub title_en: Option<String>,
    pub description_id: Option<String>,
    pub description_en: Option<String>,
    pub content_id: Option<String>,
    pub content_en: Option<String>,
    pub image: Option<String>,
    pub category: Category,
    pub tags: Vec<String>,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub meta_title_id: Option<String>,
    pub meta_title_en: Option<String>,
    pub meta_description_id: Option<String>,
    pub meta_description_en: Option<String>,
    pub sort_order: i32,
    pub view_count: i32,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Education {
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.deleted_at.is_none()
            && self.is_published
            && self.published_at.is_some_and(|at| at <= now)
    }

    /// Case-insensitive substring match on the given text fields
    pub fn text_matches(fields: &[&Option<String>], needle: &str) -> bool {
        let needle = needle.to_lowercase();
        fields
            .iter()
            .filter_map(|f| f.as_deref())
            .any(|f| f.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EducationInput {
    pub title_id: Option<String>,
    pub title_en: Option<String>,
    pub description_id: Option<String>,
    pub description_en: Option<String>,
    pub content_id: Option<String>,
    pub content_en: Option<String>,
    pub image: Option<String>,
    pub category: Category,
    pub tags: Vec<String>,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub meta_title_id: Option<String>,
    pub meta_title_en: Option<String>,
    pub meta_description_id: Option<String>,
    pub meta_description_en: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EducationStatus {
    Published,
    Draft,
}

/// Listing query shared by the public and admin views
#[derive(Debug, Clone)]
pub struct EducationFilter {
    pub search: Option<String>,
    /// Public listings only search titles
    pub search_descriptions: bool,
    pub category: Option<Category>,
    pub status: Option<EducationStatus>,
    /// Order by `published_at` (public) instead of `created_at` (admin)
    pub order_by_published: bool,
    pub now: DateTime<Utc>,
    pub page: u32,
    pub per_page: u32,
}

impl EducationFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    pub fn matches(&self, item: &Education) -> bool {
        if item.deleted_at.is_some() {
            return false;
        }
        if let Some(category) = self.category {
            if item.category != category {
                return false;
            }
        }
        match self.status {
            Some(EducationStatus::Published) if !item.is_visible_at(self.now) => return false,
            Some(EducationStatus::Draft) if item.is_published => return false,
            _ => {}
        }
        if let Some(search) = &self.search {
            let matched = if self.search_descriptions {
                Education::text_matches(
                    &[&item.title_id, &item.title_en, &item.description_id, &item.description_en],
                    search,
                )
            } else {
                Education::text_matches(&[&item.title_id, &item.title_en], search)
            };
            if !matched {
                return false;
            }
        }
        true
    }
}

impl Auditable for Education {
    const AUDIT_TYPE: &'static str = "Education";

    fn audit_id(&self) -> i64 {
        self.id
    }
}
