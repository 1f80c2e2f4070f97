use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::audit::Auditable;

/// A navigation entry; `parent_id` is a self reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MenuItem {
    pub id: i64,
    pub title: String,
    pub href: Option<String>,
    pub icon: Option<String>,
    pub position: i32,
    pub parent_id: Option<i64>,
    pub badge: Option<String>,
    pub disabled: bool,
    pub is_separator: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable columns of a menu item, already validated
#[derive(Debug, Clone, PartialEq)]
pub struct MenuItemInput {
    pub title: String,
    pub href: Option<String>,
    pub icon: Option<String>,
    pub position: i32,
    pub parent_id: Option<i64>,
    pub badge: Option<String>,
    pub disabled: bool,
    pub is_separator: bool,
    pub is_active: bool,
}

impl MenuItemInput {
    /// Apply the input on top of an existing row, keeping identity and timestamps
    pub fn apply_to(&self, item: &MenuItem) -> MenuItem {
        MenuItem {
            id: item.id,
            title: self.title.clone(),
            href: self.href.clone(),
            icon: self.icon.clone(),
            position: self.position,
            parent_id: self.parent_id,
            badge: self.badge.clone(),
            disabled: self.disabled,
            is_separator: self.is_separator,
            is_active: self.is_active,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// Serialized tree node; identifiers are rendered as strings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuNode {
    pub id: String,
    pub title: String,
    pub href: Option<String>,
    pub icon: Option<String>,
    pub position: i32,
    pub parent_id: Option<String>,
    pub children: Vec<MenuNode>,
    pub is_separator: bool,
    pub badge: Option<String>,
    pub disabled: bool,
}

impl MenuNode {
    pub fn from_item(item: &MenuItem, children: Vec<MenuNode>) -> Self {
        Self {
            id: item.id.to_string(),
            title: item.title.clone(),
            href: item.href.clone(),
            icon: item.icon.clone(),
            position: item.position,
            parent_id: item.parent_id.map(|id| id.to_string()),
            children,
            is_separator: item.is_separator,
            badge: item.badge.clone(),
            disabled: item.disabled,
        }
    }
}

impl Auditable for MenuItem {
    const AUDIT_TYPE: &'static str = "MenuItem";

    fn audit_id(&self) -> i64 {
        self.id
    }
}
