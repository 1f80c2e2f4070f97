use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::audit::Auditable;

/// Back-office account; the password hash never leaves the store
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role as listed on a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RoleSummary {
    pub id: i64,
    pub name: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    /// Ordered by role id
    pub roles: Vec<RoleSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserInput {
    pub name: String,
    pub email: String,
    /// Already hashed; `None` keeps the stored hash
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: bool,
    /// `None` keeps the current roles, an empty list detaches them all
    pub roles: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Substring of name, email or phone, case-insensitive
    pub search: Option<String>,
    pub status: Option<bool>,
    /// Role name
    pub role: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl UserFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    pub fn matches(&self, user: &UserWithRoles) -> bool {
        if self.status.is_some_and(|status| user.user.status != status) {
            return false;
        }
        if let Some(role) = &self.role {
            if !user.roles.iter().any(|r| &r.name == role) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let fields = [
                Some(&user.user.name),
                Some(&user.user.email),
                user.user.phone.as_ref(),
            ];
            return fields
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle));
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total_users: i64,
    pub active_users: i64,
    pub inactive_users: i64,
    /// Registered within the last seven days
    pub recent_registrations: i64,
    pub users_with_roles: i64,
    pub users_without_roles: i64,
}

impl Auditable for User {
    const AUDIT_TYPE: &'static str = "User";

    fn audit_id(&self) -> i64 {
        self.id
    }

    fn audit_attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("name".into(), self.name.clone().into());
        map.insert("email".into(), self.email.clone().into());
        map.insert("phone".into(), self.phone.clone().into());
        map.insert("address".into(), self.address.clone().into());
        map.insert("status".into(), self.status.into());
        map
    }
}
