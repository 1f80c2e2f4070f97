use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::audit::Auditable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub group: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PermissionInput {
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleInput {
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub permissions: Vec<i64>,
}

/// Role with its attached permissions, ordered by group then name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}

/// Listing order for permissions; ungrouped entries sort first
pub fn sort_permissions(permissions: &mut [Permission]) {
    permissions.sort_by(|a, b| a.group.cmp(&b.group).then_with(|| a.name.cmp(&b.name)));
}

impl Auditable for Permission {
    const AUDIT_TYPE: &'static str = "Permission";

    fn audit_id(&self) -> i64 {
        self.id
    }
}

impl Auditable for RoleWithPermissions {
    const AUDIT_TYPE: &'static str = "Role";

    fn audit_id(&self) -> i64 {
        self.role.id
    }

    fn audit_attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("name".into(), self.role.name.clone().into());
        map.insert("display_name".into(), self.role.display_name.clone().into());
        map.insert("description".into(), self.role.description.clone().into());
        map.insert(
            "permissions".into(),
            self.permissions.iter().map(|p| p.id).collect::<Vec<_>>().into(),
        );
        map
    }
}
