use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Kind of change captured by an audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEvent {
    Created,
    Updated,
    Deleted,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::Created => "created",
            AuditEvent::Updated => "updated",
            AuditEvent::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(AuditEvent::Created),
            "updated" => Some(AuditEvent::Updated),
            "deleted" => Some(AuditEvent::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Audit {
    pub id: i64,
    pub event: AuditEvent,
    pub auditable_type: String,
    pub auditable_id: i64,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub old_values: Value,
    pub new_values: Value,
    pub url: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit record before it is persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewAudit {
    pub event: AuditEvent,
    pub auditable_type: String,
    pub auditable_id: i64,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub old_values: Value,
    pub new_values: Value,
    pub url: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Viewer query; dates are inclusive calendar days in UTC
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub auditable_type: Option<String>,
    pub event: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub user_id: Option<i64>,
    pub page: u32,
    pub per_page: u32,
}

impl AuditFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    pub fn matches(&self, audit: &Audit) -> bool {
        if let Some(t) = &self.auditable_type {
            if &audit.auditable_type != t {
                return false;
            }
        }
        if let Some(e) = &self.event {
            if audit.event.as_str() != e {
                return false;
            }
        }
        let day = audit.created_at.date_naive();
        if self.date_from.is_some_and(|from| day < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| day > to) {
            return false;
        }
        if self.user_id.is_some() && audit.user_id != self.user_id {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentActivity {
    pub event: AuditEvent,
    pub model: String,
    pub user: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditStats {
    pub total_audits: i64,
    pub today_audits: i64,
    pub this_week_audits: i64,
    pub this_month_audits: i64,
    pub events_breakdown: BTreeMap<String, i64>,
    pub models_breakdown: BTreeMap<String, i64>,
    pub recent_activities: Vec<RecentActivity>,
}

/// A record type whose single-row writes are audited
pub trait Auditable: Serialize {
    const AUDIT_TYPE: &'static str;

    fn audit_id(&self) -> i64;

    /// Attribute snapshot without identity and timestamps
    fn audit_attributes(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                for key in ["id", "created_at", "updated_at"] {
                    map.remove(key);
                }
                map
            }
            _ => Map::new(),
        }
    }
}

/// Old and new values of the attributes that differ between two snapshots
pub fn changed_attributes(
    before: &Map<String, Value>,
    after: &Map<String, Value>,
) -> (Map<String, Value>, Map<String, Value>) {
    let mut old_values = Map::new();
    let mut new_values = Map::new();
    for (key, new_value) in after {
        let old_value = before.get(key).cloned().unwrap_or(Value::Null);
        if &old_value != new_value {
            old_values.insert(key.clone(), old_value);
            new_values.insert(key.clone(), new_value.clone());
        }
    }
    (old_values, new_values)
}
