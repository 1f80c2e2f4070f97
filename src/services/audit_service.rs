use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use validator::Validate;

use super::{Page, ServiceError};
use crate::database::models::audit::changed_attributes;
use crate::database::models::{
    Audit, AuditEvent, AuditFilter, AuditStats, Auditable, NewAudit, RecentActivity,
};
use crate::database::Store;
use crate::validation::{check, FieldErrors};

/// Who performed a request and from where, attached to audit records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditContext {
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub url: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Query string accepted by the audit viewer
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AuditQuery {
    pub auditable_type: Option<String>,
    pub event: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub user_id: Option<i64>,
    #[validate(range(min = 1, message = "The page field must be at least 1."))]
    pub page: Option<u32>,
    #[validate(range(min = 5, max = 100, message = "The per page field must be between 5 and 100."))]
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditUser {
    pub id: i64,
    pub name: Option<String>,
}

/// Viewer projection of an audit record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub event: AuditEvent,
    pub auditable_type: String,
    pub auditable_id: i64,
    pub user: Option<AuditUser>,
    pub old_values: Value,
    pub new_values: Value,
    pub url: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

impl From<Audit> for AuditEntry {
    fn from(audit: Audit) -> Self {
        Self {
            id: audit.id,
            event: audit.event,
            auditable_type: audit.auditable_type,
            auditable_id: audit.auditable_id,
            user: audit.user_id.map(|id| AuditUser {
                id,
                name: audit.user_name,
            }),
            old_values: audit.old_values,
            new_values: audit.new_values,
            url: audit.url,
            ip_address: audit.ip_address,
            user_agent: audit.user_agent,
            created_at: audit.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

pub const DEFAULT_PER_PAGE: u32 = 20;
const RECENT_ACTIVITY_LIMIT: u32 = 10;

fn parse_date(raw: &Option<String>, field: &str, errors: &mut FieldErrors) -> Option<NaiveDate> {
    let raw = raw.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    // Accept plain dates and full timestamps
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()));
    if date.is_none() {
        errors.add(field, format!("The {} field must be a valid date.", field.replace('_', " ")));
    }
    date
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|d| Utc.from_utc_datetime(&d))
}

/// Writes and reads the append-only audit trail
#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn Store>,
    enabled: bool,
}

impl AuditService {
    pub fn new(store: Arc<dyn Store>, enabled: bool) -> Self {
        Self { store, enabled }
    }

    async fn write(
        &self,
        ctx: &AuditContext,
        event: AuditEvent,
        auditable_type: &str,
        auditable_id: i64,
        old_values: Value,
        new_values: Value,
    ) -> Result<(), ServiceError> {
        if !self.enabled {
            return Ok(());
        }
        let audit = NewAudit {
            event,
            auditable_type: auditable_type.to_string(),
            auditable_id,
            user_id: ctx.user_id,
            user_name: ctx.user_name.clone(),
            old_values,
            new_values,
            url: ctx.url.clone(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        };
        let stored = self.store.record_audit(&audit).await?;
        tracing::debug!(
            audit_id = stored.id,
            event = event.as_str(),
            auditable_type,
            auditable_id,
            "audit recorded"
        );
        Ok(())
    }

    pub async fn record_created<T: Auditable>(
        &self,
        ctx: &AuditContext,
        record: &T,
    ) -> Result<(), ServiceError> {
        self.write(
            ctx,
            AuditEvent::Created,
            T::AUDIT_TYPE,
            record.audit_id(),
            Value::Object(Default::default()),
            Value::Object(record.audit_attributes()),
        )
        .await
    }

    /// Records only the attributes that changed; nothing when none did
    pub async fn record_updated<T: Auditable>(
        &self,
        ctx: &AuditContext,
        before: &T,
        after: &T,
    ) -> Result<(), ServiceError> {
        let (old_values, new_values) =
            changed_attributes(&before.audit_attributes(), &after.audit_attributes());
        if new_values.is_empty() {
            return Ok(());
        }
        self.write(
            ctx,
            AuditEvent::Updated,
            T::AUDIT_TYPE,
            after.audit_id(),
            Value::Object(old_values),
            Value::Object(new_values),
        )
        .await
    }

    pub async fn record_deleted<T: Auditable>(
        &self,
        ctx: &AuditContext,
        record: &T,
    ) -> Result<(), ServiceError> {
        self.write(
            ctx,
            AuditEvent::Deleted,
            T::AUDIT_TYPE,
            record.audit_id(),
            Value::Object(record.audit_attributes()),
            Value::Object(Default::default()),
        )
        .await
    }

    pub async fn list(&self, query: AuditQuery) -> Result<Page<AuditEntry>, ServiceError> {
        let mut errors = check(&query);
        let date_from = parse_date(&query.date_from, "date_from", &mut errors);
        let date_to = parse_date(&query.date_to, "date_to", &mut errors);
        errors.into_result()?;

        let blank_to_none = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let filter = AuditFilter {
            auditable_type: blank_to_none(query.auditable_type),
            event: blank_to_none(query.event),
            date_from,
            date_to,
            user_id: query.user_id,
            page: query.page.unwrap_or(1),
            per_page: query.per_page.unwrap_or(DEFAULT_PER_PAGE),
        };

        let (audits, total) = self.store.list_audits(&filter).await?;
        Ok(Page::new(audits, filter.page, filter.per_page, total).map(AuditEntry::from))
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> Result<AuditStats, ServiceError> {
        let today = now.date_naive();
        let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        let month_start = today.with_day(1).unwrap_or(today);
        let next_month = if today.month() == 12 {
            NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
        };

        let total_audits = self.store.count_audits(None, None).await?;
        let today_audits = self
            .store
            .count_audits(start_of_day(today), today.succ_opt().and_then(start_of_day))
            .await?;
        let this_week_audits = self
            .store
            .count_audits(
                start_of_day(week_start),
                start_of_day(week_start + Duration::days(7)),
            )
            .await?;
        let this_month_audits = self
            .store
            .count_audits(start_of_day(month_start), next_month.and_then(start_of_day))
            .await?;

        let events_breakdown = self.store.count_audits_by_event().await?.into_iter().collect();
        let models_breakdown = self.store.count_audits_by_type().await?.into_iter().collect();
        let recent_activities = self
            .store
            .recent_audits(RECENT_ACTIVITY_LIMIT)
            .await?
            .into_iter()
            .map(|audit| RecentActivity {
                event: audit.event,
                model: audit.auditable_type,
                user: audit.user_name.unwrap_or_else(|| "System".to_string()),
                created_at: audit.created_at,
            })
            .collect();

        Ok(AuditStats {
            total_audits,
            today_audits,
            this_week_audits,
            this_month_audits,
            events_breakdown,
            models_breakdown,
            recent_activities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::MenuItem;
    use crate::database::{AuditRepository, MemoryStore};

    fn item(title: &str, position: i32) -> MenuItem {
        let now = Utc::now();
        MenuItem {
            id: 5,
            title: title.into(),
            href: None,
            icon: None,
            position,
            parent_id: None,
            badge: None,
            disabled: false,
            is_separator: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn unchanged_update_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let audits = AuditService::new(store.clone(), true);
        let ctx = AuditContext::default();

        audits.record_updated(&ctx, &item("Users", 1), &item("Users", 1)).await.unwrap();
        assert_eq!(store.count_audits(None, None).await.unwrap(), 0);

        audits.record_updated(&ctx, &item("Users", 1), &item("Users", 2)).await.unwrap();
        let (rows, total) = store
            .list_audits(&AuditFilter { page: 1, per_page: 20, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].old_values, serde_json::json!({"position": 1}));
        assert_eq!(rows[0].new_values, serde_json::json!({"position": 2}));
        assert_eq!(rows[0].auditable_type, "MenuItem");
    }

    #[tokio::test]
    async fn disabled_audit_logging_records_nothing() {
        let store = Arc::new(MemoryStore::new());
        let audits = AuditService::new(store.clone(), false);
        audits
            .record_created(&AuditContext::default(), &item("Users", 0))
            .await
            .unwrap();
        assert_eq!(store.count_audits(None, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stats_default_user_is_system() {
        let store = Arc::new(MemoryStore::new());
        let audits = AuditService::new(store.clone(), true);
        audits
            .record_created(&AuditContext::default(), &item("Users", 0))
            .await
            .unwrap();

        let stats = audits.stats(Utc::now()).await.unwrap();
        assert_eq!(stats.total_audits, 1);
        assert_eq!(stats.today_audits, 1);
        assert_eq!(stats.this_week_audits, 1);
        assert_eq!(stats.this_month_audits, 1);
        assert_eq!(stats.events_breakdown.get("created"), Some(&1));
        assert_eq!(stats.models_breakdown.get("MenuItem"), Some(&1));
        assert_eq!(stats.recent_activities[0].user, "System");
    }

    #[tokio::test]
    async fn rejects_out_of_range_page_size() {
        let audits = AuditService::new(Arc::new(MemoryStore::new()), true);
        let err = audits
            .list(AuditQuery { per_page: Some(500), ..Default::default() })
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => assert!(errors.contains("per_page")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
