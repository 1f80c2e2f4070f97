use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, Postgres, QueryBuilder};

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{Audit, AuditEvent, AuditFilter, NewAudit};
use crate::database::repository::AuditRepository;

const AUDIT_COLUMNS: &str = "id, event, auditable_type, auditable_id, user_id, user_name, \
     old_values, new_values, url, ip_address, user_agent, created_at";

#[derive(FromRow)]
struct AuditRow {
    id: i64,
    event: String,
    auditable_type: String,
    auditable_id: i64,
    user_id: Option<i64>,
    user_name: Option<String>,
    old_values: Value,
    new_values: Value,
    url: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for Audit {
    type Error = DatabaseError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let event = AuditEvent::parse(&row.event)
            .ok_or_else(|| DatabaseError::QueryError(format!("unknown audit event '{}'", row.event)))?;
        Ok(Audit {
            id: row.id,
            event,
            auditable_type: row.auditable_type,
            auditable_id: row.auditable_id,
            user_id: row.user_id,
            user_name: row.user_name,
            old_values: row.old_values,
            new_values: row.new_values,
            url: row.url,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
        })
    }
}

fn push_audit_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &AuditFilter) {
    builder.push(" WHERE TRUE");
    if let Some(auditable_type) = &filter.auditable_type {
        builder.push(" AND auditable_type = ").push_bind(auditable_type.clone());
    }
    if let Some(event) = &filter.event {
        builder.push(" AND event = ").push_bind(event.clone());
    }
    if let Some(from) = filter.date_from {
        builder
            .push(" AND created_at >= ")
            .push_bind(from.and_hms_opt(0, 0, 0).map(|d| d.and_utc()));
    }
    if let Some(to) = filter.date_to.and_then(|d| d.succ_opt()) {
        builder
            .push(" AND created_at < ")
            .push_bind(to.and_hms_opt(0, 0, 0).map(|d| d.and_utc()));
    }
    if let Some(user_id) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
}

#[async_trait]
impl AuditRepository for PgStore {
    async fn record_audit(&self, audit: &NewAudit) -> Result<Audit, DatabaseError> {
        let query = format!(
            "INSERT INTO audits (event, auditable_type, auditable_id, user_id, user_name, \
             old_values, new_values, url, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            AUDIT_COLUMNS
        );
        let row = sqlx::query_as::<_, AuditRow>(&query)
            .bind(audit.event.as_str())
            .bind(&audit.auditable_type)
            .bind(audit.auditable_id)
            .bind(audit.user_id)
            .bind(&audit.user_name)
            .bind(&audit.old_values)
            .bind(&audit.new_values)
            .bind(&audit.url)
            .bind(&audit.ip_address)
            .bind(&audit.user_agent)
            .fetch_one(self.pool())
            .await?;
        row.try_into()
    }

    async fn list_audits(&self, filter: &AuditFilter) -> Result<(Vec<Audit>, i64), DatabaseError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audits");
        push_audit_filter(&mut count, filter);
        let (total,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(self.pool())
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM audits", AUDIT_COLUMNS));
        push_audit_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(filter.per_page))
            .push(" OFFSET ")
            .push_bind(filter.offset() as i64);
        let rows = select
            .build_query_as::<AuditRow>()
            .fetch_all(self.pool())
            .await?;

        let audits = rows
            .into_iter()
            .map(Audit::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((audits, total))
    }

    async fn count_audits(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<i64, DatabaseError> {
        let (count,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM audits \
             WHERE ($1::timestamptz IS NULL OR created_at >= $1) \
               AND ($2::timestamptz IS NULL OR created_at < $2)",
        )
        .bind(from)
        .bind(to)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }

    async fn count_audits_by_event(&self) -> Result<Vec<(String, i64)>, DatabaseError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT event, COUNT(*) AS count FROM audits GROUP BY event ORDER BY count DESC, event",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn count_audits_by_type(&self) -> Result<Vec<(String, i64)>, DatabaseError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT auditable_type, COUNT(*) AS count FROM audits \
             GROUP BY auditable_type ORDER BY count DESC, auditable_type",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn recent_audits(&self, limit: u32) -> Result<Vec<Audit>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM audits ORDER BY created_at DESC, id DESC LIMIT $1",
            AUDIT_COLUMNS
        );
        let rows = sqlx::query_as::<_, AuditRow>(&query)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(Audit::try_from).collect()
    }
}
