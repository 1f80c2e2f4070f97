use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{ConfigGroup, ConfigType, Configuration, ConfigurationInput};
use crate::database::repository::ConfigurationRepository;

const CONFIGURATION_COLUMNS: &str = r#"id, "key", "value", "type", "group", description, is_public, created_at, updated_at"#;

#[derive(FromRow)]
struct ConfigurationRow {
    id: i64,
    key: String,
    value: Option<Value>,
    #[sqlx(rename = "type")]
    config_type: String,
    group: String,
    description: Option<String>,
    is_public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ConfigurationRow> for Configuration {
    type Error = DatabaseError;

    fn try_from(row: ConfigurationRow) -> Result<Self, Self::Error> {
        let config_type = ConfigType::parse(&row.config_type).ok_or_else(|| {
            DatabaseError::QueryError(format!("unknown configuration type '{}'", row.config_type))
        })?;
        let group = ConfigGroup::parse(&row.group).ok_or_else(|| {
            DatabaseError::QueryError(format!("unknown configuration group '{}'", row.group))
        })?;
        Ok(Configuration {
            id: row.id,
            key: row.key,
            value: row.value.unwrap_or(Value::Null),
            config_type,
            group,
            description: row.description,
            is_public: row.is_public,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert(rows: Vec<ConfigurationRow>) -> Result<Vec<Configuration>, DatabaseError> {
    rows.into_iter().map(Configuration::try_from).collect()
}

#[async_trait]
impl ConfigurationRepository for PgStore {
    async fn list_configurations(&self) -> Result<Vec<Configuration>, DatabaseError> {
        let query = format!(
            r#"SELECT {} FROM configurations ORDER BY "group", "key""#,
            CONFIGURATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, ConfigurationRow>(&query)
            .fetch_all(self.pool())
            .await?;
        convert(rows)
    }

    async fn find_configuration(&self, id: i64) -> Result<Option<Configuration>, DatabaseError> {
        let query = format!("SELECT {} FROM configurations WHERE id = $1", CONFIGURATION_COLUMNS);
        sqlx::query_as::<_, ConfigurationRow>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .map(Configuration::try_from)
            .transpose()
    }

    async fn find_configuration_by_key(
        &self,
        key: &str,
    ) -> Result<Option<Configuration>, DatabaseError> {
        let query = format!(
            r#"SELECT {} FROM configurations WHERE "key" = $1"#,
            CONFIGURATION_COLUMNS
        );
        sqlx::query_as::<_, ConfigurationRow>(&query)
            .bind(key)
            .fetch_optional(self.pool())
            .await?
            .map(Configuration::try_from)
            .transpose()
    }

    async fn upsert_configuration(
        &self,
        input: &ConfigurationInput,
    ) -> Result<Configuration, DatabaseError> {
        let query = format!(
            r#"INSERT INTO configurations ("key", "value", "type", "group", description, is_public)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT ("key") DO UPDATE SET
                   "value" = EXCLUDED."value",
                   "type" = EXCLUDED."type",
                   "group" = EXCLUDED."group",
                   description = EXCLUDED.description,
                   is_public = EXCLUDED.is_public,
                   updated_at = NOW()
               RETURNING {}"#,
            CONFIGURATION_COLUMNS
        );
        let row = sqlx::query_as::<_, ConfigurationRow>(&query)
            .bind(&input.key)
            .bind(&input.value)
            .bind(input.config_type.as_str())
            .bind(input.group.as_str())
            .bind(&input.description)
            .bind(input.is_public)
            .fetch_one(self.pool())
            .await?;
        row.try_into()
    }

    async fn update_configuration(
        &self,
        id: i64,
        input: &ConfigurationInput,
    ) -> Result<Option<Configuration>, DatabaseError> {
        let query = format!(
            r#"UPDATE configurations SET "key" = $2, "value" = $3, "type" = $4, "group" = $5,
                   description = $6, is_public = $7, updated_at = NOW()
               WHERE id = $1 RETURNING {}"#,
            CONFIGURATION_COLUMNS
        );
        sqlx::query_as::<_, ConfigurationRow>(&query)
            .bind(id)
            .bind(&input.key)
            .bind(&input.value)
            .bind(input.config_type.as_str())
            .bind(input.group.as_str())
            .bind(&input.description)
            .bind(input.is_public)
            .fetch_optional(self.pool())
            .await?
            .map(Configuration::try_from)
            .transpose()
    }

    async fn delete_configuration(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM configurations WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
