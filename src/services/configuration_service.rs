use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use validator::{Validate, ValidateEmail, ValidateUrl};

use super::{AuditContext, AuditService, ServiceError};
use crate::database::models::configuration::{flag_bool, loose_int};
use crate::database::models::{ConfigGroup, ConfigType, Configuration, ConfigurationInput};
use crate::database::Store;
use crate::validation::{check, normalize, FieldErrors};

const NOT_FOUND: &str = "Configuration not found.";

/// Body of store and update requests
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ConfigurationPayload {
    #[validate(
        required(message = "Configuration key is required."),
        length(max = 255, message = "Configuration key cannot exceed 255 characters.")
    )]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(rename = "type")]
    pub config_type: Option<String>,
    pub group: Option<String>,
    #[validate(length(max = 500, message = "Description cannot exceed 500 characters."))]
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkConfigurationEntry {
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(rename = "type")]
    pub config_type: Option<String>,
    pub group: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkConfigurationPayload {
    pub configurations: Option<Vec<BulkConfigurationEntry>>,
}

/// Client projection with the value already cast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationView {
    pub id: i64,
    pub key: String,
    pub value: Value,
    #[serde(rename = "type")]
    pub config_type: ConfigType,
    pub group: ConfigGroup,
    pub description: Option<String>,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedEntry {
    pub value: Value,
    #[serde(rename = "type")]
    pub config_type: ConfigType,
    pub description: Option<String>,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkResult {
    pub key: String,
    pub value: Value,
    #[serde(rename = "type")]
    pub config_type: ConfigType,
    pub group: ConfigGroup,
}

fn parse_type(raw: Option<&str>, field: &str, errors: &mut FieldErrors) -> Option<ConfigType> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => {
            errors.add(field, "Configuration type is required.");
            None
        }
        Some(raw) => {
            let parsed = ConfigType::parse(raw);
            if parsed.is_none() {
                errors.add(field, "Invalid configuration type.");
            }
            parsed
        }
    }
}

fn parse_group(raw: Option<&str>, field: &str, errors: &mut FieldErrors) -> Option<ConfigGroup> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => {
            errors.add(field, "Configuration group is required.");
            None
        }
        Some(raw) => {
            let parsed = ConfigGroup::parse(raw);
            if parsed.is_none() {
                errors.add(field, "Invalid configuration group.");
            }
            parsed
        }
    }
}

/// Trimmed value with blank strings treated as missing
fn present(value: Option<Value>) -> Option<Value> {
    match value {
        Some(Value::String(s)) => normalize(Some(s)).map(Value::String),
        Some(Value::Null) | None => None,
        other => other,
    }
}

/// Checks the value against the rules of its type and returns what is stored
fn validate_value(
    config_type: ConfigType,
    value: Option<Value>,
    errors: &mut FieldErrors,
) -> Value {
    const REQUIRED: &str = "Configuration value is required.";
    let Some(value) = present(value) else {
        if config_type != ConfigType::File {
            errors.add("value", REQUIRED);
        }
        return Value::Null;
    };

    match config_type {
        ConfigType::File => match value {
            Value::String(path) => Value::String(path),
            _ => {
                errors.add("value", "File value must be a stored path.");
                Value::Null
            }
        },
        ConfigType::Email | ConfigType::Url => {
            let Value::String(text) = value else {
                errors.add("value", "Configuration value must be a string.");
                return Value::Null;
            };
            let valid = match config_type {
                ConfigType::Email => text.validate_email(),
                _ => text.validate_url(),
            };
            if !valid {
                let message = if config_type == ConfigType::Email {
                    "Please enter a valid email address."
                } else {
                    "Please enter a valid URL."
                };
                errors.add("value", message);
            } else if text.chars().count() > 255 {
                errors.add("value", "Configuration value cannot exceed 255 characters.");
            }
            Value::String(text)
        }
        ConfigType::Integer => {
            let parsed = match &value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse::<i64>().ok(),
                _ => None,
            };
            match parsed {
                Some(n) => Value::from(n),
                None => {
                    errors.add("value", "Value must be a number.");
                    Value::Null
                }
            }
        }
        ConfigType::Boolean => {
            let parsed = match &value {
                Value::Bool(b) => Some(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Some(false),
                    Some(1) => Some(true),
                    _ => None,
                },
                Value::String(s) => match s.as_str() {
                    "0" | "false" => Some(false),
                    "1" | "true" => Some(true),
                    _ => None,
                },
                _ => None,
            };
            match parsed {
                Some(b) => Value::Bool(b),
                None => {
                    errors.add("value", "Value must be true or false.");
                    Value::Null
                }
            }
        }
        ConfigType::Json => match value {
            Value::String(raw) if serde_json::from_str::<Value>(&raw).is_ok() => Value::String(raw),
            structured @ (Value::Array(_) | Value::Object(_)) => structured,
            _ => {
                errors.add("value", "Value must be valid JSON.");
                Value::Null
            }
        },
        ConfigType::String | ConfigType::Text => {
            let Value::String(text) = value else {
                errors.add("value", "Configuration value must be a string.");
                return Value::Null;
            };
            if text.chars().count() > 1000 {
                errors.add("value", "Configuration value cannot exceed 1000 characters.");
            }
            Value::String(text)
        }
    }
}

/// Bulk updates coerce instead of rejecting
fn coerce_bulk_value(config_type: ConfigType, value: Option<Value>) -> Value {
    let value = value.unwrap_or(Value::Null);
    match config_type {
        ConfigType::Json => match &value {
            Value::String(raw) => serde_json::from_str(raw).unwrap_or(value),
            _ => value,
        },
        ConfigType::Boolean => Value::Bool(flag_bool(&value)),
        ConfigType::Integer => Value::from(loose_int(&value)),
        _ => value,
    }
}

#[derive(Clone)]
pub struct ConfigurationService {
    store: Arc<dyn Store>,
    audit: AuditService,
    public_url: String,
}

impl ConfigurationService {
    pub fn new(store: Arc<dyn Store>, audit: AuditService, public_url: impl Into<String>) -> Self {
        Self {
            store,
            audit,
            public_url: public_url.into(),
        }
    }

    fn view(&self, configuration: &Configuration) -> ConfigurationView {
        ConfigurationView {
            id: configuration.id,
            key: configuration.key.clone(),
            value: configuration.typed_value(&self.public_url),
            config_type: configuration.config_type,
            group: configuration.group,
            description: configuration.description.clone(),
            is_public: configuration.is_public,
        }
    }

    /// Typed value of `key`, or `None` when the key is not stored
    pub async fn get(&self, key: &str) -> Result<Option<Value>, ServiceError> {
        Ok(self
            .store
            .find_configuration_by_key(key)
            .await?
            .map(|c| c.typed_value(&self.public_url)))
    }

    /// group -> key -> entry
    pub async fn grouped(
        &self,
    ) -> Result<BTreeMap<String, BTreeMap<String, GroupedEntry>>, ServiceError> {
        let mut grouped: BTreeMap<String, BTreeMap<String, GroupedEntry>> = BTreeMap::new();
        for configuration in self.store.list_configurations().await? {
            grouped
                .entry(configuration.group.as_str().to_string())
                .or_default()
                .insert(
                    configuration.key.clone(),
                    GroupedEntry {
                        value: configuration.typed_value(&self.public_url),
                        config_type: configuration.config_type,
                        description: configuration.description.clone(),
                        is_public: configuration.is_public,
                    },
                );
        }
        Ok(grouped)
    }

    /// key -> typed value for one group; unknown groups are empty
    pub async fn by_group(&self, group: &str) -> Result<BTreeMap<String, Value>, ServiceError> {
        let Some(group) = ConfigGroup::parse(group) else {
            return Ok(BTreeMap::new());
        };
        Ok(self
            .store
            .list_configurations()
            .await?
            .into_iter()
            .filter(|c| c.group == group)
            .map(|c| {
                let value = c.typed_value(&self.public_url);
                (c.key, value)
            })
            .collect())
    }

    /// key -> typed value for entries flagged public
    pub async fn public(&self) -> Result<BTreeMap<String, Value>, ServiceError> {
        Ok(self
            .store
            .list_configurations()
            .await?
            .into_iter()
            .filter(|c| c.is_public)
            .map(|c| {
                let value = c.typed_value(&self.public_url);
                (c.key, value)
            })
            .collect())
    }

    pub async fn show(&self, id: i64) -> Result<ConfigurationView, ServiceError> {
        let configuration = self.find(id).await?;
        Ok(self.view(&configuration))
    }

    /// Create, or overwrite the entry with the same key
    pub async fn store(
        &self,
        ctx: &AuditContext,
        payload: ConfigurationPayload,
    ) -> Result<ConfigurationView, ServiceError> {
        let input = self.validate(payload, None)?;
        let existing = self.store.find_configuration_by_key(&input.key).await?;
        let saved = self.store.upsert_configuration(&input).await?;

        match &existing {
            Some(before) => self.audit.record_updated(ctx, before, &saved).await?,
            None => self.audit.record_created(ctx, &saved).await?,
        }
        info!(key = %saved.key, created = existing.is_none(), "Configuration saved");
        Ok(self.view(&saved))
    }

    pub async fn update(
        &self,
        ctx: &AuditContext,
        id: i64,
        payload: ConfigurationPayload,
    ) -> Result<ConfigurationView, ServiceError> {
        let existing = self.find(id).await?;
        let input = self.validate(payload, Some(&existing))?;

        if input.key != existing.key {
            if let Some(other) = self.store.find_configuration_by_key(&input.key).await? {
                if other.id != id {
                    return Err(ServiceError::field("key", "Configuration key already exists."));
                }
            }
        }

        let updated = self
            .store
            .update_configuration(id, &input)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.to_string()))?;
        self.audit.record_updated(ctx, &existing, &updated).await?;
        Ok(self.view(&updated))
    }

    pub async fn delete(&self, ctx: &AuditContext, id: i64) -> Result<(), ServiceError> {
        let existing = self.find(id).await?;
        if !self.store.delete_configuration(id).await? {
            return Err(ServiceError::NotFound(NOT_FOUND.to_string()));
        }
        self.audit.record_deleted(ctx, &existing).await?;
        info!(key = %existing.key, "Configuration deleted");
        Ok(())
    }

    /// Upserts every entry after the whole batch passes validation
    pub async fn bulk_update(
        &self,
        ctx: &AuditContext,
        payload: BulkConfigurationPayload,
    ) -> Result<Vec<BulkResult>, ServiceError> {
        let mut errors = FieldErrors::new();
        let Some(entries) = payload.configurations else {
            errors.add("configurations", "The configurations field is required.");
            return Err(errors.into());
        };

        let mut inputs = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let key = normalize(entry.key);
            if key.is_none() {
                errors.add(format!("configurations.{}.key", index), "Configuration key is required.");
            }
            let config_type = parse_type(
                entry.config_type.as_deref(),
                &format!("configurations.{}.type", index),
                &mut errors,
            );
            let group = parse_group(
                entry.group.as_deref(),
                &format!("configurations.{}.group", index),
                &mut errors,
            );
            if let (Some(key), Some(config_type), Some(group)) = (key, config_type, group) {
                inputs.push(ConfigurationInput {
                    key,
                    value: coerce_bulk_value(config_type, entry.value),
                    config_type,
                    group,
                    description: normalize(entry.description),
                    is_public: entry.is_public.unwrap_or(false),
                });
            }
        }
        errors.into_result()?;

        info!(count = inputs.len(), "Bulk configuration update");
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            let existing = self.store.find_configuration_by_key(&input.key).await?;
            let saved = self.store.upsert_configuration(&input).await?;
            match &existing {
                Some(before) => self.audit.record_updated(ctx, before, &saved).await?,
                None => self.audit.record_created(ctx, &saved).await?,
            }
            results.push(BulkResult {
                key: saved.key.clone(),
                value: saved.typed_value(&self.public_url),
                config_type: saved.config_type,
                group: saved.group,
            });
        }
        Ok(results)
    }

    async fn find(&self, id: i64) -> Result<Configuration, ServiceError> {
        self.store
            .find_configuration(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.to_string()))
    }

    fn validate(
        &self,
        payload: ConfigurationPayload,
        existing: Option<&Configuration>,
    ) -> Result<ConfigurationInput, ServiceError> {
        let payload = ConfigurationPayload {
            key: normalize(payload.key),
            description: normalize(payload.description),
            ..payload
        };
        let mut errors = check(&payload);
        let config_type = parse_type(payload.config_type.as_deref(), "type", &mut errors);
        let group = parse_group(payload.group.as_deref(), "group", &mut errors);

        let value = match config_type {
            Some(config_type) => {
                let value = validate_value(config_type, payload.value, &mut errors);
                // Without a new path a file entry keeps the one it has
                match existing {
                    Some(prev) if value.is_null() && config_type == ConfigType::File => {
                        prev.value.clone()
                    }
                    _ => value,
                }
            }
            None => Value::Null,
        };
        errors.into_result()?;

        match (payload.key, config_type, group) {
            (Some(key), Some(config_type), Some(group)) => Ok(ConfigurationInput {
                key,
                value,
                config_type,
                group,
                description: payload.description,
                is_public: payload.is_public.unwrap_or(false),
            }),
            _ => Err(ServiceError::field("key", "Configuration key is required.")),
        }
    }
}
