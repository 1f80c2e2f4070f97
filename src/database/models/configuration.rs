use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::audit::Auditable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    String,
    Text,
    Integer,
    Boolean,
    Json,
    File,
    Email,
    Url,
}

impl ConfigType {
    pub const ALL: [ConfigType; 8] = [
        ConfigType::String,
        ConfigType::Text,
        ConfigType::Integer,
        ConfigType::Boolean,
        ConfigType::Json,
        ConfigType::File,
        ConfigType::Email,
        ConfigType::Url,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::String => "string",
            ConfigType::Text => "text",
            ConfigType::Integer => "integer",
            ConfigType::Boolean => "boolean",
            ConfigType::Json => "json",
            ConfigType::File => "file",
            ConfigType::Email => "email",
            ConfigType::Url => "url",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigGroup {
    General,
    Branding,
    Homepage,
    Credit,
    Maintenance,
    Contact,
    Language,
}

impl ConfigGroup {
    pub const ALL: [ConfigGroup; 7] = [
        ConfigGroup::General,
        ConfigGroup::Branding,
        ConfigGroup::Homepage,
        ConfigGroup::Credit,
        ConfigGroup::Maintenance,
        ConfigGroup::Contact,
        ConfigGroup::Language,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigGroup::General => "general",
            ConfigGroup::Branding => "branding",
            ConfigGroup::Homepage => "homepage",
            ConfigGroup::Credit => "credit",
            ConfigGroup::Maintenance => "maintenance",
            ConfigGroup::Contact => "contact",
            ConfigGroup::Language => "language",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == value)
    }
}

/// Site configuration entry; `value` holds the raw stored JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Configuration {
    pub id: i64,
    pub key: String,
    pub value: Value,
    #[serde(rename = "type")]
    pub config_type: ConfigType,
    pub group: ConfigGroup,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationInput {
    pub key: String,
    pub value: Value,
    pub config_type: ConfigType,
    pub group: ConfigGroup,
    pub description: Option<String>,
    pub is_public: bool,
}

impl Configuration {
    /// Stored value cast according to the entry's type
    pub fn typed_value(&self, public_url: &str) -> Value {
        match self.config_type {
            ConfigType::Boolean => Value::Bool(loose_bool(&self.value)),
            ConfigType::Integer => Value::from(loose_int(&self.value)),
            ConfigType::Json => match &self.value {
                Value::String(raw) => serde_json::from_str(raw).unwrap_or(Value::Null),
                other => other.clone(),
            },
            ConfigType::File => match &self.value {
                Value::String(path) if !path.is_empty() => Value::String(format!(
                    "{}/{}",
                    public_url.trim_end_matches('/'),
                    path.trim_start_matches('/')
                )),
                _ => Value::Null,
            },
            _ => self.value.clone(),
        }
    }
}

impl Auditable for Configuration {
    const AUDIT_TYPE: &'static str = "Configuration";

    fn audit_id(&self) -> i64 {
        self.id
    }
}

/// Truthiness: null, false, zero, "" and "0" and empty collections are false
pub fn loose_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Integer coercion; strings contribute their leading integer prefix
pub fn loose_int(value: &Value) -> i64 {
    match value {
        Value::Null => 0,
        Value::Bool(b) => i64::from(*b),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => leading_int(s),
        Value::Array(items) => i64::from(!items.is_empty()),
        Value::Object(map) => i64::from(!map.is_empty()),
    }
}

fn leading_int(raw: &str) -> i64 {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end]
        .parse::<i64>()
        .map(|n| sign * n)
        .unwrap_or(0)
}

/// Boolean normalization used by bulk updates: 1, true, on and yes are true
pub fn flag_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        ),
        _ => false,
    }
}
