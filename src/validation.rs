//! Field-level validation errors shared by all request types.

use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};

use crate::services::ServiceError;

/// Field name to first failure message, in field order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure; the first message for a field wins
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, message) in other.0 {
            self.add(field, message);
        }
    }

    pub fn into_map(self) -> HashMap<String, String> {
        self.0.into_iter().collect()
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation failure
    pub fn into_result(self) -> Result<(), ServiceError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(self))
        }
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, failures) in errors.field_errors() {
            if let Some(failure) = failures.first() {
                let message = failure
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("The {} field is invalid.", field));
                fields.add(field.to_string(), message);
            }
        }
        fields
    }
}

/// Run derive rules and return the collected failures (possibly empty)
pub fn check<T: validator::Validate>(payload: &T) -> FieldErrors {
    match payload.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => errors.into(),
    }
}

/// Trim and turn empty strings into `None`
pub fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseId {
    Int(i64),
    Text(String),
}

impl LooseId {
    fn resolve<E: serde::de::Error>(self) -> Result<Option<i64>, E> {
        match self {
            LooseId::Int(id) => Ok(Some(id)),
            LooseId::Text(text) if text.trim().is_empty() => Ok(None),
            LooseId::Text(text) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| E::custom(format!("invalid id '{}'", text))),
        }
    }
}

/// Identifier given as a number or a numeric string; blank means absent
pub fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<LooseId>::deserialize(deserializer)? {
        Some(id) => id.resolve(),
        None => Ok(None),
    }
}

/// List of identifiers in the same loose format; blanks are skipped
pub fn deserialize_id_list<'de, D>(deserializer: D) -> Result<Option<Vec<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<Vec<LooseId>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let mut ids = Vec::with_capacity(raw.len());
    for id in raw {
        if let Some(id) = id.resolve::<D::Error>()? {
            ids.push(id);
        }
    }
    Ok(Some(ids))
}
