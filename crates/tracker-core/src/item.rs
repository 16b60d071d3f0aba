//! Work item model.

use crate::error::{CoreError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Numeric key of a stored work item.
pub type ItemId = u64;

/// Entity name used in error messages.
pub const WORK_ITEM_ENTITY: &str = "work item";

/// Parse a caller-supplied identifier into the store's key space.
///
/// An identifier that cannot be parsed names an item that cannot exist, so
/// this reports `NotFound` rather than a format error.
///
/// # Errors
/// Returns `CoreError::NotFound` if `raw` is not a valid numeric id.
pub fn parse_item_id(raw: &str) -> Result<ItemId> {
    raw.trim()
        .parse::<ItemId>()
        .map_err(|_| CoreError::not_found(WORK_ITEM_ENTITY, raw))
}

/// A typed field value. The variant is dictated by the owning type's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Instant(DateTime<Utc>),
    Enum(String),
    User(Uuid),
}

impl FieldValue {
    /// Render the value in its wire representation.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            Self::String(s) | Self::Enum(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Instant(t) => Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::User(id) => Value::String(id.hyphenated().to_string()),
        }
    }
}

/// A versioned, schema-typed work item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkItem {
    /// Storage-assigned identifier.
    pub id: ItemId,

    /// Name of the work item type governing `fields`.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Concurrency token, bumped by exactly one per successful save.
    pub version: u64,

    /// Creation timestamp (ISO 8601 UTC).
    pub created_at: DateTime<Utc>,

    /// Last update timestamp (ISO 8601 UTC).
    pub updated_at: DateTime<Utc>,

    /// Field values keyed by field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldValue>,
}

impl WorkItem {
    /// Create an unsaved work item of the given type at version 0.
    #[must_use]
    pub fn new(id: ItemId, type_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            type_name: type_name.into(),
            version: 0,
            created_at: now,
            updated_at: now,
            fields: BTreeMap::new(),
        }
    }

    /// Set a field value.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Set the version.
    #[must_use]
    pub const fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Get a field value.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Apply converted changes. `None` removes the field.
    pub fn apply_changes(&mut self, changes: FieldChanges) {
        for (name, value) in changes {
            match value {
                Some(value) => {
                    self.fields.insert(name, value);
                }
                None => {
                    self.fields.remove(&name);
                }
            }
        }
    }

    /// Touch the `updated_at` timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Converted field assignments: `Some` sets the field, `None` clears it.
pub type FieldChanges = BTreeMap<String, Option<FieldValue>>;
