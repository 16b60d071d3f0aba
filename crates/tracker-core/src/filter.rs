//! Equality filters for listing work items.
//!
//! A filter expression is a JSON object. Each key names a field (or `Type`
//! for the work item type) and each value is the value it must equal. All
//! conditions must hold.

use crate::error::{CoreError, Result};
use crate::item::WorkItem;
use serde_json::Value;
use std::collections::BTreeMap;

/// Pseudo-field matching the work item type name.
pub const TYPE_KEY: &str = "Type";

/// Parsed filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFilter {
    /// Required type name.
    pub type_name: Option<String>,
    /// Required field values, in wire form.
    pub conditions: BTreeMap<String, Value>,
}

impl ItemFilter {
    /// Parse a filter expression. A blank expression matches everything.
    ///
    /// # Errors
    /// Returns `CoreError::BadParameter` if the expression is not a JSON
    /// object or `Type` is not a string.
    pub fn parse(expression: &str) -> Result<Self> {
        if expression.trim().is_empty() {
            return Ok(Self::default());
        }

        let parsed: Value = serde_json::from_str(expression)
            .map_err(|e| CoreError::bad_parameter("filter", format!("{expression} ({e})")))?;
        let Value::Object(object) = parsed else {
            return Err(CoreError::bad_parameter("filter", expression));
        };

        let mut filter = Self::default();
        for (key, value) in object {
            if key == TYPE_KEY {
                let name = value
                    .as_str()
                    .ok_or_else(|| CoreError::bad_parameter("filter.Type", &value))?;
                filter.type_name = Some(name.to_string());
            } else {
                filter.conditions.insert(key, value);
            }
        }
        Ok(filter)
    }

    /// Require a field value.
    #[must_use]
    pub fn with_condition(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(field.into(), value.into());
        self
    }

    /// Check if an item matches this filter.
    #[must_use]
    pub fn matches(&self, item: &WorkItem) -> bool {
        if let Some(type_name) = &self.type_name {
            if item.type_name != *type_name {
                return false;
            }
        }

        self.conditions.iter().all(|(field, expected)| {
            let actual = item.field(field).map_or(Value::Null, |v| v.to_wire());
            wire_eq(&actual, expected)
        })
    }
}

/// Equality that also lets a string condition match a scalar rendered as text.
fn wire_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::Number(n), Value::String(s)) => n.to_string() == *s,
        (Value::Bool(b), Value::String(s)) => b.to_string() == *s,
        _ => false,
    }
}
