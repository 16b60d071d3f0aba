//! Schema-driven conversion between wire values and typed field values.

use crate::error::{CoreError, Result};
use crate::item::{FieldChanges, FieldValue, WorkItem};
use crate::schema::{FieldDefinition, FieldKind, WorkItemType};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Attribute key carrying the concurrency token on the wire.
pub const VERSION_ATTRIBUTE: &str = "version";

/// Converts field values for one work item type.
///
/// The type must come from the stored record (or, on create, the registry),
/// never from the caller's payload.
#[derive(Debug, Clone, Copy)]
pub struct FieldConverter<'a> {
    work_item_type: &'a WorkItemType,
}

impl<'a> FieldConverter<'a> {
    #[must_use]
    pub const fn new(work_item_type: &'a WorkItemType) -> Self {
        Self { work_item_type }
    }

    /// The type driving this converter.
    #[must_use]
    pub const fn work_item_type(&self) -> &'a WorkItemType {
        self.work_item_type
    }

    /// Convert one wire value. `Ok(None)` means the field is cleared.
    ///
    /// # Errors
    /// Returns `CoreError::BadParameter` naming the field and the rejected
    /// value if the field is unknown or the value does not coerce.
    pub fn to_model(&self, field_name: &str, wire: &Value) -> Result<Option<FieldValue>> {
        let definition = self
            .work_item_type
            .field(field_name)
            .ok_or_else(|| CoreError::bad_parameter(field_name, wire))?;
        definition.convert_to_model(wire)
    }

    /// Convert a sparse attribute bag into field changes.
    ///
    /// Every key is checked before anything is returned, so a single bad
    /// entry rejects the whole bag. Relation fields are refused here; they
    /// are only writable through relationships.
    ///
    /// # Errors
    /// Returns `CoreError::BadParameter` for the first offending attribute.
    pub fn convert_attributes(&self, attributes: &Map<String, Value>) -> Result<FieldChanges> {
        let mut changes = FieldChanges::new();
        for (name, wire) in attributes {
            if let Some(definition) = self.work_item_type.field(name) {
                if definition.kind.is_relation() {
                    return Err(CoreError::bad_parameter(name.as_str(), wire));
                }
            }
            let value = self.to_model(name, wire)?;
            changes.insert(name.clone(), value);
        }
        Ok(changes)
    }

    /// Render a stored work item as a wire attribute map, `version` included.
    #[must_use]
    pub fn from_model(&self, item: &WorkItem) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert(VERSION_ATTRIBUTE.to_string(), Value::from(item.version));
        for definition in &self.work_item_type.fields {
            if let Some(value) = item.field(&definition.name) {
                attributes.insert(definition.name.clone(), value.to_wire());
            }
        }
        attributes
    }

    /// Check that every required field has a value.
    ///
    /// # Errors
    /// Returns `CoreError::BadParameter` naming the first missing field.
    pub fn check_required(&self, item: &WorkItem) -> Result<()> {
        match self
            .work_item_type
            .required_fields()
            .find(|f| item.field(&f.name).is_none())
        {
            Some(missing) => Err(CoreError::bad_parameter(missing.name.as_str(), Value::Null)),
            None => Ok(()),
        }
    }
}

impl FieldDefinition {
    /// Coerce a wire value into this field's typed value.
    ///
    /// # Errors
    /// Returns `CoreError::BadParameter` if the value has the wrong shape, or
    /// is null while the field is required.
    pub fn convert_to_model(&self, wire: &Value) -> Result<Option<FieldValue>> {
        if wire.is_null() {
            if self.required {
                return Err(CoreError::bad_parameter(self.name.as_str(), wire));
            }
            return Ok(None);
        }

        let converted = match self.kind {
            FieldKind::String => wire.as_str().map(|s| FieldValue::String(s.to_string())),
            FieldKind::Integer => to_integer(wire).map(FieldValue::Integer),
            FieldKind::Float => to_float(wire).map(FieldValue::Float),
            FieldKind::Boolean => to_boolean(wire).map(FieldValue::Boolean),
            FieldKind::Instant => wire
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| FieldValue::Instant(t.with_timezone(&Utc))),
            FieldKind::Enum => wire
                .as_str()
                .filter(|s| self.values.iter().any(|v| v == s))
                .map(|s| FieldValue::Enum(s.to_string())),
            FieldKind::User => wire
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(FieldValue::User),
        };

        converted
            .map(Some)
            .ok_or_else(|| CoreError::bad_parameter(self.name.as_str(), wire))
    }
}

fn to_integer(wire: &Value) -> Option<i64> {
    match wire {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_float(wire: &Value) -> Option<f64> {
    let f = match wire {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    f.is_finite().then_some(f)
}

fn to_boolean(wire: &Value) -> Option<bool> {
    match wire {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SYSTEM_ASSIGNEE, SYSTEM_PRIORITY, SYSTEM_STATE, SYSTEM_TITLE};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn userstory() -> WorkItemType {
        WorkItemType::userstory()
    }

    fn attributes(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_integer_coercion() {
        let wit = userstory();
        let converter = FieldConverter::new(&wit);

        assert_eq!(
            converter.to_model(SYSTEM_PRIORITY, &json!(3)).unwrap(),
            Some(FieldValue::Integer(3))
        );
        assert_eq!(
            converter.to_model(SYSTEM_PRIORITY, &json!("42")).unwrap(),
            Some(FieldValue::Integer(42))
        );
        assert!(converter.to_model(SYSTEM_PRIORITY, &json!(1.5)).is_err());
        assert!(converter.to_model(SYSTEM_PRIORITY, &json!("high")).is_err());
    }

    #[test]
    fn test_enum_and_string() {
        let wit = userstory();
        let converter = FieldConverter::new(&wit);

        assert_eq!(
            converter.to_model(SYSTEM_STATE, &json!("open")).unwrap(),
            Some(FieldValue::Enum("open".into()))
        );
        assert!(converter.to_model(SYSTEM_STATE, &json!("bogus")).is_err());
        assert!(converter.to_model(SYSTEM_TITLE, &json!(12)).is_err());
    }

    #[test]
    fn test_other_kinds() {
        let wit = WorkItemType::new("custom")
            .with_field(FieldDefinition::new("estimate", FieldKind::Float))
            .with_field(FieldDefinition::new("blocked", FieldKind::Boolean))
            .with_field(FieldDefinition::new("due", FieldKind::Instant));
        let converter = FieldConverter::new(&wit);

        assert_eq!(
            converter.to_model("estimate", &json!("2.5")).unwrap(),
            Some(FieldValue::Float(2.5))
        );
        assert_eq!(
            converter.to_model("blocked", &json!("true")).unwrap(),
            Some(FieldValue::Boolean(true))
        );
        assert!(converter.to_model("blocked", &json!("yes")).is_err());
        assert!(converter.to_model("due", &json!("2024-05-01T10:00:00+02:00")).is_ok());
        assert!(converter.to_model("due", &json!("tomorrow")).is_err());
    }

    #[test]
    fn test_null_clears_optional_but_not_required() {
        let wit = userstory();
        let converter = FieldConverter::new(&wit);

        assert_eq!(converter.to_model(SYSTEM_PRIORITY, &Value::Null).unwrap(), None);
        assert!(matches!(
            converter.to_model(SYSTEM_TITLE, &Value::Null),
            Err(CoreError::BadParameter { .. })
        ));
    }

    #[test]
    fn test_unknown_field_names_offender() {
        let wit = userstory();
        let converter = FieldConverter::new(&wit);

        let err = converter
            .convert_attributes(&attributes(json!({
                "system.title": "ok",
                "system.color": "red"
            })))
            .unwrap_err();
        assert_eq!(err, CoreError::bad_parameter("system.color", json!("red")));
    }

    #[test]
    fn test_relation_fields_refused_in_attributes() {
        let wit = userstory();
        let converter = FieldConverter::new(&wit);

        let err = converter
            .convert_attributes(&attributes(json!({
                SYSTEM_ASSIGNEE: "00000000-0000-0000-0000-000000000000"
            })))
            .unwrap_err();
        assert!(matches!(err, CoreError::BadParameter { parameter, .. } if parameter == SYSTEM_ASSIGNEE));
    }

    #[test]
    fn test_from_model_includes_version() {
        let wit = userstory();
        let converter = FieldConverter::new(&wit);
        let item = WorkItem::new(1, wit.name.clone())
            .with_version(4)
            .with_field(SYSTEM_TITLE, FieldValue::String("Fix login".into()))
            .with_field(SYSTEM_PRIORITY, FieldValue::Integer(2));

        assert_eq!(
            Value::Object(converter.from_model(&item)),
            json!({
                "version": 4,
                "system.title": "Fix login",
                "system.priority": 2
            })
        );
    }

    #[test]
    fn test_check_required() {
        let wit = userstory();
        let converter = FieldConverter::new(&wit);
        let item = WorkItem::new(1, wit.name.clone())
            .with_field(SYSTEM_TITLE, FieldValue::String("t".into()));

        let err = converter.check_required(&item).unwrap_err();
        assert_eq!(err, CoreError::bad_parameter(SYSTEM_STATE, Value::Null));
    }
}
