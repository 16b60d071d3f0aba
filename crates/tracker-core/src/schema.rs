//! Work item types and the registry that holds them.
//!
//! A [`WorkItemType`] is an ordered list of [`FieldDefinition`]s. The
//! [`SchemaRegistry`] is built once at startup, then shared behind an `Arc`
//! and never mutated again.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entity name used in error messages.
pub const WORK_ITEM_TYPE_ENTITY: &str = "work item type";

/// Name of the built-in user story type.
pub const SYSTEM_USERSTORY: &str = "system.userstory";

/// Well-known system field names.
pub const SYSTEM_TITLE: &str = "system.title";
pub const SYSTEM_DESCRIPTION: &str = "system.description";
pub const SYSTEM_STATE: &str = "system.state";
pub const SYSTEM_CREATOR: &str = "system.creator";
pub const SYSTEM_ASSIGNEE: &str = "system.assignee";
pub const SYSTEM_PRIORITY: &str = "system.priority";

/// Closed set of field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    Instant,
    Enum,
    /// Reference to an identity.
    User,
}

impl FieldKind {
    /// Whether values of this kind reference another entity.
    #[must_use]
    pub const fn is_relation(self) -> bool {
        matches!(self, Self::User)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
            Self::Instant => write!(f, "instant"),
            Self::Enum => write!(f, "enum"),
            Self::User => write!(f, "user"),
        }
    }
}

/// Definition of a single field within a work item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name, unique within its type.
    pub name: String,

    /// Value kind.
    pub kind: FieldKind,

    /// Whether a value must always be present.
    #[serde(default)]
    pub required: bool,

    /// Allowed values for `enum` fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl FieldDefinition {
    /// Create an optional field of the given kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            values: Vec::new(),
        }
    }

    /// Create an optional enum field.
    #[must_use]
    pub fn enumeration(
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            ..Self::new(name, FieldKind::Enum)
        }
    }

    /// Mark the field as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A named schema for work items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemType {
    /// Unique type name.
    pub name: String,

    /// Field definitions in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl WorkItemType {
    /// Create an empty type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field definition.
    #[must_use]
    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Look up a field definition by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Required fields, in declaration order.
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.required)
    }

    /// The built-in user story type.
    #[must_use]
    pub fn userstory() -> Self {
        Self::new(SYSTEM_USERSTORY)
            .with_field(FieldDefinition::new(SYSTEM_TITLE, FieldKind::String).required())
            .with_field(FieldDefinition::new(SYSTEM_DESCRIPTION, FieldKind::String))
            .with_field(
                FieldDefinition::enumeration(
                    SYSTEM_STATE,
                    ["new", "open", "in progress", "resolved", "closed"],
                )
                .required(),
            )
            .with_field(FieldDefinition::new(SYSTEM_CREATOR, FieldKind::String))
            .with_field(FieldDefinition::new(SYSTEM_ASSIGNEE, FieldKind::User))
            .with_field(FieldDefinition::new(SYSTEM_PRIORITY, FieldKind::Integer))
    }

    /// Check the type is well formed.
    ///
    /// # Errors
    /// Returns `CoreError::BadParameter` for an empty name, duplicate field
    /// names, enum fields without values, or a user field other than
    /// `system.assignee` (no relationship can write it).
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::bad_parameter("name", &self.name));
        }

        for (i, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(CoreError::bad_parameter(
                    format!("{}.fields[{i}].name", self.name),
                    &field.name,
                ));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(CoreError::bad_parameter(
                    format!("{}.fields", self.name),
                    format!("duplicate field '{}'", field.name),
                ));
            }
            match field.kind {
                FieldKind::User if field.name != SYSTEM_ASSIGNEE => {
                    return Err(CoreError::bad_parameter(
                        format!("{}.{}.kind", self.name, field.name),
                        "user fields other than system.assignee are not writable",
                    ));
                }
                FieldKind::Enum if field.values.is_empty() => {
                    return Err(CoreError::bad_parameter(
                        format!("{}.{}.values", self.name, field.name),
                        "empty",
                    ));
                }
                FieldKind::Enum => {}
                _ if !field.values.is_empty() => {
                    return Err(CoreError::bad_parameter(
                        format!("{}.{}.values", self.name, field.name),
                        format!("not allowed for kind {}", field.kind),
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Holds every known work item type, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, WorkItemType>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in types.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let userstory = WorkItemType::userstory();
        registry.types.insert(userstory.name.clone(), userstory);
        registry
    }

    /// Add a type while the registry is being assembled.
    ///
    /// # Errors
    /// Returns `CoreError::BadParameter` if the type is malformed or its name
    /// is already registered.
    pub fn register(&mut self, work_item_type: WorkItemType) -> Result<()> {
        work_item_type.validate()?;
        if self.types.contains_key(&work_item_type.name) {
            return Err(CoreError::bad_parameter(
                "name",
                format!("duplicate work item type '{}'", work_item_type.name),
            ));
        }
        self.types
            .insert(work_item_type.name.clone(), work_item_type);
        Ok(())
    }

    /// Look up a type by name.
    ///
    /// # Errors
    /// Returns `CoreError::NotFound` if no such type exists.
    pub fn lookup(&self, name: &str) -> Result<&WorkItemType> {
        self.types
            .get(name)
            .ok_or_else(|| CoreError::not_found(WORK_ITEM_TYPE_ENTITY, name))
    }

    /// All types, sorted by name.
    #[must_use]
    pub fn types(&self) -> Vec<&WorkItemType> {
        let mut types: Vec<_> = self.types.values().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        types
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = SchemaRegistry::with_builtin();
        let wit = registry.lookup(SYSTEM_USERSTORY).unwrap();

        assert_eq!(wit.fields.first().map(|f| f.name.as_str()), Some(SYSTEM_TITLE));
        assert!(wit.field(SYSTEM_ASSIGNEE).unwrap().kind.is_relation());
        let required: Vec<_> = wit.required_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(required, vec![SYSTEM_TITLE, SYSTEM_STATE]);
    }

    #[test]
    fn test_lookup_unknown_type() {
        let registry = SchemaRegistry::with_builtin();
        assert!(matches!(
            registry.lookup("system.bug"),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = SchemaRegistry::with_builtin();
        let result = registry.register(WorkItemType::userstory());
        assert!(matches!(result, Err(CoreError::BadParameter { .. })));

        let dup_fields = WorkItemType::new("custom")
            .with_field(FieldDefinition::new("a", FieldKind::String))
            .with_field(FieldDefinition::new("a", FieldKind::Integer));
        assert!(registry.register(dup_fields).is_err());
    }

    #[test]
    fn test_validate_enum_values() {
        let no_values = WorkItemType::new("custom").with_field(FieldDefinition::new(
            "severity",
            FieldKind::Enum,
        ));
        assert!(no_values.validate().is_err());

        let stray_values = WorkItemType::new("custom").with_field(FieldDefinition {
            values: vec!["x".into()],
            ..FieldDefinition::new("count", FieldKind::Integer)
        });
        assert!(stray_values.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unwritable_user_field() {
        let reviewer = WorkItemType::new("custom.review")
            .with_field(FieldDefinition::new("custom.reviewer", FieldKind::User));
        let err = reviewer.validate().unwrap_err();
        assert!(matches!(err, CoreError::BadParameter { .. }));

        let assigned = WorkItemType::new("custom.task")
            .with_field(FieldDefinition::new(SYSTEM_ASSIGNEE, FieldKind::User));
        assert!(assigned.validate().is_ok());
        assert!(WorkItemType::userstory().validate().is_ok());
    }

    #[test]
    fn test_type_from_yaml_shape() {
        let json = serde_json::json!({
            "name": "system.bug",
            "fields": [
                {"name": "system.title", "kind": "string", "required": true},
                {"name": "severity", "kind": "enum", "values": ["low", "high"]}
            ]
        });
        let wit: WorkItemType = serde_json::from_value(json).unwrap();

        assert_eq!(wit.fields.len(), 2);
        assert!(wit.fields[0].required);
        assert_eq!(wit.field("severity").unwrap().kind, FieldKind::Enum);
        wit.validate().unwrap();
    }
}
