//! Caller-supplied mutation payloads.

use crate::convert::VERSION_ATTRIBUTE;
use crate::error::{CoreError, Result};
use serde_json::{Map, Value};

/// Relationship path reported when an assignee reference is rejected.
pub const ASSIGNEE_RELATIONSHIP_PATH: &str = "data.relationships.assignee.data.id";

/// Requested change to the assignee relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssigneeRef {
    /// Remove the current assignee.
    Clear,
    /// Assign the identity with this (unparsed) id.
    Set(String),
}

/// Relationship block of a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    pub assignee: Option<AssigneeRef>,
}

impl Relationships {
    #[must_use]
    pub fn assign(id: impl Into<String>) -> Self {
        Self {
            assignee: Some(AssigneeRef::Set(id.into())),
        }
    }

    #[must_use]
    pub const fn unassign() -> Self {
        Self {
            assignee: Some(AssigneeRef::Clear),
        }
    }
}

/// A PATCH-style update of a single work item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialUpdate {
    /// Target id, unparsed.
    pub id: String,
    /// Claimed current version, as sent on the wire.
    pub version: Option<Value>,
    /// Only the attributes the caller wants to change.
    pub attributes: Map<String, Value>,
    /// Optional relationship changes.
    pub relationships: Option<Relationships>,
}

impl PartialUpdate {
    /// Build an update from a wire attribute bag, lifting `version` out of it.
    #[must_use]
    pub fn from_attributes(
        id: impl Into<String>,
        mut attributes: Map<String, Value>,
        relationships: Option<Relationships>,
    ) -> Self {
        let version = attributes.remove(VERSION_ATTRIBUTE);
        Self {
            id: id.into(),
            version,
            attributes,
            relationships,
        }
    }

    /// Set the claimed version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<Value>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set a single attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the relationship block.
    #[must_use]
    pub fn with_relationships(mut self, relationships: Relationships) -> Self {
        self.relationships = Some(relationships);
        self
    }

    /// Coerce the claimed version.
    ///
    /// # Errors
    /// Returns `CoreError::VersionConflict` if no version was supplied, and
    /// `CoreError::BadParameter` if it is not a non-negative integer.
    pub fn claimed_version(&self) -> Result<u64> {
        let wire = self
            .version
            .as_ref()
            .ok_or_else(|| CoreError::version_conflict("version is mandatory"))?;

        let parsed = match wire {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| CoreError::bad_parameter(VERSION_ATTRIBUTE, wire))
    }
}

/// Payload for creating a work item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewWorkItem {
    /// Name of the work item type.
    pub type_name: String,
    /// Initial attribute values.
    pub attributes: Map<String, Value>,
    /// Optional relationship values.
    pub relationships: Option<Relationships>,
}

impl NewWorkItem {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Set a single attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the relationship block.
    #[must_use]
    pub fn with_relationships(mut self, relationships: Relationships) -> Self {
        self.relationships = Some(relationships);
        self
    }
}
