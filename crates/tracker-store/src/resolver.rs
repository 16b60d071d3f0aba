//! Resolution of relationship references into field changes.

use crate::storage::IdentityStore;
use tracing::debug;
use tracker_core::{
    AssigneeRef, CoreError, FieldChanges, FieldValue, Relationships, Result, WorkItemType,
    ASSIGNEE_RELATIONSHIP_PATH, SYSTEM_ASSIGNEE,
};
use uuid::Uuid;

/// Checks relationship targets against the identity store.
pub struct RelationResolver<'a> {
    identities: &'a dyn IdentityStore,
}

impl<'a> RelationResolver<'a> {
    #[must_use]
    pub fn new(identities: &'a dyn IdentityStore) -> Self {
        Self { identities }
    }

    /// Turn a relationship block into field changes for `work_item_type`.
    ///
    /// # Errors
    /// Returns `CoreError::BadParameter` naming the relationship path if the
    /// reference is malformed, names an unknown identity, or the type has no
    /// assignee field. Returns `CoreError::Internal` if the lookup fails.
    pub fn resolve(
        &self,
        relationships: Option<&Relationships>,
        work_item_type: &WorkItemType,
    ) -> Result<FieldChanges> {
        let mut changes = FieldChanges::new();
        let Some(assignee) = relationships.and_then(|r| r.assignee.as_ref()) else {
            return Ok(changes);
        };

        let supported = work_item_type
            .field(SYSTEM_ASSIGNEE)
            .is_some_and(|f| f.kind.is_relation());

        match assignee {
            AssigneeRef::Clear => {
                if !supported {
                    return Err(CoreError::bad_parameter(ASSIGNEE_RELATIONSHIP_PATH, "null"));
                }
                changes.insert(SYSTEM_ASSIGNEE.to_string(), None);
            }
            AssigneeRef::Set(raw) => {
                let reject = || CoreError::bad_parameter(ASSIGNEE_RELATIONSHIP_PATH, raw);
                if !supported {
                    return Err(reject());
                }
                let id = Uuid::parse_str(raw).map_err(|_| reject())?;
                if !self.identities.exists(&id)? {
                    debug!(identity = %id, "Assignee does not exist");
                    return Err(reject());
                }
                changes.insert(SYSTEM_ASSIGNEE.to_string(), Some(FieldValue::User(id)));
            }
        }

        Ok(changes)
    }
}
