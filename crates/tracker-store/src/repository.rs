//! Versioned work item repository.
//!
//! All mutation of stored work items goes through [`WorkItemRepository`].
//! Updates are optimistic: the caller states the version it last saw, and the
//! write only lands if that is still the stored version. Nothing here locks or
//! retries; a losing writer gets `VersionConflict` and decides for itself.

use crate::resolver::RelationResolver;
use crate::storage::{IdentityStore, ReplaceOutcome, Storage};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracker_core::{
    page_links, parse_item_id, CoreError, FieldConverter, ItemFilter, NewWorkItem, PageLinks,
    PageRequest, PartialUpdate, Result, SchemaRegistry, WorkItem, WorkItemType, WORK_ITEM_ENTITY,
};

/// One page of a list result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage {
    pub items: Vec<WorkItem>,
    pub links: PageLinks,
    pub total_count: usize,
}

/// Entry point for reading and mutating work items.
#[derive(Clone)]
pub struct WorkItemRepository {
    storage: Arc<dyn Storage>,
    identities: Arc<dyn IdentityStore>,
    registry: Arc<SchemaRegistry>,
}

impl WorkItemRepository {
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        identities: Arc<dyn IdentityStore>,
        registry: Arc<SchemaRegistry>,
    ) -> Self {
        Self {
            storage,
            identities,
            registry,
        }
    }

    /// The schema snapshot this repository converts against.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// A repository over the same stores with `work_item_type` added to a
    /// copy of the registry. Holders of `self` keep the old snapshot.
    ///
    /// # Errors
    /// Returns `CoreError::BadParameter` if the type is malformed or already
    /// registered.
    pub fn with_type(&self, work_item_type: WorkItemType) -> Result<Self> {
        let mut registry = SchemaRegistry::clone(&self.registry);
        registry.register(work_item_type)?;
        Ok(Self {
            registry: Arc::new(registry),
            ..self.clone()
        })
    }

    /// The type of a stored item. A stored type that is no longer registered
    /// is an inconsistency of the store, not a caller error.
    fn stored_type(&self, item: &WorkItem) -> Result<&WorkItemType> {
        self.registry.lookup(&item.type_name).map_err(|_| {
            CoreError::internal(format!(
                "work item {} has unknown type '{}'",
                item.id, item.type_name
            ))
        })
    }

    /// Load a work item.
    ///
    /// # Errors
    /// Returns `CoreError::NotFound` if the id is unparsable or unknown.
    pub fn load(&self, id: &str) -> Result<WorkItem> {
        let key = parse_item_id(id)?;
        self.storage
            .get(key)?
            .ok_or_else(|| CoreError::not_found(WORK_ITEM_ENTITY, id))
    }

    /// Create a work item at version 0.
    ///
    /// # Errors
    /// Returns `CoreError::NotFound` for an unknown type,
    /// `CoreError::BadParameter` for unconvertible or missing required
    /// values, and `CoreError::Internal` if storage fails.
    pub fn create(&self, new: &NewWorkItem) -> Result<WorkItem> {
        let work_item_type = self.registry.lookup(&new.type_name)?;
        let converter = FieldConverter::new(work_item_type);

        let relations = RelationResolver::new(self.identities.as_ref())
            .resolve(new.relationships.as_ref(), work_item_type)?;
        let changes = converter.convert_attributes(&new.attributes)?;

        let mut item = WorkItem::new(0, work_item_type.name.clone());
        item.apply_changes(relations);
        item.apply_changes(changes);
        converter.check_required(&item)?;

        let item = self.storage.insert(item)?;
        info!(id = item.id, work_item_type = %item.type_name, "Created work item");
        Ok(item)
    }

    /// Apply a partial update if the claimed version is current.
    ///
    /// Fields absent from the update keep their stored values. On success
    /// the returned record carries the stored version plus one; on any error
    /// the stored record is left untouched.
    ///
    /// # Errors
    /// Returns `CoreError::NotFound` if the id is unparsable or unknown,
    /// `CoreError::VersionConflict` if the version is missing or stale,
    /// `CoreError::BadParameter` for rejected values, and
    /// `CoreError::Internal` if storage fails.
    pub fn save(&self, update: &PartialUpdate) -> Result<WorkItem> {
        let id = parse_item_id(&update.id)?;
        let stored = self
            .storage
            .get(id)?
            .ok_or_else(|| CoreError::not_found(WORK_ITEM_ENTITY, &update.id))?;

        let claimed = update.claimed_version()?;
        if claimed != stored.version {
            warn!(id, claimed, stored = stored.version, "Rejected stale update");
            return Err(CoreError::version_conflict(format!(
                "expected version {}, got {claimed}",
                stored.version
            )));
        }

        // Convert against the stored type; the payload cannot change it.
        let work_item_type = self.stored_type(&stored)?;
        let relations = RelationResolver::new(self.identities.as_ref())
            .resolve(update.relationships.as_ref(), work_item_type)?;
        let changes = FieldConverter::new(work_item_type).convert_attributes(&update.attributes)?;

        let mut updated = stored.clone();
        updated.apply_changes(relations);
        updated.apply_changes(changes);
        updated.version = stored.version + 1;
        updated.touch();

        match self
            .storage
            .conditional_replace(id, stored.version, &updated)?
        {
            ReplaceOutcome::Committed => {
                info!(id, version = updated.version, "Updated work item");
                Ok(updated)
            }
            ReplaceOutcome::VersionMismatch => {
                warn!(id, claimed, "Lost concurrent update");
                Err(CoreError::version_conflict("version conflict"))
            }
            ReplaceOutcome::NotFound => Err(CoreError::not_found(WORK_ITEM_ENTITY, &update.id)),
        }
    }

    /// Delete a work item.
    ///
    /// # Errors
    /// Returns `CoreError::NotFound` if the id is unparsable or unknown, and
    /// `CoreError::Internal` if storage fails.
    pub fn delete(&self, id: &str) -> Result<()> {
        let key = parse_item_id(id)?;
        if !self.storage.delete(key)? {
            return Err(CoreError::not_found(WORK_ITEM_ENTITY, id));
        }
        info!(id = key, "Deleted work item");
        Ok(())
    }

    /// List one page of work items matching `filter`.
    ///
    /// # Errors
    /// Returns `CoreError::Internal` if storage fails.
    pub fn list(&self, filter: &ItemFilter, page: PageRequest) -> Result<ListPage> {
        let (items, total_count) = self.storage.count_and_fetch(filter, page)?;
        let links = page_links(page.offset, page.limit, items.len(), total_count);
        debug!(
            offset = page.offset,
            limit = page.limit,
            returned = items.len(),
            total_count,
            "Listed work items"
        );
        Ok(ListPage {
            items,
            links,
            total_count,
        })
    }

    /// Render a work item's attributes in wire form.
    ///
    /// # Errors
    /// Returns `CoreError::Internal` if the item's type is unknown.
    pub fn to_wire(&self, item: &WorkItem) -> Result<serde_json::Map<String, serde_json::Value>> {
        Ok(FieldConverter::new(self.stored_type(item)?).from_model(item))
    }
}
