//! In-memory storage backends.

use crate::error::Result;
use crate::storage::{
    select_page, Identity, IdentityStore, ReplaceOutcome, Storage, TypeStore,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracker_core::{ItemFilter, ItemId, PageRequest, WorkItem, WorkItemType};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Items {
    records: BTreeMap<ItemId, WorkItem>,
    last_id: ItemId,
}

/// Work item records held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<Items>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().records.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().records.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, id: ItemId) -> Result<Option<WorkItem>> {
        Ok(self.items.read().records.get(&id).cloned())
    }

    fn insert(&self, mut item: WorkItem) -> Result<WorkItem> {
        let mut items = self.items.write();
        items.last_id += 1;
        item.id = items.last_id;
        items.records.insert(item.id, item.clone());
        debug!(id = item.id, "Inserted work item");
        Ok(item)
    }

    fn conditional_replace(
        &self,
        id: ItemId,
        expected_version: u64,
        item: &WorkItem,
    ) -> Result<ReplaceOutcome> {
        let mut items = self.items.write();
        let Some(current) = items.records.get_mut(&id) else {
            return Ok(ReplaceOutcome::NotFound);
        };
        if current.version != expected_version {
            return Ok(ReplaceOutcome::VersionMismatch);
        }
        *current = item.clone();
        Ok(ReplaceOutcome::Committed)
    }

    fn delete(&self, id: ItemId) -> Result<bool> {
        Ok(self.items.write().records.remove(&id).is_some())
    }

    fn count_and_fetch(
        &self,
        filter: &ItemFilter,
        page: PageRequest,
    ) -> Result<(Vec<WorkItem>, usize)> {
        let items = self.items.read();
        Ok(select_page(items.records.values().cloned(), filter, page))
    }
}

/// Identities held in process memory.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    identities: RwLock<HashMap<Uuid, Identity>>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given identities.
    #[must_use]
    pub fn with_identities(identities: impl IntoIterator<Item = Identity>) -> Self {
        let store = Self::new();
        for identity in identities {
            store.add(identity);
        }
        store
    }

    /// Add or replace an identity.
    pub fn add(&self, identity: Identity) {
        self.identities.write().insert(identity.id, identity);
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn resolve(&self, id: &Uuid) -> Result<Option<Identity>> {
        Ok(self.identities.read().get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Identity>> {
        let mut identities: Vec<_> = self.identities.read().values().cloned().collect();
        identities.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(identities)
    }
}

/// Type definitions kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryTypeStore {
    types: RwLock<Vec<WorkItemType>>,
}

impl MemoryTypeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved types, in save order.
    #[must_use]
    pub fn saved(&self) -> Vec<WorkItemType> {
        self.types.read().clone()
    }
}

impl TypeStore for MemoryTypeStore {
    fn save_type(&self, work_item_type: &WorkItemType) -> Result<()> {
        self.types.write().push(work_item_type.clone());
        Ok(())
    }
}
