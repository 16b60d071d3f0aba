//! Contracts the repository consumes from its storage collaborators.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracker_core::{ItemFilter, ItemId, PageRequest, WorkItem, WorkItemType};
use uuid::Uuid;

/// Outcome of a conditional replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The new record is stored.
    Committed,
    /// The stored version no longer equals the expected one.
    VersionMismatch,
    /// No record exists under the id.
    NotFound,
}

/// Persistence of work item records.
///
/// Implementations must make `conditional_replace` a single atomic
/// compare-and-replace on `(id, expected_version)`: of two concurrent calls
/// with the same expected version at most one may commit.
pub trait Storage: Send + Sync {
    /// Fetch a record by id.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn get(&self, id: ItemId) -> Result<Option<WorkItem>>;

    /// Store a new record under a freshly assigned id and return it.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn insert(&self, item: WorkItem) -> Result<WorkItem>;

    /// Replace the record under `id` only if its stored version equals
    /// `expected_version`.
    ///
    /// # Errors
    /// Returns an error if the backend fails; nothing is written then.
    fn conditional_replace(
        &self,
        id: ItemId,
        expected_version: u64,
        item: &WorkItem,
    ) -> Result<ReplaceOutcome>;

    /// Remove the record under `id`. Returns whether one existed.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn delete(&self, id: ItemId) -> Result<bool>;

    /// Fetch one page of matching records, ordered by id, along with the
    /// total number of matches.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn count_and_fetch(
        &self,
        filter: &ItemFilter,
        page: PageRequest,
    ) -> Result<(Vec<WorkItem>, usize)>;
}

/// A known user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,

    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl Identity {
    /// Create an identity with a random id.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            full_name: None,
        }
    }

    /// Set the full name.
    #[must_use]
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }
}

/// Lookup of identities referenced by relationships.
pub trait IdentityStore: Send + Sync {
    /// Fetch an identity by id.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn resolve(&self, id: &Uuid) -> Result<Option<Identity>>;

    /// Whether an identity exists.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn exists(&self, id: &Uuid) -> Result<bool> {
        Ok(self.resolve(id)?.is_some())
    }

    /// All identities.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn list(&self) -> Result<Vec<Identity>>;
}

/// Persistence of work item types added at runtime.
pub trait TypeStore: Send + Sync {
    /// Store a validated type definition.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn save_type(&self, work_item_type: &WorkItemType) -> Result<()>;
}

/// Apply a filter and page window to records already sorted by id.
pub(crate) fn select_page(
    items: impl IntoIterator<Item = WorkItem>,
    filter: &ItemFilter,
    page: PageRequest,
) -> (Vec<WorkItem>, usize) {
    let matching: Vec<WorkItem> = items.into_iter().filter(|i| filter.matches(i)).collect();
    let total = matching.len();
    let selected = matching
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .collect();
    (selected, total)
}
