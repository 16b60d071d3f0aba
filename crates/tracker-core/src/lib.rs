//! tracker-core: Domain models, schema conversion and paging for work item tracking.
//!
//! This crate provides:
//! - `WorkItem`: A versioned record whose fields are typed by its `WorkItemType`
//! - `SchemaRegistry`: The immutable set of known work item types
//! - `FieldConverter`: Wire value <-> typed field conversion driven by the schema
//! - `PartialUpdate` / `NewWorkItem`: Caller-supplied mutation payloads
//! - `page_links`: first/prev/next/last computation for offset/limit paging

pub mod convert;
pub mod error;
pub mod filter;
pub mod item;
pub mod paging;
pub mod schema;
pub mod update;

pub use convert::{FieldConverter, VERSION_ATTRIBUTE};
pub use error::{CoreError, Result};
pub use filter::ItemFilter;
pub use item::{parse_item_id, FieldChanges, FieldValue, ItemId, WorkItem, WORK_ITEM_ENTITY};
pub use paging::{page_links, PageLink, PageLinks, PageRequest, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use schema::{
    FieldDefinition, FieldKind, SchemaRegistry, WorkItemType, SYSTEM_ASSIGNEE, SYSTEM_STATE,
    SYSTEM_TITLE, SYSTEM_USERSTORY,
};
pub use update::{AssigneeRef, NewWorkItem, PartialUpdate, Relationships, ASSIGNEE_RELATIONSHIP_PATH};
