//! Storage backends and the versioned repository for tracker.
//!
//! - `Storage` / `IdentityStore` / `TypeStore`: contracts the repository consumes
//! - `MemoryStorage` / `MemoryIdentityStore`: in-process backends
//! - `Workspace`: file-backed backend storing items as YAML
//! - `WorkItemRepository`: create, load, optimistic save and paged list

pub mod config;
pub mod error;
pub mod memory;
pub mod repository;
pub mod resolver;
pub mod storage;
pub mod workspace;

pub use config::{PagingSettings, ServerSettings, WorkspaceConfig};
pub use error::{Result, StoreError};
pub use memory::{MemoryIdentityStore, MemoryStorage, MemoryTypeStore};
pub use repository::{ListPage, WorkItemRepository};
pub use resolver::RelationResolver;
pub use storage::{Identity, IdentityStore, ReplaceOutcome, Storage, TypeStore};
pub use workspace::Workspace;
