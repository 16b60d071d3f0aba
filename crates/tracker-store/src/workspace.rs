//! File-backed workspace: configuration, schemas, identities and work items.
//!
//! Layout:
//! - `.tracker/config.yml`: workspace configuration
//! - `.tracker/types/*.yml`: additional work item types
//! - `.tracker/identities.yml`: known identities
//! - `.tracker/lock`: held exclusively by whichever process is writing
//! - `.tracker/last_id`: highest id ever assigned
//! - `work/items/<id>.yml`: one file per work item

use crate::config::WorkspaceConfig;
use crate::error::{Result, StoreError};
use crate::storage::{
    select_page, Identity, IdentityStore, ReplaceOutcome, Storage, TypeStore,
};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use tracker_core::{ItemFilter, ItemId, PageRequest, SchemaRegistry, WorkItem, WorkItemType};
use uuid::Uuid;

/// Directory name for tracker configuration.
const TRACKER_DIR: &str = ".tracker";
/// Configuration file name.
const CONFIG_FILE: &str = "config.yml";
/// Work item type directory within the tracker directory.
const TYPES_DIR: &str = "types";
/// Identities file name.
const IDENTITIES_FILE: &str = "identities.yml";
/// Writer lock file name.
const LOCK_FILE: &str = "lock";
/// Id counter file name.
const LAST_ID_FILE: &str = "last_id";
/// Items directory name.
const ITEMS_DIR: &str = "work/items";
/// Extension of item and type files.
const YAML_EXT: &str = "yml";

/// A workspace stores work items on the filesystem.
///
/// Every write runs under an exclusive OS lock on `.tracker/lock`, so any
/// number of handles, in this process or others, may share one workspace.
#[derive(Debug)]
pub struct Workspace {
    /// Root path of the workspace.
    root: PathBuf,
    /// Workspace configuration.
    config: WorkspaceConfig,
}

/// Exclusive hold on the workspace lock file. Released on drop.
struct WriteLock {
    file: File,
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl Workspace {
    /// Initialize a new workspace at the given path.
    ///
    /// # Errors
    /// Returns error if workspace already exists or IO fails.
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        Self::init_with_config(path, WorkspaceConfig::default())
    }

    /// Initialize a new workspace with the given configuration.
    ///
    /// # Errors
    /// Returns error if workspace already exists or IO fails.
    pub fn init_with_config(path: impl AsRef<Path>, config: WorkspaceConfig) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let tracker_dir = root.join(TRACKER_DIR);

        if tracker_dir.exists() {
            return Err(StoreError::WorkspaceExists(root));
        }

        fs::create_dir_all(tracker_dir.join(TYPES_DIR))?;
        fs::create_dir_all(root.join(ITEMS_DIR))?;

        fs::write(tracker_dir.join(CONFIG_FILE), serde_yaml::to_string(&config)?)?;
        fs::write(
            tracker_dir.join(IDENTITIES_FILE),
            serde_yaml::to_string(&Vec::<Identity>::new())?,
        )?;

        info!(path = %root.display(), "Initialized workspace");

        Ok(Self { root, config })
    }

    /// Open an existing workspace at the given path.
    ///
    /// # Errors
    /// Returns error if workspace doesn't exist or config is invalid.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let config_path = root.join(TRACKER_DIR).join(CONFIG_FILE);

        if !config_path.exists() {
            return Err(StoreError::WorkspaceNotFound(root));
        }

        let config: WorkspaceConfig = serde_yaml::from_str(&fs::read_to_string(&config_path)?)?;

        debug!(path = %root.display(), "Opened workspace");

        Ok(Self { root, config })
    }

    /// Get the workspace root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the workspace configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    fn tracker_path(&self, name: &str) -> PathBuf {
        self.root.join(TRACKER_DIR).join(name)
    }

    fn types_dir(&self) -> PathBuf {
        self.tracker_path(TYPES_DIR)
    }

    fn identities_path(&self) -> PathBuf {
        self.tracker_path(IDENTITIES_FILE)
    }

    fn items_dir(&self) -> PathBuf {
        self.root.join(ITEMS_DIR)
    }

    fn item_path(&self, id: ItemId) -> PathBuf {
        self.items_dir().join(format!("{id}.{YAML_EXT}"))
    }

    fn type_path(&self, name: &str) -> PathBuf {
        self.types_dir().join(format!("{name}.{YAML_EXT}"))
    }

    /// Block until this handle holds the workspace write lock.
    fn lock(&self) -> Result<WriteLock> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.tracker_path(LOCK_FILE))?;
        FileExt::lock_exclusive(&file)?;
        Ok(WriteLock { file })
    }

    /// Build the schema registry: built-in types plus every type file.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidSchema` if a type file is malformed or
    /// clashes with an already registered type.
    pub fn load_registry(&self) -> Result<SchemaRegistry> {
        let mut registry = SchemaRegistry::with_builtin();

        for path in yaml_files(&self.types_dir())? {
            let work_item_type: WorkItemType = serde_yaml::from_str(&fs::read_to_string(&path)?)
                .map_err(|e| StoreError::InvalidSchema {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            let name = work_item_type.name.clone();
            registry
                .register(work_item_type)
                .map_err(|e| StoreError::InvalidSchema {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            debug!(name = %name, path = %path.display(), "Registered work item type");
        }

        Ok(registry)
    }

    /// Write a work item type file. Takes effect the next time the registry
    /// is loaded.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidSchema` if the type is malformed or a
    /// file for it already exists, and an IO error if writing fails.
    pub fn add_type(&self, work_item_type: &WorkItemType) -> Result<()> {
        let path = self.type_path(&work_item_type.name);
        work_item_type
            .validate()
            .map_err(|e| StoreError::InvalidSchema {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let _lock = self.lock()?;
        if path.exists() {
            return Err(StoreError::InvalidSchema {
                path,
                reason: format!("work item type '{}' already exists", work_item_type.name),
            });
        }
        write_atomically(&path, &serde_yaml::to_string(work_item_type)?)?;
        info!(name = %work_item_type.name, "Added work item type");
        Ok(())
    }

    /// Add an identity, replacing any with the same id.
    ///
    /// # Errors
    /// Returns error if IO fails.
    pub fn add_identity(&self, identity: Identity) -> Result<()> {
        let _lock = self.lock()?;
        let mut identities = self.read_identities()?;
        identities.retain(|i| i.id != identity.id);
        info!(id = %identity.id, username = %identity.username, "Added identity");
        identities.push(identity);
        write_atomically(&self.identities_path(), &serde_yaml::to_string(&identities)?)
    }

    fn read_identities(&self) -> Result<Vec<Identity>> {
        let path = self.identities_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(serde_yaml::from_str(&fs::read_to_string(path)?)?)
    }

    fn read_item(&self, id: ItemId) -> Result<Option<WorkItem>> {
        let path = self.item_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_yaml::from_str(&fs::read_to_string(path)?)?))
    }

    fn write_item(&self, item: &WorkItem) -> Result<()> {
        write_atomically(&self.item_path(item.id), &serde_yaml::to_string(item)?)
    }

    /// Ids of all stored items, ascending.
    fn item_ids(&self) -> Result<Vec<ItemId>> {
        let mut ids: Vec<ItemId> = yaml_files(&self.items_dir())?
            .iter()
            .filter_map(|p| p.file_stem()?.to_str()?.parse().ok())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Reserve the next id. Caller must hold the write lock.
    fn allocate_id(&self) -> Result<ItemId> {
        let counter = self.tracker_path(LAST_ID_FILE);
        let recorded: ItemId = if counter.exists() {
            fs::read_to_string(&counter)?.trim().parse().unwrap_or(0)
        } else {
            0
        };
        let highest = self.item_ids()?.last().copied().unwrap_or(0);
        let id = recorded.max(highest) + 1;
        write_atomically(&counter, &id.to_string())?;
        Ok(id)
    }
}

impl Storage for Workspace {
    fn get(&self, id: ItemId) -> Result<Option<WorkItem>> {
        self.read_item(id)
    }

    fn insert(&self, mut item: WorkItem) -> Result<WorkItem> {
        let _lock = self.lock()?;
        item.id = self.allocate_id()?;
        self.write_item(&item)?;
        info!(id = item.id, work_item_type = %item.type_name, "Created work item");
        Ok(item)
    }

    fn conditional_replace(
        &self,
        id: ItemId,
        expected_version: u64,
        item: &WorkItem,
    ) -> Result<ReplaceOutcome> {
        let _lock = self.lock()?;
        let Some(current) = self.read_item(id)? else {
            return Ok(ReplaceOutcome::NotFound);
        };
        if current.version != expected_version {
            return Ok(ReplaceOutcome::VersionMismatch);
        }
        self.write_item(item)?;
        Ok(ReplaceOutcome::Committed)
    }

    fn delete(&self, id: ItemId) -> Result<bool> {
        let _lock = self.lock()?;
        match fs::remove_file(self.item_path(id)) {
            Ok(()) => {
                info!(id, "Deleted work item");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn count_and_fetch(
        &self,
        filter: &ItemFilter,
        page: PageRequest,
    ) -> Result<(Vec<WorkItem>, usize)> {
        let mut items = Vec::new();
        for id in self.item_ids()? {
            // Deleted between listing and reading.
            if let Some(item) = self.read_item(id)? {
                items.push(item);
            }
        }
        Ok(select_page(items, filter, page))
    }
}

impl IdentityStore for Workspace {
    fn resolve(&self, id: &Uuid) -> Result<Option<Identity>> {
        Ok(self.read_identities()?.into_iter().find(|i| i.id == *id))
    }

    fn list(&self) -> Result<Vec<Identity>> {
        self.read_identities()
    }
}

impl TypeStore for Workspace {
    fn save_type(&self, work_item_type: &WorkItemType) -> Result<()> {
        self.add_type(work_item_type)
    }
}

/// `.yml` files directly inside `dir`, sorted by path.
fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && path.extension().is_some_and(|e| e == YAML_EXT) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Write through a uniquely named temporary file in the same directory and
/// rename it over `path`, so readers never observe a partial record.
fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
