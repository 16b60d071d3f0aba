//! CLI command implementations.

use crate::output::{self, ItemListView, ItemView, OutputFormat};
use anyhow::{bail, Context, Result};
use console::style;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracker_core::{
    FieldKind, ItemFilter, NewWorkItem, PageRequest, PartialUpdate, Relationships, WorkItem,
    WorkItemType,
};
use tracker_server::AppState;
use tracker_store::{Identity, IdentityStore, WorkItemRepository, Workspace, WorkspaceConfig};

/// Open the workspace and build a repository over it.
fn open(path: &Path) -> Result<(Arc<Workspace>, WorkItemRepository)> {
    let ws = Arc::new(Workspace::open(path).context("Failed to open workspace")?);
    let registry = ws
        .load_registry()
        .context("Failed to load work item types")?;
    let repository = WorkItemRepository::new(ws.clone(), ws.clone(), Arc::new(registry));
    Ok((ws, repository))
}

fn view(repository: &WorkItemRepository, item: &WorkItem) -> Result<ItemView> {
    let attributes = repository
        .to_wire(item)
        .context("Failed to render work item")?;
    Ok(ItemView::new(item, attributes))
}

/// Split a `key=value` assignment into a field name and wire value.
///
/// `null` clears the field. Text-like fields keep the raw text; other
/// kinds are read as JSON when possible so `points=3` sends a number.
fn parse_assignment(raw: &str, work_item_type: &WorkItemType) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Invalid assignment '{raw}', expected key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid assignment '{raw}', field name is empty");
    }

    if value == "null" {
        return Ok((key.to_string(), Value::Null));
    }

    let text_like = work_item_type.field(key).is_none_or(|field| {
        matches!(
            field.kind,
            FieldKind::String | FieldKind::Enum | FieldKind::Instant | FieldKind::User
        )
    });
    let value = if text_like {
        Value::String(value.to_string())
    } else {
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
    };
    Ok((key.to_string(), value))
}

/// Initialize a new workspace.
pub fn init(path: &Path, name: Option<String>, format: OutputFormat) -> Result<()> {
    let config = name.map_or_else(WorkspaceConfig::default, WorkspaceConfig::new);
    Workspace::init_with_config(path, config).context("Failed to initialize workspace")?;
    output::print_success(
        &format!("Initialized workspace at {}", path.display()),
        format,
    )
}

/// Start the JSON:API server.
pub fn serve(path: &Path, host: Option<&str>, port: Option<u16>) -> Result<()> {
    let (ws, repository) = open(path)?;
    let config = ws.config();
    let host = host.unwrap_or(&config.server.host).to_string();
    let port = port.unwrap_or(config.server.port);

    let state = AppState::new(repository, ws.clone(), config.paging, format!("{host}:{port}"));
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { tracker_server::serve(state, &host, port).await })
}

/// List one page of work items.
pub fn list(
    path: &Path,
    filter: Option<&str>,
    offset: usize,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let (ws, repository) = open(path)?;
    let paging = ws.config().paging;

    let filter = ItemFilter::parse(filter.unwrap_or_default()).context("Invalid filter")?;
    let limit = limit.unwrap_or(paging.default_limit).min(paging.max_limit);
    let page = PageRequest::new(offset, limit).context("Invalid page")?;

    let result = repository
        .list(&filter, page)
        .context("Failed to list items")?;
    let items = result
        .items
        .iter()
        .map(|item| view(&repository, item))
        .collect::<Result<Vec<_>>>()?;

    output::print_item_list(
        &ItemListView {
            offset,
            items,
            total_count: result.total_count,
            links: result.links,
        },
        format,
    )
}

/// Show a work item by id.
pub fn show(path: &Path, id: &str, format: OutputFormat) -> Result<()> {
    let (_, repository) = open(path)?;
    let item = repository.load(id).context("Failed to get item")?;
    output::print(&view(&repository, &item)?, format)
}

/// Create a work item.
pub fn create(
    path: &Path,
    type_name: &str,
    assignments: &[String],
    assignee: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let (_, repository) = open(path)?;
    let work_item_type = repository
        .registry()
        .lookup(type_name)
        .context("Unknown work item type")?;

    let mut new = NewWorkItem::new(type_name);
    for raw in assignments {
        let (key, value) = parse_assignment(raw, work_item_type)?;
        new = new.with_attribute(key, value);
    }
    if let Some(assignee) = assignee {
        new = new.with_relationships(Relationships::assign(assignee));
    }

    let item = repository
        .create(&new)
        .context("Failed to create item")?;
    info!(id = item.id, work_item_type = %item.type_name, "Created work item from CLI");

    if matches!(format, OutputFormat::Human) {
        println!("{}", style(format!("  ✓ Created #{}", item.id)).green().bold());
    }
    output::print(&view(&repository, &item)?, format)
}

/// Update fields of a work item, based on the given version.
pub fn update(
    path: &Path,
    id: &str,
    version: u64,
    assignments: &[String],
    relationships: Option<Relationships>,
    format: OutputFormat,
) -> Result<()> {
    let (_, repository) = open(path)?;
    let current = repository.load(id).context("Failed to get item")?;
    let work_item_type = repository
        .registry()
        .lookup(&current.type_name)
        .context("Unknown work item type")?;

    let mut update = PartialUpdate {
        id: id.to_string(),
        relationships,
        ..PartialUpdate::default()
    }
    .with_version(version);
    for raw in assignments {
        let (key, value) = parse_assignment(raw, work_item_type)?;
        update = update.with_attribute(key, value);
    }

    let item = repository
        .save(&update)
        .context("Failed to update item")?;
    info!(id = item.id, version = item.version, "Updated work item from CLI");

    if matches!(format, OutputFormat::Human) {
        println!(
            "{}",
            style(format!("  v{} → v{}", version, item.version))
                .green()
                .bold()
        );
    }
    output::print(&view(&repository, &item)?, format)
}

/// Delete a work item.
pub fn delete(path: &Path, id: &str, format: OutputFormat) -> Result<()> {
    let (_, repository) = open(path)?;
    repository.delete(id).context("Failed to delete item")?;
    info!(id, "Deleted work item from CLI");
    output::print_success(&format!("Deleted #{id}"), format)
}

/// List registered work item types.
pub fn types(path: &Path, format: OutputFormat) -> Result<()> {
    let (_, repository) = open(path)?;
    let types: Vec<WorkItemType> = repository
        .registry()
        .types()
        .into_iter()
        .cloned()
        .collect();
    output::print_list(&types, format)
}

/// Register a work item type read from a YAML file.
pub fn types_add(path: &Path, file: &Path, format: OutputFormat) -> Result<()> {
    let (ws, repository) = open(path)?;
    let raw = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let work_item_type: WorkItemType =
        serde_yaml::from_str(&raw).context("Invalid work item type")?;

    // Clashes with built-in or already registered types.
    repository
        .with_type(work_item_type.clone())
        .context("Invalid work item type")?;
    ws.add_type(&work_item_type)
        .context("Failed to add work item type")?;
    output::print(&work_item_type, format)
}

/// Register an identity.
pub fn identity_add(
    path: &Path,
    username: &str,
    full_name: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let ws = Workspace::open(path).context("Failed to open workspace")?;
    let mut identity = Identity::new(username);
    if let Some(full_name) = full_name {
        identity = identity.with_full_name(full_name);
    }
    ws.add_identity(identity.clone())
        .context("Failed to add identity")?;
    output::print(&identity, format)
}

/// List identities.
pub fn identity_list(path: &Path, format: OutputFormat) -> Result<()> {
    let ws = Workspace::open(path).context("Failed to open workspace")?;
    let identities = ws.list().context("Failed to list identities")?;
    if identities.is_empty() {
        return output::print_success("No identities found", format);
    }
    output::print_list(&identities, format)
}
