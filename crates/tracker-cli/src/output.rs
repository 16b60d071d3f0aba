//! Output formatting for the CLI.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Write;
use tracker_core::{
    ItemId, PageLinks, WorkItem, WorkItemType, SYSTEM_STATE, SYSTEM_TITLE, VERSION_ATTRIBUTE,
};
use tracker_store::Identity;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

/// Print output in the specified format.
pub fn print<T: Serialize + HumanDisplay>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => println!("{}", value.human_display()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

/// Print a list in the specified format.
pub fn print_list<T: Serialize + HumanDisplay>(values: &[T], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => {
            for value in values {
                println!("{}", value.human_display());
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(values)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(values)?),
    }
    Ok(())
}

/// Print one page of work items with dynamic column widths.
pub fn print_item_list(page: &ItemListView, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => print!("{}", render_item_table(page)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(page)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(page)?),
    }
    Ok(())
}

/// Print a success message.
pub fn print_success(message: &str, format: OutputFormat) -> Result<()> {
    #[derive(Serialize)]
    struct Status<'a> {
        status: &'static str,
        message: &'a str,
    }

    let status = Status {
        status: "ok",
        message,
    };
    match format {
        OutputFormat::Human => println!("{message}"),
        OutputFormat::Json => println!("{}", serde_json::to_string(&status)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&status)?),
    }
    Ok(())
}

/// Trait for human-readable display.
pub trait HumanDisplay {
    fn human_display(&self) -> String;
}

/// A work item as shown to users: record metadata plus wire attributes.
#[derive(Debug, Serialize)]
pub struct ItemView {
    pub id: ItemId,
    #[serde(rename = "type")]
    pub type_name: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attributes: Map<String, Value>,
}

impl ItemView {
    /// Build a view from a record and its wire attributes.
    pub fn new(item: &WorkItem, mut attributes: Map<String, Value>) -> Self {
        attributes.remove(VERSION_ATTRIBUTE);
        Self {
            id: item.id,
            type_name: item.type_name.clone(),
            version: item.version,
            created_at: item.created_at,
            updated_at: item.updated_at,
            attributes,
        }
    }

    fn text(&self, name: &str) -> &str {
        self.attributes
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or("-")
    }
}

impl HumanDisplay for ItemView {
    fn human_display(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "ID:        {}", self.id);
        let _ = writeln!(out, "Type:      {}", self.type_name);
        let _ = writeln!(out, "Version:   {}", self.version);
        let _ = writeln!(out, "Created:   {}", format_time(&self.created_at));
        let _ = writeln!(out, "Updated:   {}", format_time(&self.updated_at));

        if !self.attributes.is_empty() {
            let _ = writeln!(out, "Fields:");
            for (key, value) in &self.attributes {
                let _ = writeln!(out, "  {key}: {}", format_value(value));
            }
        }

        out
    }
}

/// One page of work items.
#[derive(Debug, Serialize)]
pub struct ItemListView {
    pub offset: usize,
    pub items: Vec<ItemView>,
    pub total_count: usize,
    pub links: PageLinks,
}

fn render_item_table(page: &ItemListView) -> String {
    let mut out = String::new();

    if page.items.is_empty() {
        let _ = writeln!(out, "No work items found.");
        return out;
    }

    // Calculate max widths (with minimum for headers)
    let id_width = page
        .items
        .iter()
        .map(|i| i.id.to_string().len())
        .max()
        .unwrap_or(2)
        .max(2);
    let type_width = page
        .items
        .iter()
        .map(|i| i.type_name.len())
        .max()
        .unwrap_or(4)
        .max(4);
    let state_width = page
        .items
        .iter()
        .map(|i| i.text(SYSTEM_STATE).len())
        .max()
        .unwrap_or(5)
        .max(5);

    let _ = writeln!(
        out,
        "{:<id_width$}  {:<type_width$}  {:>3}  {:<state_width$}  TITLE",
        "ID", "TYPE", "VER", "STATE"
    );
    let _ = writeln!(out, "{}", "-".repeat(id_width + type_width + state_width + 20));

    for item in &page.items {
        let _ = writeln!(
            out,
            "{:<id_width$}  {:<type_width$}  {:>3}  {:<state_width$}  {}",
            item.id,
            item.type_name,
            item.version,
            item.text(SYSTEM_STATE),
            item.text(SYSTEM_TITLE),
        );
    }

    let _ = writeln!(
        out,
        "\n{}-{} of {}",
        page.offset + 1,
        page.offset + page.items.len(),
        page.total_count
    );
    out
}

impl HumanDisplay for WorkItemType {
    fn human_display(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.name);
        for field in &self.fields {
            let required = if field.required { " (required)" } else { "" };
            if field.values.is_empty() {
                let _ = writeln!(out, "  {}: {}{required}", field.name, field.kind);
            } else {
                let _ = writeln!(
                    out,
                    "  {}: {} [{}]{required}",
                    field.name,
                    field.kind,
                    field.values.join(", ")
                );
            }
        }
        out
    }
}

impl HumanDisplay for Identity {
    fn human_display(&self) -> String {
        match &self.full_name {
            Some(full_name) => format!("{}  {} ({full_name})", self.id, self.username),
            None => format!("{}  {}", self.id, self.username),
        }
    }
}

fn format_time(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracker_core::page_links;

    fn view(id: ItemId, title: &str, state: &str) -> ItemView {
        let item = WorkItem::new(id, "system.userstory");
        let attributes = json!({"version": 0, SYSTEM_TITLE: title, SYSTEM_STATE: state})
            .as_object()
            .cloned()
            .unwrap();
        ItemView::new(&item, attributes)
    }

    #[test]
    fn test_item_view_drops_version_attribute() {
        let view = view(3, "Write docs", "new");
        assert!(!view.attributes.contains_key(VERSION_ATTRIBUTE));
        assert_eq!(view.version, 0);

        let text = view.human_display();
        assert!(text.contains("ID:        3"));
        assert!(text.contains("system.title: Write docs"));
    }

    #[test]
    fn test_item_table() {
        let page = ItemListView {
            offset: 0,
            items: vec![view(1, "First", "new"), view(2, "Second", "in progress")],
            total_count: 2,
            links: page_links(0, 20, 2, 2),
        };
        let table = render_item_table(&page);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("ID"));
        assert!(lines[2].contains("First"));
        assert!(lines[3].contains("in progress"));
        assert!(lines[3].ends_with("Second"));
        assert_eq!(lines.last(), Some(&"1-2 of 2"));
    }

    #[test]
    fn test_empty_item_table() {
        let page = ItemListView {
            offset: 0,
            items: vec![],
            total_count: 0,
            links: page_links(0, 20, 0, 0),
        };
        assert_eq!(render_item_table(&page), "No work items found.\n");
    }
}
