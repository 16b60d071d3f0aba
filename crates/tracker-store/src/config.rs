//! Workspace configuration.

use serde::{Deserialize, Serialize};
use tracker_core::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

/// Workspace configuration stored in `.tracker/config.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Configuration version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace settings.
    #[serde(default)]
    pub workspace: WorkspaceSettings,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// List paging settings.
    #[serde(default)]
    pub paging: PagingSettings,
}

const fn default_version() -> u32 {
    1
}

/// Workspace-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Workspace name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Where the HTTP server listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    17380
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Page sizes for list endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PagingSettings {
    /// Page size when the caller gives none.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Upper bound on caller-requested page sizes.
    #[serde(default = "max_limit")]
    pub max_limit: usize,
}

const fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

const fn max_limit() -> usize {
    MAX_PAGE_LIMIT
}

impl Default for PagingSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: max_limit(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            version: 1,
            workspace: WorkspaceSettings::default(),
            server: ServerSettings::default(),
            paging: PagingSettings::default(),
        }
    }
}

impl WorkspaceConfig {
    /// Create a new config with the given workspace name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            workspace: WorkspaceSettings {
                name: Some(name.into()),
            },
            ..Default::default()
        }
    }
}
