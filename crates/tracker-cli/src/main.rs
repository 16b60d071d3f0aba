//! tracker CLI - Work item tracking from the command line.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tracker_core::Relationships;

#[derive(Parser)]
#[command(name = "tracker")]
#[command(author, version, about = "Work item tracking CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "human")]
    format: output::OutputFormat,

    /// Workspace path (defaults to current directory)
    #[arg(long, short = 'C', global = true)]
    path: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new workspace
    Init {
        /// Workspace name
        #[arg(long)]
        name: Option<String>,
    },

    /// Start the JSON:API server
    Serve {
        /// Port to listen on (defaults to the workspace config)
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Host to bind to (defaults to the workspace config)
        #[arg(long)]
        host: Option<String>,
    },

    /// List work items
    #[command(alias = "ls")]
    List {
        /// JSON filter, e.g. '{"Type":"system.userstory","system.state":"open"}'
        #[arg(long, short = 'f')]
        filter: Option<String>,

        /// Index of the first item
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Page size (defaults to the workspace config)
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Show a work item by id
    Show {
        /// Work item id
        id: String,
    },

    /// Create a work item
    Create {
        /// Work item type, e.g. system.userstory
        #[arg(value_name = "TYPE")]
        type_name: String,

        /// Field assignments (key=value)
        assignments: Vec<String>,

        /// Identity id to assign
        #[arg(long, short = 'a')]
        assignee: Option<String>,
    },

    /// Update fields of a work item
    Update {
        /// Work item id
        id: String,

        /// Version the change is based on
        #[arg(long, short = 'v')]
        version: u64,

        /// Field assignments (key=value, `key=null` clears)
        assignments: Vec<String>,

        /// Identity id to assign
        #[arg(long, short = 'a', conflicts_with = "unassign")]
        assignee: Option<String>,

        /// Remove the assignee
        #[arg(long)]
        unassign: bool,
    },

    /// Delete a work item
    #[command(alias = "rm")]
    Delete {
        /// Work item id
        id: String,
    },

    /// Manage work item types (lists them by default)
    Types {
        #[command(subcommand)]
        command: Option<TypesCommands>,
    },

    /// Manage identities
    #[command(subcommand)]
    Identity(IdentityCommands),
}

#[derive(Subcommand)]
enum TypesCommands {
    /// Register a work item type from a YAML file
    Add {
        /// Path to the type definition
        file: std::path::PathBuf,
    },

    /// List registered work item types
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand)]
enum IdentityCommands {
    /// Register an identity
    Add {
        /// Login name
        username: String,

        /// Display name
        #[arg(long)]
        full_name: Option<String>,
    },

    /// List identities
    #[command(alias = "ls")]
    List,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let workspace_path = match cli.path {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match cli.command {
        Commands::Init { name } => commands::init(&workspace_path, name, cli.format),
        Commands::Serve { port, host } => {
            commands::serve(&workspace_path, host.as_deref(), port)
        }
        Commands::List {
            filter,
            offset,
            limit,
        } => commands::list(&workspace_path, filter.as_deref(), offset, limit, cli.format),
        Commands::Show { id } => commands::show(&workspace_path, &id, cli.format),
        Commands::Create {
            type_name,
            assignments,
            assignee,
        } => commands::create(
            &workspace_path,
            &type_name,
            &assignments,
            assignee,
            cli.format,
        ),
        Commands::Update {
            id,
            version,
            assignments,
            assignee,
            unassign,
        } => {
            let relationships = match (assignee, unassign) {
                (Some(id), _) => Some(Relationships::assign(id)),
                (None, true) => Some(Relationships::unassign()),
                (None, false) => None,
            };
            commands::update(
                &workspace_path,
                &id,
                version,
                &assignments,
                relationships,
                cli.format,
            )
        }
        Commands::Delete { id } => commands::delete(&workspace_path, &id, cli.format),
        Commands::Types {
            command: Some(TypesCommands::Add { file }),
        } => commands::types_add(&workspace_path, &file, cli.format),
        Commands::Types {
            command: None | Some(TypesCommands::List),
        } => commands::types(&workspace_path, cli.format),
        Commands::Identity(IdentityCommands::Add {
            username,
            full_name,
        }) => commands::identity_add(&workspace_path, &username, full_name, cli.format),
        Commands::Identity(IdentityCommands::List) => {
            commands::identity_list(&workspace_path, cli.format)
        }
    }
}
