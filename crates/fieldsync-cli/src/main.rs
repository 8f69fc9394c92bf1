//! fieldsync CLI - Resolve and push issue custom fields from the command line.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fieldsync_core::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(author, version, about = "Issue custom field CLI")]
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
    Init,

    /// List catalog fields, optionally scoped to a project
    Fields {
        /// Project key
        #[arg(long, short = 'p')]
        project: Option<String>,

        /// Issue type id or name (requires --project)
        #[arg(long, short = 't', requires = "project")]
        issue_type: Option<String>,
    },

    /// Resolve a field name to its id
    Resolve {
        /// Field name (case-insensitive)
        name: String,

        /// Project key
        #[arg(long, short = 'p')]
        project: String,

        /// Issue type id or name
        #[arg(long, short = 't')]
        issue_type: Option<String>,

        /// Resolve within the project even when the name is unique
        #[arg(long)]
        project_only: bool,
    },

    /// Show the custom fields of an issue
    Show {
        /// Issue key (e.g., OPS-12)
        key: String,
    },

    /// Set custom field values on an issue
    Set {
        /// Issue key
        key: String,

        /// Field assignment NAME=V1,V2 (repeatable)
        #[arg(long = "field", short = 'f')]
        fields: Vec<String>,

        /// Cascading select NAME=PARENT[/CHILD] (repeatable)
        #[arg(long)]
        cascade: Vec<String>,

        /// Clear a field by name (repeatable)
        #[arg(long)]
        clear: Vec<String>,

        /// Print the update payload without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Start the tool server (for AI integration)
    #[command(subcommand)]
    Tool(ToolCommands),
}

#[derive(Subcommand)]
enum ToolCommands {
    /// Start the HTTP tool server
    Serve {
        /// Port to listen on (defaults to the workspace config)
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Host to bind to (defaults to the workspace config)
        #[arg(long)]
        host: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let workspace_path = match cli.path {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let cancel = CancellationToken::new();

    rt.block_on(async {
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling");
                on_interrupt.cancel();
            }
        });

        match cli.command {
            Commands::Init => commands::init(&workspace_path, cli.format),
            Commands::Fields {
                project,
                issue_type,
            } => commands::fields(&workspace_path, project, issue_type, cli.format).await,
            Commands::Resolve {
                name,
                project,
                issue_type,
                project_only,
            } => {
                commands::resolve(
                    &workspace_path,
                    &name,
                    project,
                    issue_type,
                    project_only,
                    cli.format,
                    &cancel,
                )
                .await
            }
            Commands::Show { key } => {
                commands::show(&workspace_path, &key, cli.format, &cancel).await
            }
            Commands::Set {
                key,
                fields,
                cascade,
                clear,
                dry_run,
            } => {
                let edits = commands::FieldEdits::parse(&fields, &cascade, &clear)?;
                commands::set(&workspace_path, &key, &edits, dry_run, cli.format, &cancel).await
            }
            Commands::Tool(ToolCommands::Serve { port, host }) => {
                commands::tool_serve(&workspace_path, host, port, &cancel).await
            }
        }
    })
}
