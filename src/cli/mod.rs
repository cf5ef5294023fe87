//! Command-line interface for daybook
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command family lives in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::output::OutputOptions;
use crate::task::StatusAction;

mod context;
mod profile;
mod shell;
mod sync;
mod tasks;

/// daybook - a per-day task tracker
///
/// Tasks live in one list per calendar day and profile. Unfinished tasks
/// roll forward into today, and tasks linked to GitHub issues or pull
/// requests follow their review state.
#[derive(Parser, Debug)]
#[command(name = "daybook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "DAYBOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Store file (overrides storage.path)
    #[arg(long, global = true, env = "DAYBOOK_STORE")]
    pub store: Option<PathBuf>,

    /// Profile to operate on
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Day to operate on (YYYY-MM-DD, defaults to today)
    #[arg(long, global = true)]
    pub date: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the day's tasks
    List {
        /// Skip the GitHub refresh
        #[arg(long)]
        no_sync: bool,
    },

    /// Add a task
    Add {
        /// Task title (optional with --link)
        #[arg(required_unless_present = "link")]
        title: Option<String>,

        /// Longer description
        #[arg(short, long)]
        description: Option<String>,

        /// Priority: low, medium, high
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Deadline (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        deadline: Option<String>,

        /// GitHub issue or pull request URL to import
        #[arg(long, conflicts_with_all = ["title", "description"])]
        link: Option<String>,
    },

    /// Edit task fields
    Edit {
        /// Task id (or unique prefix)
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        priority: Option<String>,

        /// Deadline (YYYY-MM-DD or RFC 3339)
        #[arg(long, conflicts_with = "clear_deadline")]
        deadline: Option<String>,

        /// Remove the deadline
        #[arg(long)]
        clear_deadline: bool,
    },

    /// Start a todo task
    Start { id: String },

    /// Pause an in-progress task
    Pause { id: String },

    /// Resume a paused task
    Resume { id: String },

    /// Toggle a task between done and todo
    Toggle { id: String },

    /// Delete a task
    Rm { id: String },

    /// Move unfinished tasks from past days into today
    Rollover,

    /// Refresh GitHub-linked tasks
    Sync,

    /// Profile management
    #[command(subcommand)]
    Profile(ProfileCommands),

    /// Interactive session with undo/redo
    Shell,
}

/// Profile subcommands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List profiles
    List,

    /// Create a profile
    Create { name: String },

    /// Delete a profile (its tasks are kept)
    Delete { name: String },

    /// Make a profile the default for later invocations
    Use { name: String },
}

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub(crate) struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub store: Option<PathBuf>,
    pub profile: Option<String>,
    pub date: Option<String>,
    pub output: OutputOptions,
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let global = GlobalOptions {
            config: self.config,
            store: self.store,
            profile: self.profile,
            date: self.date,
            output: OutputOptions {
                json: self.json,
                quiet: self.quiet,
            },
        };

        let ctx = context::Context::open(&global).await?;
        let result = match self.command {
            Commands::List { no_sync } => tasks::run_list(&ctx, no_sync).await,
            Commands::Add {
                title,
                description,
                priority,
                deadline,
                link,
            } => {
                tasks::run_add(
                    &ctx,
                    tasks::AddOptions {
                        title,
                        description,
                        priority,
                        deadline,
                        link,
                    },
                )
                .await
            }
            Commands::Edit {
                id,
                title,
                description,
                priority,
                deadline,
                clear_deadline,
            } => {
                tasks::run_edit(
                    &ctx,
                    tasks::EditOptions {
                        id,
                        title,
                        description,
                        priority,
                        deadline,
                        clear_deadline,
                    },
                )
                .await
            }
            Commands::Start { id } => tasks::run_status(&ctx, &id, StatusAction::Start).await,
            Commands::Pause { id } => tasks::run_status(&ctx, &id, StatusAction::Pause).await,
            Commands::Resume { id } => tasks::run_status(&ctx, &id, StatusAction::Resume).await,
            Commands::Toggle { id } => tasks::run_status(&ctx, &id, StatusAction::Toggle).await,
            Commands::Rm { id } => tasks::run_rm(&ctx, &id).await,
            Commands::Rollover => tasks::run_rollover(&ctx).await,
            Commands::Sync => sync::run(&ctx).await,
            Commands::Profile(cmd) => profile::run(&ctx, cmd).await,
            Commands::Shell => shell::run(&ctx).await,
        };

        // Background note exports must land before the process exits.
        ctx.store.exporter().flush().await;
        result
    }
}
