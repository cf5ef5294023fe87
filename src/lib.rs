//! daybook - date and profile partitioned task tracking
//!
//! This library is the state engine behind the `daybook` CLI.
//!
//! # Core Concepts
//!
//! - **Partitions**: one task list per (calendar day, profile) in a
//!   key-value store
//! - **Rollover**: unfinished tasks from past days move into today
//! - **History**: whole-list snapshots for undo/redo within a session
//! - **Reconciliation**: GitHub PR and review state drives task status
//! - **Profiles**: named workspaces with a persisted last selection
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `daybook.toml`
//! - `error`: Error types and result aliases
//! - `kv`: Key-value store trait and in-memory implementation
//! - `storage`: File-backed key-value store
//! - `lock`: File locking and atomic writes
//! - `partition`: Storage keys, dates and profile names
//! - `task`: Task model and status transitions
//! - `store`: Partition load/save, legacy migration, rollover
//! - `export`: Background markdown note export
//! - `history`: Undo/redo and editing sessions
//! - `profile`: Profile directory and active profile resolution
//! - `remote`: GitHub lookups through the `gh` CLI
//! - `reconcile`: Status derivation and metadata refresh
//! - `output`: Human and JSON output for commands

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod kv;
pub mod lock;
pub mod output;
pub mod partition;
pub mod profile;
pub mod reconcile;
pub mod remote;
pub mod storage;
pub mod store;
pub mod task;

pub use error::{Error, Result};
