//! Daily-note export.
//!
//! After a partition is saved its task list is handed to a [`NoteSink`]. The
//! export runs as a detached tokio task started only after the save has
//! completed; its result is captured and logged, never returned to the saver.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::partition::{format_date, is_default_profile};
use crate::task::{sort_tasks, Task, TaskStatus};

/// Destination for a rendered day of tasks.
#[async_trait]
pub trait NoteSink: Send + Sync {
    async fn export(&self, date: NaiveDate, tasks: &[Task], profile: &str) -> Result<()>;
}

/// Sink used when export is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl NoteSink for NullSink {
    async fn export(&self, _date: NaiveDate, _tasks: &[Task], _profile: &str) -> Result<()> {
        Ok(())
    }
}

/// Writes one markdown note per (date, profile):
/// `<dir>/<date>.md` for the default profile, `<dir>/<profile>/<date>.md`
/// otherwise.
#[derive(Debug, Clone)]
pub struct MarkdownSink {
    dir: PathBuf,
}

impl MarkdownSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn note_path(&self, date: NaiveDate, profile: &str) -> PathBuf {
        let file = format!("{}.md", format_date(date));
        if is_default_profile(profile) {
            self.dir.join(file)
        } else {
            self.dir.join(profile).join(file)
        }
    }
}

#[async_trait]
impl NoteSink for MarkdownSink {
    async fn export(&self, date: NaiveDate, tasks: &[Task], profile: &str) -> Result<()> {
        let path = self.note_path(date, profile);
        let body = render_markdown(date, tasks, profile);
        write_note(&path, &body)
            .await
            .map_err(|err| Error::Export(format!("{}: {err}", path.display())))
    }
}

async fn write_note(path: &Path, body: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, body).await
}

/// Render a day of tasks as a markdown checklist.
pub fn render_markdown(date: NaiveDate, tasks: &[Task], profile: &str) -> String {
    let mut sorted = tasks.to_vec();
    sort_tasks(&mut sorted);

    let mut lines = Vec::new();
    if is_default_profile(profile) {
        lines.push(format!("# Tasks {}", format_date(date)));
    } else {
        lines.push(format!("# Tasks {} ({profile})", format_date(date)));
    }
    lines.push(String::new());

    if sorted.is_empty() {
        lines.push("_No tasks._".to_string());
    }

    for task in &sorted {
        let check = if task.status == TaskStatus::Done { "x" } else { " " };
        let mut line = format!("- [{check}] {} ({}, {})", task.title, task.status, task.priority);
        if let Some(deadline) = task.deadline {
            line.push_str(&format!(" due {}", deadline.format("%Y-%m-%d %H:%M")));
        }
        if let Some(github) = &task.github {
            line.push_str(&format!(" [{}]({})", github.reference(), github.url));
        }
        lines.push(line);

        for desc_line in task.description.lines().filter(|l| !l.trim().is_empty()) {
            lines.push(format!("    {desc_line}"));
        }
    }

    lines.push(String::new());
    lines.join("\n")
}

/// Dispatches exports as detached tasks and keeps their handles so a caller
/// about to exit can wait for them.
pub struct Exporter {
    sink: Arc<dyn NoteSink>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Exporter {
    pub fn new(sink: Arc<dyn NoteSink>) -> Self {
        Self {
            sink,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NullSink))
    }

    /// Start an export in the background. Must be called from within a tokio
    /// runtime; the caller's own write has already completed.
    pub fn dispatch(&self, date: NaiveDate, tasks: Vec<Task>, profile: &str) {
        let sink = Arc::clone(&self.sink);
        let profile = profile.to_string();
        let handle = tokio::spawn(async move {
            if let Err(err) = sink.export(date, &tasks, &profile).await {
                tracing::warn!(
                    date = %format_date(date),
                    profile = %profile,
                    error = %err,
                    "note export failed"
                );
            }
        });

        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|handle| !handle.is_finished());
            pending.push(handle);
        }
    }

    /// Wait for every dispatched export to finish.
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = match self.pending.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return,
        };
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "note export task aborted");
            }
        }
    }
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter").finish_non_exhaustive()
    }
}
