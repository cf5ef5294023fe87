//! Task model for daybook.
//!
//! A partition value is a JSON array of [`Task`]. Field names are camelCase
//! on the wire (`createdAt`, `reviewState`, `linkedPRs`) so stores written by
//! earlier versions keep loading.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(Error::InvalidArgument(format!(
                "unknown priority '{other}' (expected low|medium|high)"
            ))),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task status.
///
/// `WaitingForReview` and `ReadyToMerge` are normally set by reconciliation
/// from GitHub state; `Done` is the only terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Paused,
    WaitingForReview,
    ReadyToMerge,
    Done,
}

/// User-initiated status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    Start,
    Pause,
    Resume,
    Toggle,
}

impl StatusAction {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusAction::Start => "start",
            StatusAction::Pause => "pause",
            StatusAction::Resume => "resume",
            StatusAction::Toggle => "toggle",
        }
    }
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Paused => "paused",
            TaskStatus::WaitingForReview => "waiting-for-review",
            TaskStatus::ReadyToMerge => "ready-to-merge",
            TaskStatus::Done => "done",
        }
    }

    pub fn is_done(self) -> bool {
        self == TaskStatus::Done
    }

    /// Statuses reconciliation may overwrite. `Paused` and `Done` are never
    /// touched.
    pub fn is_auto_derivable(self) -> bool {
        matches!(
            self,
            TaskStatus::Todo
                | TaskStatus::InProgress
                | TaskStatus::WaitingForReview
                | TaskStatus::ReadyToMerge
        )
    }

    /// Apply a user action, returning the next status.
    pub fn apply(self, action: StatusAction) -> Result<TaskStatus> {
        let next = match (self, action) {
            (TaskStatus::Done, StatusAction::Toggle) => Some(TaskStatus::Todo),
            (_, StatusAction::Toggle) => Some(TaskStatus::Done),
            (TaskStatus::Todo, StatusAction::Start) => Some(TaskStatus::InProgress),
            (TaskStatus::InProgress, StatusAction::Pause) => Some(TaskStatus::Paused),
            (TaskStatus::Paused, StatusAction::Resume) => Some(TaskStatus::InProgress),
            _ => None,
        };

        next.ok_or_else(|| Error::InvalidTransition {
            from: self.to_string(),
            action: action.as_str().to_string(),
        })
    }

    fn rank(self) -> u8 {
        if self.is_done() {
            1
        } else {
            0
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Issue,
    PullRequest,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    PendingReview,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

/// A pull request linked to an issue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedPr {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub state: PrState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_state: Option<ReviewState>,
}

/// Cached GitHub issue / pull request metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GithubMetadata {
    pub url: String,
    pub number: u64,
    pub repo: String,
    pub owner: String,
    /// Normalized lowercase state ("open", "closed", "merged", ...).
    pub state: String,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_state: Option<ReviewState>,
    #[serde(
        rename = "linkedPRs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub linked_prs: Option<Vec<LinkedPr>>,
}

impl GithubMetadata {
    pub fn is_open_pull_request(&self) -> bool {
        self.item_type == ItemType::PullRequest && self.state.eq_ignore_ascii_case("open")
    }

    pub fn normalized_state(&self) -> String {
        self.state.trim().to_ascii_lowercase()
    }

    pub fn linked_prs(&self) -> &[LinkedPr] {
        self.linked_prs.as_deref().unwrap_or(&[])
    }

    /// `owner/repo#number`
    pub fn reference(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repo, self.number)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubMetadata>,
}

impl Task {
    /// New `todo` task with a fresh ULID id.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: generate_task_id(),
            title: title.into(),
            description: String::new(),
            priority: Priority::default(),
            status: TaskStatus::Todo,
            created_at: Utc::now(),
            deadline: None,
            github: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_github(mut self, github: GithubMetadata) -> Self {
        self.github = Some(github);
        self
    }
}

/// Field-level edit applied by `update`-style operations.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    /// `Some(None)` clears the deadline.
    pub deadline: Option<Option<DateTime<Utc>>>,
}

impl TaskEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.deadline.is_none()
    }

    pub fn apply_to(&self, task: &mut Task) -> Result<()> {
        if let Some(title) = &self.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(Error::InvalidArgument("title cannot be empty".to_string()));
            }
            task.title = title.to_string();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(deadline) = self.deadline {
            task.deadline = deadline;
        }
        Ok(())
    }
}

/// Lowercase ULID; unique across partitions so ids are never reused.
pub fn generate_task_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

/// Display order: open before done, high priority first, earliest deadline
/// first (no deadline last), then oldest first.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|left, right| {
        left.status
            .rank()
            .cmp(&right.status.rank())
            .then_with(|| left.priority.rank().cmp(&right.priority.rank()))
            .then_with(|| compare_deadlines(left.deadline, right.deadline))
            .then_with(|| left.created_at.cmp(&right.created_at))
            .then_with(|| left.id.cmp(&right.id))
    });
}

fn compare_deadlines(left: Option<DateTime<Utc>>, right: Option<DateTime<Utc>>) -> Ordering {
    match (left, right) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
