//! Undo/redo over whole-partition snapshots.
//!
//! [`History`] is plain linear history: a snapshot of the list is pushed onto
//! the undo stack right before each mutation commits, and any new mutation
//! clears the redo stack. Both stacks are bounded; the oldest entries fall
//! off first.
//!
//! [`Session`] owns the history for one (date, profile) view. Open a new
//! session whenever the active date or profile changes; the old history is
//! dropped with it.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::reconcile::task_from_link;
use crate::remote::RemoteResolver;
use crate::store::{RolloverReport, TaskStore};
use crate::task::{Priority, StatusAction, Task, TaskEdit};

/// Default number of snapshots kept per stack
pub const DEFAULT_HISTORY_DEPTH: usize = 50;

/// Immutable copy of a partition's tasks.
pub type Snapshot = Vec<Task>;

#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Snapshot>,
    redo: VecDeque<Snapshot>,
    max_depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Record `current` before a mutation; clears redo.
    pub fn snapshot(&mut self, current: Snapshot) {
        push_bounded(&mut self.undo, current, self.max_depth);
        self.redo.clear();
    }

    /// Pop the latest undo snapshot, parking `current` on the redo stack.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo.pop_back()?;
        push_bounded(&mut self.redo, current, self.max_depth);
        Some(previous)
    }

    /// Pop the latest redo snapshot, parking `current` on the undo stack.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo.pop_back()?;
        push_bounded(&mut self.undo, current, self.max_depth);
        Some(next)
    }

    /// Snapshot the next `undo` would restore.
    pub fn peek_undo(&self) -> Option<&Snapshot> {
        self.undo.back()
    }

    /// Snapshot the next `redo` would restore.
    pub fn peek_redo(&self) -> Option<&Snapshot> {
        self.redo.back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}

fn push_bounded(stack: &mut VecDeque<Snapshot>, snapshot: Snapshot, max_depth: usize) {
    stack.push_back(snapshot);
    while stack.len() > max_depth {
        stack.pop_front();
    }
}

/// Editing session over one (date, profile) partition.
pub struct Session {
    store: Arc<TaskStore>,
    date: NaiveDate,
    profile: String,
    history: History,
}

impl Session {
    /// Open a session. When `rollover` is set and `date` is today, unfinished
    /// tasks from past days are pulled in first.
    pub async fn open(
        store: Arc<TaskStore>,
        date: NaiveDate,
        profile: &str,
        max_depth: usize,
        rollover: bool,
    ) -> Result<(Self, Option<RolloverReport>)> {
        let report = if rollover && date == store.today() {
            Some(store.rollover(profile).await?)
        } else {
            None
        };

        let session = Self {
            store,
            date,
            profile: profile.to_string(),
            history: History::new(max_depth),
        };
        Ok((session, report))
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub async fn tasks(&self) -> Result<Vec<Task>> {
        self.store.load(self.date, &self.profile).await
    }

    // Snapshots are taken before the write but only recorded once it
    // succeeds, so a rejected or failed mutation leaves history untouched.

    pub async fn create(&mut self, task: Task) -> Result<Task> {
        if task.title.trim().is_empty() {
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }
        let before = self.tasks().await?;
        let created = self.store.create(self.date, &self.profile, task).await?;
        self.history.snapshot(before);
        Ok(created)
    }

    /// Resolve a GitHub link and add it as a task.
    pub async fn create_from_link(
        &mut self,
        resolver: &dyn RemoteResolver,
        url: &str,
        priority: Priority,
    ) -> Result<Task> {
        let task = task_from_link(resolver, url, priority).await?;
        self.create(task).await
    }

    /// Replace a task wholesale. `Ok(None)` (and no snapshot) when the id is
    /// unknown.
    pub async fn update(&mut self, task: Task) -> Result<Option<Task>> {
        let before = self.tasks().await?;
        if !before.iter().any(|existing| existing.id == task.id) {
            return Ok(None);
        }
        let updated = self
            .store
            .update(self.date, &self.profile, task.clone())
            .await?;
        if !updated {
            return Ok(None);
        }
        self.history.snapshot(before);
        Ok(Some(task))
    }

    pub async fn edit(&mut self, id: &str, edit: &TaskEdit) -> Result<Option<Task>> {
        let before = self.tasks().await?;
        let Some(mut preview) = before.iter().find(|task| task.id == id).cloned() else {
            return Ok(None);
        };
        edit.apply_to(&mut preview)?;
        let edited = self.store.edit(self.date, &self.profile, id, edit).await?;
        if edited.is_some() {
            self.history.snapshot(before);
        }
        Ok(edited)
    }

    /// Apply a user status transition.
    pub async fn apply_status(&mut self, id: &str, action: StatusAction) -> Result<Option<Task>> {
        let Some(mut task) = self.require(id).await? else {
            return Ok(None);
        };
        task.status = task.status.apply(action)?;
        self.update(task).await
    }

    /// Remove a task, returning what was removed.
    pub async fn delete(&mut self, id: &str) -> Result<Option<Task>> {
        let before = self.tasks().await?;
        let Some(task) = before.iter().find(|task| task.id == id).cloned() else {
            return Ok(None);
        };
        self.store.delete(self.date, &self.profile, id).await?;
        self.history.snapshot(before);
        Ok(Some(task))
    }

    /// Restore the previous snapshot. `Ok(None)` when there is nothing to undo.
    pub async fn undo(&mut self) -> Result<Option<Vec<Task>>> {
        let Some(previous) = self.history.peek_undo().cloned() else {
            return Ok(None);
        };
        let current = self.tasks().await?;
        self.store.replace(self.date, &self.profile, &previous).await?;
        self.history.undo(current);
        Ok(Some(previous))
    }

    /// Re-apply the last undone snapshot. `Ok(None)` when there is nothing to redo.
    pub async fn redo(&mut self) -> Result<Option<Vec<Task>>> {
        let Some(next) = self.history.peek_redo().cloned() else {
            return Ok(None);
        };
        let current = self.tasks().await?;
        self.store.replace(self.date, &self.profile, &next).await?;
        self.history.redo(current);
        Ok(Some(next))
    }

    /// Find a task by exact id or unique id prefix.
    pub async fn find(&self, id: &str) -> Result<Option<Task>> {
        let tasks = self.tasks().await?;
        Ok(resolve_task_id(&tasks, id)?.cloned())
    }

    async fn require(&self, id: &str) -> Result<Option<Task>> {
        let tasks = self.tasks().await?;
        Ok(tasks.into_iter().find(|task| task.id == id))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("date", &self.date)
            .field("profile", &self.profile)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

/// Match `input` against task ids: exact match first, then unique prefix.
pub fn resolve_task_id<'a>(tasks: &'a [Task], input: &str) -> Result<Option<&'a Task>> {
    let needle = input.trim().to_lowercase();
    if needle.is_empty() {
        return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
    }

    if let Some(exact) = tasks.iter().find(|task| task.id.to_lowercase() == needle) {
        return Ok(Some(exact));
    }

    let matches: Vec<&Task> = tasks
        .iter()
        .filter(|task| task.id.to_lowercase().starts_with(&needle))
        .collect();
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches[0])),
        _ => Err(Error::InvalidArgument(format!(
            "ambiguous task id '{}': {}",
            input.trim(),
            matches
                .iter()
                .map(|task| task.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(titles: &[&str]) -> Snapshot {
        titles.iter().map(|title| Task::new(*title)).collect()
    }

    #[test]
    fn undo_then_redo_restores_pre_undo_list() {
        let mut history = History::new(10);
        let before = snap(&["a"]);
        let after = {
            let mut list = before.clone();
            list.push(Task::new("b"));
            list
        };

        history.snapshot(before.clone());
        let restored = history.undo(after.clone()).unwrap();
        assert_eq!(restored, before);

        let redone = history.redo(restored).unwrap();
        assert_eq!(redone, after);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn new_snapshot_clears_redo() {
        let mut history = History::new(10);
        history.snapshot(snap(&["a"]));
        history.undo(snap(&["a", "b"])).unwrap();
        assert!(history.can_redo());

        history.snapshot(snap(&["a", "c"]));
        assert!(!history.can_redo());
    }

    #[test]
    fn empty_stacks_are_noops() {
        let mut history = History::default();
        assert!(history.undo(snap(&["x"])).is_none());
        assert!(history.redo(snap(&["x"])).is_none());
        assert_eq!(history.redo_depth(), 0);
    }

    #[test]
    fn stacks_are_bounded() {
        let mut history = History::new(3);
        for idx in 0..5 {
            history.snapshot(snap(&[&format!("v{idx}")]));
        }
        assert_eq!(history.undo_depth(), 3);
        let latest = history.undo(Vec::new()).unwrap();
        assert_eq!(latest[0].title, "v4");
    }

    #[test]
    fn task_ids_resolve_by_unique_prefix() {
        let mut a = Task::new("a");
        a.id = "01abc".to_string();
        let mut b = Task::new("b");
        b.id = "01abd".to_string();
        let tasks = vec![a, b];

        assert_eq!(resolve_task_id(&tasks, "01ABC").unwrap().unwrap().title, "a");
        assert_eq!(resolve_task_id(&tasks, "01abd").unwrap().unwrap().title, "b");
        assert!(resolve_task_id(&tasks, "01ab").is_err());
        assert!(resolve_task_id(&tasks, "zz").unwrap().is_none());
        assert!(resolve_task_id(&tasks, " ").is_err());
    }
}
