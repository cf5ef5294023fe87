//! Task store: the only component that reads or writes task partitions.
//!
//! - `load` migrates the legacy undated record on first sight, then parses
//!   the partition (absent or unparseable values read as an empty list)
//! - `save` writes the whole list and then fires a background note export
//! - `create` / `update` / `delete` are read-modify-write over `load`/`save`
//! - `rollover` moves unfinished tasks from past partitions into today
//!
//! Read-modify-write operations are serialized through an async mutex so a
//! background reconciliation and a foreground edit never interleave their
//! load/save pairs.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::export::Exporter;
use crate::kv::KeyValueStore;
use crate::partition::{
    format_date, partition_date, partition_key, DEFAULT_PROFILE, LEGACY_TASKS_KEY,
};
use crate::task::{Task, TaskEdit};

/// Source of "today" for migration and rollover.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Local calendar date.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

pub struct TaskStore {
    kv: Arc<dyn KeyValueStore>,
    exporter: Exporter,
    clock: Clock,
    write_lock: Mutex<()>,
}

/// Result of a rollover pass.
#[derive(Debug, Clone, Default, serde::Serialize, PartialEq, Eq)]
pub struct RolloverReport {
    pub profile: String,
    pub today: String,
    /// Tasks moved into today's partition.
    pub moved: usize,
    /// Past partitions that were rewritten.
    pub partitions_rewritten: usize,
}

impl TaskStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, exporter: Exporter) -> Self {
        Self {
            kv,
            exporter,
            clock: Arc::new(local_today),
            write_lock: Mutex::new(()),
        }
    }

    /// Replace the clock (tests pin "today").
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    pub fn kv(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    /// Exclusive access for a read-modify-write sequence.
    pub(crate) async fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    // =========================================================================
    // Load / save
    // =========================================================================

    /// Tasks of the (date, profile) partition.
    pub async fn load(&self, date: NaiveDate, profile: &str) -> Result<Vec<Task>> {
        self.migrate_legacy().await?;
        let key = partition_key(date, profile);
        let raw = self.kv.get(&key).await?;
        Ok(parse_partition(&key, raw.as_deref()))
    }

    /// Persist the full list, then export it in the background.
    pub async fn save(&self, date: NaiveDate, profile: &str, tasks: &[Task]) -> Result<()> {
        let key = partition_key(date, profile);
        let json = serde_json::to_string(tasks)?;
        self.kv.set(&key, &json).await?;
        tracing::debug!(key = %key, count = tasks.len(), "saved partition");

        self.exporter.dispatch(date, tasks.to_vec(), profile);
        Ok(())
    }

    /// Move the pre-partition `tasks` record under today's default-profile key.
    ///
    /// Tasks whose id already exists in today's partition are not duplicated.
    /// The legacy key is deleted afterwards, so this runs at most once.
    async fn migrate_legacy(&self) -> Result<()> {
        let Some(raw) = self.kv.get(LEGACY_TASKS_KEY).await? else {
            return Ok(());
        };

        let today = self.today();
        let legacy = parse_partition(LEGACY_TASKS_KEY, Some(&raw));
        if !legacy.is_empty() {
            let key = partition_key(today, DEFAULT_PROFILE);
            let current_raw = self.kv.get(&key).await?;
            let mut current = parse_partition(&key, current_raw.as_deref());
            let added = append_missing(&mut current, legacy);
            let json = serde_json::to_string(&current)?;
            self.kv.set(&key, &json).await?;
            tracing::info!(key = %key, migrated = added, "migrated legacy task list");
        }

        self.kv.delete(LEGACY_TASKS_KEY).await?;
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append `task` to the partition.
    pub async fn create(&self, date: NaiveDate, profile: &str, task: Task) -> Result<Task> {
        let _guard = self.write_guard().await;
        let mut tasks = self.load(date, profile).await?;
        if tasks.iter().any(|existing| existing.id == task.id) {
            return Err(Error::InvalidArgument(format!(
                "task id already exists: {}",
                task.id
            )));
        }
        tasks.push(task.clone());
        self.save(date, profile, &tasks).await?;
        Ok(task)
    }

    /// Replace the task with the same id. Returns `false` (and writes
    /// nothing) when the id is not present.
    pub async fn update(&self, date: NaiveDate, profile: &str, task: Task) -> Result<bool> {
        let _guard = self.write_guard().await;
        let mut tasks = self.load(date, profile).await?;
        let Some(slot) = tasks.iter_mut().find(|existing| existing.id == task.id) else {
            tracing::debug!(id = %task.id, "update target not found");
            return Ok(false);
        };
        *slot = task;
        self.save(date, profile, &tasks).await?;
        Ok(true)
    }

    /// Apply a field edit to one task. `Ok(None)` when the id is unknown.
    pub async fn edit(
        &self,
        date: NaiveDate,
        profile: &str,
        id: &str,
        edit: &TaskEdit,
    ) -> Result<Option<Task>> {
        let _guard = self.write_guard().await;
        let mut tasks = self.load(date, profile).await?;
        let Some(slot) = tasks.iter_mut().find(|existing| existing.id == id) else {
            return Ok(None);
        };
        edit.apply_to(slot)?;
        let updated = slot.clone();
        self.save(date, profile, &tasks).await?;
        Ok(Some(updated))
    }

    /// Remove the task with `id`. Always persists.
    pub async fn delete(&self, date: NaiveDate, profile: &str, id: &str) -> Result<()> {
        let _guard = self.write_guard().await;
        let mut tasks = self.load(date, profile).await?;
        tasks.retain(|task| task.id != id);
        self.save(date, profile, &tasks).await
    }

    /// Overwrite the whole partition (undo/redo replay).
    pub async fn replace(&self, date: NaiveDate, profile: &str, tasks: &[Task]) -> Result<()> {
        let _guard = self.write_guard().await;
        self.save(date, profile, tasks).await
    }

    // =========================================================================
    // Rollover
    // =========================================================================

    /// Move every unfinished task from `profile`'s past partitions into today.
    pub async fn rollover(&self, profile: &str) -> Result<RolloverReport> {
        let _guard = self.write_guard().await;
        self.migrate_legacy().await?;

        let today = self.today();
        let entries = self.kv.list_all().await?;
        let past = past_partitions(&entries, profile, today);

        let today_key = partition_key(today, profile);
        let mut today_tasks =
            parse_partition(&today_key, entries.get(&today_key).map(String::as_str));
        let mut seen: HashSet<String> = today_tasks.iter().map(|task| task.id.clone()).collect();

        let mut report = RolloverReport {
            profile: profile.to_string(),
            today: format_date(today),
            ..RolloverReport::default()
        };

        let mut rewrites: Vec<(NaiveDate, Vec<Task>)> = Vec::new();
        for (date, key) in past {
            let tasks = parse_partition(&key, entries.get(&key).map(String::as_str));
            let (done, unfinished): (Vec<Task>, Vec<Task>) =
                tasks.into_iter().partition(|task| task.status.is_done());

            if unfinished.is_empty() {
                continue;
            }

            // Copies already present today are dropped from the past
            // partition without being appended again.
            for task in unfinished {
                if seen.insert(task.id.clone()) {
                    today_tasks.push(task);
                    report.moved += 1;
                }
            }
            rewrites.push((date, done));
        }

        // Today is written before any past partition is trimmed: a failure in
        // between leaves a duplicate (absorbed by id dedup), never a loss.
        if report.moved > 0 {
            self.save(today, profile, &today_tasks).await?;
        }
        for (date, done) in rewrites {
            self.save(date, profile, &done).await?;
            report.partitions_rewritten += 1;
        }

        if report.moved > 0 {
            tracing::info!(
                profile = %profile,
                moved = report.moved,
                partitions = report.partitions_rewritten,
                "rolled over unfinished tasks"
            );
        }

        Ok(report)
    }
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("today", &self.today())
            .finish_non_exhaustive()
    }
}

/// Parse a stored partition; absent or corrupt values are an empty list.
fn parse_partition(key: &str, raw: Option<&str>) -> Vec<Task> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<Task>>(raw) {
        Ok(tasks) => tasks,
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "ignoring unparseable task partition");
            Vec::new()
        }
    }
}

/// Dated partitions of `profile` strictly before `today`, oldest first.
fn past_partitions(
    entries: &BTreeMap<String, String>,
    profile: &str,
    today: NaiveDate,
) -> Vec<(NaiveDate, String)> {
    let mut past: Vec<(NaiveDate, String)> = entries
        .keys()
        .filter_map(|key| partition_date(key, profile).map(|date| (date, key.clone())))
        .filter(|(date, _)| *date < today)
        .collect();
    past.sort();
    past
}

fn append_missing(target: &mut Vec<Task>, incoming: Vec<Task>) -> usize {
    let mut seen: HashSet<String> = target.iter().map(|task| task.id.clone()).collect();
    let mut added = 0;
    for task in incoming {
        if seen.insert(task.id.clone()) {
            target.push(task);
            added += 1;
        }
    }
    added
}
