#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use daybook::error::Result;
use daybook::export::{Exporter, NoteSink};
use daybook::kv::{KeyValueStore, MemoryStore};
use daybook::remote::{RemoteResolver, ResolvedItem};
use daybook::store::TaskStore;
use daybook::task::{GithubMetadata, ItemType, LinkedPr, PrState, ReviewState, Task};

pub fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
}

/// Store over `kv` whose "today" is pinned to `today`.
pub fn store_at(kv: Arc<MemoryStore>, today: &str) -> Arc<TaskStore> {
    store_with_exporter(kv, today, Exporter::disabled())
}

pub fn store_with_sink(
    kv: Arc<MemoryStore>,
    today: &str,
    sink: Arc<RecordingSink>,
) -> Arc<TaskStore> {
    store_with_exporter(kv, today, Exporter::new(sink))
}

fn store_with_exporter(kv: Arc<MemoryStore>, today: &str, exporter: Exporter) -> Arc<TaskStore> {
    let today = day(today);
    let kv: Arc<dyn KeyValueStore> = kv;
    Arc::new(TaskStore::new(kv, exporter).with_clock(Arc::new(move || today)))
}

pub fn tasks_json(tasks: &[Task]) -> String {
    serde_json::to_string(tasks).expect("serialize tasks")
}

pub async fn stored_tasks(kv: &MemoryStore, key: &str) -> Option<Vec<Task>> {
    let raw = kv.get(key).await.expect("kv get")?;
    Some(serde_json::from_str(&raw).expect("stored partition parses"))
}

/// Sink recording every export it receives.
#[derive(Default)]
pub struct RecordingSink {
    exports: Mutex<Vec<(NaiveDate, String, Vec<Task>)>>,
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.exports.lock().expect("sink lock").len()
    }

    pub fn last(&self) -> Option<(NaiveDate, String, Vec<Task>)> {
        self.exports.lock().expect("sink lock").last().cloned()
    }
}

#[async_trait]
impl NoteSink for RecordingSink {
    async fn export(&self, date: NaiveDate, tasks: &[Task], profile: &str) -> Result<()> {
        self.exports
            .lock()
            .expect("sink lock")
            .push((date, profile.to_string(), tasks.to_vec()));
        Ok(())
    }
}

/// Resolver answering from a fixed table; unknown URLs fail.
#[derive(Default)]
pub struct StubResolver {
    items: HashMap<String, ResolvedItem>,
    calls: AtomicUsize,
}

impl StubResolver {
    pub fn with(mut self, metadata: GithubMetadata) -> Self {
        self.items.insert(
            metadata.url.clone(),
            ResolvedItem {
                metadata,
                body: "remote body".to_string(),
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteResolver for StubResolver {
    async fn resolve(&self, url: &str) -> Option<ResolvedItem> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.items.get(url).cloned()
    }
}

pub fn pr_metadata(number: u64, state: &str, review: Option<ReviewState>) -> GithubMetadata {
    GithubMetadata {
        url: format!("https://github.com/acme/app/pull/{number}"),
        number,
        repo: "app".to_string(),
        owner: "acme".to_string(),
        state: state.to_string(),
        title: format!("PR {number}"),
        item_type: ItemType::PullRequest,
        review_state: review,
        linked_prs: None,
    }
}

pub fn issue_metadata(number: u64, linked: Vec<LinkedPr>) -> GithubMetadata {
    GithubMetadata {
        url: format!("https://github.com/acme/app/issues/{number}"),
        number,
        repo: "app".to_string(),
        owner: "acme".to_string(),
        state: "open".to_string(),
        title: format!("Issue {number}"),
        item_type: ItemType::Issue,
        review_state: None,
        linked_prs: Some(linked),
    }
}

pub fn linked_pr(number: u64, state: PrState, review: Option<ReviewState>) -> LinkedPr {
    LinkedPr {
        number,
        title: format!("PR {number}"),
        url: format!("https://github.com/acme/app/pull/{number}"),
        state,
        review_state: review,
    }
}

/// Task linked to `metadata` with the given status.
pub fn linked_task(title: &str, metadata: GithubMetadata) -> Task {
    Task::new(title).with_github(metadata)
}
