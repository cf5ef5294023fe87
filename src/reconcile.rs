//! Reconciliation of cached GitHub metadata against fresh remote state.
//!
//! For every task in a partition that carries a GitHub link, the remote item
//! is looked up (all lookups run concurrently and independently), the task
//! status is re-derived from PR and review state, and tasks whose metadata or
//! status changed are written back. Tasks with nothing new are left alone.
//!
//! Status derivation only applies to `todo`, `in-progress`,
//! `waiting-for-review` and `ready-to-merge`:
//!
//! | linked item                                  | derived status       |
//! |----------------------------------------------|----------------------|
//! | open PR, approved                            | `ready-to-merge`     |
//! | open PR, any other review state              | `waiting-for-review` |
//! | issue with an approved open linked PR        | `ready-to-merge`     |
//! | issue with any other open linked PR          | `waiting-for-review` |
//! | anything else                                | unchanged            |

use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::remote::{RemoteResolver, ResolvedItem};
use crate::store::TaskStore;
use crate::task::{
    GithubMetadata, ItemType, PrState, Priority, ReviewState, Task, TaskStatus,
};

/// Status implied by `metadata` for a task currently in `current`.
pub fn derive_status(current: TaskStatus, metadata: &GithubMetadata) -> TaskStatus {
    if !current.is_auto_derivable() {
        return current;
    }

    if metadata.is_open_pull_request() {
        return if metadata.review_state == Some(ReviewState::Approved) {
            TaskStatus::ReadyToMerge
        } else {
            TaskStatus::WaitingForReview
        };
    }

    if metadata.item_type == ItemType::Issue {
        let open: Vec<_> = metadata
            .linked_prs()
            .iter()
            .filter(|pr| pr.state == PrState::Open)
            .collect();
        if open
            .iter()
            .any(|pr| pr.review_state == Some(ReviewState::Approved))
        {
            return TaskStatus::ReadyToMerge;
        }
        if !open.is_empty() {
            return TaskStatus::WaitingForReview;
        }
    }

    current
}

/// Whether the fields reconciliation tracks differ between the cached and
/// fresh metadata. A missing linked-PR list equals an empty one.
pub fn metadata_changed(cached: Option<&GithubMetadata>, fresh: &GithubMetadata) -> bool {
    let Some(cached) = cached else {
        return true;
    };
    cached.normalized_state() != fresh.normalized_state()
        || cached.review_state != fresh.review_state
        || cached.linked_prs() != fresh.linked_prs()
}

/// One task rewritten by reconciliation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskChange {
    pub id: String,
    pub title: String,
    pub status_from: TaskStatus,
    pub status_to: TaskStatus,
    pub metadata_changed: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Tasks carrying a GitHub link.
    pub checked: usize,
    /// Links the resolver could not answer.
    pub unresolved: usize,
    pub updated: Vec<TaskChange>,
}

pub struct Reconciler {
    store: Arc<TaskStore>,
    resolver: Arc<dyn RemoteResolver>,
}

impl Reconciler {
    pub fn new(store: Arc<TaskStore>, resolver: Arc<dyn RemoteResolver>) -> Self {
        Self { store, resolver }
    }

    /// Refresh every linked task in the (date, profile) partition.
    pub async fn reconcile(&self, date: NaiveDate, profile: &str) -> Result<ReconcileReport> {
        let tasks = self.store.load(date, profile).await?;
        let linked: Vec<(String, String)> = tasks
            .iter()
            .filter_map(|task| {
                task.github
                    .as_ref()
                    .map(|github| (task.id.clone(), github.url.clone()))
            })
            .collect();

        let mut report = ReconcileReport {
            checked: linked.len(),
            ..ReconcileReport::default()
        };
        if linked.is_empty() {
            return Ok(report);
        }

        let lookups = linked.iter().map(|(id, url)| {
            let resolver = Arc::clone(&self.resolver);
            async move { (id.clone(), resolver.resolve(url).await) }
        });
        let results = join_all(lookups).await;

        let mut pending: Vec<(String, ResolvedItem)> = Vec::new();
        for (id, resolved) in results {
            let Some(fresh) = resolved else {
                report.unresolved += 1;
                continue;
            };
            let Some(task) = tasks.iter().find(|task| task.id == id) else {
                continue;
            };
            if needs_update(task, &fresh.metadata) {
                pending.push((id, fresh));
            }
        }

        if pending.is_empty() {
            tracing::debug!(checked = report.checked, "reconciliation found no changes");
            return Ok(report);
        }

        // Re-read under the write guard so an edit made while the lookups
        // were in flight is not overwritten with the pre-fetch list.
        let _guard = self.store.write_guard().await;
        let mut current = self.store.load(date, profile).await?;
        for (id, fresh) in pending {
            let Some(task) = current.iter_mut().find(|task| task.id == id) else {
                tracing::debug!(id = %id, "task removed during reconciliation");
                continue;
            };
            if !needs_update(task, &fresh.metadata) {
                continue;
            }

            let status_from = task.status;
            let status_to = derive_status(task.status, &fresh.metadata);
            let changed_meta = metadata_changed(task.github.as_ref(), &fresh.metadata);
            task.github = Some(fresh.metadata);
            task.status = status_to;

            report.updated.push(TaskChange {
                id: task.id.clone(),
                title: task.title.clone(),
                status_from,
                status_to,
                metadata_changed: changed_meta,
            });
        }

        if !report.updated.is_empty() {
            self.store.save(date, profile, &current).await?;
            tracing::info!(
                profile = %profile,
                updated = report.updated.len(),
                "reconciled GitHub state"
            );
        }

        Ok(report)
    }

    /// Run [`Reconciler::reconcile`] as a detached task; the handle delivers
    /// the report once changes (if any) are persisted.
    pub fn spawn(
        self: &Arc<Self>,
        date: NaiveDate,
        profile: &str,
    ) -> JoinHandle<Result<ReconcileReport>> {
        let this = Arc::clone(self);
        let profile = profile.to_string();
        tokio::spawn(async move { this.reconcile(date, &profile).await })
    }
}

fn needs_update(task: &Task, fresh: &GithubMetadata) -> bool {
    metadata_changed(task.github.as_ref(), fresh) || derive_status(task.status, fresh) != task.status
}

/// Build a new task from a GitHub link.
pub async fn task_from_link(
    resolver: &dyn RemoteResolver,
    url: &str,
    priority: Priority,
) -> Result<Task> {
    let item = resolver
        .resolve(url)
        .await
        .ok_or_else(|| Error::Remote(format!("could not resolve {url}")))?;

    let status = derive_status(TaskStatus::Todo, &item.metadata);
    let mut task = Task::new(item.metadata.title.clone())
        .with_description(item.body)
        .with_priority(priority)
        .with_github(item.metadata);
    task.status = status;
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::LinkedPr;

    fn pr(state: &str, review: Option<ReviewState>) -> GithubMetadata {
        GithubMetadata {
            url: "https://github.com/acme/app/pull/5".to_string(),
            number: 5,
            repo: "app".to_string(),
            owner: "acme".to_string(),
            state: state.to_string(),
            title: "Change".to_string(),
            item_type: ItemType::PullRequest,
            review_state: review,
            linked_prs: None,
        }
    }

    fn issue(linked: Vec<LinkedPr>) -> GithubMetadata {
        GithubMetadata {
            url: "https://github.com/acme/app/issues/4".to_string(),
            number: 4,
            repo: "app".to_string(),
            owner: "acme".to_string(),
            state: "open".to_string(),
            title: "Bug".to_string(),
            item_type: ItemType::Issue,
            review_state: None,
            linked_prs: Some(linked),
        }
    }

    fn linked(number: u64, state: PrState, review: Option<ReviewState>) -> LinkedPr {
        LinkedPr {
            number,
            title: format!("PR {number}"),
            url: format!("https://github.com/acme/app/pull/{number}"),
            state,
            review_state: review,
        }
    }

    #[test]
    fn open_pr_review_state_drives_status() {
        assert_eq!(
            derive_status(TaskStatus::Todo, &pr("open", Some(ReviewState::Approved))),
            TaskStatus::ReadyToMerge
        );
        for review in [
            Some(ReviewState::ChangesRequested),
            Some(ReviewState::PendingReview),
            None,
        ] {
            assert_eq!(
                derive_status(TaskStatus::InProgress, &pr("open", review)),
                TaskStatus::WaitingForReview
            );
        }
        assert_eq!(
            derive_status(TaskStatus::ReadyToMerge, &pr("merged", Some(ReviewState::Approved))),
            TaskStatus::ReadyToMerge
        );
    }

    #[test]
    fn paused_and_done_are_never_overridden() {
        let approved = pr("open", Some(ReviewState::Approved));
        assert_eq!(derive_status(TaskStatus::Paused, &approved), TaskStatus::Paused);
        assert_eq!(derive_status(TaskStatus::Done, &approved), TaskStatus::Done);
    }

    #[test]
    fn issue_uses_open_linked_prs_only() {
        let approved_but_closed = issue(vec![
            linked(1, PrState::Closed, Some(ReviewState::Approved)),
            linked(2, PrState::Open, Some(ReviewState::ChangesRequested)),
        ]);
        assert_eq!(
            derive_status(TaskStatus::Todo, &approved_but_closed),
            TaskStatus::WaitingForReview
        );

        let approved_open = issue(vec![
            linked(2, PrState::Open, None),
            linked(3, PrState::Open, Some(ReviewState::Approved)),
        ]);
        assert_eq!(
            derive_status(TaskStatus::WaitingForReview, &approved_open),
            TaskStatus::ReadyToMerge
        );

        let merged_only = issue(vec![linked(4, PrState::Merged, Some(ReviewState::Approved))]);
        assert_eq!(
            derive_status(TaskStatus::InProgress, &merged_only),
            TaskStatus::InProgress
        );
    }

    #[test]
    fn change_detection_tracks_state_review_and_links() {
        let cached = issue(vec![linked(1, PrState::Open, None)]);

        let mut same = cached.clone();
        same.state = "OPEN".to_string();
        same.title = "Renamed upstream".to_string();
        assert!(!metadata_changed(Some(&cached), &same));

        let mut closed = cached.clone();
        closed.state = "closed".to_string();
        assert!(metadata_changed(Some(&cached), &closed));

        let reordered = issue(vec![linked(2, PrState::Open, None), linked(1, PrState::Open, None)]);
        let original = issue(vec![linked(1, PrState::Open, None), linked(2, PrState::Open, None)]);
        assert!(metadata_changed(Some(&original), &reordered));

        let mut no_links = cached.clone();
        no_links.linked_prs = None;
        let mut empty_links = cached.clone();
        empty_links.linked_prs = Some(Vec::new());
        assert!(!metadata_changed(Some(&no_links), &empty_links));

        assert!(metadata_changed(None, &cached));
    }
}
