//! Remote status lookup for GitHub issues and pull requests.
//!
//! The core only depends on [`RemoteResolver`]. [`GhResolver`] is the
//! production implementation: it shells out to `gh api graphql`, so
//! authentication and transport stay with the GitHub CLI.
//!
//! A resolver answers `None` both for links it does not recognize and for
//! lookups that failed; callers treat the two identically.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::task::{GithubMetadata, ItemType, LinkedPr, PrState, ReviewState};

/// Fresh remote state for one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem {
    pub metadata: GithubMetadata,
    pub body: String,
}

#[async_trait]
pub trait RemoteResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Option<ResolvedItem>;
}

/// Parsed `https://github.com/<owner>/<repo>/(issues|pull)/<number>` link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub kind: ItemType,
}

impl GithubRef {
    pub fn canonical_url(&self) -> String {
        let segment = match self.kind {
            ItemType::Issue => "issues",
            ItemType::PullRequest => "pull",
        };
        format!(
            "https://github.com/{}/{}/{}/{}",
            self.owner, self.repo, segment, self.number
        )
    }
}

/// Recognize a GitHub issue or pull request URL.
pub fn parse_github_url(url: &str) -> Option<GithubRef> {
    let trimmed = url.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))?;
    let without_www = without_scheme
        .strip_prefix("www.")
        .unwrap_or(without_scheme);
    let path = without_www.strip_prefix("github.com/")?;
    let path = path
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    let mut segments = path.split('/');
    let owner = segments.next().filter(|s| !s.is_empty())?;
    let repo = segments.next().filter(|s| !s.is_empty())?;
    let kind = match segments.next()? {
        "issues" => ItemType::Issue,
        "pull" | "pulls" => ItemType::PullRequest,
        _ => return None,
    };
    let number: u64 = segments.next()?.parse().ok()?;
    if number == 0 {
        return None;
    }

    Some(GithubRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
        number,
        kind,
    })
}

// =============================================================================
// gh CLI resolver
// =============================================================================

const ITEM_QUERY: &str = r#"
query($owner: String!, $repo: String!, $number: Int!) {
  repository(owner: $owner, name: $repo) {
    issueOrPullRequest(number: $number) {
      __typename
      ... on Issue {
        number
        title
        url
        state
        body
        timelineItems(first: 50, itemTypes: [CONNECTED_EVENT, CROSS_REFERENCED_EVENT]) {
          nodes {
            __typename
            ... on ConnectedEvent {
              subject { __typename ... on PullRequest { number title url state reviewDecision } }
            }
            ... on CrossReferencedEvent {
              source { __typename ... on PullRequest { number title url state reviewDecision } }
            }
          }
        }
      }
      ... on PullRequest {
        number
        title
        url
        state
        body
        reviewDecision
      }
    }
  }
}
"#;

/// Resolver backed by the `gh` CLI.
#[derive(Debug, Clone)]
pub struct GhResolver {
    gh_bin: PathBuf,
    timeout: Duration,
}

impl GhResolver {
    pub fn new(gh_bin: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            gh_bin: gh_bin.into(),
            timeout,
        }
    }

    async fn fetch(&self, reference: &GithubRef) -> Result<ResolvedItem> {
        let mut command = Command::new(&self.gh_bin);
        command
            .arg("api")
            .arg("graphql")
            .arg("-f")
            .arg(format!("query={ITEM_QUERY}"))
            .arg("-f")
            .arg(format!("owner={}", reference.owner))
            .arg("-f")
            .arg(format!("repo={}", reference.repo))
            .arg("-F")
            .arg(format!("number={}", reference.number))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                Error::Remote(format!(
                    "gh timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Remote(format!(
                "gh exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        decode_item_response(reference, &stdout)
    }
}

#[async_trait]
impl RemoteResolver for GhResolver {
    async fn resolve(&self, url: &str) -> Option<ResolvedItem> {
        let reference = parse_github_url(url)?;
        match self.fetch(&reference).await {
            Ok(item) => Some(item),
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "remote lookup failed");
                None
            }
        }
    }
}

// =============================================================================
// Response decoding
// =============================================================================

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
struct RepositoryNode {
    #[serde(rename = "issueOrPullRequest")]
    item: Option<ItemNode>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum ItemNode {
    Issue(IssueNode),
    PullRequest(PullRequestNode),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueNode {
    number: u64,
    title: String,
    url: String,
    state: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    timeline_items: Option<Connection<TimelineNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestNode {
    number: u64,
    title: String,
    url: String,
    state: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    review_decision: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Connection<T> {
    #[serde(default)]
    nodes: Vec<Option<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum TimelineNode {
    ConnectedEvent {
        #[serde(default)]
        subject: Option<ReferenceSource>,
    },
    CrossReferencedEvent {
        #[serde(default)]
        source: Option<ReferenceSource>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum ReferenceSource {
    PullRequest(PullRequestNode),
    #[serde(other)]
    Other,
}

/// Decode a `gh api graphql` response for `reference`.
pub fn decode_item_response(reference: &GithubRef, raw: &str) -> Result<ResolvedItem> {
    let response: GraphqlResponse = serde_json::from_str(raw)?;
    if let Some(first) = response.errors.first() {
        return Err(Error::Remote(first.message.clone()));
    }

    let item = response
        .data
        .and_then(|data| data.repository)
        .and_then(|repo| repo.item)
        .ok_or_else(|| {
            Error::Remote(format!(
                "{}/{}#{} not found",
                reference.owner, reference.repo, reference.number
            ))
        })?;

    let resolved = match item {
        ItemNode::PullRequest(pr) => ResolvedItem {
            metadata: GithubMetadata {
                url: pr.url,
                number: pr.number,
                repo: reference.repo.clone(),
                owner: reference.owner.clone(),
                state: pr.state.to_ascii_lowercase(),
                title: pr.title,
                item_type: ItemType::PullRequest,
                review_state: pr.review_decision.as_deref().and_then(review_state_from),
                linked_prs: None,
            },
            body: pr.body.unwrap_or_default(),
        },
        ItemNode::Issue(issue) => {
            let linked = linked_prs_from(issue.timeline_items);
            ResolvedItem {
                metadata: GithubMetadata {
                    url: issue.url,
                    number: issue.number,
                    repo: reference.repo.clone(),
                    owner: reference.owner.clone(),
                    state: issue.state.to_ascii_lowercase(),
                    title: issue.title,
                    item_type: ItemType::Issue,
                    review_state: None,
                    linked_prs: Some(linked),
                },
                body: issue.body.unwrap_or_default(),
            }
        }
    };

    Ok(resolved)
}

fn linked_prs_from(timeline: Option<Connection<TimelineNode>>) -> Vec<LinkedPr> {
    let mut linked: Vec<LinkedPr> = Vec::new();
    let nodes = timeline.map(|conn| conn.nodes).unwrap_or_default();

    for node in nodes.into_iter().flatten() {
        let source = match node {
            TimelineNode::ConnectedEvent { subject } => subject,
            TimelineNode::CrossReferencedEvent { source } => source,
            TimelineNode::Other => None,
        };
        let Some(ReferenceSource::PullRequest(pr)) = source else {
            continue;
        };
        if linked.iter().any(|existing| existing.number == pr.number) {
            continue;
        }
        let Some(state) = pr_state_from(&pr.state) else {
            continue;
        };
        linked.push(LinkedPr {
            number: pr.number,
            title: pr.title,
            url: pr.url,
            state,
            review_state: pr.review_decision.as_deref().and_then(review_state_from),
        });
    }

    linked
}

fn pr_state_from(raw: &str) -> Option<PrState> {
    match raw.to_ascii_uppercase().as_str() {
        "OPEN" => Some(PrState::Open),
        "CLOSED" => Some(PrState::Closed),
        "MERGED" => Some(PrState::Merged),
        _ => None,
    }
}

fn review_state_from(raw: &str) -> Option<ReviewState> {
    match raw.to_ascii_uppercase().as_str() {
        "APPROVED" => Some(ReviewState::Approved),
        "CHANGES_REQUESTED" => Some(ReviewState::ChangesRequested),
        "REVIEW_REQUIRED" => Some(ReviewState::PendingReview),
        _ => None,
    }
}
