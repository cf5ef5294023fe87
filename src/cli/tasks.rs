//! daybook task commands: list, add, edit, status changes, rm, rollover.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::cli::context::Context;
use crate::error::{Error, Result};
use crate::history::Session;
use crate::output::{emit_success, HumanOutput};
use crate::partition::{format_date, parse_iso_date};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::store::RolloverReport;
use crate::task::{sort_tasks, Priority, StatusAction, Task, TaskEdit};

/// Characters of the id shown in listings; any unique prefix is accepted.
const SHORT_ID_LEN: usize = 12;

/// Options for `daybook add`
pub struct AddOptions {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: String,
    pub deadline: Option<String>,
    pub link: Option<String>,
}

/// Options for `daybook edit`
pub struct EditOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub deadline: Option<String>,
    pub clear_deadline: bool,
}

#[derive(Serialize)]
struct ListReport {
    date: String,
    profile: String,
    tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rollover: Option<RolloverReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reconcile: Option<ReconcileReport>,
}

#[derive(Serialize)]
struct TaskReport {
    date: String,
    profile: String,
    task: Task,
}

pub async fn run_list(ctx: &Context, no_sync: bool) -> Result<()> {
    let (session, rollover) = ctx.session().await?;
    let mut human_warnings = Vec::new();

    let reconcile = match (&ctx.resolver, no_sync) {
        (Some(resolver), false) => {
            let reconciler = Arc::new(Reconciler::new(Arc::clone(&ctx.store), Arc::clone(resolver)));
            let report = reconciler
                .spawn(session.date(), session.profile())
                .await
                .map_err(|err| Error::OperationFailed(format!("reconciliation task failed: {err}")))??;
            if report.unresolved > 0 {
                human_warnings.push(format!(
                    "{} linked task(s) could not be refreshed from GitHub",
                    report.unresolved
                ));
            }
            Some(report)
        }
        _ => None,
    };

    let mut tasks = session.tasks().await?;
    sort_tasks(&mut tasks);

    let mut human = HumanOutput::new(format!(
        "daybook list: {} ({})",
        format_date(session.date()),
        session.profile()
    ));
    let open = tasks.iter().filter(|task| !task.status.is_done()).count();
    human.push_summary("open", open.to_string());
    human.push_summary("done", (tasks.len() - open).to_string());
    if let Some(report) = rollover.as_ref().filter(|report| report.moved > 0) {
        human.push_summary("rolled over", report.moved.to_string());
    }
    if let Some(report) = reconcile.as_ref().filter(|report| !report.updated.is_empty()) {
        human.push_summary("refreshed from GitHub", report.updated.len().to_string());
    }
    for task in &tasks {
        human.push_detail(task_line(task));
    }
    for warning in human_warnings {
        human.push_warning(warning);
    }
    if tasks.is_empty() {
        human.push_next_step("daybook add \"<title>\"");
    }

    let report = ListReport {
        date: format_date(session.date()),
        profile: session.profile().to_string(),
        tasks,
        rollover,
        reconcile,
    };
    emit_success(ctx.output, "list", &report, Some(&human))
}

pub async fn run_add(ctx: &Context, options: AddOptions) -> Result<()> {
    let priority: Priority = options.priority.parse()?;
    let deadline = options.deadline.as_deref().map(parse_deadline).transpose()?;
    let (mut session, _) = ctx.session().await?;

    let task = match options.link {
        Some(url) => {
            let resolver = ctx.require_resolver()?;
            let mut task = session
                .create_from_link(resolver.as_ref(), &url, priority)
                .await?;
            if deadline.is_some() {
                let edit = TaskEdit {
                    deadline: Some(deadline),
                    ..TaskEdit::default()
                };
                if let Some(updated) = session.edit(&task.id, &edit).await? {
                    task = updated;
                }
            }
            task
        }
        None => {
            let title = options.title.unwrap_or_default();
            let task = Task::new(title.trim())
                .with_description(options.description.unwrap_or_default())
                .with_priority(priority)
                .with_deadline(deadline);
            session.create(task).await?
        }
    };

    let mut human = HumanOutput::new(format!("daybook add: {}", task.title));
    human.push_summary("id", task.id.clone());
    human.push_summary("status", task.status.to_string());
    human.push_summary("priority", task.priority.to_string());
    if let Some(github) = &task.github {
        human.push_summary("github", github.reference());
    }
    human.push_next_step(format!("daybook start {}", short_id(&task.id)));

    emit_task(ctx, "add", &session, task, &human)
}

pub async fn run_edit(ctx: &Context, options: EditOptions) -> Result<()> {
    let deadline = if options.clear_deadline {
        Some(None)
    } else {
        options
            .deadline
            .as_deref()
            .map(parse_deadline)
            .transpose()?
            .map(Some)
    };
    let edit = TaskEdit {
        title: options.title,
        description: options.description,
        priority: options.priority.as_deref().map(str::parse).transpose()?,
        deadline,
    };
    if edit.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to edit (pass --title, --description, --priority or --deadline)".to_string(),
        ));
    }

    let (mut session, _) = ctx.session().await?;
    let id = resolve_id(&session, &options.id).await?;
    let task = session
        .edit(&id, &edit)
        .await?
        .ok_or_else(|| Error::TaskNotFound(options.id.clone()))?;

    let mut human = HumanOutput::new(format!("daybook edit: {}", task.title));
    human.push_detail(task_line(&task));
    emit_task(ctx, "edit", &session, task, &human)
}

pub async fn run_status(ctx: &Context, input: &str, action: StatusAction) -> Result<()> {
    let (mut session, _) = ctx.session().await?;
    let id = resolve_id(&session, input).await?;
    let task = session
        .apply_status(&id, action)
        .await?
        .ok_or_else(|| Error::TaskNotFound(input.to_string()))?;

    let mut human = HumanOutput::new(format!("daybook {}: {}", action.as_str(), task.title));
    human.push_summary("status", task.status.to_string());
    emit_task(ctx, action.as_str(), &session, task, &human)
}

pub async fn run_rm(ctx: &Context, input: &str) -> Result<()> {
    let (mut session, _) = ctx.session().await?;
    let id = resolve_id(&session, input).await?;
    let task = session
        .delete(&id)
        .await?
        .ok_or_else(|| Error::TaskNotFound(input.to_string()))?;

    let human = HumanOutput::new(format!("daybook rm: {}", task.title));
    emit_task(ctx, "rm", &session, task, &human)
}

pub async fn run_rollover(ctx: &Context) -> Result<()> {
    let profile = ctx.active_profile().await?;
    let report = ctx.store.rollover(&profile).await?;

    let mut human = HumanOutput::new(format!("daybook rollover: {profile}"));
    human.push_summary("today", report.today.clone());
    human.push_summary("moved", report.moved.to_string());
    human.push_summary("days cleaned up", report.partitions_rewritten.to_string());
    emit_success(ctx.output, "rollover", &report, Some(&human))
}

fn emit_task(
    ctx: &Context,
    command: &str,
    session: &Session,
    task: Task,
    human: &HumanOutput,
) -> Result<()> {
    let report = TaskReport {
        date: format_date(session.date()),
        profile: session.profile().to_string(),
        task,
    };
    emit_success(ctx.output, command, &report, Some(human))
}

/// Expand a user supplied id or prefix into a full task id.
pub(crate) async fn resolve_id(session: &Session, input: &str) -> Result<String> {
    session
        .find(input)
        .await?
        .map(|task| task.id)
        .ok_or_else(|| Error::TaskNotFound(input.to_string()))
}

/// `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
pub(crate) fn parse_deadline(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Some(date) = parse_iso_date(raw) {
        return Ok(start_of_day(date));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| {
            Error::InvalidArgument(format!(
                "invalid deadline '{raw}' (expected YYYY-MM-DD or RFC 3339)"
            ))
        })
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

pub(crate) fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// One-line rendering used by `list` and the shell.
pub(crate) fn task_line(task: &Task) -> String {
    let mut line = format!(
        "{}  [{}] {} ({})",
        short_id(&task.id),
        task.status,
        task.title,
        task.priority
    );
    if let Some(deadline) = task.deadline {
        line.push_str(&format!(" due {}", deadline.format("%Y-%m-%d")));
    }
    if let Some(github) = &task.github {
        line.push_str(&format!(" {}", github.reference()));
    }
    line
}
