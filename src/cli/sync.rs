//! daybook sync: refresh GitHub-linked tasks of the active day.

use std::sync::Arc;

use crate::cli::context::Context;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::partition::format_date;
use crate::reconcile::Reconciler;

pub async fn run(ctx: &Context) -> Result<()> {
    let resolver = ctx.require_resolver()?;
    let profile = ctx.active_profile().await?;
    let date = ctx.date();

    let reconciler = Arc::new(Reconciler::new(Arc::clone(&ctx.store), resolver));
    let report = reconciler
        .spawn(date, &profile)
        .await
        .map_err(|err| Error::OperationFailed(format!("reconciliation task failed: {err}")))??;

    let mut human = HumanOutput::new(format!(
        "daybook sync: {} ({profile})",
        format_date(date)
    ));
    human.push_summary("linked", report.checked.to_string());
    human.push_summary("updated", report.updated.len().to_string());
    for change in &report.updated {
        if change.status_from == change.status_to {
            human.push_detail(format!("{}: metadata refreshed", change.title));
        } else {
            human.push_detail(format!(
                "{}: {} -> {}",
                change.title, change.status_from, change.status_to
            ));
        }
    }
    if report.unresolved > 0 {
        human.push_warning(format!(
            "{} link(s) could not be resolved; is `gh` installed and authenticated?",
            report.unresolved
        ));
        human.push_next_step("gh auth status");
    }

    emit_success(ctx.output, "sync", &report, Some(&human))
}
