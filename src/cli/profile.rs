//! daybook profile commands.

use serde::Serialize;

use crate::cli::context::Context;
use crate::cli::ProfileCommands;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::partition::validate_profile_name;

#[derive(Serialize)]
struct ProfileListReport {
    profiles: Vec<String>,
    active: String,
}

#[derive(Serialize)]
struct ProfileChangeReport {
    profile: String,
    changed: bool,
}

pub async fn run(ctx: &Context, command: ProfileCommands) -> Result<()> {
    match command {
        ProfileCommands::List => run_list(ctx).await,
        ProfileCommands::Create { name } => run_create(ctx, &name).await,
        ProfileCommands::Delete { name } => run_delete(ctx, &name).await,
        ProfileCommands::Use { name } => run_use(ctx, &name).await,
    }
}

async fn run_list(ctx: &Context) -> Result<()> {
    let directory = ctx.profiles().await?;
    let active = ctx.active_profile().await?;

    let mut human = HumanOutput::new("daybook profile list");
    for name in directory.list() {
        if *name == active {
            human.push_detail(format!("{name} (active)"));
        } else {
            human.push_detail(name.clone());
        }
    }

    let report = ProfileListReport {
        profiles: directory.list().to_vec(),
        active,
    };
    emit_success(ctx.output, "profile list", &report, Some(&human))
}

async fn run_create(ctx: &Context, raw: &str) -> Result<()> {
    let name = validate_profile_name(raw)?;
    let mut directory = ctx.profiles().await?;
    let changed = directory.create(&name).await?;

    let mut human = HumanOutput::new(format!("daybook profile create: {name}"));
    if changed {
        human.push_next_step(format!("daybook profile use {name}"));
    } else {
        human.push_warning(format!("profile '{name}' already exists"));
    }

    let report = ProfileChangeReport {
        profile: name,
        changed,
    };
    emit_success(ctx.output, "profile create", &report, Some(&human))
}

async fn run_delete(ctx: &Context, raw: &str) -> Result<()> {
    let name = raw.trim().to_string();
    let mut directory = ctx.profiles().await?;
    let changed = directory.delete(&name).await?;

    let mut human = HumanOutput::new(format!("daybook profile delete: {name}"));
    if changed {
        human.push_summary("tasks", "kept in the store");
    } else {
        human.push_warning(format!(
            "profile '{name}' was not deleted (unknown or the default profile)"
        ));
    }

    let report = ProfileChangeReport {
        profile: name,
        changed,
    };
    emit_success(ctx.output, "profile delete", &report, Some(&human))
}

async fn run_use(ctx: &Context, raw: &str) -> Result<()> {
    let mut directory = ctx.profiles().await?;
    directory.select(raw).await?;
    let name = directory.selected().to_string();

    let mut human = HumanOutput::new(format!("daybook profile use: {name}"));
    human.push_next_step("daybook list");

    let report = ProfileChangeReport {
        profile: name,
        changed: true,
    };
    emit_success(ctx.output, "profile use", &report, Some(&human))
}
