//! daybook shell: line-oriented session with undo/redo.
//!
//! History lives as long as the shell does; each line is one mutation.

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::context::Context;
use crate::cli::tasks::{resolve_id, task_line};
use crate::error::{exit_codes, Error, Result};
use crate::history::Session;
use crate::partition::format_date;
use crate::task::{sort_tasks, StatusAction, Task, TaskEdit};

const HELP: &str =
    "commands: list | add <title> | edit <id> <title> | start|pause|resume|toggle <id> | rm <id> | undo | redo | help | quit";

#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    List,
    Add(String),
    Rename(String, String),
    Status(StatusAction, String),
    Remove(String),
    Undo,
    Redo,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<ShellCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let needs_arg = |what: &str| {
        if rest.is_empty() {
            Err(Error::InvalidArgument(format!("{verb} needs {what}")))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "list" | "ls" => ShellCommand::List,
        "add" => ShellCommand::Add(needs_arg("a title")?),
        "edit" => {
            let arg = needs_arg("a task id and a title")?;
            match arg.split_once(char::is_whitespace) {
                Some((id, title)) if !title.trim().is_empty() => {
                    ShellCommand::Rename(id.to_string(), title.trim().to_string())
                }
                _ => {
                    return Err(Error::InvalidArgument(
                        "edit needs a task id and a title".to_string(),
                    ))
                }
            }
        }
        "start" => ShellCommand::Status(StatusAction::Start, needs_arg("a task id")?),
        "pause" => ShellCommand::Status(StatusAction::Pause, needs_arg("a task id")?),
        "resume" => ShellCommand::Status(StatusAction::Resume, needs_arg("a task id")?),
        "toggle" | "done" => ShellCommand::Status(StatusAction::Toggle, needs_arg("a task id")?),
        "rm" => ShellCommand::Remove(needs_arg("a task id")?),
        "undo" => ShellCommand::Undo,
        "redo" => ShellCommand::Redo,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => {
            return Err(Error::InvalidArgument(format!(
                "unknown command '{other}' (try help)"
            )))
        }
    };
    Ok(Some(command))
}

pub async fn run(ctx: &Context) -> Result<()> {
    let (mut session, rollover) = ctx.session().await?;
    if !ctx.output.quiet {
        println!(
            "daybook shell: {} ({}). {HELP}",
            format_date(session.date()),
            session.profile()
        );
        if let Some(report) = rollover.filter(|report| report.moved > 0) {
            println!("rolled over {} task(s)", report.moved);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("error: {err}");
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }

        match execute(&mut session, command).await {
            Ok(message) => println!("{message}"),
            // User mistakes keep the shell open; storage failures end it.
            Err(err) if err.exit_code() == exit_codes::USER_ERROR => eprintln!("error: {err}"),
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

async fn execute(session: &mut Session, command: ShellCommand) -> Result<String> {
    match command {
        ShellCommand::List => Ok(render_list(session.tasks().await?)),
        ShellCommand::Add(title) => {
            let task = session.create(Task::new(title)).await?;
            Ok(format!("added {}", task_line(&task)))
        }
        ShellCommand::Rename(input, title) => {
            let id = resolve_id(session, &input).await?;
            let edit = TaskEdit {
                title: Some(title),
                ..TaskEdit::default()
            };
            let task = session
                .edit(&id, &edit)
                .await?
                .ok_or(Error::TaskNotFound(input))?;
            Ok(task_line(&task))
        }
        ShellCommand::Status(action, input) => {
            let id = resolve_id(session, &input).await?;
            let task = session
                .apply_status(&id, action)
                .await?
                .ok_or(Error::TaskNotFound(input))?;
            Ok(task_line(&task))
        }
        ShellCommand::Remove(input) => {
            let id = resolve_id(session, &input).await?;
            let task = session
                .delete(&id)
                .await?
                .ok_or(Error::TaskNotFound(input))?;
            Ok(format!("removed {}", task.title))
        }
        ShellCommand::Undo => Ok(match session.undo().await? {
            Some(tasks) => format!("undone\n{}", render_list(tasks)),
            None => "nothing to undo".to_string(),
        }),
        ShellCommand::Redo => Ok(match session.redo().await? {
            Some(tasks) => format!("redone\n{}", render_list(tasks)),
            None => "nothing to redo".to_string(),
        }),
        ShellCommand::Help => Ok(HELP.to_string()),
        ShellCommand::Quit => Ok(String::new()),
    }
}

fn render_list(mut tasks: Vec<Task>) -> String {
    if tasks.is_empty() {
        return "(no tasks)".to_string();
    }
    sort_tasks(&mut tasks);
    tasks.iter().map(task_line).collect::<Vec<_>>().join("\n")
}
