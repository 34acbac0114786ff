use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use tracing::{debug, info, instrument, warn};

use crate::cli::{AddArgs, Command, EditArgs, ListArgs, ShellCommand, ShellLine, ThemeMode};
use crate::config::Config;
use crate::datetime::parse_due_expr;
use crate::render::Renderer;
use crate::storage::Storage;
use crate::store::TaskStore;
use crate::task::{NewTask, TaskEdit};
use crate::view::{compute_stats, compute_view};

/// Whether an interactive session should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[instrument(skip(store, cfg, renderer, command, now, out))]
pub fn dispatch<S: Storage, W: Write>(
    store: &mut TaskStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        | Command::Add(args) => cmd_add(store, args, now, out),
        | Command::List(args) => cmd_list(store, cfg, renderer, args, now, out),
        | Command::Info { id } => cmd_info(store, renderer, id, out),
        | Command::Toggle { id } => cmd_toggle(store, id, now, out),
        | Command::Delete { id } => cmd_delete(store, id, out),
        | Command::Edit(args) => cmd_edit(store, args, now, out),
        | Command::Complete { ids } => {
            store.select_all(ids);
            let changed = store.complete_selected(now);
            writeln!(out, "Completed {changed} task(s).")?;
            Ok(())
        }
        | Command::Remove { ids } => {
            store.select_all(ids);
            let removed = store.delete_selected();
            writeln!(out, "Deleted {removed} task(s).")?;
            Ok(())
        }
        | Command::Stats => {
            let stats = compute_stats(store.tasks(), now);
            renderer.print_stats(out, &stats)
        }
        | Command::Export { out: dir } => cmd_export(store, dir.as_deref(), now, out),
        | Command::Import { file } => cmd_import(store, &file, out),
        | Command::Theme { mode } => cmd_theme(store, mode, out),
        | Command::Shell => {
            writeln!(out, "Already in a shell.")?;
            Ok(())
        }
    }
}

/// Reads one command per line until end of input or `quit`. Undo history
/// and selection live as long as this loop.
#[instrument(skip_all)]
pub fn run_shell<S: Storage, R: BufRead, W: Write>(
    store: &mut TaskStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    input: R,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("shell started");
    writeln!(out, "taskboard shell; type `help` for commands, `quit` to leave.")?;

    for line in input.lines() {
        let line = line.context("failed reading shell input")?;
        let words = match shell_words::split(&line) {
            | Ok(words) => words,
            | Err(err) => {
                writeln!(out, "error: {err}")?;
                continue;
            }
        };
        if words.is_empty() {
            continue;
        }

        let parsed = match ShellLine::try_parse_from(words) {
            | Ok(parsed) => parsed,
            | Err(err) => {
                writeln!(out, "{}", err.render())?;
                continue;
            }
        };

        let now = Utc::now();
        match shell_step(store, cfg, renderer, parsed.command, now, out) {
            | Ok(Flow::Quit) => break,
            | Ok(Flow::Continue) => {}
            | Err(err) => {
                warn!(error = %format!("{err:#}"), "shell command failed");
                writeln!(out, "error: {err:#}")?;
            }
        }
    }

    info!("shell finished");
    Ok(())
}

pub fn shell_step<S: Storage, W: Write>(
    store: &mut TaskStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    command: ShellCommand,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<Flow> {
    match command {
        | ShellCommand::Task(command) => {
            dispatch(store, cfg, renderer, command, now, out)?;
        }
        | ShellCommand::Undo => {
            if store.undo() {
                writeln!(out, "Undo completed ({} left).", store.undo_depth())?;
            } else {
                writeln!(out, "Nothing to undo.")?;
            }
        }
        | ShellCommand::Select { ids } => {
            for id in ids {
                if store.get(id).is_none() {
                    writeln!(out, "No task with id {id}.")?;
                    continue;
                }
                store.toggle_selection(id);
            }
            writeln!(out, "{} task(s) selected.", store.selection().len())?;
        }
        | ShellCommand::SelectAll => {
            let filter = cfg.view.filter();
            let ids: Vec<u64> = compute_view(store.tasks(), &filter, cfg.view.sort, now)
                .into_iter()
                .map(|t| t.id)
                .collect();
            store.select_all(ids);
            writeln!(out, "{} task(s) selected.", store.selection().len())?;
        }
        | ShellCommand::Deselect => {
            store.deselect_all();
            writeln!(out, "Selection cleared.")?;
        }
        | ShellCommand::CompleteSelected => {
            if store.selection().is_empty() {
                writeln!(out, "Nothing selected.")?;
            } else {
                let changed = store.complete_selected(now);
                writeln!(out, "Completed {changed} task(s).")?;
            }
        }
        | ShellCommand::RemoveSelected => {
            if store.selection().is_empty() {
                writeln!(out, "Nothing selected.")?;
            } else {
                let removed = store.delete_selected();
                writeln!(out, "Deleted {removed} task(s).")?;
            }
        }
        | ShellCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

#[instrument(skip(store, args, now, out))]
fn cmd_add<S: Storage, W: Write>(
    store: &mut TaskStore<S>,
    args: AddArgs,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command add");

    let due_date = args
        .due
        .as_deref()
        .map(|expr| parse_due_expr(expr, now))
        .transpose()?;

    let id = store.add(
        NewTask {
            title: args.title.join(" "),
            description: args.description,
            priority: args.priority,
            category: args.category,
            due_date,
        },
        now,
    )?;

    writeln!(out, "Created task {id}.")?;
    Ok(())
}

#[instrument(skip(store, cfg, renderer, args, now, out))]
fn cmd_list<S: Storage, W: Write>(
    store: &TaskStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    args: ListArgs,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut filter = cfg.view.filter();
    if let Some(search) = args.search {
        filter.search = search;
    }
    if let Some(status) = args.filter {
        filter.status = status;
    }
    if args.hide_completed {
        filter.show_completed = false;
    }
    let sort = args.sort.unwrap_or(cfg.view.sort);

    let view = compute_view(store.tasks(), &filter, sort, now);
    debug!(shown = view.len(), ?sort, "rendering list");

    renderer.print_task_table(out, &view, store.selection(), now)?;
    writeln!(out)?;
    renderer.print_stats(out, &compute_stats(store.tasks(), now))
}

fn cmd_info<S: Storage, W: Write>(
    store: &TaskStore<S>,
    renderer: &Renderer,
    id: u64,
    out: &mut W,
) -> anyhow::Result<()> {
    let task = store
        .get(id)
        .ok_or_else(|| anyhow!("no task with id {id}"))?;
    renderer.print_task(out, task)
}

fn cmd_toggle<S: Storage, W: Write>(
    store: &mut TaskStore<S>,
    id: u64,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    if !store.toggle_completion(id, now) {
        writeln!(out, "No task with id {id}.")?;
        return Ok(());
    }

    let state = match store.get(id) {
        | Some(task) if task.completed => "completed",
        | _ => "pending",
    };
    writeln!(out, "Task {id} is now {state}.")?;
    Ok(())
}

fn cmd_delete<S: Storage, W: Write>(
    store: &mut TaskStore<S>,
    id: u64,
    out: &mut W,
) -> anyhow::Result<()> {
    if store.delete(id) {
        writeln!(out, "Deleted task {id}.")?;
    } else {
        writeln!(out, "No task with id {id}.")?;
    }
    Ok(())
}

#[instrument(skip(store, args, now, out), fields(id = args.id))]
fn cmd_edit<S: Storage, W: Write>(
    store: &mut TaskStore<S>,
    args: EditArgs,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    let Some(current) = store.get(args.id) else {
        writeln!(out, "No task with id {}.", args.id)?;
        return Ok(());
    };

    let mut edit = TaskEdit::from_task(current);
    if let Some(title) = args.title {
        edit.title = title;
    }
    if args.clear_description {
        edit.description = None;
    } else if let Some(description) = args.description {
        edit.description = Some(description);
    }
    if let Some(priority) = args.priority {
        edit.priority = priority;
    }
    if let Some(category) = args.category {
        edit.category = category;
    }
    if args.clear_due {
        edit.due_date = None;
    } else if let Some(expr) = args.due.as_deref() {
        edit.due_date = Some(parse_due_expr(expr, now)?);
    }

    store.edit(args.id, edit)?;
    writeln!(out, "Updated task {}.", args.id)?;
    Ok(())
}

#[instrument(skip(store, now, out))]
fn cmd_export<S: Storage, W: Write>(
    store: &TaskStore<S>,
    dir: Option<&Path>,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    let dir = dir.unwrap_or_else(|| Path::new("."));
    let date = now.with_timezone(&Local).date_naive();
    let path = store.export_to_dir(dir, date)?;
    writeln!(out, "Exported {} task(s) to {}.", store.len(), path.display())?;
    Ok(())
}

#[instrument(skip(store, out))]
fn cmd_import<S: Storage, W: Write>(
    store: &mut TaskStore<S>,
    file: &Path,
    out: &mut W,
) -> anyhow::Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("failed reading {}", file.display()))?;
    let count = store.import_replace(&raw)?;
    writeln!(out, "Imported {count} task(s); previous tasks were replaced.")?;
    Ok(())
}

fn cmd_theme<S: Storage, W: Write>(
    store: &mut TaskStore<S>,
    mode: Option<ThemeMode>,
    out: &mut W,
) -> anyhow::Result<()> {
    let dark = match mode {
        | None => store.dark_mode(),
        | Some(ThemeMode::Dark) => {
            store.set_dark_mode(true)?;
            true
        }
        | Some(ThemeMode::Light) => {
            store.set_dark_mode(false)?;
            false
        }
        | Some(ThemeMode::Toggle) => store.toggle_dark_mode()?,
    };
    writeln!(out, "Theme: {}.", if dark { "dark" } else { "light" })?;
    Ok(())
}
