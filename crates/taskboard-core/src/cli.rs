use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::task::{Category, Priority};
use crate::view::{SortMode, StatusFilter};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskboard",
    version,
    about = "Taskboard: a personal task list with undo, filters and JSON import/export"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add a task
    Add(AddArgs),
    /// Show the filtered and sorted task list
    List(ListArgs),
    /// Show one task in full
    Info { id: u64 },
    /// Flip a task between pending and completed
    Toggle { id: u64 },
    /// Delete a task
    Delete { id: u64 },
    /// Change a task's fields
    Edit(EditArgs),
    /// Mark several tasks completed
    Complete {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Delete several tasks
    Remove {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Print task counts
    Stats,
    /// Write all tasks to tasks-YYYY-MM-DD.json
    Export {
        #[arg(long = "out")]
        out: Option<PathBuf>,
    },
    /// Replace all tasks with the contents of a JSON file
    Import { file: PathBuf },
    /// Show or change the display theme
    Theme {
        #[arg(value_enum)]
        mode: Option<ThemeMode>,
    },
    /// Interactive session with undo and selection
    Shell,
}

impl Default for Command {
    fn default() -> Self {
        Self::List(ListArgs::default())
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,

    #[arg(short = 'd', long = "description")]
    pub description: Option<String>,

    #[arg(short = 'p', long = "priority", value_enum, default_value_t = Priority::Medium)]
    pub priority: Priority,

    #[arg(short = 'c', long = "category", value_enum, ignore_case = true, default_value_t = Category::Personal)]
    pub category: Category,

    /// today, tomorrow, +Nd, YYYY-MM-DD or an RFC 3339 timestamp
    #[arg(long = "due")]
    pub due: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(short = 's', long = "search")]
    pub search: Option<String>,

    #[arg(short = 'f', long = "filter", value_enum)]
    pub filter: Option<StatusFilter>,

    #[arg(long = "sort", value_enum)]
    pub sort: Option<SortMode>,

    #[arg(long = "hide-completed")]
    pub hide_completed: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub id: u64,

    #[arg(long = "title")]
    pub title: Option<String>,

    #[arg(short = 'd', long = "description", conflicts_with = "clear_description")]
    pub description: Option<String>,

    #[arg(long = "clear-description")]
    pub clear_description: bool,

    #[arg(short = 'p', long = "priority", value_enum)]
    pub priority: Option<Priority>,

    #[arg(short = 'c', long = "category", value_enum, ignore_case = true)]
    pub category: Option<Category>,

    #[arg(long = "due", conflicts_with = "clear_due")]
    pub due: Option<String>,

    #[arg(long = "clear-due")]
    pub clear_due: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Dark,
    Light,
    Toggle,
}

/// One line typed into the interactive shell.
#[derive(Parser, Debug, Clone)]
#[command(no_binary_name = true, name = "taskboard>", disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ShellCommand {
    #[command(flatten)]
    Task(Command),
    /// Restore the list as it was before the last change
    Undo,
    /// Toggle tasks in the selection
    Select {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Select every task in the default view
    SelectAll,
    /// Clear the selection
    Deselect,
    /// Mark the selected tasks completed
    CompleteSelected,
    /// Delete the selected tasks
    RemoveSelected,
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

/// Filter used when `RUST_LOG` is unset. `-v` raises only taskboard's own
/// events; other crates stay at `warn` unless `-q` lowers everything.
pub fn default_log_directive(verbose: u8, quiet: u8) -> String {
    let level = match (quiet, verbose) {
        | (2.., _) => return "error".to_string(),
        | (1, _) => return "warn".to_string(),
        | (_, 3..) => "trace",
        | (_, 2) => "debug",
        | (_, 1) => "info",
        | _ => "warn",
    };
    format!("warn,{}={level}", env!("CARGO_CRATE_NAME"))
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let directive = default_log_directive(verbose, quiet);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli, ShellCommand, ShellLine, default_log_directive};
    use crate::task::{Category, Priority};
    use crate::view::SortMode;

    #[test]
    fn parses_add_with_options() {
        let cli = GlobalCli::try_parse_from([
            "taskboard", "-vv", "add", "Buy", "milk", "-p", "high", "-c", "Shopping", "--due",
            "tomorrow",
        ])
        .expect("parse");

        assert_eq!(cli.verbose, 2);
        let Some(Command::Add(args)) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(args.title.join(" "), "Buy milk");
        assert_eq!(args.priority, Priority::High);
        assert_eq!(args.category, Category::Shopping);
        assert_eq!(args.due.as_deref(), Some("tomorrow"));
    }

    #[test]
    fn sort_accepts_camel_case_name() {
        let cli = GlobalCli::try_parse_from(["taskboard", "list", "--sort", "dueDate"])
            .expect("parse");
        let Some(Command::List(args)) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.sort, Some(SortMode::DueDate));
    }

    #[test]
    fn edit_rejects_conflicting_flags() {
        assert!(
            GlobalCli::try_parse_from(["taskboard", "edit", "3", "--due", "today", "--clear-due"])
                .is_err()
        );
    }

    #[test]
    fn shell_lines_cover_session_commands() {
        let line = ShellLine::try_parse_from(["select", "1", "2"]).expect("parse");
        assert!(matches!(line.command, ShellCommand::Select { ref ids } if ids == &vec![1, 2]));

        let line = ShellLine::try_parse_from(["toggle", "4"]).expect("parse");
        assert!(matches!(
            line.command,
            ShellCommand::Task(Command::Toggle { id: 4 })
        ));

        let line = ShellLine::try_parse_from(["exit"]).expect("parse");
        assert!(matches!(line.command, ShellCommand::Quit));
    }

    #[test]
    fn verbosity_targets_only_this_crate() {
        assert_eq!(default_log_directive(0, 0), "warn,taskboard_core=warn");
        assert_eq!(default_log_directive(2, 0), "warn,taskboard_core=debug");
        assert_eq!(default_log_directive(5, 0), "warn,taskboard_core=trace");
        assert_eq!(default_log_directive(3, 1), "warn");
        assert_eq!(default_log_directive(0, 2), "error");
    }
}
