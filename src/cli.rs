//! Command-line entry point.
//!
//! Runner options come first; everything from the first non-option token on
//! is tasks and their arguments:
//!
//! ```text
//! runtasks -e prod build --release deploy --host example.com
//! ```

use crate::config::{Hide, RunSettings};
use crate::error::RunnerError;
use crate::registry::TaskSet;
use crate::runner::TaskRunner;
use crate::task::TaskSchema;
use crate::taskfile::{self, DEFAULT_TASKS_FILE};
use crate::ui;
use clap::Parser as ClapParser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Overrides the log filter, e.g. `RUNTASKS_LOG=runtasks=trace`.
pub const LOG_ENV: &str = "RUNTASKS_LOG";

/// Runner options that consume the following token as their value.
const OPTIONS_WITH_VALUES: &[&str] = &[
    "-c",
    "--config-file",
    "-e",
    "--env",
    "-t",
    "--tasks-file",
    "--hide",
];

#[derive(ClapParser, Debug)]
#[command(name = "runtasks")]
#[command(version = PKG_VERSION)]
#[command(about = "Run one or more tasks in succession", long_about = None)]
#[command(after_help = "Tasks and their arguments follow the runner options: \
    runtasks [OPTIONS] <task> [ARGS]... [<task> [ARGS]...]...\n\
    Prefix an argument with `:` to keep it from being read as a task name.")]
struct Cli {
    /// Configuration file (default: tasks.toml when present)
    #[arg(short = 'c', long, value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Environment to run every task in
    #[arg(short, long)]
    env: Option<String>,

    /// Task file to load
    #[arg(short = 't', long, value_name = "FILE", default_value = DEFAULT_TASKS_FILE)]
    tasks_file: PathBuf,

    /// List task names
    #[arg(short = 'l')]
    list_names: bool,

    /// List tasks with their help
    #[arg(long)]
    list: bool,

    /// Print commands before running them
    #[arg(short = 'E', long, overrides_with = "no_echo")]
    echo: bool,

    /// Don't print commands before running them
    #[arg(long, overrides_with = "echo")]
    no_echo: bool,

    /// Suppress command output
    #[arg(long, value_enum)]
    hide: Option<Hide>,

    /// Show debug output; implies --echo
    #[arg(short, long)]
    debug: bool,

    /// Print a JSON description of all tasks
    #[arg(long)]
    inspect: bool,
}

impl Cli {
    fn settings(&self) -> RunSettings {
        let echo = if self.echo || self.debug {
            Some(true)
        } else if self.no_echo {
            Some(false)
        } else {
            None
        };
        RunSettings {
            echo,
            hide: self.hide,
        }
    }
}

/// Split `args` (without the program name) into runner options and task
/// tokens. Task tokens start at the first token that is neither a runner
/// option nor the value of one.
#[must_use]
pub fn split_args(args: &[String]) -> (Vec<String>, Vec<String>) {
    let mut index = 0;
    while let Some(arg) = args.get(index) {
        if !arg.starts_with('-') || arg == "-" {
            break;
        }
        index += 1;
        if !arg.contains('=') && OPTIONS_WITH_VALUES.contains(&arg.as_str()) {
            index += 1;
        }
    }
    let index = index.min(args.len());
    (args[..index].to_vec(), args[index..].to_vec())
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Serialize)]
struct Inspection<'a> {
    tasks: Vec<TaskSchema<'a>>,
}

fn print_inspect(tasks: &TaskSet) -> anyhow::Result<()> {
    let inspection = Inspection {
        tasks: tasks.sorted().into_iter().map(|task| task.schema()).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&inspection)?);
    Ok(())
}

fn load_tasks(path: &Path) -> Result<TaskSet, RunnerError> {
    Ok(taskfile::load(path)?)
}

fn run(cli: &Cli, task_args: &[String]) -> anyhow::Result<()> {
    let tasks = load_tasks(&cli.tasks_file)?;

    if cli.inspect {
        return print_inspect(&tasks);
    }

    let runner = TaskRunner::new()
        .config_file(cli.config_file.clone())
        .env(cli.env.clone())
        .settings(cli.settings())
        .debug(cli.debug);

    if cli.list_names || cli.list {
        runner.print_usage(&tasks, cli.list_names)?;
        return Ok(());
    }

    if task_args.is_empty() {
        ui::print_warning("No tasks specified");
        runner.print_usage(&tasks, false)?;
        return Ok(());
    }

    runner.run(&tasks, task_args)?;
    Ok(())
}

fn report(err: &anyhow::Error) -> ExitCode {
    let aborted = err
        .downcast_ref::<RunnerError>()
        .is_some_and(RunnerError::is_aborted);
    if aborted {
        ui::print_warning("Aborted");
        return ExitCode::SUCCESS;
    }

    ui::print_error(&format!("Error: {err}"));
    for cause in err.chain().skip(1) {
        ui::print_error(&format!("  caused by: {cause}"));
    }
    ExitCode::FAILURE
}

/// Main CLI logic.
#[must_use]
pub fn run_cli() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (runner_args, task_args) = split_args(&args);
    let cli = Cli::parse_from(std::iter::once("runtasks".to_string()).chain(runner_args));

    init_tracing(cli.debug);
    tracing::debug!(?cli, ?task_args, "parsed command line");

    match run(&cli, &task_args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}
