//! # runtasks
//!
//! Run tasks declared in a `tasks.run` file, several per invocation:
//!
//! - List tasks: `runtasks -l`, or `runtasks --list` for full help
//! - Run a task: `runtasks build --release`
//! - Chain tasks: `runtasks build deploy --host example.com`
//! - Pick an environment: `runtasks -e prod deploy`
//!
//! Configuration defaults come from `tasks.toml`.

use std::process::ExitCode;

/// Entry point for the CLI tool.
fn main() -> ExitCode {
    runtasks::cli::run_cli()
}
