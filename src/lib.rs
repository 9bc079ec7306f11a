//! # runtasks
//!
//! Run one or more tasks in succession. Each task's command line is derived
//! from its declared parameters: parameters without a default are
//! positional, parameters with a default become options (`--jobs 4`, `-j 4`),
//! and boolean options also get a negation (`--no-release`).
//!
//! Several tasks can be given in one invocation; a token naming a task starts
//! the next task's arguments unless it is the value of the option before it.

pub mod cli;
pub mod config;
pub mod error;
pub mod partition;
pub mod registry;
pub mod runner;
pub mod shell;
pub mod task;
pub mod taskfile;
pub mod ui;
pub mod value;

pub use config::Config;
pub use error::{Aborted, ConfigError, LoadError, RunnerError, TaskError};
pub use registry::TaskSet;
pub use runner::TaskRunner;
pub use task::{ParamSpec, Task, TaskArgs};
pub use value::{Value, ValueKind};
