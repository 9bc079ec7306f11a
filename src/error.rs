//! Error types shared by the runner, tasks, configuration and task files.

use crate::taskfile::ParseError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from resolving the configuration for a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("environment '{env}' is not defined in '{}'", path.display())]
    UnknownEnv { env: String, path: PathBuf },

    #[error("config key not found: {0}")]
    MissingKey(String),
}

/// Errors raised while defining, parsing arguments for, or calling a task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task's declared signature can't be turned into a command line.
    #[error("invalid definition for task `{task}`: {message}")]
    Definition { task: String, message: String },

    /// The task's arguments didn't match its command line.
    #[error("{task}: {message}")]
    ArgumentSyntax { task: String, message: String },

    /// A positional parameter had no value from the command line, the
    /// configuration or the caller.
    #[error("{task}: missing value for positional argument `{name}`")]
    MissingArgument { task: String, name: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("task `{task}` failed")]
    Failed {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    /// The task declined to continue, e.g. a confirmation was answered "no".
    #[error("Aborted")]
    Aborted,
}

/// Errors from loading a task file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read tasks file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Parse(Box<ParseError>),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("task `{0}` is defined more than once")]
    Duplicate(String),
}

/// Top-level errors surfaced by a run.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl RunnerError {
    /// True when the run stopped because a task was declined rather than failed.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, RunnerError::Task(TaskError::Aborted))
    }
}

/// Marker error an action returns to stop the run without failing it.
#[derive(Debug, Error)]
#[error("Aborted")]
pub struct Aborted;
