//! Splitting one token stream into per-task argument lists.
//!
//! There is no separator between tasks: a token that names a task starts a
//! new group unless the token before it is an option expecting a value. A
//! leading `:` marks a token as data (`:deploy` is passed on as `deploy`).

use crate::error::RunnerError;
use crate::registry::TaskSet;
use crate::task::Task;

/// Prefix marking a token as literal data.
pub const ESCAPE: char = ':';

/// One task and the raw tokens it should parse.
#[derive(Debug, Clone)]
pub struct TaskRun<'a> {
    pub task: &'a Task,
    pub args: Vec<String>,
}

/// Whether `previous` is an option of `task` that takes a value.
fn expects_value(task: &Task, previous: Option<&str>) -> bool {
    previous
        .and_then(|token| task.signature().arg(token))
        .is_some_and(|param| param.is_optional() && !param.is_bool())
}

fn unescape(token: &str) -> String {
    match token.strip_prefix(ESCAPE) {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => token.to_string(),
    }
}

/// Split `args` into consecutive task runs.
///
/// # Errors
///
/// Returns [`RunnerError::UnknownTask`] if a group doesn't start with a
/// known task name. Nothing is returned for earlier groups in that case.
pub fn partition<'a>(tasks: &'a TaskSet, args: &[String]) -> Result<Vec<TaskRun<'a>>, RunnerError> {
    let mut runs = Vec::new();
    let mut rest = args;

    while let Some((name, remaining)) = rest.split_first() {
        let task = tasks
            .get(name)
            .ok_or_else(|| RunnerError::UnknownTask(name.clone()))?;

        let mut task_args = Vec::new();
        let mut previous: Option<&str> = None;
        for token in remaining {
            if tasks.contains(token) && !expects_value(task, previous) {
                break;
            }
            previous = Some(token.as_str());
            task_args.push(token.as_str());
        }

        rest = &remaining[task_args.len()..];
        runs.push(TaskRun {
            task,
            args: task_args.into_iter().map(unescape).collect(),
        });
    }

    Ok(runs)
}
