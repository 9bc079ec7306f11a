//! Loading tasks from a task file.
//!
//! A task file declares shell-backed tasks:
//!
//! ```text
//! # Build the project.
//! # @help jobs Parallel jobs
//! build(target, jobs = 4, release = false) make -j "$jobs" "$target"
//!
//! # @timed
//! deploy(host: str = "localhost") {
//!     rsync -a dist/ "$host:/srv/app"
//! }
//! ```
//!
//! The module name of every task is the file stem, so the tasks above read
//! their configuration defaults from `defaults.tasks.build` and
//! `defaults.tasks.deploy` when loaded from `tasks.run`.

mod attributes;
mod error;

pub use error::ParseError;

use crate::error::{LoadError, TaskError};
use crate::registry::TaskSet;
use crate::shell::ShellAction;
use crate::task::{DEFAULT_MODULE, ParamSpec, Task};
use crate::value::{Value, ValueKind};
use attributes::{Annotations, Attribute};
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use std::fs;
use std::path::Path;

#[derive(Parser)]
#[grammar = "taskfile.pest"]
pub struct TaskFileParser;

/// Task file looked up in the working directory by default.
pub const DEFAULT_TASKS_FILE: &str = "tasks.run";

/// One parsed definition, before it becomes a [`Task`].
#[derive(Debug, Clone)]
struct Definition {
    name: String,
    params: Vec<ParamSpec>,
    body: String,
    annotations: Annotations,
}

/// Load every task declared in the file at `path`.
///
/// # Errors
///
/// Returns `Err` if the file can't be read, has a syntax error, declares an
/// invalid task, or declares the same task name twice.
pub fn load(path: &Path) -> Result<TaskSet, LoadError> {
    let source = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let module = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(DEFAULT_MODULE);
    let filename = path.display().to_string();
    parse(&source, module, Some(&filename))
}

/// Parse task file `source` into tasks belonging to `module`.
///
/// # Errors
///
/// See [`load`].
pub fn parse(source: &str, module: &str, filename: Option<&str>) -> Result<TaskSet, LoadError> {
    let pairs = TaskFileParser::parse(Rule::file, source)
        .map_err(|err| LoadError::Parse(Box::new(ParseError::from_pest(&err, source, filename))))?;

    let mut tasks = TaskSet::new();
    for pair in pairs.flatten().filter(|pair| pair.as_rule() == Rule::task_def) {
        let definition = parse_definition(pair, source)?;
        tasks.register(build_task(definition, module)?)?;
    }

    tracing::debug!(module, count = tasks.len(), "loaded tasks");
    Ok(tasks)
}

fn parse_definition(pair: Pair<'_, Rule>, source: &str) -> Result<Definition, TaskError> {
    let line_index = source[..pair.as_span().start()].lines().count();
    let annotations = attributes::parse_annotations(source, line_index);

    let mut name = String::new();
    let mut params = Vec::new();
    let mut body = String::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::task_name => name = inner.as_str().to_string(),
            Rule::param_list => {
                for param in inner.into_inner() {
                    params.push(parse_param(param, &name)?);
                }
            }
            Rule::block => {
                let content = inner.into_inner().next().map_or("", |p| p.as_str());
                body = dedent(content);
            }
            Rule::command => body = inner.as_str().trim().to_string(),
            _ => {}
        }
    }

    Ok(Definition {
        name,
        params,
        body,
        annotations,
    })
}

fn parse_param(pair: Pair<'_, Rule>, task: &str) -> Result<ParamSpec, TaskError> {
    let definition_error = |message: String| TaskError::Definition {
        task: task.to_string(),
        message,
    };

    let mut name = String::new();
    let mut annotation = None;
    let mut default = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::param_name => name = inner.as_str().to_string(),
            Rule::type_name => {
                let kind: ValueKind = inner.as_str().parse().map_err(definition_error)?;
                annotation = Some(kind);
            }
            Rule::literal => {
                let value = literal_value(inner, annotation)
                    .map_err(|message| definition_error(format!("parameter `{name}`: {message}")))?;
                default = Some(value);
            }
            _ => {}
        }
    }

    Ok(ParamSpec {
        name,
        default,
        annotation,
    })
}

/// Convert a default literal, honoring the parameter's annotation.
fn literal_value(pair: Pair<'_, Rule>, annotation: Option<ValueKind>) -> Result<Value, String> {
    let Some(literal) = pair.into_inner().next() else {
        return Err("empty default".to_string());
    };

    let (raw, natural) = match literal.as_rule() {
        Rule::string => {
            let quoted = literal.into_inner().next().map_or("", |p| p.as_str());
            (unescape(quoted), ValueKind::Str)
        }
        Rule::boolean => (literal.as_str().to_string(), ValueKind::Bool),
        Rule::integer => (literal.as_str().to_string(), ValueKind::Int),
        Rule::float => (literal.as_str().to_string(), ValueKind::Float),
        Rule::complex => (literal.as_str().to_string(), ValueKind::Complex),
        _ => (literal.as_str().to_string(), ValueKind::Str),
    };

    annotation.unwrap_or(natural).parse(&raw)
}

fn unescape(quoted: &str) -> String {
    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Strip the common indentation and surrounding blank lines from a block body.
fn dedent(content: &str) -> String {
    let all_lines: Vec<&str> = content.lines().collect();

    let start = all_lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(all_lines.len());
    let end = all_lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(start, |i| i + 1);
    let lines = &all_lines[start..end.max(start)];

    let min_indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.get(min_indent..).unwrap_or(line).trim_end()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_task(definition: Definition, module: &str) -> Result<Task, TaskError> {
    let Definition {
        name,
        params,
        body,
        annotations,
    } = definition;

    let mut builder = Task::builder(name.clone()).module(module);
    let mut cli_name = name.clone();
    let mut shell = None;
    let mut confirm = None;

    if let Some(doc) = annotations.doc {
        builder = builder.doc(doc);
    }

    for attribute in annotations.attributes {
        builder = match attribute {
            Attribute::Desc(text) => builder.description(text),
            Attribute::Help { param, text } => builder.help(param, text),
            Attribute::Env(env) => builder.default_env(env),
            Attribute::Timed => builder.timed(true),
            Attribute::Name(alias) => {
                cli_name.clone_from(&alias);
                builder.name(alias)
            }
            Attribute::Shell(kind) => {
                shell = Some(kind);
                builder
            }
            Attribute::Confirm(prompt) => {
                confirm = Some(prompt.unwrap_or_else(|| format!("Run {cli_name}?")));
                builder
            }
        };
    }

    let positionals = params
        .iter()
        .filter(|spec| spec.default.is_none())
        .map(|spec| spec.name.clone())
        .collect();

    let action = ShellAction::new(cli_name, body)
        .shell(shell)
        .confirm(confirm)
        .positionals(positionals);

    builder.params(params).action(move |config, args| action.execute(config, args)).build()
}
