//! Running a sequence of tasks from one command line.

use crate::config::{Config, DEFAULT_CONFIG_FILE, RunSettings};
use crate::error::{ConfigError, RunnerError};
use crate::partition::partition;
use crate::registry::TaskSet;
use crate::task::RunOutcome;
use crate::ui;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

/// Runs tasks in command-line order with one configuration per environment.
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    config_file: Option<PathBuf>,
    env: Option<String>,
    settings: RunSettings,
    debug: bool,
}

impl TaskRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from `path`; it must exist. Without one,
    /// `tasks.toml` is used when present.
    #[must_use]
    pub fn config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Run every task in `env`, overriding task default environments.
    #[must_use]
    pub fn env(mut self, env: Option<String>) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn config_path(&self) -> Option<&Path> {
        match &self.config_file {
            Some(path) => Some(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                default.is_file().then_some(default)
            }
        }
    }

    /// Load the configuration for `env`.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_config(&self, env: Option<&str>) -> Result<Config, ConfigError> {
        let path = self.config_path();
        tracing::debug!(?path, ?env, "loading config");
        Config::load(path, env, &self.settings, self.debug)
    }

    /// Split `args` into task runs and run them one after another.
    ///
    /// Nothing runs if any group fails to name a task. A failing task stops
    /// the run; tasks before it are not undone.
    ///
    /// # Errors
    ///
    /// Returns the first partitioning, configuration or task error.
    pub fn run(&self, tasks: &TaskSet, args: &[String]) -> Result<(), RunnerError> {
        let runs = partition(tasks, args)?;
        for run in &runs {
            tracing::debug!(task = run.task.name(), args = ?run.args, "planned");
        }

        let mut configs: HashMap<Option<String>, Config> = HashMap::new();

        for run in runs {
            let env = self
                .env
                .clone()
                .or_else(|| run.task.default_env().map(str::to_string));

            let config = match configs.entry(env) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let config = self.load_config(entry.key().as_deref())?;
                    entry.insert(config)
                }
            };

            if run.task.run(config, &run.args)? == RunOutcome::HelpShown {
                break;
            }
        }

        Ok(())
    }

    /// Print the available tasks: just their names when `short`, otherwise
    /// each task's help under a separator rule.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the configuration can't be loaded.
    pub fn print_usage(&self, tasks: &TaskSet, short: bool) -> Result<(), RunnerError> {
        if tasks.is_empty() {
            ui::print_warning("No tasks available");
            return Ok(());
        }

        if short {
            println!("Available tasks: {}", tasks.names().join(", "));
            return Ok(());
        }

        let config = self.load_config(self.env.as_deref())?;
        let hr = ui::hr();
        ui::print_header("Available tasks:\n");
        for task in tasks.sorted() {
            let rule = hr.get(task.name().len() + 1..).unwrap_or_default();
            ui::print_info(&format!("{} {rule}", task.name()));
            println!("{}\n", task.help(Some(&config)));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::task::{ParamSpec, Task, TaskArgs};
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(String, Option<String>, TaskArgs)>>>;

    fn logging_task(name: &str, params: Vec<ParamSpec>, default_env: Option<&str>, log: &Log) -> Task {
        let sink = Rc::clone(log);
        let task_name = name.to_string();
        let mut builder = Task::builder(name).params(params);
        if let Some(env) = default_env {
            builder = builder.default_env(env);
        }
        builder
            .action(move |config, args| {
                sink.borrow_mut()
                    .push((task_name.clone(), config.env().map(str::to_string), args.clone()));
                Ok(())
            })
            .build()
            .unwrap()
    }

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn config_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("tasks.toml");
        fs::write(
            &path,
            r#"
[defaults.tasks.deploy]
host = "staging"

[env.prod.defaults.tasks.deploy]
host = "prod"

[env.qa]
"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_runs_tasks_in_order_with_per_env_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let log: Log = Rc::default();
        let mut tasks = TaskSet::new();
        tasks
            .register(logging_task("build", vec![ParamSpec::optional("verbose", false)], None, &log))
            .unwrap();
        tasks
            .register(logging_task(
                "deploy",
                vec![ParamSpec::optional("host", "localhost")],
                Some("prod"),
                &log,
            ))
            .unwrap();

        let runner = TaskRunner::new().config_file(Some(config_file(&dir)));
        runner
            .run(&tasks, &tokens(&["build", "--verbose", "deploy", "build"]))
            .unwrap();

        let log = log.borrow();
        let summary: Vec<_> = log.iter().map(|(name, env, _)| (name.as_str(), env.as_deref())).collect();
        assert_eq!(
            summary,
            vec![("build", None), ("deploy", Some("prod")), ("build", None)]
        );
        assert_eq!(log[0].2.bool("verbose"), Some(true));
        assert_eq!(log[1].2.str("host"), Some("prod"));
    }

    #[test]
    fn test_env_flag_overrides_default_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let log: Log = Rc::default();
        let mut tasks = TaskSet::new();
        tasks
            .register(logging_task(
                "deploy",
                vec![ParamSpec::optional("host", "localhost")],
                Some("prod"),
                &log,
            ))
            .unwrap();

        let runner = TaskRunner::new()
            .config_file(Some(config_file(&dir)))
            .env(Some("qa".to_string()));
        runner.run(&tasks, &tokens(&["deploy"])).unwrap();

        let log = log.borrow();
        assert_eq!(log[0].1.as_deref(), Some("qa"));
        assert_eq!(log[0].2.str("host"), Some("staging"));
    }

    #[test]
    fn test_unknown_task_runs_nothing() {
        let log: Log = Rc::default();
        let mut tasks = TaskSet::new();
        tasks.register(logging_task("build", vec![], None, &log)).unwrap();

        let err = TaskRunner::new()
            .run(&tasks, &tokens(&["bogus", "build"]))
            .unwrap_err();
        assert!(matches!(err, RunnerError::UnknownTask(_)));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_failure_stops_later_tasks() {
        let log: Log = Rc::default();
        let mut tasks = TaskSet::new();
        tasks.register(logging_task("first", vec![], None, &log)).unwrap();
        tasks
            .register(logging_task("second", vec![ParamSpec::optional("count", 1)], None, &log))
            .unwrap();
        tasks.register(logging_task("third", vec![], None, &log)).unwrap();

        let err = TaskRunner::new()
            .run(&tasks, &tokens(&["first", "second", "--count", "x", "third"]))
            .unwrap_err();
        assert!(matches!(err, RunnerError::Task(_)));
        let names: Vec<_> = log.borrow().iter().map(|(n, _, _)| n.clone()).collect();
        assert_eq!(names, vec!["first"]);
    }

    #[test]
    fn test_missing_explicit_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let log: Log = Rc::default();
        let mut tasks = TaskSet::new();
        tasks.register(logging_task("build", vec![], None, &log)).unwrap();

        let err = TaskRunner::new()
            .config_file(Some(dir.path().join("nope.toml")))
            .run(&tasks, &tokens(&["build"]))
            .unwrap_err();
        assert!(matches!(err, RunnerError::Config(ConfigError::Read { .. })));
    }
}
