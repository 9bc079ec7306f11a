//! Tasks: an action plus the metadata that shapes its command line.
//!
//! A task is declared once through [`Task::builder`] and is immutable
//! afterwards. Its [`Signature`] is analyzed at build time, so a bad
//! declaration fails before anything runs.

pub mod args;
pub mod command;
pub mod param;
pub mod signature;

pub use args::TaskArgs;
pub use command::{Coercion, Parsed};
pub use param::{ParamKind, ParamSpec, Parameter};
pub use signature::{Signature, SignatureError};

use crate::config::{Config, Hide};
use crate::error::{Aborted, ConfigError, TaskError};
use crate::ui;
use crate::value::{Value, ValueKind};
use command::CommandLine;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Environment variable consulted when a task declares no default environment.
pub const DEFAULT_ENV_VAR: &str = "RUNTASKS_DEFAULT_ENV";

/// Module name used when a task isn't loaded from a file.
pub const DEFAULT_MODULE: &str = "tasks";

/// The callable a task wraps. The configuration is always the first argument.
pub type Action = Box<dyn Fn(&Config, &TaskArgs) -> anyhow::Result<()>>;

/// What [`Task::run`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// `--help` was given; the task's help was printed instead of running it.
    HelpShown,
}

pub struct Task {
    name: String,
    implementation_name: String,
    module: String,
    qualified_name: String,
    defaults_path: String,
    description: Option<String>,
    doc: Option<String>,
    help: HashMap<String, String>,
    types: HashMap<String, Coercion>,
    default_env: Option<String>,
    timed: bool,
    signature: Signature,
    action: Action,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("qualified_name", &self.qualified_name)
            .field("description", &self.description)
            .field("default_env", &self.default_env)
            .field("timed", &self.timed)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl Task {
    /// Start declaring a task whose implementation is called `implementation_name`.
    ///
    /// The command-line name defaults to the implementation name.
    pub fn builder(implementation_name: impl Into<String>) -> TaskBuilder {
        TaskBuilder::new(implementation_name)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn implementation_name(&self) -> &str {
        &self.implementation_name
    }

    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// `<module>.<implementation-name>`
    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Dotted configuration path holding this task's defaults.
    #[must_use]
    pub fn defaults_path(&self) -> &str {
        &self.defaults_path
    }

    /// The declared description, or the first paragraph of the doc comment.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    #[must_use]
    pub fn help_text(&self, param: &str) -> Option<&str> {
        self.help.get(param).map(String::as_str)
    }

    #[must_use]
    pub fn coercion(&self, param: &str) -> Option<&Coercion> {
        self.types.get(param)
    }

    #[must_use]
    pub fn default_env(&self) -> Option<&str> {
        self.default_env.as_deref()
    }

    #[must_use]
    pub fn timed(&self) -> bool {
        self.timed
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The configuration table of per-task defaults, if there is one.
    fn defaults<'c>(&self, config: Option<&'c Config>) -> Option<&'c toml::Table> {
        config.and_then(|config| config.table(&self.defaults_path))
    }

    #[must_use]
    pub fn usage(&self, config: Option<&Config>) -> String {
        CommandLine::new(self, self.defaults(config)).usage()
    }

    #[must_use]
    pub fn help(&self, config: Option<&Config>) -> String {
        CommandLine::new(self, self.defaults(config)).help()
    }

    /// Parse this task's tokens. Positionals with a configuration default
    /// are optional on the command line.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::ArgumentSyntax`] when the tokens don't fit the
    /// task's command line.
    pub fn parse_args(&self, config: Option<&Config>, tokens: &[String]) -> Result<Parsed, TaskError> {
        CommandLine::new(self, self.defaults(config)).parse(tokens)
    }

    /// Parse `tokens`, call the task, and report elapsed time for timed tasks.
    ///
    /// # Errors
    ///
    /// Returns `Err` if parsing fails or the call fails.
    pub fn run(&self, config: &Config, tokens: &[String]) -> Result<RunOutcome, TaskError> {
        let start = self.timed.then(Instant::now);

        let args = match self.parse_args(Some(config), tokens)? {
            Parsed::Help(help) => {
                println!("{help}");
                return Ok(RunOutcome::HelpShown);
            }
            Parsed::Args(args) => args,
        };

        let hide = match args.str("hide") {
            Some(raw) => raw.parse::<Hide>().map_err(|message| TaskError::ArgumentSyntax {
                task: self.name.clone(),
                message,
            })?,
            None => config.hide(),
        };

        self.call(config, args)?;

        if let Some(start) = start
            && !hide.hides_stdout()
        {
            self.print_elapsed_time(start.elapsed());
        }

        Ok(RunOutcome::Completed)
    }

    fn print_elapsed_time(&self, elapsed: Duration) {
        let minutes = elapsed.as_secs() / 60;
        let seconds = elapsed.as_secs_f64() % 60.0;
        let hr = ui::hr();
        ui::print_info(&format!(
            "{hr}\nElapsed time for {} task: {minutes}m {seconds:.3}s\n{hr}",
            self.name
        ));
    }

    /// Resolve every parameter and invoke the action.
    ///
    /// Values in `args` win; unsupplied parameters come from the
    /// configuration defaults table, then `echo`/`hide` from `run.*`, then
    /// declared defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::MissingArgument`] if a positional is still
    /// unresolved, and [`TaskError::Failed`] / [`TaskError::Aborted`] /
    /// [`TaskError::Config`] for action errors.
    pub fn call(&self, config: &Config, mut args: TaskArgs) -> Result<(), TaskError> {
        if let Some(defaults) = self.defaults(Some(config)) {
            for param in self.signature.parameters() {
                if !args.contains(param.name())
                    && let Some(value) = defaults.get(param.name())
                {
                    tracing::debug!(
                        task = %self.name,
                        param = param.name(),
                        "using default from {}",
                        self.defaults_path
                    );
                    args.insert(param.name(), Value::from_toml(value));
                }
            }
        }

        if self.signature.contains("echo") && !args.contains("echo") {
            args.insert("echo", config.echo());
        }
        if self.signature.contains("hide") && !args.contains("hide") {
            args.insert("hide", config.hide().name());
        }

        let mut resolved = TaskArgs::new();
        for param in self.signature.parameters() {
            match args.remove(param.name()).or_else(|| param.default().cloned()) {
                Some(value) => resolved.insert(param.name(), value),
                None => {
                    return Err(TaskError::MissingArgument {
                        task: self.name.clone(),
                        name: param.name().to_string(),
                    });
                }
            }
        }

        if config.debug() {
            for (name, value) in resolved.iter() {
                tracing::debug!(task = %self.name, "{name} = {value}");
            }
        }

        (self.action)(config, &resolved).map_err(|err| {
            if err.is::<Aborted>() {
                return TaskError::Aborted;
            }
            match err.downcast::<ConfigError>() {
                Ok(config_err) => TaskError::Config(config_err),
                Err(source) => TaskError::Failed {
                    task: self.name.clone(),
                    source,
                },
            }
        })
    }

    /// Machine-readable description of this task.
    #[must_use]
    pub fn schema(&self) -> TaskSchema<'_> {
        TaskSchema {
            name: &self.name,
            qualified_name: &self.qualified_name,
            description: self.description(),
            default_env: self.default_env(),
            timed: self.timed,
            usage: self.usage(None),
            parameters: self
                .signature
                .parameters()
                .iter()
                .map(|param| ParamSchema {
                    name: param.name(),
                    kind: param.kind(),
                    default: param.default(),
                    r#type: self
                        .coercion(param.name())
                        .map(Coercion::name)
                        .or_else(|| param.annotation().map(ValueKind::name)),
                    options: self.signature.arg_names(param.name()).unwrap_or_default(),
                    help: self.help_text(param.name()),
                })
                .collect(),
        }
    }
}

/// The first paragraph of `doc` on one line.
fn summary(doc: &str) -> Option<String> {
    let paragraph = doc.split("\n\n").next()?;
    let line = paragraph
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!line.is_empty()).then_some(line)
}

#[derive(Debug, Serialize)]
pub struct TaskSchema<'a> {
    pub name: &'a str,
    pub qualified_name: &'a str,
    pub description: Option<&'a str>,
    pub default_env: Option<&'a str>,
    pub timed: bool,
    pub usage: String,
    pub parameters: Vec<ParamSchema<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ParamSchema<'a> {
    pub name: &'a str,
    pub kind: ParamKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'a Value>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<&'static str>,
    pub options: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<&'a str>,
}

/// Declares a [`Task`].
pub struct TaskBuilder {
    implementation_name: String,
    name: Option<String>,
    module: String,
    description: Option<String>,
    doc: Option<String>,
    help: HashMap<String, String>,
    types: HashMap<String, Coercion>,
    default_env: Option<String>,
    timed: bool,
    params: Vec<ParamSpec>,
    action: Option<Action>,
}

impl TaskBuilder {
    fn new(implementation_name: impl Into<String>) -> Self {
        Self {
            implementation_name: implementation_name.into(),
            name: None,
            module: DEFAULT_MODULE.to_string(),
            description: None,
            doc: None,
            help: HashMap::new(),
            types: HashMap::new(),
            default_env: None,
            timed: false,
            params: Vec::new(),
            action: None,
        }
    }

    /// Override the command-line name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    #[must_use]
    pub fn help(mut self, param: impl Into<String>, text: impl Into<String>) -> Self {
        self.help.insert(param.into(), text.into());
        self
    }

    #[must_use]
    pub fn coerce(mut self, param: impl Into<String>, coercion: impl Into<Coercion>) -> Self {
        self.types.insert(param.into(), coercion.into());
        self
    }

    #[must_use]
    pub fn coerce_with<F>(self, param: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + 'static,
    {
        self.coerce(param, Coercion::custom(f))
    }

    #[must_use]
    pub fn default_env(mut self, env: impl Into<String>) -> Self {
        self.default_env = Some(env.into());
        self
    }

    #[must_use]
    pub fn timed(mut self, timed: bool) -> Self {
        self.timed = timed;
        self
    }

    #[must_use]
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    #[must_use]
    pub fn params(mut self, specs: impl IntoIterator<Item = ParamSpec>) -> Self {
        self.params.extend(specs);
        self
    }

    #[must_use]
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&Config, &TaskArgs) -> anyhow::Result<()> + 'static,
    {
        self.action = Some(Box::new(action));
        self
    }

    /// # Errors
    ///
    /// Returns [`TaskError::Definition`] if the signature is invalid, help or
    /// types name an undeclared parameter, or no action was given.
    pub fn build(self) -> Result<Task, TaskError> {
        let name = self
            .name
            .unwrap_or_else(|| self.implementation_name.clone());
        let definition_error = |message: String| TaskError::Definition {
            task: name.clone(),
            message,
        };

        let signature = Signature::new(self.params).map_err(|err| definition_error(err.to_string()))?;

        for param in self.help.keys().chain(self.types.keys()) {
            if !signature.contains(param) {
                return Err(definition_error(format!("unknown parameter `{param}`")));
            }
        }

        let action = self
            .action
            .ok_or_else(|| definition_error("no action".to_string()))?;

        let default_env = self.default_env.or_else(|| {
            std::env::var(DEFAULT_ENV_VAR)
                .ok()
                .filter(|env| !env.is_empty())
        });

        let qualified_name = format!("{}.{}", self.module, self.implementation_name);
        let defaults_path = format!("defaults.{qualified_name}");

        Ok(Task {
            name,
            implementation_name: self.implementation_name,
            module: self.module,
            qualified_name,
            defaults_path,
            description: self.description.or_else(|| self.doc.as_deref().and_then(summary)),
            doc: self.doc,
            help: self.help,
            types: self.types,
            default_env,
            timed: self.timed,
            signature,
            action,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Calls = Rc<RefCell<Vec<TaskArgs>>>;

    fn recording(builder: TaskBuilder) -> (Task, Calls) {
        let calls: Calls = Rc::default();
        let sink = Rc::clone(&calls);
        let task = builder
            .action(move |_, args| {
                sink.borrow_mut().push(args.clone());
                Ok(())
            })
            .build()
            .unwrap();
        (task, calls)
    }

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn config(source: &str) -> Config {
        Config::from_table(toml::from_str(source).unwrap(), None)
    }

    #[test]
    fn test_qualified_name_and_defaults_path() {
        let (task, _) = recording(Task::builder("deploy_app").name("deploy").module("ops"));
        assert_eq!(task.name(), "deploy");
        assert_eq!(task.implementation_name(), "deploy_app");
        assert_eq!(task.qualified_name(), "ops.deploy_app");
        assert_eq!(task.defaults_path(), "defaults.ops.deploy_app");
    }

    #[test]
    fn test_run_passes_args_in_declaration_order() {
        let (task, calls) = recording(Task::builder("copy").params([
            ParamSpec::positional("src"),
            ParamSpec::optional("force", false),
            ParamSpec::positional("dest"),
        ]));

        let outcome = task
            .run(&Config::empty(), &tokens(&["--force", "a", "b"]))
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let calls = calls.borrow();
        let names: Vec<_> = calls[0].iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["src", "force", "dest"]);
        assert_eq!(calls[0].bool("force"), Some(true));
    }

    #[test]
    fn test_config_defaults_fill_unsupplied_params() {
        let (task, calls) = recording(Task::builder("count").params([
            ParamSpec::positional("count"),
            ParamSpec::optional("label", "items"),
        ]));
        let config = config(
            r#"
[defaults.tasks.count]
count = 5
label = "widgets"
"#,
        );

        task.run(&config, &[]).unwrap();
        task.run(&config, &tokens(&["7", "--label", "bolts"])).unwrap();

        let calls = calls.borrow();
        assert_eq!(calls[0].int("count"), Some(5));
        assert_eq!(calls[0].str("label"), Some("widgets"));
        assert_eq!(calls[1].int("count"), Some(7));
        assert_eq!(calls[1].str("label"), Some("bolts"));
    }

    #[test]
    fn test_echo_and_hide_injected_from_run_settings() {
        let (task, calls) = recording(Task::builder("build").params([
            ParamSpec::optional("echo", false),
            ParamSpec::optional("hide", "none"),
        ]));
        let config = config(
            r#"
[run]
echo = true
hide = "stderr"
"#,
        );

        task.run(&config, &[]).unwrap();
        task.run(&config, &tokens(&["--no-echo"])).unwrap();

        let calls = calls.borrow();
        assert_eq!(calls[0].bool("echo"), Some(true));
        assert_eq!(calls[0].str("hide"), Some("stderr"));
        assert_eq!(calls[1].bool("echo"), Some(false));
    }

    #[test]
    fn test_missing_positional_in_direct_call() {
        let (task, calls) = recording(Task::builder("greet").param(ParamSpec::positional("name")));
        let err = task.call(&Config::empty(), TaskArgs::new()).unwrap_err();
        assert!(matches!(err, TaskError::MissingArgument { ref name, .. } if name == "name"));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_help_outcome_skips_action() {
        let (task, calls) = recording(Task::builder("greet").param(ParamSpec::positional("name")));
        let outcome = task.run(&Config::empty(), &tokens(&["--help"])).unwrap();
        assert_eq!(outcome, RunOutcome::HelpShown);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_argument_syntax_error_skips_action() {
        let (task, calls) = recording(Task::builder("build").param(ParamSpec::optional("jobs", 1)));
        let err = task
            .run(&Config::empty(), &tokens(&["--jobs", "lots"]))
            .unwrap_err();
        assert!(matches!(err, TaskError::ArgumentSyntax { .. }));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_action_errors_are_classified() {
        let failing = Task::builder("fail")
            .action(|_, _| anyhow::bail!("boom"))
            .build()
            .unwrap();
        let err = failing.call(&Config::empty(), TaskArgs::new()).unwrap_err();
        assert!(matches!(err, TaskError::Failed { ref task, .. } if task == "fail"));

        let aborting = Task::builder("abort")
            .action(|_, _| Err(Aborted.into()))
            .build()
            .unwrap();
        let err = aborting.call(&Config::empty(), TaskArgs::new()).unwrap_err();
        assert!(matches!(err, TaskError::Aborted));

        let lookup = Task::builder("lookup")
            .action(|config, _| {
                config.require("deploy.host")?;
                Ok(())
            })
            .build()
            .unwrap();
        let err = lookup.call(&Config::empty(), TaskArgs::new()).unwrap_err();
        assert!(matches!(err, TaskError::Config(ConfigError::MissingKey(_))));
    }

    #[test]
    fn test_definition_errors() {
        let err = Task::builder("x")
            .param(ParamSpec::positional("a"))
            .help("b", "no such parameter")
            .action(|_, _| Ok(()))
            .build()
            .unwrap_err();
        assert!(matches!(err, TaskError::Definition { .. }));

        let err = Task::builder("x").build().unwrap_err();
        assert!(err.to_string().contains("no action"));

        let err = Task::builder("x")
            .params([ParamSpec::optional("yes", true), ParamSpec::optional("no", true)])
            .action(|_, _| Ok(()))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("--no"));
    }

    #[test]
    fn test_description_falls_back_to_doc() {
        let (task, _) = recording(Task::builder("x").doc("Build things.\n\nLonger text."));
        assert_eq!(task.description(), Some("Build things."));

        let (task, _) = recording(Task::builder("x").doc("ignored").description("Explicit"));
        assert_eq!(task.description(), Some("Explicit"));

        let (task, _) = recording(Task::builder("x").doc("Build things\n  for release.\n\nLonger text."));
        assert_eq!(task.description(), Some("Build things for release."));
    }

    #[test]
    fn test_explicit_default_env() {
        let (task, _) = recording(Task::builder("x").default_env("staging"));
        assert_eq!(task.default_env(), Some("staging"));
    }

    #[test]
    fn test_schema_serializes() {
        let (task, _) = recording(
            Task::builder("build")
                .params([ParamSpec::positional("target"), ParamSpec::optional("jobs", 4)])
                .help("jobs", "Parallel jobs"),
        );
        let json = serde_json::to_value(task.schema()).unwrap();
        assert_eq!(json["name"], "build");
        assert_eq!(json["parameters"][0]["kind"], "positional");
        assert_eq!(json["parameters"][1]["default"], 4);
        assert_eq!(json["parameters"][1]["options"][0], "-j");
        assert_eq!(json["parameters"][1]["help"], "Parallel jobs");
    }

    #[test]
    fn test_invalid_hide_is_an_argument_error() {
        let (task, calls) = recording(
            Task::builder("quiet").params([ParamSpec::optional("hide", "none")]),
        );
        let err = task
            .run(&Config::empty(), &tokens(&["--hide", "loud"]))
            .unwrap_err();
        assert!(matches!(err, TaskError::ArgumentSyntax { .. }));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_timed_run_completes() {
        let (task, calls) = recording(Task::builder("slow").timed(true));
        let config = config("[run]\nhide = \"stdout\"");
        assert_eq!(task.run(&config, &[]).unwrap(), RunOutcome::Completed);
        assert_eq!(calls.borrow().len(), 1);
    }
}
