//! Per-task command lines, synthesized with clap's builder API.
//!
//! clap handles tokenizing (short/long options, `--opt=value`, `--`, unknown
//! options); positional assignment and coercion happen here so positionals
//! with configuration defaults can sit anywhere in the parameter list.

use super::args::TaskArgs;
use super::param::Parameter;
use super::signature::HELP_FLAG;
use super::Task;
use crate::config::Hide;
use crate::error::TaskError;
use crate::value::{Value, ValueKind};
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fmt;
use std::sync::Arc;

const HELP_ID: &str = "__help";

/// Parameter that takes its values from [`Hide`].
const HIDE_PARAM: &str = "hide";

/// Turns a raw command-line string into a [`Value`].
#[derive(Clone)]
pub enum Coercion {
    Kind(ValueKind),
    Custom(Arc<dyn Fn(&str) -> Result<Value, String>>),
}

impl Coercion {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + 'static,
    {
        Coercion::Custom(Arc::new(f))
    }

    /// # Errors
    ///
    /// Returns the coercion's message when `raw` isn't acceptable.
    pub fn apply(&self, raw: &str) -> Result<Value, String> {
        match self {
            Coercion::Kind(kind) => kind.parse(raw),
            Coercion::Custom(f) => f(raw),
        }
    }

    /// Name used in listings; custom coercions have none.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Coercion::Kind(kind) => kind.name(),
            Coercion::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Coercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coercion::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Coercion::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<ValueKind> for Coercion {
    fn from(kind: ValueKind) -> Self {
        Coercion::Kind(kind)
    }
}

/// Result of parsing one task's tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// Explicitly supplied values, plus positional defaults that applied.
    Args(TaskArgs),
    /// `--help` was given; holds the formatted help.
    Help(String),
}

/// The command line of one task, optionally with defaults from configuration.
pub(crate) struct CommandLine<'a> {
    task: &'a Task,
    defaults: Option<&'a toml::Table>,
}

fn negation_id(name: &str) -> String {
    format!("no:{name}")
}

impl<'a> CommandLine<'a> {
    pub(crate) fn new(task: &'a Task, defaults: Option<&'a toml::Table>) -> Self {
        Self { task, defaults }
    }

    /// The default a positional parameter takes from configuration.
    fn positional_default(&self, param: &Parameter) -> Option<Value> {
        self.defaults
            .and_then(|defaults| defaults.get(param.name()))
            .map(Value::from_toml)
    }

    fn default_for(&self, param: &Parameter) -> Option<Value> {
        if param.is_positional() {
            self.positional_default(param)
        } else {
            param.default().cloned()
        }
    }

    /// Declared coercion first, then the annotation, then whatever the
    /// default's type suggests; text otherwise.
    fn coercion(&self, param: &Parameter, default: Option<&Value>) -> Coercion {
        if let Some(coercion) = self.task.coercion(param.name()) {
            return coercion.clone();
        }
        if param.name() == HIDE_PARAM {
            return Coercion::custom(|raw| raw.parse::<Hide>().map(|hide| Value::from(hide.name())));
        }
        if let Some(kind) = param.annotation() {
            return Coercion::Kind(kind);
        }
        match default.map(Value::kind) {
            Some(kind @ (ValueKind::Int | ValueKind::Float | ValueKind::Complex)) => {
                Coercion::Kind(kind)
            }
            Some(ValueKind::Bool) if param.is_positional() => Coercion::Kind(ValueKind::Bool),
            _ => Coercion::Kind(ValueKind::Str),
        }
    }

    fn arg_names(&self, param: &Parameter) -> &[String] {
        self.task
            .signature()
            .arg_names(param.name())
            .unwrap_or_default()
    }

    /// argparse-style usage line, e.g. `build [--help] [-j JOBS] [-r | --release | --no-release] target`.
    pub(crate) fn usage(&self) -> String {
        let mut parts = vec![self.task.name().to_string(), format!("[{HELP_FLAG}]")];

        for param in self.task.signature().optionals() {
            let names = self.arg_names(param);
            if param.is_bool() {
                parts.push(format!("[{}]", names.join(" | ")));
            } else if let Some(first) = names.first() {
                parts.push(format!("[{first} {}]", param.name().to_uppercase()));
            }
        }

        for param in self.task.signature().positionals() {
            if self.positional_default(param).is_some() {
                parts.push(format!("[{}]", param.name()));
            } else {
                parts.push(param.name().to_string());
            }
        }

        parts.join(" ")
    }

    fn help_for(&self, param: &Parameter, default: Option<&Value>) -> Option<String> {
        let text = self.task.help_text(param.name());
        let default = default.filter(|_| !param.is_bool());
        match (text, default) {
            (Some(text), Some(default)) => Some(format!("{text} [default: {default}]")),
            (Some(text), None) => Some(text.to_string()),
            (None, Some(default)) => Some(format!("[default: {default}]")),
            (None, None) => None,
        }
    }

    /// Build the clap command for this task.
    pub(crate) fn command(&self) -> Command {
        let template = if self.task.description().is_some() {
            "{usage}\n\n{about-with-newline}\n{all-args}"
        } else {
            "{usage}\n\n{all-args}"
        };

        let mut command = Command::new(self.task.name().to_string())
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true)
            .disable_colored_help(true)
            .args_override_self(true)
            .override_usage(self.usage())
            .help_template(template)
            .arg(
                Arg::new(HELP_ID)
                    .long(HELP_FLAG.trim_start_matches('-'))
                    .action(ArgAction::Help)
                    .help("Show this help message and exit"),
            );

        if let Some(description) = self.task.description() {
            command = command.about(description.to_string());
        }

        for param in self.task.signature().parameters() {
            let default = self.default_for(param);
            let help = self.help_for(param, default.as_ref());
            let names = self.arg_names(param);

            if let Some(index) = param.position() {
                let mut arg = Arg::new(param.name().to_string())
                    .index(index)
                    .value_name(param.name().to_string())
                    .action(ArgAction::Set)
                    .allow_negative_numbers(true)
                    .required(false);
                if let Some(help) = help {
                    arg = arg.help(help);
                }
                command = command.arg(arg);
                continue;
            }

            if param.is_bool() {
                let Some((negation, positive)) = names.split_last() else {
                    continue;
                };
                let mut arg = with_names(Arg::new(param.name().to_string()), positive)
                    .action(ArgAction::SetTrue);
                let mut negated = with_names(Arg::new(negation_id(param.name())), std::slice::from_ref(negation))
                    .action(ArgAction::SetFalse)
                    .conflicts_with(param.name().to_string());
                if let Some(help) = help {
                    arg = arg.help(help.clone());
                    negated = negated.help(help);
                }
                command = command.arg(arg).arg(negated);
            } else {
                let mut arg = with_names(Arg::new(param.name().to_string()), names)
                    .action(ArgAction::Set)
                    .num_args(1)
                    .allow_negative_numbers(true)
                    .value_name(param.name().to_uppercase());
                if let Some(help) = help {
                    arg = arg.help(help);
                }
                command = command.arg(arg);
            }
        }

        command
    }

    /// Formatted help, starting with the usage line.
    pub(crate) fn help(&self) -> String {
        self.command().render_help().to_string().trim().to_string()
    }

    fn syntax_error(&self, message: impl Into<String>) -> TaskError {
        TaskError::ArgumentSyntax {
            task: self.task.name().to_string(),
            message: message.into(),
        }
    }

    fn coerce(&self, param: &Parameter, default: Option<&Value>, raw: &str) -> Result<Value, TaskError> {
        self.coercion(param, default).apply(raw).map_err(|message| {
            let names = self.arg_names(param).join("/");
            self.syntax_error(format!("argument {names}: {message}"))
        })
    }

    /// Parse `tokens` into explicitly supplied values.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::ArgumentSyntax`] for unknown options, missing or
    /// surplus positionals, conflicting toggles and failed coercions.
    pub(crate) fn parse(&self, tokens: &[String]) -> Result<Parsed, TaskError> {
        let matches = match self.command().try_get_matches_from(tokens) {
            Ok(matches) => matches,
            Err(err) if err.kind() == ErrorKind::DisplayHelp => {
                return Ok(Parsed::Help(err.render().to_string().trim().to_string()));
            }
            Err(err) => {
                let rendered = err.render().to_string();
                let message = rendered.trim().trim_start_matches("error: ");
                return Err(self.syntax_error(message));
            }
        };

        let mut args = TaskArgs::new();
        self.assign_positionals(&matches, &mut args)?;

        for param in self.task.signature().optionals() {
            let name = param.name();
            if param.is_bool() {
                if matches.value_source(name) == Some(ValueSource::CommandLine) {
                    args.insert(name, true);
                } else if matches.value_source(&negation_id(name)) == Some(ValueSource::CommandLine) {
                    args.insert(name, false);
                }
            } else if let Some(raw) = matches.get_one::<String>(name) {
                let value = self.coerce(param, param.default(), raw)?;
                args.insert(name, value);
            }
        }

        Ok(Parsed::Args(args))
    }

    /// Assign supplied positional values left to right; a positional with a
    /// default only takes a value when enough remain for the required ones
    /// after it.
    fn assign_positionals(&self, matches: &ArgMatches, args: &mut TaskArgs) -> Result<(), TaskError> {
        let slots: Vec<(&Parameter, Option<Value>)> = self
            .task
            .signature()
            .positionals()
            .map(|param| (param, self.positional_default(param)))
            .collect();

        let mut supplied = slots
            .iter()
            .filter_map(|(param, _)| matches.get_one::<String>(param.name()).cloned())
            .collect::<Vec<_>>()
            .into_iter();

        let mut required_left = slots.iter().filter(|(_, d)| d.is_none()).count();
        let mut missing = Vec::new();

        for (param, default) in &slots {
            match default {
                None => {
                    required_left -= 1;
                    match supplied.next() {
                        Some(raw) => {
                            let value = self.coerce(param, None, &raw)?;
                            args.insert(param.name(), value);
                        }
                        None => missing.push(param.name()),
                    }
                }
                Some(default) => {
                    let raw = if supplied.len() > required_left {
                        supplied.next()
                    } else {
                        None
                    };
                    let value = match (raw, default) {
                        (Some(raw), _) => self.coerce(param, Some(default), &raw)?,
                        // String defaults go through the coercion like typed input.
                        (None, Value::Str(text)) => self.coerce(param, Some(default), text)?,
                        (None, default) => default.clone(),
                    };
                    args.insert(param.name(), value);
                }
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(self.syntax_error(format!(
                "the following arguments are required: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Register every short (`-x`) and long (`--name`) option string on `arg`.
fn with_names(mut arg: Arg, names: &[String]) -> Arg {
    let mut has_long = false;
    for name in names {
        if let Some(long) = name.strip_prefix("--") {
            arg = if has_long {
                arg.visible_alias(long.to_string())
            } else {
                arg.long(long.to_string())
            };
            has_long = true;
        } else if let Some(short) = name.strip_prefix('-').and_then(|s| s.chars().next()) {
            arg = arg.short(short);
        }
    }
    arg
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::task::ParamSpec;

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn task(params: Vec<ParamSpec>) -> Task {
        Task::builder("demo")
            .params(params)
            .action(|_, _| Ok(()))
            .build()
            .unwrap()
    }

    fn parse(task: &Task, items: &[&str]) -> Result<TaskArgs, TaskError> {
        match CommandLine::new(task, None).parse(&tokens(items))? {
            Parsed::Args(args) => Ok(args),
            Parsed::Help(help) => panic!("unexpected help: {help}"),
        }
    }

    #[test]
    fn test_bool_toggles() {
        let task = task(vec![ParamSpec::positional("a"), ParamSpec::optional("b", false)]);

        let args = parse(&task, &["x", "--b"]).unwrap();
        assert_eq!(args.bool("b"), Some(true));
        assert_eq!(args.str("a"), Some("x"));

        let args = parse(&task, &["x", "--no-b"]).unwrap();
        assert_eq!(args.bool("b"), Some(false));

        // Not supplied: absent, so later merging can tell it apart from an explicit value
        let args = parse(&task, &["x"]).unwrap();
        assert!(!args.contains("b"));

        assert!(matches!(
            parse(&task, &["x", "--b", "--no-b"]),
            Err(TaskError::ArgumentSyntax { .. })
        ));
        assert!(matches!(
            parse(&task, &["x", "--b=yes"]),
            Err(TaskError::ArgumentSyntax { .. })
        ));
    }

    #[test]
    fn test_numeric_inference_from_defaults() {
        let task = task(vec![
            ParamSpec::optional("count", 1),
            ParamSpec::optional("ratio", 0.5),
            ParamSpec::optional("z", crate::value::Complex::new(0.0, 1.0)),
            ParamSpec::optional("label", "x"),
        ]);

        let args = parse(&task, &["--count", "12", "--ratio", "2.5", "-z", "1+2j", "-l", "7"]).unwrap();
        assert_eq!(args.get("count"), Some(&Value::Int(12)));
        assert_eq!(args.get("ratio"), Some(&Value::Float(2.5)));
        assert_eq!(
            args.get("z"),
            Some(&Value::Complex(crate::value::Complex::new(1.0, 2.0)))
        );
        assert_eq!(args.get("label"), Some(&Value::from("7")));

        let err = parse(&task, &["--count", "many"]).unwrap_err();
        match err {
            TaskError::ArgumentSyntax { message, .. } => {
                assert_eq!(message, "argument -c/--count: invalid int value: 'many'");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_negative_numbers_are_values() {
        let task = task(vec![ParamSpec::optional("offset", 0)]);
        let args = parse(&task, &["--offset", "-5"]).unwrap();
        assert_eq!(args.int("offset"), Some(-5));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let task = task(vec![ParamSpec::optional("env", "dev")]);
        let args = parse(&task, &["--env", "qa", "-e", "prod"]).unwrap();
        assert_eq!(args.str("env"), Some("prod"));
    }

    #[test]
    fn test_missing_positional_and_unknown_option() {
        let task = task(vec![ParamSpec::positional("src"), ParamSpec::positional("dest")]);

        let err = parse(&task, &["a"]).unwrap_err();
        assert!(err.to_string().contains("the following arguments are required: dest"));

        let err = parse(&task, &["a", "b", "--bogus"]).unwrap_err();
        assert!(matches!(err, TaskError::ArgumentSyntax { .. }));
        assert!(err.to_string().contains("--bogus"));

        assert!(parse(&task, &["a", "b", "c"]).is_err());
    }

    #[test]
    fn test_help_is_returned_not_printed() {
        let task = Task::builder("greet")
            .description("Say hello")
            .param(ParamSpec::positional("name"))
            .help("name", "Who to greet")
            .action(|_, _| Ok(()))
            .build()
            .unwrap();

        let parsed = CommandLine::new(&task, None).parse(&tokens(&["--help"])).unwrap();
        let Parsed::Help(help) = parsed else {
            panic!("expected help");
        };
        assert!(help.starts_with("greet [--help] name"));
        assert!(help.contains("Say hello"));
        assert!(help.contains("Who to greet"));
    }

    #[test]
    fn test_hide_values_are_checked() {
        let task = task(vec![ParamSpec::optional("hide", "none")]);

        let args = parse(&task, &["--hide", "stderr"]).unwrap();
        assert_eq!(args.str("hide"), Some("stderr"));

        let err = parse(&task, &["--hide", "everything"]).unwrap_err();
        assert!(matches!(err, TaskError::ArgumentSyntax { .. }));
        assert!(err.to_string().contains("invalid hide value 'everything'"));
    }

    #[test]
    fn test_h_is_free_for_parameters() {
        let task = task(vec![ParamSpec::optional("host", "localhost")]);
        let args = parse(&task, &["-h", "example.com"]).unwrap();
        assert_eq!(args.str("host"), Some("example.com"));
    }

    #[test]
    fn test_config_default_makes_positional_optional() {
        let task = task(vec![ParamSpec::positional("count")]);
        let defaults: toml::Table = toml::from_str("count = 5").unwrap();
        let command_line = CommandLine::new(&task, Some(&defaults));

        let Parsed::Args(args) = command_line.parse(&[]).unwrap() else {
            panic!("expected args");
        };
        assert_eq!(args.int("count"), Some(5));

        // The config default's type drives coercion
        let Parsed::Args(args) = command_line.parse(&tokens(&["9"])).unwrap() else {
            panic!("expected args");
        };
        assert_eq!(args.int("count"), Some(9));
        assert!(command_line.parse(&tokens(&["nine"])).is_err());
        assert_eq!(command_line.usage(), "demo [--help] [count]");
    }

    #[test]
    fn test_optional_positional_before_required() {
        let task = task(vec![ParamSpec::positional("region"), ParamSpec::positional("name")]);
        let defaults: toml::Table = toml::from_str("region = \"eu\"").unwrap();
        let command_line = CommandLine::new(&task, Some(&defaults));

        let Parsed::Args(args) = command_line.parse(&tokens(&["web"])).unwrap() else {
            panic!("expected args");
        };
        assert_eq!(args.str("region"), Some("eu"));
        assert_eq!(args.str("name"), Some("web"));

        let Parsed::Args(args) = command_line.parse(&tokens(&["us", "web"])).unwrap() else {
            panic!("expected args");
        };
        assert_eq!(args.str("region"), Some("us"));
        assert_eq!(args.str("name"), Some("web"));
    }

    #[test]
    fn test_custom_coercion() {
        let task = Task::builder("demo")
            .param(ParamSpec::optional("level", 1))
            .coerce_with("level", |raw| match raw {
                "low" => Ok(Value::Int(1)),
                "high" => Ok(Value::Int(9)),
                other => Err(format!("unknown level '{other}'")),
            })
            .action(|_, _| Ok(()))
            .build()
            .unwrap();

        let args = parse(&task, &["--level", "high"]).unwrap();
        assert_eq!(args.int("level"), Some(9));
        let err = parse(&task, &["--level", "mid"]).unwrap_err();
        assert!(err.to_string().contains("unknown level 'mid'"));
    }

    #[test]
    fn test_usage_line() {
        let task = task(vec![
            ParamSpec::positional("target"),
            ParamSpec::optional("jobs", 4),
            ParamSpec::optional("release", false),
        ]);
        assert_eq!(
            CommandLine::new(&task, None).usage(),
            "demo [--help] [-j JOBS] [-r | --release | --no-release] target"
        );
    }
}
