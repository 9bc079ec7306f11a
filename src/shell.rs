//! Running task bodies through a shell or script interpreter.

use crate::config::{Config, Hide};
use crate::error::{Aborted, ConfigError};
use crate::task::TaskArgs;
use crate::ui;
use crate::value::Value;
use anyhow::{Context, bail};
use std::fmt;
use std::process::{Command, Stdio};
use std::str::FromStr;

/// Overrides the shell used for tasks without an `@shell` attribute.
pub const SHELL_VAR: &str = "RUNTASKS_SHELL";

/// Exported to every command with the selected environment, when there is one.
pub const ENV_VAR: &str = "RUNTASKS_ENV";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellType {
    Sh,
    Bash,
    Zsh,
    Python,
    Node,
    Ruby,
}

/// Get the Python executable (prefers python3)
fn python_executable() -> String {
    if which::which("python3").is_ok() {
        "python3".to_string()
    } else {
        "python".to_string()
    }
}

impl ShellType {
    /// Program and the flag that makes it run an inline script.
    fn program(self) -> (String, &'static str) {
        match self {
            ShellType::Sh => ("sh".to_string(), "-c"),
            ShellType::Bash => ("bash".to_string(), "-c"),
            ShellType::Zsh => ("zsh".to_string(), "-c"),
            ShellType::Python => (python_executable(), "-c"),
            ShellType::Node => ("node".to_string(), "-e"),
            ShellType::Ruby => ("ruby".to_string(), "-e"),
        }
    }

    /// POSIX-style shells take `$0` before the positional arguments.
    fn takes_arg0(self) -> bool {
        matches!(self, ShellType::Sh | ShellType::Bash | ShellType::Zsh)
    }
}

impl FromStr for ShellType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sh" => Ok(ShellType::Sh),
            "bash" => Ok(ShellType::Bash),
            "zsh" => Ok(ShellType::Zsh),
            "python" | "python3" => Ok(ShellType::Python),
            "node" => Ok(ShellType::Node),
            "ruby" => Ok(ShellType::Ruby),
            other => Err(format!("unsupported shell '{other}'")),
        }
    }
}

impl fmt::Display for ShellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShellType::Sh => "sh",
            ShellType::Bash => "bash",
            ShellType::Zsh => "zsh",
            ShellType::Python => "python",
            ShellType::Node => "node",
            ShellType::Ruby => "ruby",
        };
        f.write_str(name)
    }
}

/// A task body and how to run it.
#[derive(Debug, Clone)]
pub struct ShellAction {
    task: String,
    body: String,
    shell: Option<ShellType>,
    confirm: Option<String>,
    positionals: Vec<String>,
}

impl ShellAction {
    pub fn new(task: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            body: body.into(),
            shell: None,
            confirm: None,
            positionals: Vec::new(),
        }
    }

    #[must_use]
    pub fn shell(mut self, shell: Option<ShellType>) -> Self {
        self.shell = shell;
        self
    }

    /// Ask before running; declining aborts the run.
    #[must_use]
    pub fn confirm(mut self, prompt: Option<String>) -> Self {
        self.confirm = prompt;
        self
    }

    /// Parameters also passed as script arguments, in order.
    #[must_use]
    pub fn positionals(mut self, names: Vec<String>) -> Self {
        self.positionals = names;
        self
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Replace `{{ dotted.path }}` placeholders with configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] for a path the configuration
    /// doesn't have.
    pub fn render(&self, config: &Config) -> Result<String, ConfigError> {
        let mut rendered = String::with_capacity(self.body.len());
        let mut rest = self.body.as_str();

        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start + 2..].find("}}") else {
                break;
            };
            rendered.push_str(&rest[..start]);
            let path = rest[start + 2..start + 2 + len].trim();
            match config.require(path)? {
                toml::Value::String(text) => rendered.push_str(text),
                other => rendered.push_str(&Value::from_toml(other).to_string()),
            }
            rest = &rest[start + 2 + len + 2..];
        }
        rendered.push_str(rest);

        Ok(rendered)
    }

    fn command(&self, script: &str, config: &Config, args: &TaskArgs) -> Command {
        let (program, flag, shell) = match self.shell {
            Some(shell) => {
                let (program, flag) = shell.program();
                (program, flag, shell)
            }
            None => {
                let program = std::env::var(SHELL_VAR)
                    .ok()
                    .filter(|shell| !shell.is_empty())
                    .unwrap_or_else(|| "sh".to_string());
                (program, "-c", ShellType::Sh)
            }
        };

        let mut command = Command::new(program);
        command.arg(flag).arg(script);
        if shell.takes_arg0() {
            command.arg(&self.task);
        }
        for name in &self.positionals {
            if let Some(value) = args.get(name) {
                command.arg(value.to_string());
            }
        }
        for (name, value) in args.iter() {
            command.env(name, value.to_string());
        }
        if let Some(env) = config.env() {
            command.env(ENV_VAR, env);
        }
        command
    }

    /// Run the body with `args` exported as environment variables.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a placeholder can't be resolved, the confirmation is
    /// declined ([`Aborted`]), the program can't be started, or it exits
    /// unsuccessfully.
    pub fn execute(&self, config: &Config, args: &TaskArgs) -> anyhow::Result<()> {
        let script = self.render(config)?;

        if let Some(prompt) = &self.confirm
            && !ui::confirm(prompt)
        {
            return Err(Aborted.into());
        }

        let echo = args.bool("echo").unwrap_or_else(|| config.echo());
        let hide = match args.str("hide") {
            Some(raw) => raw.parse::<Hide>().map_err(anyhow::Error::msg)?,
            None => config.hide(),
        };

        if echo {
            ui::print_command(script.trim());
        }

        let mut command = self.command(&script, config, args);
        if hide.hides_stdout() {
            command.stdout(Stdio::null());
        }
        if hide.hides_stderr() {
            command.stderr(Stdio::null());
        }

        tracing::debug!(task = %self.task, "running {:?}", command);
        let status = command
            .status()
            .with_context(|| format!("could not start {:?}", command.get_program()))?;

        if !status.success() {
            bail!("command {status}");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config(source: &str) -> Config {
        Config::from_table(toml::from_str(source).unwrap(), Some("qa"))
    }

    #[test]
    fn test_render_placeholders() {
        let config = config(
            r#"
[deploy]
host = "example.com"
port = 2222
"#,
        );
        let action = ShellAction::new("deploy", "ssh -p {{deploy.port}} {{ deploy.host }} # {{ env }}");
        assert_eq!(
            action.render(&config).unwrap(),
            "ssh -p 2222 example.com # qa"
        );
    }

    #[test]
    fn test_render_missing_key() {
        let action = ShellAction::new("deploy", "echo {{ deploy.user }}");
        let err = action.render(&config("")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(ref key) if key == "deploy.user"));
    }

    #[test]
    fn test_render_unterminated_placeholder_is_literal() {
        let action = ShellAction::new("x", "echo {{ oops");
        assert_eq!(action.render(&config("")).unwrap(), "echo {{ oops");
    }

    #[test]
    fn test_shell_type_names() {
        assert_eq!("bash".parse::<ShellType>().unwrap(), ShellType::Bash);
        assert_eq!("python3".parse::<ShellType>().unwrap(), ShellType::Python);
        assert!("fish".parse::<ShellType>().is_err());
        assert_eq!(ShellType::Node.to_string(), "node");
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_exports_args() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out.txt");
        let action = ShellAction::new(
            "write",
            format!("printf '%s %s %s' \"$name\" \"$1\" \"$RUNTASKS_ENV\" > '{}'", out.display()),
        )
        .shell(Some(ShellType::Sh))
        .positionals(vec!["name".to_string()]);

        let args = TaskArgs::new().with("name", "widget");
        action.execute(&config(""), &args).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "widget widget qa");
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_failure_is_error() {
        let action = ShellAction::new("fail", "exit 3").shell(Some(ShellType::Sh));
        let err = action.execute(&config(""), &TaskArgs::new()).unwrap_err();
        assert!(err.to_string().contains("exit status: 3"));
    }

    #[test]
    fn test_execute_rejects_invalid_hide() {
        let action = ShellAction::new("quiet", "true").shell(Some(ShellType::Sh));
        let args = TaskArgs::new().with("hide", "everything");
        let err = action.execute(&config(""), &args).unwrap_err();
        assert!(err.to_string().contains("invalid hide value 'everything'"));
    }
}
