//! Configuration loading and dotted-path lookup.
//!
//! Configuration lives in a TOML file (`tasks.toml` by default). Top-level
//! tables apply to every environment; an `[env.<name>]` table is merged over
//! them when that environment is selected:
//!
//! ```toml
//! [run]
//! echo = true
//!
//! [defaults.tasks.deploy]
//! host = "staging.example.com"
//!
//! [env.prod.defaults.tasks.deploy]
//! host = "example.com"
//! ```

use crate::error::ConfigError;
use crate::value::Value;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Default name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tasks.toml";

/// Which output streams of a task's commands are suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Hide {
    #[default]
    None,
    Stdout,
    Stderr,
    All,
}

impl Hide {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Hide::None => "none",
            Hide::Stdout => "stdout",
            Hide::Stderr => "stderr",
            Hide::All => "all",
        }
    }

    #[must_use]
    pub fn hides_stdout(self) -> bool {
        matches!(self, Hide::Stdout | Hide::All)
    }

    #[must_use]
    pub fn hides_stderr(self) -> bool {
        matches!(self, Hide::Stderr | Hide::All)
    }
}

impl FromStr for Hide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Hide::None),
            "stdout" => Ok(Hide::Stdout),
            "stderr" => Ok(Hide::Stderr),
            "all" => Ok(Hide::All),
            other => Err(format!("invalid hide value '{other}'")),
        }
    }
}

/// Run-wide settings given on the command line. Unset fields leave the
/// configuration file's `run.*` values in place.
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub echo: Option<bool>,
    pub hide: Option<Hide>,
}

/// Resolved configuration for one environment.
#[derive(Debug, Clone, Default)]
pub struct Config {
    env: Option<String>,
    values: toml::Table,
    debug: bool,
}

impl Config {
    /// An empty configuration with no environment selected.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load configuration from `path` (if any) for the environment `env`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file can't be read or parsed, or if `env` names an
    /// environment the file doesn't define.
    pub fn load(
        path: Option<&Path>,
        env: Option<&str>,
        settings: &RunSettings,
        debug: bool,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                let table: toml::Table =
                    toml::from_str(&content).map_err(|source| ConfigError::Parse {
                        path: path.to_path_buf(),
                        source,
                    })?;
                if let Some(env) = env {
                    let defined = table
                        .get("env")
                        .and_then(toml::Value::as_table)
                        .is_some_and(|envs| envs.contains_key(env));
                    if !defined {
                        return Err(ConfigError::UnknownEnv {
                            env: env.to_string(),
                            path: path.to_path_buf(),
                        });
                    }
                }
                Self::from_table(table, env)
            }
            None => Self::from_table(toml::Table::new(), env),
        };

        config.apply(settings);
        config.debug = debug;
        Ok(config)
    }

    /// Build a configuration from an already-parsed table, merging the
    /// `[env.<env>]` table (when present) over the top-level values.
    #[must_use]
    pub fn from_table(mut table: toml::Table, env: Option<&str>) -> Self {
        let envs = table.remove("env");
        if let (Some(env), Some(toml::Value::Table(mut envs))) = (env, envs)
            && let Some(toml::Value::Table(overlay)) = envs.remove(env)
        {
            merge(&mut table, overlay);
        }
        if let Some(env) = env {
            table.insert("env".to_string(), toml::Value::String(env.to_string()));
        }
        Self {
            env: env.map(str::to_string),
            values: table,
            debug: false,
        }
    }

    /// Override `run.echo` / `run.hide` with whatever the command line supplied.
    pub fn apply(&mut self, settings: &RunSettings) {
        if settings.echo.is_none() && settings.hide.is_none() {
            return;
        }
        let run = self
            .values
            .entry("run")
            .or_insert(toml::Value::Table(toml::Table::new()));
        if !run.is_table() {
            *run = toml::Value::Table(toml::Table::new());
        }
        if let toml::Value::Table(run) = run {
            if let Some(echo) = settings.echo {
                run.insert("echo".to_string(), toml::Value::Boolean(echo));
            }
            if let Some(hide) = settings.hide {
                run.insert("hide".to_string(), toml::Value::String(hide.name().to_string()));
            }
        }
    }

    /// The selected environment, if any.
    #[must_use]
    pub fn env(&self) -> Option<&str> {
        self.env.as_deref()
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Look up a value by dotted path, e.g. `defaults.tasks.build.jobs`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&toml::Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.values.get(first)?;
        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }
        Some(current)
    }

    /// Look up a value by dotted path, falling back to `default`.
    #[must_use]
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).map_or(default, Value::from_toml)
    }

    /// Look up a value by dotted path, failing when it isn't there.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] when nothing is stored at `path`.
    pub fn require(&self, path: &str) -> Result<&toml::Value, ConfigError> {
        self.get(path)
            .ok_or_else(|| ConfigError::MissingKey(path.to_string()))
    }

    /// The table stored at `path`, if it is one.
    #[must_use]
    pub fn table(&self, path: &str) -> Option<&toml::Table> {
        self.get(path).and_then(toml::Value::as_table)
    }

    /// `run.echo`, defaulting to false.
    #[must_use]
    pub fn echo(&self) -> bool {
        self.get("run.echo")
            .and_then(toml::Value::as_bool)
            .unwrap_or(false)
    }

    /// `run.hide`, defaulting to [`Hide::None`].
    #[must_use]
    pub fn hide(&self) -> Hide {
        match self.get("run.hide").and_then(toml::Value::as_str) {
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!("ignoring run.hide: {err}");
                Hide::None
            }),
            None => Hide::None,
        }
    }
}

/// Recursively merge `overlay` into `base`; tables merge, anything else replaces.
fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
