//! Task parameters: declarations and the derived read-only model.

use crate::value::{Value, ValueKind};
use serde::Serialize;

/// Declaration of one task parameter, as written by the task author.
///
/// The configuration object every action receives is not declared here; it
/// is always passed separately and can never be supplied on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<Value>,
    pub annotation: Option<ValueKind>,
}

impl ParamSpec {
    /// A parameter without a default: positional on the command line.
    pub fn positional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            annotation: None,
        }
    }

    /// A parameter with a default: exposed as an option.
    pub fn optional(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
            annotation: None,
        }
    }

    /// Declare the parameter's type; used as its coercion unless the task
    /// declares one explicitly.
    #[must_use]
    pub fn annotate(mut self, kind: ValueKind) -> Self {
        self.annotation = Some(kind);
        self
    }
}

/// Whether a parameter is filled by position or by option name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Positional,
    Optional,
}

/// A task parameter with its derived classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    spec: ParamSpec,
    position: Option<usize>,
}

impl Parameter {
    /// Wrap a declaration. `position` is the 1-based ordinal among positional
    /// parameters and is ignored for parameters that have a default.
    #[must_use]
    pub fn new(spec: ParamSpec, position: Option<usize>) -> Self {
        let position = if spec.default.is_none() { position } else { None };
        Self { spec, position }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    #[must_use]
    pub fn default(&self) -> Option<&Value> {
        self.spec.default.as_ref()
    }

    #[must_use]
    pub fn annotation(&self) -> Option<ValueKind> {
        self.spec.annotation
    }

    #[must_use]
    pub fn kind(&self) -> ParamKind {
        if self.is_positional() {
            ParamKind::Positional
        } else {
            ParamKind::Optional
        }
    }

    #[must_use]
    pub fn is_positional(&self) -> bool {
        self.spec.default.is_none()
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        !self.is_positional()
    }

    /// True when the default is a boolean, independent of positional/optional.
    #[must_use]
    pub fn is_bool(&self) -> bool {
        matches!(self.spec.default, Some(Value::Bool(_)))
    }

    #[must_use]
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    #[must_use]
    pub fn spec(&self) -> &ParamSpec {
        &self.spec
    }
}
