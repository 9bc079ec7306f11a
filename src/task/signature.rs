//! Signature analysis: from declared parameters to command-line names.
//!
//! Optional parameters get a long name (`--dry-run` for `dry_run`), at most
//! two parameters per leading letter get a short name (`-d` for the first,
//! `-D` for the second), and boolean parameters get a negation
//! (`--no-dry-run`, with `yes`/`no` mapping to `--no`/`--yes`).

use super::param::{ParamSpec, Parameter};
use thiserror::Error;

/// The option string reserved for help output.
pub const HELP_FLAG: &str = "--help";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("parameter `{0}` is declared more than once")]
    DuplicateParameter(String),

    #[error("parameter name `{0}` must start with a letter and contain only letters, digits and underscores")]
    InvalidName(String),

    #[error("option `{option}` of parameter `{param}` is already used by `{other}`")]
    ConflictingOption {
        option: String,
        param: String,
        other: String,
    },
}

/// The analyzed parameter list of one task.
#[derive(Debug, Clone)]
pub struct Signature {
    parameters: Vec<Parameter>,
    /// Command-line token -> index into `parameters`.
    arg_map: Vec<(String, usize)>,
    /// Parameter name -> its command-line tokens.
    param_map: Vec<(String, Vec<String>)>,
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Compute the command-line names for `param`, given every parameter name of
/// the task in declaration order.
///
/// Positional parameters are addressed by their bare name.
#[must_use]
pub fn arg_names_for_param(param: &Parameter, all_names: &[&str]) -> Vec<String> {
    let name = param.name();
    if param.is_positional() {
        return vec![name.to_string()];
    }

    let arg_name = name.replace('_', "-");
    let mut arg_names = Vec::with_capacity(3);

    if let Some(first_char) = name.chars().next() {
        let mut same_initial = all_names.iter().filter(|n| n.starts_with(first_char));
        let first = same_initial.next();
        let second = same_initial.next();
        if first == Some(&name) {
            arg_names.push(format!("-{first_char}"));
        } else if second == Some(&name) {
            arg_names.push(format!("-{}", first_char.to_ascii_uppercase()));
        }
    }

    arg_names.push(format!("--{arg_name}"));

    if param.is_bool() {
        let negation = match name {
            "yes" => "--no".to_string(),
            "no" => "--yes".to_string(),
            _ => format!("--no-{arg_name}"),
        };
        arg_names.push(negation);
    }

    arg_names
}

impl Signature {
    /// Analyze a parameter list, assigning positions to positional
    /// parameters from left to right.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a name is invalid or repeated, or if two parameters
    /// end up with the same option string.
    pub fn new(specs: Vec<ParamSpec>) -> Result<Self, SignatureError> {
        let mut parameters: Vec<Parameter> = Vec::with_capacity(specs.len());
        let mut position = 1;
        for spec in specs {
            if !is_valid_name(&spec.name) {
                return Err(SignatureError::InvalidName(spec.name));
            }
            if parameters.iter().any(|p| p.name() == spec.name) {
                return Err(SignatureError::DuplicateParameter(spec.name));
            }
            let param_position = if spec.default.is_none() {
                position += 1;
                Some(position - 1)
            } else {
                None
            };
            parameters.push(Parameter::new(spec, param_position));
        }

        let names: Vec<&str> = parameters.iter().map(Parameter::name).collect();
        let mut arg_map: Vec<(String, usize)> = Vec::new();
        let mut param_map = Vec::with_capacity(parameters.len());

        for (index, param) in parameters.iter().enumerate() {
            let arg_names = arg_names_for_param(param, &names);
            for arg_name in &arg_names {
                if arg_name.starts_with('-') {
                    if arg_name == HELP_FLAG {
                        return Err(SignatureError::ConflictingOption {
                            option: arg_name.clone(),
                            param: param.name().to_string(),
                            other: "help".to_string(),
                        });
                    }
                    if let Some((_, other)) = arg_map.iter().find(|(token, _)| token == arg_name) {
                        return Err(SignatureError::ConflictingOption {
                            option: arg_name.clone(),
                            param: param.name().to_string(),
                            other: parameters[*other].name().to_string(),
                        });
                    }
                }
                arg_map.push((arg_name.clone(), index));
            }
            param_map.push((param.name().to_string(), arg_names));
        }

        Ok(Self {
            parameters,
            arg_map,
            param_map,
        })
    }

    /// All parameters in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parameter(name).is_some()
    }

    /// Parameters without defaults, in declaration order.
    pub fn positionals(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.is_positional())
    }

    /// Parameters with defaults, in declaration order.
    pub fn optionals(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.is_optional())
    }

    /// The parameter a command-line token refers to.
    #[must_use]
    pub fn arg(&self, token: &str) -> Option<&Parameter> {
        self.arg_map
            .iter()
            .find(|(name, _)| name == token)
            .map(|(_, index)| &self.parameters[*index])
    }

    /// Every command-line token paired with its parameter.
    pub fn arg_map(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.arg_map
            .iter()
            .map(|(name, index)| (name.as_str(), &self.parameters[*index]))
    }

    /// The command-line tokens for the parameter called `name`.
    #[must_use]
    pub fn arg_names(&self, name: &str) -> Option<&[String]> {
        self.param_map
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, names)| names.as_slice())
    }

    #[must_use]
    pub fn param_map(&self) -> &[(String, Vec<String>)] {
        &self.param_map
    }
}
