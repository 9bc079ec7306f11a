//! Typed argument values and the coercions that produce them.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The runtime type of a [`Value`], also used to name a coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Str,
    Int,
    Float,
    Complex,
    Bool,
}

impl ValueKind {
    /// Returns the lowercase name used in task files and error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Str => "str",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Complex => "complex",
            ValueKind::Bool => "bool",
        }
    }

    /// Coerce a raw command-line string into a value of this kind.
    ///
    /// # Errors
    ///
    /// Returns a message of the form `invalid int value: 'abc'` when the text
    /// cannot be converted.
    pub fn parse(self, raw: &str) -> Result<Value, String> {
        let invalid = || format!("invalid {} value: '{raw}'", self.name());
        let trimmed = raw.trim();
        match self {
            ValueKind::Str => Ok(Value::Str(raw.to_string())),
            ValueKind::Int => trimmed.parse().map(Value::Int).map_err(|_| invalid()),
            ValueKind::Float => trimmed.parse().map(Value::Float).map_err(|_| invalid()),
            ValueKind::Complex => trimmed.parse().map(Value::Complex).map_err(|_| invalid()),
            ValueKind::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "n" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
        }
    }
}

impl FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "str" | "string" => Ok(ValueKind::Str),
            "int" | "integer" => Ok(ValueKind::Int),
            "float" => Ok(ValueKind::Float),
            "complex" => Ok(ValueKind::Complex),
            "bool" | "boolean" => Ok(ValueKind::Bool),
            other => Err(format!("unknown type '{other}'")),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A complex number written as `1+2j`, `-3.5j`, `(2-1j)` or a plain real.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    #[must_use]
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

/// Parse one component; a bare sign stands for a unit imaginary part.
fn parse_imaginary(text: &str) -> Result<f64, std::num::ParseFloatError> {
    match text {
        "" | "+" => Ok(1.0),
        "-" => Ok(-1.0),
        _ => text.parse(),
    }
}

impl FromStr for Complex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid complex literal '{s}'");
        let mut text = s.trim();
        if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            text = inner.trim();
        }
        if text.is_empty() {
            return Err(invalid());
        }

        let Some(body) = text.strip_suffix(['j', 'J']) else {
            let re = text.parse().map_err(|_| invalid())?;
            return Ok(Complex::new(re, 0.0));
        };

        // The real/imaginary split is the last sign that isn't an exponent sign.
        let bytes = body.as_bytes();
        let split = (1..bytes.len()).rev().find(|&i| {
            matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E')
        });

        match split {
            Some(i) => {
                let re = body[..i].parse().map_err(|_| invalid())?;
                let im = parse_imaginary(&body[i..]).map_err(|_| invalid())?;
                Ok(Complex::new(re, im))
            }
            None => {
                let im = parse_imaginary(body).map_err(|_| invalid())?;
                Ok(Complex::new(0.0, im))
            }
        }
    }
}

fn fmt_component(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.0}")
    } else {
        format!("{x}")
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.re == 0.0 && !self.re.is_sign_negative() {
            write!(f, "{}j", fmt_component(self.im))
        } else {
            let sign = if self.im.is_sign_negative() { '-' } else { '+' };
            write!(
                f,
                "({}{sign}{}j)",
                fmt_component(self.re),
                fmt_component(self.im.abs())
            )
        }
    }
}

/// A task argument value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Complex(Complex),
    Bool(bool),
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Complex(_) => ValueKind::Complex,
            Value::Bool(_) => ValueKind::Bool,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_complex(&self) -> Option<Complex> {
        match self {
            Value::Complex(c) => Some(*c),
            _ => None,
        }
    }

    /// Convert a configuration value. Tables, arrays and datetimes keep their
    /// TOML rendering as text.
    #[must_use]
    pub fn from_toml(value: &toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Value::Str(s.clone()),
            toml::Value::Integer(i) => Value::Int(*i),
            toml::Value::Float(x) => Value::Float(*x),
            toml::Value::Boolean(b) => Value::Bool(*b),
            other => Value::Str(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Complex(c) => write!(f, "{c}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Complex> for Value {
    fn from(c: Complex) -> Self {
        Value::Complex(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}
