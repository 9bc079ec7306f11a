//! Comment annotations above task definitions.
//!
//! `# @desc`, `# @help`, `# @env`, `# @timed`, `# @name`, `# @shell` and
//! `# @confirm` lines configure the task below them; other comment lines in
//! the same block become its doc comment.

use crate::shell::ShellType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Attribute {
    Desc(String),
    Help { param: String, text: String },
    Env(String),
    Timed,
    Name(String),
    Shell(ShellType),
    /// Prompt text; `None` uses a default prompt.
    Confirm(Option<String>),
}

/// Everything the comment block above a definition says about it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct Annotations {
    pub attributes: Vec<Attribute>,
    pub doc: Option<String>,
}

/// Collect the comment block directly above the definition on line
/// `line_index` (0-based). A blank line ends the block.
pub(super) fn parse_annotations(input: &str, line_index: usize) -> Annotations {
    let lines: Vec<&str> = input.lines().collect();
    let mut attributes = Vec::new();
    let mut doc_lines = Vec::new();

    for line in lines[..line_index.min(lines.len())].iter().rev() {
        let line = line.trim();
        let Some(comment) = line.strip_prefix('#') else {
            break;
        };

        let comment = comment.strip_prefix(' ').unwrap_or(comment);
        if let Some(directive) = comment.trim_start().strip_prefix('@') {
            match parse_attribute(directive) {
                Some(attr) => attributes.push(attr),
                None => tracing::warn!(line = line, "ignoring unrecognized task attribute"),
            }
        } else {
            doc_lines.push(comment.trim_end());
        }
    }

    attributes.reverse();
    doc_lines.reverse();

    let doc = doc_lines.join("\n").trim().to_string();
    Annotations {
        attributes,
        doc: (!doc.is_empty()).then_some(doc),
    }
}

/// Strip surrounding quotes from a string
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if ((trimmed.starts_with('"') && trimmed.ends_with('"'))
        || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
        && trimmed.len() >= 2
    {
        return trimmed[1..trimmed.len() - 1].to_string();
    }
    trimmed.to_string()
}

/// Parse the text after `@` on an attribute line.
fn parse_attribute(directive: &str) -> Option<Attribute> {
    let (keyword, rest) = directive
        .split_once(char::is_whitespace)
        .map_or((directive.trim(), ""), |(k, r)| (k, r.trim()));

    match keyword {
        "desc" if !rest.is_empty() => Some(Attribute::Desc(strip_quotes(rest))),
        "help" => {
            let (param, text) = rest.split_once(char::is_whitespace)?;
            Some(Attribute::Help {
                param: param.to_string(),
                text: strip_quotes(text),
            })
        }
        "env" if !rest.is_empty() => Some(Attribute::Env(strip_quotes(rest))),
        "timed" if rest.is_empty() => Some(Attribute::Timed),
        "name" if !rest.is_empty() && !rest.contains(char::is_whitespace) => {
            Some(Attribute::Name(rest.to_string()))
        }
        "shell" => rest.parse().ok().map(Attribute::Shell),
        "confirm" => Some(Attribute::Confirm(
            (!rest.is_empty()).then(|| strip_quotes(rest)),
        )),
        _ => None,
    }
}
