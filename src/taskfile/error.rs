//! Readable task file syntax errors.
//!
//! Turns pest errors into a message, a location, the offending source line
//! with a caret, and a hint where one helps.

use std::fmt;

use super::Rule;

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    /// 1-indexed.
    pub line: usize,
    /// 1-indexed.
    pub col: usize,
    /// End column for single-line spans; sizes the caret.
    pub col_end: Option<usize>,
    pub source_line: Option<String>,
    pub filename: Option<String>,
    pub hint: Option<String>,
}

impl ParseError {
    pub fn from_pest(error: &pest::error::Error<Rule>, source: &str, filename: Option<&str>) -> Self {
        let (line, col, col_end) = match error.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c, None),
            pest::error::LineColLocation::Span((sl, sc), (el, ec)) => {
                let end = if sl == el { Some(ec) } else { None };
                (sl, sc, end)
            }
        };

        let source_line = source
            .lines()
            .nth(line.saturating_sub(1))
            .map(str::to_string);

        let (message, hint) = match &error.variant {
            pest::error::ErrorVariant::ParsingError { positives, .. } => (
                friendly_message(positives),
                friendly_hint(positives, source_line.as_deref(), col),
            ),
            pest::error::ErrorVariant::CustomError { message } => (message.clone(), None),
        };

        ParseError {
            message,
            line,
            col,
            col_end,
            source_line,
            filename: filename.map(str::to_string),
            hint,
        }
    }
}

/// User-facing name of a grammar rule; `None` hides it from messages.
fn rule_label(rule: Rule) -> Option<&'static str> {
    match rule {
        Rule::task_def => Some("task definition"),
        Rule::task_name => Some("task name"),
        Rule::param_list | Rule::param => Some("parameter"),
        Rule::param_name => Some("parameter name"),
        Rule::type_name => Some("type name"),
        Rule::literal
        | Rule::string
        | Rule::boolean
        | Rule::complex
        | Rule::float
        | Rule::integer
        | Rule::bare => Some("default value"),
        Rule::block => Some("block body (`{ ... }`)"),
        Rule::command => Some("command"),
        _ => None,
    }
}

fn friendly_message(positives: &[Rule]) -> String {
    let mut named: Vec<&str> = Vec::new();
    for label in positives.iter().copied().filter_map(rule_label) {
        if !named.contains(&label) {
            named.push(label);
        }
    }

    match named.as_slice() {
        [] => "unexpected token".to_string(),
        [single] => format!("expected {single}"),
        [a, b] => format!("expected {a} or {b}"),
        [rest @ .., last] => format!("expected {} or {last}", rest.join(", ")),
    }
}

fn friendly_hint(positives: &[Rule], source_line: Option<&str>, col: usize) -> Option<String> {
    let has = |r: Rule| positives.contains(&r);

    if has(Rule::block) || has(Rule::command) {
        return Some(
            "A task needs a body: put a command on the same line, \
             or wrap several lines in braces: `name() { ... }`"
                .to_string(),
        );
    }

    if has(Rule::param) || has(Rule::param_name) {
        if let Some(line) = source_line {
            // pest columns count characters, not bytes
            let before_err = line.chars().take(col.saturating_sub(1));
            let (open, close) = before_err.fold((0, 0), |(open, close), c| match c {
                '(' => (open + 1, close),
                ')' => (open, close + 1),
                _ => (open, close),
            });
            if open > close {
                return Some(
                    "A parameter list must be closed with `)`. \
                     Check for a missing `)` or a stray character inside the list."
                        .to_string(),
                );
            }
        }
        return Some(
            "Parameters look like `name`, `name = default` or `name: type = default`, \
             separated by commas."
                .to_string(),
        );
    }

    if has(Rule::task_def) || has(Rule::task_name) {
        return Some(
            "Only task definitions and `#` comments may appear at the top level: \
             `name(params) command`"
                .to_string(),
        );
    }

    None
}

fn underline(col: usize, col_end: Option<usize>) -> String {
    let start = col.saturating_sub(1);
    let len = col_end.map_or(1, |end| end.saturating_sub(col).max(1));
    format!("{}{}", " ".repeat(start), "^".repeat(len))
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "syntax error: {}", self.message)?;

        let location = match &self.filename {
            Some(name) => format!("{name}:{}:{}", self.line, self.col),
            None => format!("{}:{}", self.line, self.col),
        };
        write!(f, "  --> {location}")?;

        if let Some(ref src) = self.source_line {
            let num = self.line.to_string();
            let pad = " ".repeat(num.len());

            writeln!(f)?;
            writeln!(f, "   {pad} |")?;
            writeln!(f, "   {num} | {src}")?;
            write!(f, "   {pad} | {}", underline(self.col, self.col_end))?;
        }

        if let Some(ref hint) = self.hint {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "   = hint: {hint}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::{super::TaskFileParser, *};
    use pest::Parser;

    fn parse_err(input: &str, filename: Option<&str>) -> ParseError {
        let err = TaskFileParser::parse(Rule::file, input)
            .expect_err("expected a parse failure for this input");
        ParseError::from_pest(&err, input, filename)
    }

    #[test]
    fn test_display_includes_filename_and_location() {
        let err = parse_err("build(\n", Some("tasks.run"));
        let rendered = err.to_string();
        assert!(rendered.contains("tasks.run:"), "filename missing in:\n{rendered}");
        assert!(rendered.starts_with("syntax error:"), "prefix missing in:\n{rendered}");
        assert!(rendered.contains("-->"), "location arrow missing in:\n{rendered}");
    }

    #[test]
    fn test_missing_body_hint() {
        let err = parse_err("build()\n", None);
        let hint = err.hint.expect("hint");
        assert!(hint.contains("body"), "unexpected hint: {hint}");
    }

    #[test]
    fn test_unclosed_param_list() {
        let err = parse_err("build(target echo hi\n", None);
        assert_eq!(err.line, 1);
        assert!(err.to_string().contains('^'));
    }

    #[test]
    fn test_non_ascii_line_does_not_panic() {
        let err = parse_err("ab(x = \"éééé\", ?) echo\n", None);
        assert_eq!(err.line, 1);
        assert!(err.to_string().contains("éééé"));
    }

    #[test]
    fn test_stray_top_level_line() {
        let input = "build() echo ok\nFOO=bar\n";
        let err = parse_err(input, None);
        assert_eq!(err.line, 2, "error should point to second line");
        assert_eq!(err.source_line.as_deref(), Some("FOO=bar"));
        assert!(!err.message.contains("Rule::"));
    }
}
