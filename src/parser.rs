//! Script line parser
//!
//! A script line is processed in this order:
//! - surrounding whitespace is trimmed; blank lines and `#` lines are no-ops
//! - a leading `[cond]` is split off (an unterminated bracket is an error);
//!   the text between the brackets is passed on untrimmed, and `[]` guards nothing
//! - the remaining text has `$VAR` / `${VAR}` expanded by the session
//! - the expanded text is split on whitespace into arguments
//! - a leading `!` argument marks the command as negated
//!
//! There is no quoting: arguments never contain whitespace.

use crate::error::ScriptError;

/// The parts of a raw line that are known before variable expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine<'a> {
    /// Text between `[` and `]`, if the line is guarded
    pub condition: Option<&'a str>,
    /// Everything after the guard, trimmed
    pub text: &'a str,
}

/// A command ready for dispatch. Only `parse_command` builds one, so the
/// argument vector always holds at least the command name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    negate: bool,
    argv: Vec<String>,
}

impl ParsedCommand {
    /// Whether the line started with `!`
    pub fn negate(&self) -> bool {
        self.negate
    }

    pub fn name(&self) -> &str {
        &self.argv[0]
    }

    /// Arguments after the command name
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    /// Command name followed by its arguments
    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

/// Split a physical line into its condition guard and command text.
///
/// Returns `Ok(None)` when the line is a no-op: blank, a `#` comment,
/// or a guard with nothing after it. The guard is not evaluated here.
pub fn parse_line(line: &str) -> Result<Option<ScriptLine<'_>>, ScriptError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let Some(inner) = line.strip_prefix('[') else {
        return Ok(Some(ScriptLine { condition: None, text: line }));
    };

    let end = inner
        .find(']')
        .ok_or_else(|| ScriptError::parse("unterminated condition"))?;
    let text = inner[end + 1..].trim();
    if text.is_empty() {
        return Ok(None);
    }
    // an empty guard places no condition on the line
    let condition = Some(&inner[..end]).filter(|c| !c.is_empty());

    Ok(Some(ScriptLine { condition, text }))
}

/// Split expanded text into arguments and peel off a leading `!`.
///
/// Returns `Ok(None)` when the text has no arguments at all.
pub fn parse_command(expanded: &str) -> Result<Option<ParsedCommand>, ScriptError> {
    let mut args: Vec<String> = expanded.split_whitespace().map(str::to_string).collect();
    if args.is_empty() {
        return Ok(None);
    }

    let negate = args[0] == "!";
    if negate {
        args.remove(0);
        if args.is_empty() {
            return Err(ScriptError::parse("! on line by itself"));
        }
    }

    Ok(Some(ParsedCommand { negate, argv: args }))
}

/// Expand `$NAME` and `${NAME}` references in `s` using `lookup`.
///
/// Unknown names expand to the empty string. A `$` not followed by a
/// name is kept literally. Malformed braces (`${` without `}` or `${}`)
/// are dropped, matching shell-style expanders.
pub fn expand_env(s: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, consumed) = shell_name(after);
        match name {
            Some(name) => result.push_str(&lookup(name).unwrap_or_default()),
            None if consumed == 0 => result.push('$'),
            None => {}
        }
        rest = &after[consumed..];
    }
    result.push_str(rest);
    result
}

/// Read a variable name from the text right after a `$`.
///
/// Returns the name (if any) and how many bytes were consumed.
fn shell_name(s: &str) -> (Option<&str>, usize) {
    let bytes = s.as_bytes();
    let Some(&first) = bytes.first() else {
        return (None, 0);
    };

    if first == b'{' {
        return match s[1..].find('}') {
            Some(0) => (None, 2),
            Some(end) => (Some(&s[1..end + 1]), end + 2),
            None => (None, 1),
        };
    }

    if is_special_var(first) {
        return (Some(&s[..1]), 1);
    }

    let len = bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    if len == 0 {
        (None, 0)
    } else {
        (Some(&s[..len]), len)
    }
}

fn is_special_var(c: u8) -> bool {
    matches!(c, b'*' | b'#' | b'$' | b'@' | b'!' | b'?' | b'-') || c.is_ascii_digit()
}
