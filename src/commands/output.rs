//! stdout / stderr / grep: pattern matching commands

use crate::engine::{Cmd, CmdResult, CmdUsage};
use crate::error::{ErrorKind, ScriptError};
use crate::state::State;

// ──────────────────────────────────────────────────────────
// stdout: match stdout against pattern
// ──────────────────────────────────────────────────────────

pub(super) struct StdoutCmd;

impl Cmd for StdoutCmd {
    fn run(&self, state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        let pattern = single_pattern("stdout", args)?;
        let content = state.stdout.clone();
        match_content(state, "stdout", neg, pattern, &content)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Match the last captured stdout against a pattern".into(),
            args: "pattern".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// stderr: match stderr against pattern
// ──────────────────────────────────────────────────────────

pub(super) struct StderrCmd;

impl Cmd for StderrCmd {
    fn run(&self, state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        let pattern = single_pattern("stderr", args)?;
        let content = state.stderr.clone();
        match_content(state, "stderr", neg, pattern, &content)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Match the last captured stderr against a pattern".into(),
            args: "pattern".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// grep: regex search in a file
// ──────────────────────────────────────────────────────────

pub(super) struct GrepCmd;

impl Cmd for GrepCmd {
    fn run(&self, state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        let [pattern, file] = args else {
            return Err(ScriptError::usage("grep", "pattern file"));
        };
        let content = state.read_file(file)?;
        match_content(state, file, neg, pattern, &content)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Search for a pattern in a file".into(),
            args: "pattern file".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// Shared helpers
// ──────────────────────────────────────────────────────────

fn single_pattern<'a>(name: &str, args: &'a [String]) -> Result<&'a str, ScriptError> {
    match args {
        [pattern] => Ok(pattern),
        _ => Err(ScriptError::usage(name, "pattern")),
    }
}

/// Compile a pattern in multi-line mode with a bounded program size.
fn compile_regex(pattern: &str) -> Result<regex::Regex, ScriptError> {
    regex::RegexBuilder::new(&format!("(?m){}", pattern))
        .size_limit(1 << 20)
        .build()
        .map_err(|e| ScriptError::new(ErrorKind::UsageError, format!("invalid pattern {:?}: {}", pattern, e)))
}

/// Assert that `content` matches `pattern`, or with `neg` that it does not.
/// `what` names the searched text in failure messages.
fn match_content(
    state: &mut State,
    what: &str,
    neg: bool,
    pattern: &str,
    content: &str,
) -> Result<CmdResult, ScriptError> {
    let re = compile_regex(pattern)?;

    match (re.find(content), neg) {
        (Some(m), true) => {
            state.logf(&format!("[{}]\n{}", what, content));
            Err(ScriptError::assertion(format!(
                "unexpected match for {:?} found in {}: {}",
                pattern,
                what,
                enclosing_line(content, m.start(), m.end())
            )))
        }
        (None, false) => {
            state.logf(&format!("[{}]\n{}", what, content));
            Err(ScriptError::assertion(format!("no match for {:?} found in {}", pattern, what)))
        }
        _ => Ok(CmdResult::Ok),
    }
}

/// The full line(s) containing the byte range `start..end`.
fn enclosing_line(content: &str, start: usize, end: usize) -> &str {
    let from = content[..start].rfind('\n').map(|p| p + 1).unwrap_or(0);
    let to = content[end..].find('\n').map(|p| end + p).unwrap_or(content.len());
    &content[from..to]
}
