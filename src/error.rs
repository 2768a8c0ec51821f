//! Script errors

use std::fmt;

/// The kind of script error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed arguments to a built-in command
    UsageError,
    /// Unknown condition name, or a resolver refused the condition
    ConditionError,
    /// Unterminated `[cond]` bracket or a bare `!`
    ParseError,
    /// An existence, content or output check did not match expectation
    AssertionFailure,
    /// Work directory creation/removal, setup hook or archive extraction failed
    EnvironmentError,
    /// A process exited contrary to its negation expectation
    ProcessError,
    /// Two scripts in one run share a name
    DuplicateName,
    /// IO error
    Io,
}

/// A script error with file/line context
#[derive(Debug)]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub command: Option<String>,
    pub args: Vec<String>,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file: None,
            line: None,
            command: None,
            args: Vec::new(),
        }
    }

    pub fn with_location(mut self, file: impl Into<String>, line: usize) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_command(mut self, cmd: impl Into<String>) -> Self {
        self.command = Some(cmd.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn usage(cmd: &str, expected: &str) -> Self {
        Self::new(ErrorKind::UsageError, format!("usage: {} {}", cmd, expected))
    }

    /// `!` was put in front of a command that has no failing form.
    pub fn unsupported_negation(cmd: &str) -> Self {
        Self::new(ErrorKind::UsageError, format!("unsupported: ! {}", cmd))
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, msg)
    }

    pub fn condition(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConditionError, msg)
    }

    pub fn assertion(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::AssertionFailure, msg)
    }

    pub fn environment(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::EnvironmentError, msg)
    }

    pub fn process(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProcessError, msg)
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref file) = self.file {
            write!(f, "{}:", file)?;
        }
        if let Some(line) = self.line {
            write!(f, "{}:", line)?;
        }
        if let Some(ref cmd) = self.command {
            if self.args.is_empty() {
                write!(f, " {}: ", cmd)?;
            } else {
                write!(f, " {} {}: ", cmd, self.args.join(" "))?;
            }
        } else if self.file.is_some() || self.line.is_some() {
            write!(f, " ")?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ScriptError {}

impl From<std::io::Error> for ScriptError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, e.to_string())
    }
}
