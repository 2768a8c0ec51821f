//! tsar: a script-driven test engine for CLI integration tests
//!
//! Inspired by Go's `rogpeppe/go-internal/testscript`.
//!
//! # Overview
//!
//! Each `.tsar` file is one test. Its lines are commands run in a fresh work
//! directory; if the file contains `-- name --` sections, the text before
//! the first section is the script and each section is staged as a file.
//!
//! # Script Syntax
//!
//! ```text
//! # comment
//! env GREETING=hello
//! exec echo $GREETING
//! stdout ^hello$
//! ! exists missing.txt
//! [short] skip slow test below
//! exec mytool input.txt &
//! wait
//!
//! -- input.txt --
//! some input
//! ```
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cd` | Change the current directory |
//! | `cp` | Copy files (`stdout`/`stderr` name the last output) |
//! | `env` | Log the environment or set a variable |
//! | `exec` | Run a program; trailing `&` runs it in the background |
//! | `exists` | Check file existence |
//! | `grep` | Regex match in a file |
//! | `mkdir` | Create directories |
//! | `rm` | Remove files and directories |
//! | `skip` | Skip the script |
//! | `stdout` | Regex match on the last stdout |
//! | `stderr` | Regex match on the last stderr |
//! | `stop` | Stop the script early |
//! | `wait` | Wait for background programs |
//!
//! Any other name runs as a program unless explicit `exec` is required.
//!
//! # Prefixes
//!
//! - `!` - Command must fail
//! - `[cond]` - Conditional execution (`short`, `windows`, `darwin`, `linux`, `!cond`)

mod archive;
mod background;
mod commands;
mod conditions;
mod engine;
mod env;
mod error;
mod parser;
mod report;
mod runner;
mod script;
mod state;

pub use archive::{Archive, ArchiveFile};
pub use conditions::{default_conditions, Condition, ConditionEvaluator, ConditionFn};
pub use engine::{builtins, BoxedCmd, Cmd, CmdResult, CmdUsage, CommandTable, Dispatch, Engine};
pub use env::Environment;
pub use error::{ErrorKind, ScriptError};
pub use parser::{expand_env, parse_command, parse_line, ParsedCommand, ScriptLine};
pub use report::{CaseReport, Reporter};
pub use runner::{BoxError, RunConfig, SetupEnv, SetupFn, TestCaseResult, TestResult, TestRunner, TestRunnerBuilder};
pub use script::{run_script, script_name, Session};
pub use state::State;

// Convenience functions for cargo test integration
pub use runner::{run, run_and_assert, run_and_assert_with};
