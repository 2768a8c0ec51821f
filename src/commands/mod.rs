//! Built-in script commands
//!
//! The fixed command set every script can use. Built-ins are resolved before
//! user commands and cannot be replaced. Pattern arguments (`stdout`,
//! `stderr`, `grep`) are regular expressions in multi-line mode.

mod exec;
mod output;
mod file_ops;
mod flow;
mod env;

use crate::engine::CommandTable;

pub(crate) use exec::run_foreground;

/// Return the built-in commands
pub fn default_commands() -> CommandTable {
    let mut cmds = CommandTable::new();
    cmds.insert("cd".into(), Box::new(env::CdCmd));
    cmds.insert("cp".into(), Box::new(file_ops::CpCmd));
    cmds.insert("env".into(), Box::new(env::EnvCmd));
    cmds.insert("exec".into(), Box::new(exec::ExecCmd));
    cmds.insert("exists".into(), Box::new(file_ops::ExistsCmd));
    cmds.insert("grep".into(), Box::new(output::GrepCmd));
    cmds.insert("mkdir".into(), Box::new(file_ops::MkdirCmd));
    cmds.insert("rm".into(), Box::new(file_ops::RmCmd));
    cmds.insert("skip".into(), Box::new(flow::SkipCmd));
    cmds.insert("stderr".into(), Box::new(output::StderrCmd));
    cmds.insert("stdout".into(), Box::new(output::StdoutCmd));
    cmds.insert("stop".into(), Box::new(flow::StopCmd));
    cmds.insert("wait".into(), Box::new(flow::WaitCmd));
    cmds
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::engine::{builtins, CmdResult};
    use crate::error::ScriptError;
    use crate::state::State;

    /// A state rooted in a fresh temp dir, with PATH inherited.
    pub fn state() -> (tempfile::TempDir, State) {
        let tmp = tempfile::tempdir().unwrap();
        let mut state = State::new(tmp.path().to_path_buf());
        state.setenv("PATH", &std::env::var("PATH").unwrap_or_default());
        (tmp, state)
    }

    /// Run a built-in by name.
    pub fn run(state: &mut State, neg: bool, line: &str) -> Result<CmdResult, ScriptError> {
        let mut words = line.split_whitespace().map(str::to_string);
        let name = words.next().unwrap();
        let args: Vec<String> = words.collect();
        builtins()[&name].run(state, neg, &args)
    }
}
