//! Flow control commands: stop, skip, wait

use crate::engine::{Cmd, CmdResult, CmdUsage};
use crate::error::ScriptError;
use crate::state::State;

// ──────────────────────────────────────────────────────────
// stop: stop script execution
// ──────────────────────────────────────────────────────────

pub(super) struct StopCmd;

impl Cmd for StopCmd {
    fn run(&self, _state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        if neg {
            return Err(ScriptError::unsupported_negation("stop"));
        }
        Ok(CmdResult::Stop(args.join(" ")))
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Stop the script early; not a failure".into(),
            args: "[message]".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// skip: skip the test
// ──────────────────────────────────────────────────────────

pub(super) struct SkipCmd;

impl Cmd for SkipCmd {
    fn run(&self, _state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        if neg {
            return Err(ScriptError::unsupported_negation("skip"));
        }
        Ok(CmdResult::Skip(args.join(" ")))
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Mark the script skipped and stop running it".into(),
            args: "[reason]".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// wait: wait for background commands
// ──────────────────────────────────────────────────────────

pub(super) struct WaitCmd;

impl Cmd for WaitCmd {
    fn run(&self, state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        if neg {
            return Err(ScriptError::unsupported_negation("wait"));
        }
        if !args.is_empty() {
            return Err(ScriptError::usage("wait", ""));
        }

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut first_mismatch = None;

        // every job is joined even after a mismatch, so none is left running
        for outcome in state.background.wait_all() {
            state.logf(&format!("[background] {}", outcome.args.join(" ")));
            if !outcome.stdout.is_empty() {
                state.logf(&format!("[stdout]\n{}", outcome.stdout));
                stdout.push_str(&outcome.stdout);
            }
            if !outcome.stderr.is_empty() {
                state.logf(&format!("[stderr]\n{}", outcome.stderr));
                stderr.push_str(&outcome.stderr);
            }
            if let Some(ref err) = outcome.error {
                state.logf(&format!("[{}]", err));
            }
            if first_mismatch.is_none() {
                first_mismatch = outcome
                    .mismatch()
                    .map(|msg| format!("{}: {}", outcome.args.join(" "), msg));
            }
        }

        state.stdout = stdout;
        state.stderr = stderr;

        match first_mismatch {
            Some(msg) => Err(ScriptError::process(msg)),
            None => Ok(CmdResult::Ok),
        }
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Wait for background commands to complete".into(),
            args: "".into(),
        }
    }
}
