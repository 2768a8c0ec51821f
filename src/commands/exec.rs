//! exec: execute a subprocess

use std::path::PathBuf;
use std::process::Command as ProcessCommand;
use crate::background::{BackgroundJob, JobOutcome};
use crate::engine::{Cmd, CmdResult, CmdUsage};
use crate::error::ScriptError;
use crate::state::State;

/// Trailing argument that sends `exec` to the background.
const BACKGROUND_MARKER: &str = "&";

pub(super) struct ExecCmd;

impl Cmd for ExecCmd {
    fn run(&self, state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        let (args, background) = match args.split_last() {
            Some((last, rest)) if last == BACKGROUND_MARKER => (rest, true),
            _ => (args, false),
        };
        if args.is_empty() {
            return Err(ScriptError::usage("exec", "program [args...] [&]"));
        }

        if background {
            let job = start(state, args, neg).map_err(ScriptError::process)?;
            state.stdout.clear();
            state.stderr.clear();
            state.background.push(job);
            return Ok(CmdResult::Ok);
        }

        run_foreground(state, args, neg)?;
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Run a program; a trailing & runs it in the background".into(),
            args: "program [args...] [&]".into(),
        }
    }
}

/// Run `args[0]` to completion, capturing its output into the session's
/// stdout/stderr and logging it. Fails when the outcome contradicts `neg`.
pub(crate) fn run_foreground(state: &mut State, args: &[String], neg: bool) -> Result<(), ScriptError> {
    if args.is_empty() {
        return Err(ScriptError::usage("exec", "program [args...] [&]"));
    }
    let outcome = match start(state, args, neg) {
        Ok(job) => job.wait(),
        Err(err) => JobOutcome {
            args: args.to_vec(),
            negate: neg,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(err),
        },
    };

    state.stdout = outcome.stdout.clone();
    state.stderr = outcome.stderr.clone();
    if !state.stdout.is_empty() {
        state.logf(&format!("[stdout]\n{}", outcome.stdout));
    }
    if !state.stderr.is_empty() {
        state.logf(&format!("[stderr]\n{}", outcome.stderr));
    }
    if let Some(ref err) = outcome.error {
        state.logf(&format!("[{}]", err));
    }

    match outcome.mismatch() {
        Some(msg) => Err(ScriptError::process(msg)),
        None => Ok(()),
    }
}

/// Spawn `args[0]` in the current directory with exactly the session's environment.
fn start(state: &State, args: &[String], neg: bool) -> Result<BackgroundJob, String> {
    let program = look_path(state, &args[0])?;

    let mut cmd = ProcessCommand::new(&program);
    cmd.args(&args[1..]);
    cmd.current_dir(&state.pwd);
    cmd.env_clear();
    cmd.envs(state.env.vars());

    BackgroundJob::spawn(&mut cmd, args.to_vec(), neg)
        .map_err(|e| format!("cannot run {}: {}", args[0], e))
}

/// Look up an executable by name using the script's PATH, not the host's.
///
/// Names containing a path separator are resolved against the current
/// directory instead of searched for.
fn look_path(state: &State, command: &str) -> Result<PathBuf, String> {
    if command.contains('/') || command.contains(std::path::MAIN_SEPARATOR) {
        return Ok(state.resolve_path(command));
    }

    #[cfg(windows)]
    let extensions: Vec<String> = std::env::var("PATHEXT")
        .unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string())
        .split(';')
        .map(|s| s.to_lowercase())
        .collect();

    for dir in std::env::split_paths(state.getenv("PATH")) {
        if dir.as_os_str().is_empty() {
            continue;
        }

        #[cfg(windows)]
        {
            let path = dir.join(command);
            if path.is_file() {
                return Ok(path);
            }
            for ext in &extensions {
                let with_ext = dir.join(format!("{}{}", command, ext));
                if with_ext.is_file() {
                    return Ok(with_ext);
                }
            }
        }

        #[cfg(not(windows))]
        {
            use std::os::unix::fs::PermissionsExt;
            let path = dir.join(command);
            if let Ok(meta) = std::fs::metadata(&path) {
                if meta.is_file() && meta.permissions().mode() & 0o111 != 0 {
                    return Ok(path);
                }
            }
        }
    }

    Err(format!("executable file not found in $PATH: {}", command))
}
