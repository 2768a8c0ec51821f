//! Environment commands: cd, env

use crate::engine::{Cmd, CmdResult, CmdUsage};
use crate::error::ScriptError;
use crate::state::State;

// ──────────────────────────────────────────────────────────
// cd: change directory
// ──────────────────────────────────────────────────────────

pub(super) struct CdCmd;

impl Cmd for CdCmd {
    fn run(&self, state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        if neg {
            return Err(ScriptError::unsupported_negation("cd"));
        }
        let [dir] = args else {
            return Err(ScriptError::usage("cd", "dir"));
        };

        state.chdir(dir)?;
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Change the current directory".into(),
            args: "dir".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// env: set/print environment variables
// ──────────────────────────────────────────────────────────

pub(super) struct EnvCmd;

impl Cmd for EnvCmd {
    fn run(&self, state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        if neg {
            return Err(ScriptError::unsupported_negation("env"));
        }

        match args {
            [] => {
                let entries: Vec<String> = state.env.entries().to_vec();
                for entry in &entries {
                    state.logf(entry);
                }
                Ok(CmdResult::Ok)
            }
            [assignment] => {
                let Some((key, value)) = assignment.split_once('=') else {
                    return Err(ScriptError::usage("env", "[key=value]"));
                };
                state.setenv(key, value);
                Ok(CmdResult::Ok)
            }
            _ => Err(ScriptError::usage("env", "[key=value]")),
        }
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Log the environment, or set one variable".into(),
            args: "[key=value]".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::testutil::{run, state};
    use crate::error::ErrorKind;

    #[test]
    fn test_cd_changes_pwd() {
        let (tmp, mut state) = state();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        run(&mut state, false, "cd sub").unwrap();
        assert_eq!(state.pwd, tmp.path().join("sub"));
    }

    #[test]
    fn test_cd_errors() {
        let (_tmp, mut state) = state();
        assert_eq!(run(&mut state, false, "cd").unwrap_err().kind, ErrorKind::UsageError);
        assert!(run(&mut state, false, "cd missing").is_err());
        let err = run(&mut state, true, "cd .").unwrap_err();
        assert_eq!(err.message, "unsupported: ! cd");
    }

    #[test]
    fn test_env_set_and_log() {
        let (_tmp, mut state) = state();
        run(&mut state, false, "env GREETING=hello=world").unwrap();
        assert_eq!(state.getenv("GREETING"), "hello=world");
        run(&mut state, false, "env").unwrap();
        assert!(state.log().lines().any(|l| l == "GREETING=hello=world"));
    }

    #[test]
    fn test_env_usage() {
        let (_tmp, mut state) = state();
        assert!(run(&mut state, false, "env NOEQUALS").is_err());
        assert!(run(&mut state, false, "env A=1 B=2").is_err());
        assert!(run(&mut state, true, "env").is_err());
    }
}
