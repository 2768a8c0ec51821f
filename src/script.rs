//! Script session
//!
//! One [`Session`] runs one script file from setup to finalize. It allocates
//! the work directory, seeds the environment, runs the setup hook, extracts
//! archive files, then feeds the script body through the parser and the
//! engine one line at a time. Outcomes go to a [`Reporter`]; nothing here
//! aborts the process.

use std::path::{Path, PathBuf};
use crate::archive;
use crate::conditions::ConditionEvaluator;
use crate::engine::{CmdResult, Dispatch, Engine};
use crate::error::{ErrorKind, ScriptError};
use crate::parser::{parse_command, parse_line};
use crate::report::Reporter;
use crate::runner::{RunConfig, SetupEnv};
use crate::state::State;

#[cfg(windows)]
const HOME_VAR: &str = "USERPROFILE";
#[cfg(not(windows))]
const HOME_VAR: &str = "HOME";

#[cfg(windows)]
const TMP_VAR: &str = "TMP";
#[cfg(not(windows))]
const TMP_VAR: &str = "TMPDIR";

const EXE_SUFFIX: &str = if cfg!(windows) { ".exe" } else { "" };

/// Script name derived from the file's base name without its extension.
pub fn script_name(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "script".to_string())
}

/// Run one script file to completion and finalize it.
///
/// Returns the work directory when it was kept for inspection.
pub fn run_script(
    engine: &Engine,
    config: &RunConfig,
    file: &Path,
    reporter: &mut dyn Reporter,
) -> Option<PathBuf> {
    let session = match Session::new(engine, config, file) {
        Ok(session) => session,
        Err(e) => {
            reporter.fail(&e.to_string());
            return None;
        }
    };
    session.run(reporter)
}

/// The state machine for one script.
pub struct Session<'a> {
    engine: &'a Engine,
    config: &'a RunConfig,
    file: PathBuf,
    display_name: String,
    preserve: bool,
    state: State,
}

impl<'a> Session<'a> {
    /// Allocate the work directory. Nothing else happens until [`Session::run`].
    pub fn new(engine: &'a Engine, config: &'a RunConfig, file: &Path) -> Result<Self, ScriptError> {
        let name = script_name(file);
        let workdir = create_workdir(config, &name)?;
        tracing::debug!(script = %name, workdir = %workdir.display(), "session created");

        Ok(Self {
            engine,
            config,
            file: file.to_path_buf(),
            display_name: file.display().to_string(),
            preserve: config.preserve_work || config.workdir_root.is_some(),
            state: State::new(workdir),
        })
    }

    /// Work directory of this session.
    pub fn workdir(&self) -> &Path {
        &self.state.workdir
    }

    /// Set up, execute, and finalize. Finalize runs however the script ended.
    pub fn run(mut self, reporter: &mut dyn Reporter) -> Option<PathBuf> {
        match self.setup() {
            Ok(script) => self.execute(&script, reporter),
            Err(e) => reporter.fail(&e.to_string()),
        }
        self.finalize(reporter)
    }

    /// Seed the environment, run the setup hook, and extract archive files.
    /// Returns the script body.
    fn setup(&mut self) -> Result<String, ScriptError> {
        let tmp = self.state.workdir.join("tmp");
        std::fs::create_dir_all(&tmp).map_err(|e| {
            ScriptError::environment(format!("mkdir {}: {}", tmp.display(), e))
        })?;
        self.state.env.replace(initial_env(&self.state.workdir, &tmp));

        let data = std::fs::read_to_string(&self.file).map_err(|e| {
            ScriptError::new(ErrorKind::Io, format!("{}: {}", self.display_name, e))
        })?;
        let archive = archive::decode(&data)?;

        if let Some(ref setup) = self.config.setup {
            let mut env = SetupEnv {
                work_dir: self.state.workdir.clone(),
                values: self.state.env.entries().to_vec(),
            };
            setup(&mut env).map_err(|e| ScriptError::environment(format!("setup failed: {}", e)))?;
            self.state.env.replace(env.values);
        }

        self.state.extract_files(&archive)?;
        Ok(archive.comment)
    }

    fn execute(&mut self, script: &str, reporter: &mut dyn Reporter) {
        let engine = self.engine;
        let config = self.config;
        let conditions = ConditionEvaluator::new(&engine.conditions, config.condition.as_deref(), config.short);

        for line in script.lines() {
            self.state.lineno += 1;
            match self.step(line, &conditions) {
                Ok(CmdResult::Ok) => {}
                Ok(CmdResult::Stop(msg)) => {
                    self.state.stopped = true;
                    if msg.is_empty() {
                        self.state.logf("stop");
                    } else {
                        self.state.logf(&format!("stop: {}", msg));
                    }
                }
                Ok(CmdResult::Skip(reason)) => {
                    if !reason.is_empty() {
                        self.state.logf(&format!("skip: {}", reason));
                    }
                    reporter.skip(&reason);
                    break;
                }
                Err(e) => {
                    let e = e.with_location(self.display_name.clone(), self.state.lineno);
                    self.state.logf(&format!("FAIL: {}", e));
                    reporter.fail(&e.to_string());
                }
            }
            if reporter.has_failed() || self.state.stopped {
                break;
            }
        }
    }

    /// Process one physical line.
    fn step(&mut self, raw: &str, conditions: &ConditionEvaluator<'_>) -> Result<CmdResult, ScriptError> {
        let Some(line) = parse_line(raw)? else {
            return Ok(CmdResult::Ok);
        };
        if let Some(cond) = line.condition {
            if !conditions.evaluate(cond)? {
                return Ok(CmdResult::Ok);
            }
        }

        let expanded = self.state.env.expand(line.text);
        let Some(parsed) = parse_command(&expanded)? else {
            return Ok(CmdResult::Ok);
        };

        self.state.line = raw.trim().to_string();
        self.state.logf(&format!("> {}", self.state.line));

        let engine = self.engine;
        let name = parsed.name().to_string();
        let negate = parsed.negate();
        let result = match engine.resolve(&name, self.config.require_explicit_exec) {
            Some(Dispatch::Builtin(cmd)) | Some(Dispatch::User(cmd)) => {
                tracing::debug!(command = %name, negate, "dispatch");
                cmd.run(&mut self.state, negate, parsed.args())
            }
            Some(Dispatch::ImplicitExec(exec)) => {
                tracing::debug!(command = %name, negate, "implicit exec");
                exec.run(&mut self.state, negate, parsed.argv())
            }
            None => Err(ScriptError::new(ErrorKind::UsageError, "unknown command")),
        };
        result.map_err(|e| e.with_command(name).with_args(parsed.args().to_vec()))
    }

    /// Reap leftover jobs, then remove or keep the work directory. Consumes
    /// the session so it can only happen once.
    fn finalize(mut self, reporter: &mut dyn Reporter) -> Option<PathBuf> {
        let reaped = self.state.background.cancel_all();
        if reaped > 0 {
            tracing::warn!(script = %self.display_name, jobs = reaped, "killed background jobs that were never waited for");
            self.state.logf(&format!("killed {} unwaited background job(s)", reaped));
        }

        let workdir = self.state.workdir.clone();
        let kept = if self.preserve {
            self.state.logf(&format!("work directory: {}", workdir.display()));
            Some(workdir)
        } else {
            if let Err(e) = std::fs::remove_dir_all(&workdir) {
                tracing::warn!(workdir = %workdir.display(), error = %e, "failed to remove work directory");
                self.state.logf(&format!("cannot remove work directory {}: {}", workdir.display(), e));
            }
            None
        };

        let log = self.state.take_log();
        if !log.is_empty() {
            reporter.log(&log);
        }
        tracing::debug!(script = %self.display_name, elapsed = ?self.state.start.elapsed(), "session finalized");
        kept
    }
}

fn create_workdir(config: &RunConfig, name: &str) -> Result<PathBuf, ScriptError> {
    let prefix = format!("tsar-{}-", name);
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).disable_cleanup(true);
    let dir = match config.workdir_root {
        Some(ref root) => {
            std::fs::create_dir_all(root).map_err(|e| {
                ScriptError::environment(format!("mkdir {}: {}", root.display(), e))
            })?;
            builder.tempdir_in(root)
        }
        None => builder.tempdir(),
    }
    .map_err(|e| ScriptError::environment(format!("cannot create work directory: {}", e)))?;
    Ok(dir.path().to_path_buf())
}

fn initial_env(workdir: &Path, tmp: &Path) -> Vec<String> {
    let mut env = vec![
        format!("WORK={}", workdir.display()),
        format!("PATH={}", std::env::var("PATH").unwrap_or_default()),
        format!("{}=/no-home", HOME_VAR),
        format!("{}={}", TMP_VAR, tmp.display()),
        format!("exe={}", EXE_SUFFIX),
    ];
    // processes on Windows cannot start without it
    env.extend(
        std::env::var("SYSTEMROOT")
            .ok()
            .filter(|_| cfg!(windows))
            .map(|root| format!("SYSTEMROOT={}", root)),
    );
    env
}
