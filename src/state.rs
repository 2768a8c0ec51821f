//! Script execution state
//!
//! Holds the mutable per-session state: work directory, current directory,
//! environment, the last captured output, the log, and background jobs.
//! Built-in and user commands receive `&mut State`.

use std::path::{Path, PathBuf};
use std::time::Instant;
use crate::archive::Archive;
use crate::background::Jobs;
use crate::env::Environment;
use crate::error::ScriptError;

/// Upper bound on the in-memory log, in bytes.
const LOG_LIMIT: usize = 1 << 20;

/// Mutable state for a single script session
pub struct State {
    /// The session's work directory (`$WORK`)
    pub workdir: PathBuf,
    /// Current directory, changed by `cd`; initially `workdir`
    pub pwd: PathBuf,
    /// Environment snapshot
    pub env: Environment,
    /// Standard output of the last `exec` (or `wait`)
    pub stdout: String,
    /// Standard error of the last `exec` (or `wait`)
    pub stderr: String,
    /// Set by `stop`; no further lines run
    pub stopped: bool,
    /// 1-based number of the line being processed
    pub lineno: usize,
    /// Text of the line being processed
    pub line: String,
    /// When the session started
    pub start: Instant,
    /// Background jobs not yet harvested by `wait`
    pub background: Jobs,
    log: String,
}

impl State {
    /// Create a new State rooted at `workdir` with an empty environment
    pub fn new(workdir: PathBuf) -> Self {
        let pwd = workdir.clone();
        Self {
            workdir,
            pwd,
            env: Environment::new(),
            stdout: String::new(),
            stderr: String::new(),
            stopped: false,
            lineno: 0,
            line: String::new(),
            start: Instant::now(),
            background: Jobs::new(),
            log: String::new(),
        }
    }

    /// Value of an environment variable, empty if unset.
    pub fn getenv(&self, key: &str) -> &str {
        self.env.get(key)
    }

    /// Set an environment variable for the rest of the script.
    pub fn setenv(&mut self, key: &str, value: &str) {
        self.env.set(key, value);
    }

    /// Make `path` absolute, relative to the work directory.
    pub fn mkabs(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            clean_path(p)
        } else {
            clean_path(&self.workdir.join(p))
        }
    }

    /// Resolve `path` relative to the current directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            clean_path(p)
        } else {
            clean_path(&self.pwd.join(p))
        }
    }

    /// Change the current directory.
    pub fn chdir(&mut self, dir: &str) -> Result<(), ScriptError> {
        let target = self.resolve_path(dir);
        let meta = std::fs::metadata(&target).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScriptError::environment(format!("directory {} does not exist", target.display()))
            } else {
                ScriptError::environment(format!("{}: {}", target.display(), e))
            }
        })?;
        if !meta.is_dir() {
            return Err(ScriptError::environment(format!(
                "{} is not a directory",
                target.display()
            )));
        }
        self.pwd = target;
        Ok(())
    }

    /// Read a file relative to the work directory.
    /// Line endings are normalized to LF.
    pub fn read_file(&self, name: &str) -> Result<String, ScriptError> {
        let path = self.mkabs(name);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ScriptError::new(crate::error::ErrorKind::Io, format!("{}: {}", name, e))
        })?;
        Ok(content.replace("\r\n", "\n"))
    }

    /// Run a program in the foreground exactly as the `exec` command does:
    /// looked up on the session's PATH, started in the current directory with
    /// the session's environment. Its output replaces `stdout` and `stderr`,
    /// and a non-zero exit or spawn failure is an error.
    pub fn exec(&mut self, program: &str, args: &[String]) -> Result<(), ScriptError> {
        let argv: Vec<String> = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect();
        crate::commands::run_foreground(self, &argv, false)
    }

    /// Write the archive's files into the work directory, creating parents.
    /// Names that would land outside the work directory are rejected.
    pub fn extract_files(&self, archive: &Archive) -> Result<(), ScriptError> {
        for file in &archive.files {
            let path = self.mkabs(&file.name);
            if !path.starts_with(&self.workdir) {
                return Err(ScriptError::environment(format!(
                    "archive file {:?} escapes the work directory",
                    file.name
                )));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ScriptError::environment(format!("mkdir {}: {}", parent.display(), e))
                })?;
            }
            std::fs::write(&path, &file.data).map_err(|e| {
                ScriptError::environment(format!("write {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }

    /// Write a log entry. The log keeps roughly the most recent `LOG_LIMIT` bytes.
    pub fn logf(&mut self, msg: &str) {
        self.log.push_str(msg);
        if !msg.ends_with('\n') {
            self.log.push('\n');
        }
        if self.log.len() > LOG_LIMIT {
            let mut cut = self.log.len() - LOG_LIMIT / 2;
            while !self.log.is_char_boundary(cut) {
                cut += 1;
            }
            self.log = format!("[log truncated]\n{}", &self.log[cut..]);
        }
    }

    /// The log so far.
    pub fn log(&self) -> &str {
        &self.log
    }

    /// Take the log, leaving it empty.
    pub fn take_log(&mut self) -> String {
        std::mem::take(&mut self.log)
    }
}

/// Clean a path by resolving `.` and `..` components lexically.
///
/// Unlike `canonicalize()`, this does not require the path to exist.
fn clean_path(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut result = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                result.push(component);
                depth = 0;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    result.pop();
                    depth -= 1;
                } else if !result.has_root() {
                    result.push("..");
                }
            }
            Component::Normal(part) => {
                result.push(part);
                depth += 1;
            }
        }
    }
    if result.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_mkabs_is_relative_to_workdir() {
        let mut state = State::new(PathBuf::from("/work"));
        state.pwd = PathBuf::from("/work/sub");
        assert_eq!(state.mkabs("a/b.txt"), PathBuf::from("/work/a/b.txt"));
        assert_eq!(state.resolve_path("a"), PathBuf::from("/work/sub/a"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_fills_output_buffers() {
        let tmp = tempfile::tempdir().unwrap();
        let mut state = State::new(tmp.path().to_path_buf());
        state.setenv("PATH", &std::env::var("PATH").unwrap_or_default());
        state.setenv("WHO", "session");
        state.exec("sh", &["-c".into(), "echo $WHO; echo oops >&2".into()]).unwrap();
        assert_eq!(state.stdout, "session\n");
        assert_eq!(state.stderr, "oops\n");

        let err = state.exec("false", &[]).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ProcessError);
        assert!(state.exec("definitely-not-a-program-xyz", &[]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean_path(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(clean_path(Path::new("a/../..")), PathBuf::from(".."));
        assert_eq!(clean_path(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn test_chdir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("file"), "x").unwrap();
        let mut state = State::new(tmp.path().to_path_buf());

        state.chdir("sub").unwrap();
        assert_eq!(state.pwd, tmp.path().join("sub"));

        let err = state.chdir("missing").unwrap_err();
        assert!(err.message.contains("does not exist"));

        state.chdir("..").unwrap();
        let err = state.chdir("file").unwrap_err();
        assert!(err.message.contains("is not a directory"));
    }

    #[test]
    fn test_extract_files_creates_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let state = State::new(tmp.path().to_path_buf());
        let archive = crate::archive::Archive {
            comment: String::new(),
            files: vec![crate::archive::ArchiveFile {
                name: "a/b/c.txt".into(),
                data: b"hello".to_vec(),
            }],
        };
        state.extract_files(&archive).unwrap();
        assert_eq!(std::fs::read_to_string(tmp.path().join("a/b/c.txt")).unwrap(), "hello");
    }

    #[test]
    fn test_extract_files_rejects_escape() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("work");
        std::fs::create_dir(&work).unwrap();
        let state = State::new(work);
        let archive = crate::archive::Archive {
            comment: String::new(),
            files: vec![crate::archive::ArchiveFile {
                name: "../evil.txt".into(),
                data: Vec::new(),
            }],
        };
        assert!(state.extract_files(&archive).is_err());
        assert!(!tmp.path().join("evil.txt").exists());
    }

    #[test]
    fn test_log_is_bounded() {
        let mut state = State::new(PathBuf::from("/work"));
        let chunk = "x".repeat(1024);
        for _ in 0..(2 * 1024) {
            state.logf(&chunk);
        }
        assert!(state.log().len() <= LOG_LIMIT);
        assert!(state.log().starts_with("[log truncated]"));
        assert!(state.take_log().len() > 0);
        assert!(state.log().is_empty());
    }
}
