//! File operation commands: exists, cp, mkdir, rm
//!
//! Relative paths are taken from the work directory, not the current one.

use std::path::Path;
use crate::engine::{Cmd, CmdResult, CmdUsage};
use crate::error::{ErrorKind, ScriptError};
use crate::state::State;

// ──────────────────────────────────────────────────────────
// exists: check if files exist
// ──────────────────────────────────────────────────────────

pub(super) struct ExistsCmd;

impl Cmd for ExistsCmd {
    fn run(&self, state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        if args.is_empty() {
            return Err(ScriptError::usage("exists", "file..."));
        }

        for file in args {
            let path = state.mkabs(file);
            let exists = std::fs::metadata(&path).is_ok();
            match (exists, neg) {
                (false, false) => {
                    return Err(ScriptError::assertion(format!(
                        "file {} does not exist",
                        path.display()
                    )));
                }
                (true, true) => {
                    return Err(ScriptError::assertion(format!(
                        "file {} exists unexpectedly",
                        path.display()
                    )));
                }
                _ => {}
            }
        }

        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Check that files exist".into(),
            args: "file...".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// cp: copy files
// ──────────────────────────────────────────────────────────

pub(super) struct CpCmd;

impl Cmd for CpCmd {
    fn run(&self, state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        if neg {
            return Err(ScriptError::unsupported_negation("cp"));
        }
        let Some((dst, srcs)) = args.split_last().filter(|(_, srcs)| !srcs.is_empty()) else {
            return Err(ScriptError::usage("cp", "src... dst"));
        };

        let dst_path = state.mkabs(dst);
        let dst_is_dir = dst_path.is_dir();
        if srcs.len() > 1 && !dst_is_dir {
            return Err(ScriptError::new(
                ErrorKind::Io,
                format!("cp: destination {} is not a directory", dst_path.display()),
            ));
        }

        for src in srcs {
            // "stdout" and "stderr" name the last captured output
            let (data, mode) = match src.as_str() {
                "stdout" => (state.stdout.as_bytes().to_vec(), 0o666),
                "stderr" => (state.stderr.as_bytes().to_vec(), 0o666),
                _ => {
                    let src_path = state.mkabs(src);
                    let data = std::fs::read(&src_path).map_err(|e| {
                        ScriptError::new(ErrorKind::Io, format!("cp: {}: {}", src, e))
                    })?;
                    (data, file_mode(&src_path))
                }
            };

            let target = if dst_is_dir {
                let name = Path::new(src.as_str())
                    .file_name()
                    .unwrap_or_else(|| std::ffi::OsStr::new(src.as_str()));
                dst_path.join(name)
            } else {
                dst_path.clone()
            };

            std::fs::write(&target, &data).map_err(|e| {
                ScriptError::new(ErrorKind::Io, format!("cp: write {}: {}", target.display(), e))
            })?;
            set_file_mode(&target, mode)?;
        }

        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Copy files; stdout and stderr name the last captured output".into(),
            args: "src... dst".into(),
        }
    }
}

#[cfg(unix)]
fn file_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o777)
        .unwrap_or(0o666)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> u32 {
    0o666
}

#[cfg(unix)]
fn set_file_mode(path: &Path, mode: u32) -> Result<(), ScriptError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
        ScriptError::new(ErrorKind::Io, format!("cp: chmod {}: {}", path.display(), e))
    })
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path, _mode: u32) -> Result<(), ScriptError> {
    Ok(())
}

// ──────────────────────────────────────────────────────────
// mkdir: create directories
// ──────────────────────────────────────────────────────────

pub(super) struct MkdirCmd;

impl Cmd for MkdirCmd {
    fn run(&self, state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        if neg {
            return Err(ScriptError::unsupported_negation("mkdir"));
        }
        if args.is_empty() {
            return Err(ScriptError::usage("mkdir", "dir..."));
        }

        for dir in args {
            let path = state.mkabs(dir);
            std::fs::create_dir_all(&path).map_err(|e| {
                ScriptError::new(ErrorKind::Io, format!("mkdir {}: {}", path.display(), e))
            })?;
        }

        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Create directories and missing parents".into(),
            args: "dir...".into(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// rm: remove files/directories
// ──────────────────────────────────────────────────────────

pub(super) struct RmCmd;

impl Cmd for RmCmd {
    fn run(&self, state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        if neg {
            return Err(ScriptError::unsupported_negation("rm"));
        }
        if args.is_empty() {
            return Err(ScriptError::usage("rm", "file..."));
        }

        for file in args {
            let path = state.mkabs(file);
            let result = match std::fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&path),
                Ok(_) => std::fs::remove_file(&path),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(ScriptError::new(
                        ErrorKind::Io,
                        format!("rm {}: {}", path.display(), e),
                    ));
                }
            }
        }

        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Remove files or directories recursively".into(),
            args: "file...".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::testutil::{run, state};
    use crate::error::ErrorKind;

    #[test]
    fn test_exists_and_negation() {
        let (tmp, mut state) = state();
        std::fs::write(tmp.path().join("a.txt"), "x").unwrap();
        run(&mut state, false, "exists a.txt").unwrap();
        run(&mut state, true, "exists b.txt").unwrap();

        let err = run(&mut state, false, "exists b.txt").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AssertionFailure);
        assert!(err.message.contains("does not exist"));
        let err = run(&mut state, true, "exists a.txt").unwrap_err();
        assert!(err.message.contains("exists unexpectedly"));
    }

    #[test]
    fn test_paths_are_relative_to_workdir() {
        let (tmp, mut state) = state();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        state.chdir("sub").unwrap();
        run(&mut state, false, "mkdir made").unwrap();
        assert!(tmp.path().join("made").is_dir());
        assert!(!tmp.path().join("sub/made").exists());
    }

    #[test]
    fn test_rm_removes_trees_and_ignores_missing() {
        let (tmp, mut state) = state();
        run(&mut state, false, "mkdir d/e/f").unwrap();
        std::fs::write(tmp.path().join("d/e/f/x"), "x").unwrap();
        std::fs::write(tmp.path().join("file"), "x").unwrap();
        run(&mut state, false, "rm d file never-existed").unwrap();
        assert!(!tmp.path().join("d").exists());
        assert!(!tmp.path().join("file").exists());
    }

    #[test]
    fn test_rm_then_exists() {
        let (tmp, mut state) = state();
        std::fs::write(tmp.path().join("f"), "x").unwrap();
        run(&mut state, false, "exists f").unwrap();
        run(&mut state, false, "rm f").unwrap();
        run(&mut state, true, "exists f").unwrap();
    }

    #[test]
    fn test_cp_single_and_into_dir() {
        let (tmp, mut state) = state();
        std::fs::write(tmp.path().join("a"), "aaa").unwrap();
        std::fs::write(tmp.path().join("b"), "bbb").unwrap();
        run(&mut state, false, "cp a c").unwrap();
        assert_eq!(std::fs::read_to_string(tmp.path().join("c")).unwrap(), "aaa");

        run(&mut state, false, "mkdir out").unwrap();
        run(&mut state, false, "cp a b out").unwrap();
        assert_eq!(std::fs::read_to_string(tmp.path().join("out/b")).unwrap(), "bbb");
    }

    #[test]
    fn test_cp_stdout_source() {
        let (tmp, mut state) = state();
        state.stdout = "captured\n".into();
        run(&mut state, false, "cp stdout got.txt").unwrap();
        assert_eq!(std::fs::read_to_string(tmp.path().join("got.txt")).unwrap(), "captured\n");
    }

    #[test]
    fn test_cp_errors() {
        let (tmp, mut state) = state();
        std::fs::write(tmp.path().join("a"), "a").unwrap();
        assert_eq!(run(&mut state, false, "cp a").unwrap_err().kind, ErrorKind::UsageError);
        assert!(run(&mut state, false, "cp a a notadir").is_err());
        assert!(run(&mut state, false, "cp missing x").is_err());
        assert!(run(&mut state, true, "cp a x").is_err());
    }

    #[test]
    fn test_negation_rejected() {
        let (_tmp, mut state) = state();
        assert_eq!(run(&mut state, true, "mkdir x").unwrap_err().message, "unsupported: ! mkdir");
        assert_eq!(run(&mut state, true, "rm x").unwrap_err().message, "unsupported: ! rm");
    }
}
