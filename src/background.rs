//! Background jobs
//!
//! Every `exec` spawns a child with piped output. A foreground `exec` joins
//! it straight away; a backgrounded one is parked in [`Jobs`] until `wait`
//! joins it or the session's finalize cancels it. Output is drained by one
//! reader thread per stream so a chatty child never blocks on a full pipe.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

/// A spawned process whose output is being collected.
pub struct BackgroundJob {
    /// Program and arguments, for the log
    pub args: Vec<String>,
    /// Whether the line was negated (`!`), i.e. the process should fail
    pub negate: bool,
    child: Child,
    stdout: Option<JoinHandle<Vec<u8>>>,
    stderr: Option<JoinHandle<Vec<u8>>>,
}

/// What a job produced once it completed.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub args: Vec<String>,
    pub negate: bool,
    pub stdout: String,
    pub stderr: String,
    /// `None` if the process exited successfully
    pub error: Option<String>,
}

impl JobOutcome {
    /// Describe the mismatch between how the job ended and how it was expected to end.
    pub fn mismatch(&self) -> Option<String> {
        match (&self.error, self.negate) {
            (Some(err), false) => Some(format!("unexpected command failure: {}", err)),
            (None, true) => Some("unexpected command success".to_string()),
            _ => None,
        }
    }
}

impl BackgroundJob {
    /// Spawn `cmd` with stdout/stderr captured.
    pub fn spawn(cmd: &mut Command, args: Vec<String>, negate: bool) -> std::io::Result<Self> {
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        tracing::debug!(pid = child.id(), program = %args.first().map(String::as_str).unwrap_or(""), "spawned");

        Ok(Self {
            args,
            negate,
            child,
            stdout,
            stderr,
        })
    }

    /// Whether the process has already exited.
    pub fn is_finished(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Block until the process exits and collect its output.
    pub fn wait(mut self) -> JobOutcome {
        let status = self.child.wait();
        self.finish(status, true)
    }

    /// Kill the process if it is still running, then reap it.
    pub fn cancel(mut self) -> JobOutcome {
        if !self.is_finished() {
            if let Err(e) = self.child.kill() {
                tracing::warn!(pid = self.child.id(), error = %e, "failed to kill background job");
            }
        }
        let status = self.child.wait();
        self.finish(status, false)
    }

    /// Collect the outcome. Without `block`, a reader still held open by a
    /// grandchild of the killed process is detached instead of joined.
    fn finish(mut self, status: std::io::Result<ExitStatus>, block: bool) -> JobOutcome {
        let stdout = join_output(self.stdout.take(), block);
        let stderr = join_output(self.stderr.take(), block);
        let error = match status {
            Ok(status) if status.success() => None,
            Ok(status) => Some(status.to_string()),
            Err(e) => Some(e.to_string()),
        };
        JobOutcome {
            args: std::mem::take(&mut self.args),
            negate: self.negate,
            stdout,
            stderr,
            error,
        }
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = reader.read_to_end(&mut buf) {
            tracing::warn!(error = %e, read = buf.len(), "background output read failed");
        }
        buf
    })
}

fn join_output(handle: Option<JoinHandle<Vec<u8>>>, block: bool) -> String {
    handle
        .filter(|h| block || h.is_finished())
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

/// The background jobs owned by one session, oldest first.
#[derive(Default)]
pub struct Jobs {
    jobs: Vec<BackgroundJob>,
}

impl Jobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, job: BackgroundJob) {
        self.jobs.push(job);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Join every pending job in creation order.
    pub fn wait_all(&mut self) -> Vec<JobOutcome> {
        std::mem::take(&mut self.jobs)
            .into_iter()
            .map(BackgroundJob::wait)
            .collect()
    }

    /// Kill and reap every pending job. Returns how many were still pending.
    pub fn cancel_all(&mut self) -> usize {
        let pending = std::mem::take(&mut self.jobs);
        let count = pending.len();
        for job in pending {
            let outcome = job.cancel();
            tracing::debug!(args = ?outcome.args, "reaped unwaited background job");
        }
        count
    }
}

impl Drop for Jobs {
    fn drop(&mut self) {
        // never leave children behind, even if finalize was skipped by a panic
        self.cancel_all();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn test_wait_collects_output() {
        let job = BackgroundJob::spawn(&mut sh("echo out; echo err >&2"), vec!["sh".into()], false).unwrap();
        let outcome = job.wait();
        assert_eq!(outcome.stdout, "out\n");
        assert_eq!(outcome.stderr, "err\n");
        assert!(outcome.error.is_none());
        assert!(outcome.mismatch().is_none());
    }

    #[test]
    fn test_negated_failure_matches() {
        let job = BackgroundJob::spawn(&mut sh("exit 3"), vec!["sh".into()], true).unwrap();
        let outcome = job.wait();
        assert!(outcome.error.is_some());
        assert!(outcome.mismatch().is_none());
    }

    #[test]
    fn test_mismatch_messages() {
        let ok = BackgroundJob::spawn(&mut sh("true"), vec![], true).unwrap().wait();
        assert_eq!(ok.mismatch().as_deref(), Some("unexpected command success"));
        let bad = BackgroundJob::spawn(&mut sh("exit 1"), vec![], false).unwrap().wait();
        assert!(bad.mismatch().unwrap().starts_with("unexpected command failure"));
    }

    #[test]
    fn test_wait_all_is_fifo() {
        let mut jobs = Jobs::new();
        jobs.push(BackgroundJob::spawn(&mut sh("sleep 0.2; echo first"), vec!["a".into()], false).unwrap());
        jobs.push(BackgroundJob::spawn(&mut sh("echo second"), vec!["b".into()], false).unwrap());
        let outcomes = jobs.wait_all();
        assert!(jobs.is_empty());
        assert_eq!(outcomes[0].stdout, "first\n");
        assert_eq!(outcomes[1].stdout, "second\n");
    }

    struct FailingReader {
        sent: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.sent {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"));
            }
            self.sent = true;
            buf[..4].copy_from_slice(b"part");
            Ok(4)
        }
    }

    #[test]
    fn test_drain_keeps_output_read_before_error() {
        let handle = drain(FailingReader { sent: false });
        assert_eq!(join_output(Some(handle), true), "part");
    }

    #[test]
    fn test_cancel_all_kills_running_jobs() {
        let mut jobs = Jobs::new();
        let mut sleep = Command::new("sleep");
        sleep.arg("30");
        jobs.push(BackgroundJob::spawn(&mut sleep, vec!["sleep".into()], false).unwrap());
        let start = Instant::now();
        assert_eq!(jobs.cancel_all(), 1);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(jobs.len(), 0);
    }
}
