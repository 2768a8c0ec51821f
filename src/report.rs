//! Reporting sink
//!
//! The interpreter never aborts the process. It records outcomes on a
//! [`Reporter`] and returns; whoever owns the sink decides what a failure
//! means for the rest of the run.

use std::fmt;

/// Pass/fail/skip bookkeeping consumed by a script session.
pub trait Reporter {
    /// Mark the script skipped. Not a failure.
    fn skip(&mut self, msg: &str);

    /// Mark the script failed.
    fn fail(&mut self, msg: &str);

    /// Record a log line.
    fn log(&mut self, msg: &str);

    /// Whether `fail` has been called.
    fn has_failed(&self) -> bool;

    fn failf(&mut self, args: fmt::Arguments<'_>) {
        self.fail(&args.to_string());
    }

    fn logf(&mut self, args: fmt::Arguments<'_>) {
        self.log(&args.to_string());
    }
}

/// Recording sink for one script, used by the run orchestrator.
#[derive(Debug, Default, Clone)]
pub struct CaseReport {
    /// Failure messages, in the order reported
    pub failures: Vec<String>,
    /// Skip reason, if the script skipped itself
    pub skipped: Option<String>,
    /// Everything logged
    pub log: String,
}

impl CaseReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    /// The first failure, which is the one that stopped the script.
    pub fn first_failure(&self) -> Option<&str> {
        self.failures.first().map(|s| s.as_str())
    }
}

impl Reporter for CaseReport {
    fn skip(&mut self, msg: &str) {
        self.skipped = Some(msg.to_string());
    }

    fn fail(&mut self, msg: &str) {
        self.failures.push(msg.to_string());
    }

    fn log(&mut self, msg: &str) {
        self.log.push_str(msg);
        if !msg.ends_with('\n') {
            self.log.push('\n');
        }
    }

    fn has_failed(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_report_records_outcomes() {
        let mut r = CaseReport::new();
        assert!(!r.has_failed());
        r.logf(format_args!("line {}", 1));
        r.failf(format_args!("script:{}: boom", 2));
        r.fail("second");
        assert!(r.has_failed());
        assert_eq!(r.first_failure(), Some("script:2: boom"));
        assert_eq!(r.log, "line 1\n");
    }

    #[test]
    fn test_skip_is_not_failure() {
        let mut r = CaseReport::new();
        r.skip("not today");
        assert!(r.is_skipped());
        assert!(!r.has_failed());
    }
}
