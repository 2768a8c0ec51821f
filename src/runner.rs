//! Test runner
//!
//! Orchestrates a run: finds `.tsar` files (or takes an explicit list), checks
//! name uniqueness, runs each script in its own session, one at a time, and
//! collects the results.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use crate::conditions::ConditionFn;
use crate::engine::Engine;
use crate::error::{ErrorKind, ScriptError};
use crate::report::{CaseReport, Reporter};
use crate::script::{run_script, script_name};

/// Error type returned by setup hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Setup hook, run after the environment is seeded and before archive files are extracted.
pub type SetupFn = dyn Fn(&mut SetupEnv) -> Result<(), BoxError> + Send + Sync;

/// Configuration for the test runner
pub struct RunConfig {
    /// Directory containing test scripts
    pub dir: PathBuf,
    /// Explicit script files; when non-empty, `dir` is not scanned
    pub files: Vec<PathBuf>,
    /// Keep work directories after each script
    pub preserve_work: bool,
    /// Parent for work directories. Setting it implies `preserve_work`.
    pub workdir_root: Option<PathBuf>,
    /// Setup function called before each script
    pub setup: Option<Box<SetupFn>>,
    /// Replaces the built-in conditions when set
    pub condition: Option<Box<ConditionFn>>,
    /// Unknown command names fail instead of running as programs
    pub require_explicit_exec: bool,
    /// Two scripts with the same name fail the run before anything executes
    pub require_unique_names: bool,
    /// Keep running after a script fails
    pub continue_on_error: bool,
    /// Short mode, visible to scripts as the `short` condition
    pub short: bool,
    /// Verbose mode: report logs of passing scripts too
    pub verbose: bool,
    /// Only run scripts whose name contains this
    pub filter: Option<String>,
    /// Script file extension, including the dot
    pub extension: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("testdata"),
            files: Vec::new(),
            preserve_work: false,
            workdir_root: None,
            setup: None,
            condition: None,
            require_explicit_exec: false,
            require_unique_names: false,
            continue_on_error: false,
            short: false,
            verbose: false,
            filter: None,
            extension: ".tsar".into(),
        }
    }
}

/// Environment handed to the setup hook
pub struct SetupEnv {
    /// The script's work directory
    pub work_dir: PathBuf,
    /// `KEY=VALUE` entries; they become the script's environment
    pub values: Vec<String>,
}

impl SetupEnv {
    /// Value of `key`, empty if unset. The last entry wins.
    pub fn getenv(&self, key: &str) -> &str {
        self.values
            .iter()
            .rev()
            .find_map(|kv| kv.strip_prefix(key).and_then(|rest| rest.strip_prefix('=')))
            .unwrap_or("")
    }

    /// Append `key=value`.
    pub fn setenv(&mut self, key: &str, value: &str) {
        self.values.push(format!("{}={}", key, value));
    }
}

/// Result of running all tests
#[derive(Debug)]
pub struct TestResult {
    /// Results of the scripts that ran, in run order
    pub cases: Vec<TestCaseResult>,
    /// Total duration
    pub duration: Duration,
}

impl TestResult {
    /// Check if all tests passed
    pub fn all_passed(&self) -> bool {
        self.cases.iter().all(|c| c.passed || c.skipped)
    }

    /// Count passed tests
    pub fn passed_count(&self) -> usize {
        self.cases.iter().filter(|c| c.passed && !c.skipped).count()
    }

    /// Count failed tests
    pub fn failed_count(&self) -> usize {
        self.cases.iter().filter(|c| !c.passed && !c.skipped).count()
    }

    /// Count skipped tests
    pub fn skipped_count(&self) -> usize {
        self.cases.iter().filter(|c| c.skipped).count()
    }

    /// Format a summary line
    pub fn summary(&self) -> String {
        format!(
            "{} passed, {} failed, {} skipped ({}ms)",
            self.passed_count(),
            self.failed_count(),
            self.skipped_count(),
            self.duration.as_millis(),
        )
    }
}

/// Result of a single test case
#[derive(Debug)]
pub struct TestCaseResult {
    /// Script name (file name without extension)
    pub name: String,
    /// Source file path
    pub file: PathBuf,
    /// Whether the script passed
    pub passed: bool,
    /// Whether the script skipped itself
    pub skipped: bool,
    /// Failure message, or the skip reason
    pub error: Option<String>,
    /// Execution log
    pub log: String,
    /// Duration
    pub duration: Duration,
    /// Work directory, if it was kept
    pub workdir: Option<PathBuf>,
}

/// The test runner
pub struct TestRunner {
    engine: Engine,
    config: RunConfig,
}

impl TestRunner {
    /// Create a new runner with the given config
    pub fn new(config: RunConfig) -> Self {
        Self {
            engine: Engine::new(),
            config,
        }
    }

    /// Create a new runner with a custom engine
    pub fn with_engine(engine: Engine, config: RunConfig) -> Self {
        Self { engine, config }
    }

    /// Get mutable reference to the engine (for registering custom commands)
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The scripts this run would execute, in run order.
    ///
    /// An explicit file list is used as given. Otherwise `dir` is scanned
    /// (not recursively) for files with the configured extension, sorted
    /// by path; a single file in `dir` is run on its own.
    pub fn discover(&self) -> Result<Vec<PathBuf>, ScriptError> {
        let files = if !self.config.files.is_empty() {
            self.config.files.clone()
        } else if self.config.dir.is_file() {
            vec![self.config.dir.clone()]
        } else {
            self.scan_dir(&self.config.dir)?
        };

        Ok(files.into_iter().filter(|f| self.matches_filter(f)).collect())
    }

    fn scan_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, ScriptError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            ScriptError::new(ErrorKind::Io, format!("{}: {}", dir.display(), e))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && self.is_test_file(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(ScriptError::new(
                ErrorKind::UsageError,
                format!("no test script files found in {}", dir.display()),
            ));
        }
        files.sort();
        Ok(files)
    }

    fn is_test_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| name.ends_with(self.config.extension.as_str()))
            .unwrap_or(false)
    }

    fn matches_filter(&self, path: &Path) -> bool {
        match self.config.filter {
            Some(ref filter) => script_name(path).contains(filter.as_str()),
            None => true,
        }
    }

    /// Reject the run if two scripts share a name.
    fn check_unique_names(&self, files: &[PathBuf]) -> Result<(), ScriptError> {
        let mut seen: HashMap<String, &Path> = HashMap::new();
        for file in files {
            let name = script_name(file);
            if let Some(first) = seen.insert(name.clone(), file) {
                return Err(ScriptError::new(
                    ErrorKind::DuplicateName,
                    format!(
                        "duplicate script name {:?}: {} and {}",
                        name,
                        first.display(),
                        file.display()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Run all discovered tests
    pub fn run_all(&self) -> Result<TestResult, ScriptError> {
        let files = self.discover()?;
        self.run_files(&files)
    }

    /// Run the given scripts in order.
    ///
    /// Stops after the first failing script unless `continue_on_error` is set.
    pub fn run_files(&self, files: &[PathBuf]) -> Result<TestResult, ScriptError> {
        if self.config.require_unique_names {
            self.check_unique_names(files)?;
        }

        let start = Instant::now();
        let mut cases = Vec::new();
        for file in files {
            let case = self.run_one(file);
            let failed = !case.passed;
            cases.push(case);
            if failed && !self.config.continue_on_error {
                tracing::debug!(file = %file.display(), "stopping run after failure");
                break;
            }
        }

        Ok(TestResult {
            cases,
            duration: start.elapsed(),
        })
    }

    /// Run a single test file
    pub fn run_one(&self, file: &Path) -> TestCaseResult {
        let start = Instant::now();
        let mut report = CaseReport::new();
        let workdir = run_script(&self.engine, &self.config, file, &mut report);

        let passed = !report.has_failed();
        let error = match report.first_failure() {
            Some(msg) => Some(msg.to_string()),
            None => report.skipped.clone(),
        };

        TestCaseResult {
            name: script_name(file),
            file: file.to_path_buf(),
            passed,
            skipped: passed && report.is_skipped(),
            error,
            log: report.log,
            duration: start.elapsed(),
            workdir,
        }
    }
}

/// Builder API for convenient test runner construction
pub struct TestRunnerBuilder {
    config: RunConfig,
    engine: Option<Engine>,
}

impl TestRunnerBuilder {
    /// Start building a runner for the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            config: RunConfig {
                dir: dir.into(),
                ..Default::default()
            },
            engine: None,
        }
    }

    /// Run exactly these files instead of scanning the directory
    pub fn files(mut self, files: Vec<PathBuf>) -> Self {
        self.config.files = files;
        self
    }

    /// Set the test filter pattern
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.config.filter = Some(filter.into());
        self
    }

    /// Set the working directory root
    pub fn workdir_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workdir_root = Some(root.into());
        self
    }

    /// Preserve working directories after tests
    pub fn preserve_work(mut self, preserve: bool) -> Self {
        self.config.preserve_work = preserve;
        self
    }

    /// Enable verbose output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn short(mut self, short: bool) -> Self {
        self.config.short = short;
        self
    }

    pub fn continue_on_error(mut self, yes: bool) -> Self {
        self.config.continue_on_error = yes;
        self
    }

    pub fn require_explicit_exec(mut self, yes: bool) -> Self {
        self.config.require_explicit_exec = yes;
        self
    }

    pub fn require_unique_names(mut self, yes: bool) -> Self {
        self.config.require_unique_names = yes;
        self
    }

    /// Set the script file extension
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.config.extension = ext.into();
        self
    }

    /// Run `f` after each script's environment is seeded
    pub fn setup<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut SetupEnv) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.config.setup = Some(Box::new(f));
        self
    }

    /// Answer every `[cond]` with `f` instead of the built-in conditions
    pub fn condition<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<bool, ScriptError> + Send + Sync + 'static,
    {
        self.config.condition = Some(Box::new(f));
        self
    }

    /// Use a custom engine
    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Build and return the runner
    pub fn build(self) -> TestRunner {
        if let Some(engine) = self.engine {
            TestRunner::with_engine(engine, self.config)
        } else {
            TestRunner::new(self.config)
        }
    }

    /// Build and run all tests
    pub fn run(self) -> Result<TestResult, ScriptError> {
        self.build().run_all()
    }
}

/// Convenience function: create a runner builder for a directory
pub fn run(dir: impl Into<PathBuf>) -> TestRunnerBuilder {
    TestRunnerBuilder::new(dir)
}

/// Run `.tsar` scripts and integrate with `#[test]` by panicking on failure.
///
/// Usage in cargo tests:
/// ```rust,ignore
/// #[test]
/// fn scripts() {
///     tsar::run_and_assert("tests/testdata");
/// }
/// ```
///
/// `TSAR_VERBOSE` prints every log, `TSAR_WORK` keeps work directories.
pub fn run_and_assert(dir: impl Into<PathBuf>) {
    run_and_assert_with(dir, |_| {});
}

/// Like `run_and_assert` but allows engine customization.
pub fn run_and_assert_with(dir: impl Into<PathBuf>, customize: impl FnOnce(&mut Engine)) {
    let mut engine = Engine::new();
    customize(&mut engine);

    let config = RunConfig {
        dir: dir.into(),
        verbose: std::env::var_os("TSAR_VERBOSE").is_some(),
        preserve_work: std::env::var_os("TSAR_WORK").is_some(),
        continue_on_error: true,
        ..Default::default()
    };
    let verbose = config.verbose;

    let runner = TestRunner::with_engine(engine, config);
    let result = match runner.run_all() {
        Ok(result) => result,
        Err(e) => panic!("failed to run scripts: {}", e),
    };

    for case in &result.cases {
        if case.skipped {
            eprintln!("SKIP  {}: {}", case.name, case.error.as_deref().unwrap_or(""));
        } else if case.passed {
            eprintln!("PASS  {} ({}ms)", case.name, case.duration.as_millis());
        } else {
            eprintln!("FAIL  {}", case.name);
            if let Some(ref err) = case.error {
                eprintln!("  {}", err);
            }
        }
        if (verbose || !case.passed) && !case.log.is_empty() {
            eprintln!("  --- log ---");
            for line in case.log.lines() {
                eprintln!("  {}", line);
            }
        }
    }

    eprintln!("\n{}", result.summary());

    if !result.all_passed() {
        panic!("{} script(s) failed", result.failed_count());
    }
}
