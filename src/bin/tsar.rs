//! tsar CLI
//!
//! Run `.tsar` scripts from a file or a directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tsar::{Engine, RunConfig, TestResult, TestRunner};

const EXTENSION: &str = ".tsar";

/// Exit status for a bad command line.
const USAGE_EXIT: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "tsar")]
#[command(version)]
#[command(about = "Run .tsar test scripts")]
struct Cli {
    /// A .tsar file or a directory of them
    target: Option<PathBuf>,

    /// Show the log of passing scripts too
    #[arg(short, long, env = "TSAR_VERBOSE")]
    verbose: bool,

    /// Run in short mode (the `short` condition holds)
    #[arg(short, long, env = "TSAR_SHORT")]
    short: bool,

    /// Keep work directories after each script
    #[arg(long, env = "TSAR_PRESERVE_WORK")]
    preserve_work: bool,

    /// Create work directories under this directory (implies --preserve-work)
    #[arg(short = 'w', long, env = "TSAR_WORKDIR_ROOT")]
    workdir_root: Option<PathBuf>,

    /// Keep running scripts after one fails
    #[arg(short = 'c', long, env = "TSAR_CONTINUE_ON_ERROR")]
    continue_on_error: bool,

    /// Unknown commands fail instead of running as programs
    #[arg(short = 'e', long, env = "TSAR_REQUIRE_EXPLICIT_EXEC")]
    require_explicit_exec: bool,

    /// Fail when two scripts share a name
    #[arg(short = 'u', long, env = "TSAR_REQUIRE_UNIQUE_NAMES")]
    require_unique_names: bool,

    /// List built-in commands and conditions, then exit
    #[arg(long = "list-commands")]
    list_commands: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.list_commands {
        print_commands();
        return ExitCode::SUCCESS;
    }

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("usage error: {:#}", e);
            return ExitCode::from(USAGE_EXIT);
        }
    };

    match run(config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Check the target and turn the flags into a run configuration.
fn build_config(cli: &Cli) -> Result<RunConfig> {
    let Some(ref target) = cli.target else {
        bail!("missing target: expected a {} file or a directory", EXTENSION);
    };

    let mut config = RunConfig {
        preserve_work: cli.preserve_work,
        workdir_root: cli.workdir_root.clone(),
        require_explicit_exec: cli.require_explicit_exec,
        require_unique_names: cli.require_unique_names,
        continue_on_error: cli.continue_on_error,
        short: cli.short,
        verbose: cli.verbose,
        ..Default::default()
    };

    if target.is_dir() {
        config.dir = target.clone();
    } else if target.is_file() && is_script(target) {
        config.files = vec![target.clone()];
    } else {
        bail!("{} is neither a {} file nor a directory", target.display(), EXTENSION);
    }
    Ok(config)
}

fn is_script(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.ends_with(EXTENSION))
}

fn run(config: RunConfig) -> Result<bool> {
    let target = if config.files.is_empty() { config.dir.clone() } else { config.files[0].clone() };
    let runner = TestRunner::new(config);
    let result = runner
        .run_all()
        .with_context(|| format!("running {}", target.display()))?;
    print_result(&result, runner.config().verbose);
    Ok(result.all_passed())
}

fn print_result(result: &TestResult, verbose: bool) {
    for case in &result.cases {
        if case.skipped {
            println!("SKIP  {} - {}", case.name, case.error.as_deref().unwrap_or(""));
        } else if case.passed {
            println!("PASS  {} ({}ms)", case.name, case.duration.as_millis());
        } else {
            println!("FAIL  {}", case.name);
            if let Some(ref err) = case.error {
                for line in err.lines() {
                    println!("      {}", line);
                }
            }
        }
        if (verbose || !case.passed) && !case.log.is_empty() {
            println!("      --- log ---");
            for line in case.log.lines() {
                println!("      {}", line);
            }
        }
        if let Some(ref wd) = case.workdir {
            println!("      workdir: {}", wd.display());
        }
    }

    println!();
    println!("{}", result.summary());
}

fn print_commands() {
    let engine = Engine::new();

    println!("Built-in commands:");
    println!();
    let mut cmds: Vec<_> = engine.builtins().iter().collect();
    cmds.sort_by(|a, b| a.0.cmp(b.0));
    for (name, cmd) in cmds {
        let usage = cmd.usage();
        println!("  {:<8} {:<24} {}", name, usage.args, usage.summary);
    }

    println!();
    println!("Built-in conditions:");
    println!();
    let mut conds: Vec<_> = engine.conditions.iter().collect();
    conds.sort_by(|a, b| a.0.cmp(b.0));
    for (name, cond) in conds {
        println!("  {:<8} {}", name, cond.summary());
    }

    println!();
    println!("Prefixes:");
    println!("  !        Command must fail");
    println!("  [cond]   Run the line only if cond holds");
    println!("  [!cond]  Negated condition");
}
