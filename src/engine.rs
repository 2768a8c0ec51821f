//! Script engine
//!
//! The Engine holds the command and condition registries.
//! It is stateless config: one engine can run many scripts.
//!
//! Commands live in two tables. The built-in table is built once per process
//! and shared read-only; the user table belongs to the engine. A command name
//! is resolved by trying, in order: built-ins, user commands, and finally an
//! implicit `exec` of the name when explicit exec is not required.

use std::collections::HashMap;
use std::sync::OnceLock;
use crate::conditions::BoxedCondition;
use crate::error::ScriptError;
use crate::state::State;

/// Result returned by a command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdResult {
    /// Command completed successfully
    Ok,
    /// Command completed, script should stop
    Stop(String),
    /// Command completed, script should be skipped
    Skip(String),
}

/// Usage information for a command
pub struct CmdUsage {
    /// One-line summary
    pub summary: String,
    /// Argument syntax
    pub args: String,
}

/// A command that can be executed in a script.
///
/// `neg` is true when the line started with `!`. `args` are the arguments
/// after the command name. Returning `Err` fails the script at the current line.
pub trait Cmd: Send + Sync {
    /// Execute the command
    fn run(&self, state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError>;

    /// Return usage information
    fn usage(&self) -> CmdUsage;
}

/// A boxed command
pub type BoxedCmd = Box<dyn Cmd>;

/// Name → command table
pub type CommandTable = HashMap<String, BoxedCmd>;

/// The built-in command table, constructed on first use.
pub fn builtins() -> &'static CommandTable {
    static BUILTINS: OnceLock<CommandTable> = OnceLock::new();
    BUILTINS.get_or_init(crate::commands::default_commands)
}

/// Adapter that turns a closure into a [`Cmd`].
pub struct FnCmd<F> {
    f: F,
    summary: String,
}

impl<F> Cmd for FnCmd<F>
where
    F: Fn(&mut State, bool, &[String]) -> Result<(), ScriptError> + Send + Sync,
{
    fn run(&self, state: &mut State, neg: bool, args: &[String]) -> Result<CmdResult, ScriptError> {
        (self.f)(state, neg, args).map(|()| CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: self.summary.clone(),
            args: String::new(),
        }
    }
}

/// Which table a command name resolved to.
pub enum Dispatch<'a> {
    /// A built-in; receives the arguments after the name
    Builtin(&'a dyn Cmd),
    /// A user command; receives the arguments after the name
    User(&'a dyn Cmd),
    /// No command by that name: run it through `exec`, which receives
    /// the name as its first argument
    ImplicitExec(&'a dyn Cmd),
}

type Resolver = for<'a, 'b> fn(&'a Engine, &'b str, bool) -> Option<Dispatch<'a>>;

/// Resolution strategies, tried in order. The first hit wins.
const RESOLVERS: [Resolver; 3] = [
    Engine::resolve_builtin,
    Engine::resolve_user,
    Engine::resolve_implicit_exec,
];

/// The script engine: holds command and condition registries
pub struct Engine {
    builtins: &'static CommandTable,
    /// User-registered commands
    pub commands: CommandTable,
    /// Built-in conditions (consulted unless a resolver is configured)
    pub conditions: HashMap<String, BoxedCondition>,
}

impl Engine {
    /// Create a new engine with the built-in commands and conditions
    pub fn new() -> Self {
        Self {
            builtins: builtins(),
            commands: HashMap::new(),
            conditions: crate::conditions::default_conditions(),
        }
    }

    /// The built-in command table.
    pub fn builtins(&self) -> &CommandTable {
        self.builtins
    }

    /// Register a user command. Built-in names cannot be taken.
    pub fn register_command(&mut self, name: impl Into<String>, cmd: BoxedCmd) -> Result<(), ScriptError> {
        let name = name.into();
        if self.builtins.contains_key(&name) {
            return Err(ScriptError::new(
                crate::error::ErrorKind::UsageError,
                format!("cannot override built-in command {:?}", name),
            ));
        }
        self.commands.insert(name, cmd);
        Ok(())
    }

    /// Register a closure as a user command.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, summary: impl Into<String>, f: F) -> Result<(), ScriptError>
    where
        F: Fn(&mut State, bool, &[String]) -> Result<(), ScriptError> + Send + Sync + 'static,
    {
        self.register_command(name, Box::new(FnCmd { f, summary: summary.into() }))
    }

    /// Resolve a command name to its handler.
    pub fn resolve(&self, name: &str, require_explicit_exec: bool) -> Option<Dispatch<'_>> {
        RESOLVERS
            .iter()
            .find_map(|resolve| resolve(self, name, require_explicit_exec))
    }

    fn resolve_builtin<'a>(&'a self, name: &str, _explicit: bool) -> Option<Dispatch<'a>> {
        self.builtins.get(name).map(|c| Dispatch::Builtin(c.as_ref()))
    }

    fn resolve_user<'a>(&'a self, name: &str, _explicit: bool) -> Option<Dispatch<'a>> {
        self.commands.get(name).map(|c| Dispatch::User(c.as_ref()))
    }

    fn resolve_implicit_exec<'a>(&'a self, _name: &str, explicit: bool) -> Option<Dispatch<'a>> {
        if explicit {
            return None;
        }
        self.builtins.get("exec").map(|c| Dispatch::ImplicitExec(c.as_ref()))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    impl Cmd for Marker {
        fn run(&self, state: &mut State, _neg: bool, _args: &[String]) -> Result<CmdResult, ScriptError> {
            state.setenv("MARKER", "1");
            Ok(CmdResult::Ok)
        }
        fn usage(&self) -> CmdUsage {
            CmdUsage { summary: "test".into(), args: String::new() }
        }
    }

    #[test]
    fn test_builtin_table_is_shared() {
        let a = Engine::new();
        let b = Engine::new();
        assert!(std::ptr::eq(a.builtins(), b.builtins()));
        for name in ["cd", "cp", "env", "exec", "exists", "grep", "mkdir", "rm", "skip", "stderr", "stdout", "stop", "wait"] {
            assert!(a.builtins().contains_key(name), "missing built-in {}", name);
        }
    }

    #[test]
    fn test_builtin_cannot_be_overridden() {
        let mut engine = Engine::new();
        let err = engine.register_command("exists", Box::new(Marker)).unwrap_err();
        assert!(err.message.contains("cannot override"));
        assert!(matches!(engine.resolve("exists", true), Some(Dispatch::Builtin(_))));
    }

    #[test]
    fn test_user_command_resolves() {
        let mut engine = Engine::new();
        engine.register_command("marker", Box::new(Marker)).unwrap();
        assert!(matches!(engine.resolve("marker", true), Some(Dispatch::User(_))));
    }

    #[test]
    fn test_unknown_falls_back_to_exec() {
        let engine = Engine::new();
        assert!(matches!(engine.resolve("git", false), Some(Dispatch::ImplicitExec(_))));
        assert!(engine.resolve("git", true).is_none());
    }

    #[test]
    fn test_register_fn() {
        let mut engine = Engine::new();
        engine
            .register_fn("hello", "set HELLO", |state: &mut State, _neg: bool, args: &[String]| {
                state.setenv("HELLO", &args.join(" "));
                Ok(())
            })
            .unwrap();
        let mut state = State::new(std::path::PathBuf::from("."));
        match engine.resolve("hello", true) {
            Some(Dispatch::User(cmd)) => {
                assert_eq!(cmd.run(&mut state, false, &["a".into(), "b".into()]).unwrap(), CmdResult::Ok);
            }
            _ => panic!("hello did not resolve to a user command"),
        }
        assert_eq!(state.getenv("HELLO"), "a b");
    }
}
