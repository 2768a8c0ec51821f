//! Script conditions
//!
//! Conditions are used in `[cond]` guards to conditionally execute a line.
//! A caller-supplied resolver replaces the built-in table entirely; without
//! one, `short` and the platform names are known and `!name` negates.

use std::collections::HashMap;
use crate::error::ScriptError;

/// Caller-supplied condition resolver. Its answer, including errors, is final.
pub type ConditionFn = dyn Fn(&str) -> Result<bool, ScriptError> + Send + Sync;

/// A built-in condition
pub trait Condition: Send + Sync {
    /// Evaluate the condition. `short` reports whether the run is in short mode.
    fn eval(&self, short: bool) -> bool;

    /// Brief description
    fn summary(&self) -> &str;
}

/// Boxed condition
pub type BoxedCondition = Box<dyn Condition>;

/// Return the built-in conditions
pub fn default_conditions() -> HashMap<String, BoxedCondition> {
    let mut conds: HashMap<String, BoxedCondition> = HashMap::new();

    conds.insert("short".into(), Box::new(ShortCondition));
    conds.insert("windows".into(), Box::new(BoolCondition {
        summary: "true on Windows",
        value: cfg!(windows),
    }));
    conds.insert("darwin".into(), Box::new(BoolCondition {
        summary: "true on macOS",
        value: cfg!(target_os = "macos"),
    }));
    conds.insert("linux".into(), Box::new(BoolCondition {
        summary: "true on Linux",
        value: cfg!(target_os = "linux"),
    }));

    conds
}

/// A static boolean condition fixed at compile time
struct BoolCondition {
    summary: &'static str,
    value: bool,
}

impl Condition for BoolCondition {
    fn eval(&self, _short: bool) -> bool {
        self.value
    }
    fn summary(&self) -> &str {
        self.summary
    }
}

/// True when the run was started in short mode
struct ShortCondition;

impl Condition for ShortCondition {
    fn eval(&self, short: bool) -> bool {
        short
    }
    fn summary(&self) -> &str {
        "true when running in short mode"
    }
}

/// Evaluates guard names for one session.
pub struct ConditionEvaluator<'a> {
    table: &'a HashMap<String, BoxedCondition>,
    resolver: Option<&'a ConditionFn>,
    short: bool,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(
        table: &'a HashMap<String, BoxedCondition>,
        resolver: Option<&'a ConditionFn>,
        short: bool,
    ) -> Self {
        Self { table, resolver, short }
    }

    /// Evaluate a guard name such as `linux` or `!short`.
    pub fn evaluate(&self, name: &str) -> Result<bool, ScriptError> {
        if let Some(resolver) = self.resolver {
            return resolver(name);
        }
        self.builtin(name)
    }

    fn builtin(&self, name: &str) -> Result<bool, ScriptError> {
        if let Some(cond) = self.table.get(name) {
            return Ok(cond.eval(self.short));
        }
        if let Some(rest) = name.strip_prefix('!') {
            return self.builtin(rest).map(|ok| !ok);
        }
        Err(ScriptError::condition(format!("unknown condition {:?}", name)))
    }
}
