//! Environment store
//!
//! An ordered list of `KEY=VALUE` entries plus a key → value index.
//! Setting a key appends a new entry; earlier duplicates stay in the list
//! but lookups always see the most recent one.

use std::collections::HashMap;

/// Environment snapshot for a single script session.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Entries in insertion order, `KEY=VALUE`
    entries: Vec<String>,
    /// Derived index, rebuilt from `entries` on every mutation
    index: HashMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw `KEY=VALUE` entries.
    pub fn from_entries(entries: Vec<String>) -> Self {
        let mut env = Self {
            entries,
            index: HashMap::new(),
        };
        env.refresh();
        env
    }

    /// Value for `key`, or the empty string when unset.
    pub fn get(&self, key: &str) -> &str {
        self.lookup(key).unwrap_or("")
    }

    /// Value for `key` if the snapshot defines it.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|v| v.as_str())
    }

    /// Append `key=value`. The index is updated before returning.
    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.push(format!("{}={}", key, value));
        self.index.insert(key.to_string(), value.to_string());
    }

    /// Replace every entry (used after the setup hook ran).
    pub fn replace(&mut self, entries: Vec<String>) {
        self.entries = entries;
        self.refresh();
    }

    /// Rebuild the index from the ordered entries. Later entries win.
    pub fn refresh(&mut self) {
        self.index.clear();
        for kv in &self.entries {
            if let Some((k, v)) = kv.split_once('=') {
                self.index.insert(k.to_string(), v.to_string());
            }
        }
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Key/value pairs in entry order, for handing to a subprocess.
    /// Duplicates are kept; the process builder lets the last one win.
    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|kv| kv.split_once('='))
    }

    /// Substitute `$NAME` and `${NAME}` in `text`.
    ///
    /// Names missing from the snapshot fall back to the host process
    /// environment, then to the empty string.
    pub fn expand(&self, text: &str) -> String {
        crate::parser::expand_env(text, &|key| {
            self.lookup(key)
                .map(|v| v.to_string())
                .or_else(|| std::env::var(key).ok())
        })
    }
}
