//! Realized state, rendered snapshots and input values.

use crate::instance::AbsOutputAddr;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Values for the root module's caller-supplied variables, by name.
pub type InputValues = BTreeMap<String, Value>;

/// The engine's record of actual values after applying one step.
///
/// Holds the output values of every module instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    outputs: BTreeMap<AbsOutputAddr, Value>,
}

impl State {
    /// Creates an empty state (the starting point of every series).
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the value of an output, replacing any previous value.
    pub fn set_output(&mut self, addr: AbsOutputAddr, value: Value) {
        self.outputs.insert(addr, value);
    }

    /// Removes an output, returning its value if it was present.
    pub fn remove_output(&mut self, addr: &AbsOutputAddr) -> Option<Value> {
        self.outputs.remove(addr)
    }

    pub fn output(&self, addr: &AbsOutputAddr) -> Option<&Value> {
        self.outputs.get(addr)
    }

    pub fn contains(&self, addr: &AbsOutputAddr) -> bool {
        self.outputs.contains_key(addr)
    }

    /// Iterates outputs in address order.
    pub fn outputs(&self) -> impl Iterator<Item = (&AbsOutputAddr, &Value)> {
        self.outputs.iter()
    }

    /// Mutable access, for engines that need to rewrite values in place.
    pub fn outputs_mut(&mut self) -> impl Iterator<Item = (&AbsOutputAddr, &mut Value)> {
        self.outputs.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// A rendered configuration: one source file per module directory.
///
/// The root module lives at [`ConfigSnapshot::ROOT`]; a module called `b`
/// from a module in directory `a` lives at `a/b`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    modules: BTreeMap<String, String>,
}

impl ConfigSnapshot {
    /// Directory of the root module.
    pub const ROOT: &'static str = "";

    /// Conventional file name used when writing a snapshot to disk.
    pub const FILE_NAME: &'static str = "main.tf";

    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the source of the module in `dir`.
    pub fn insert_module(&mut self, dir: impl Into<String>, source: impl Into<String>) {
        self.modules.insert(dir.into(), source.into());
    }

    /// Returns the source of the module in `dir`.
    pub fn module(&self, dir: &str) -> Option<&str> {
        self.modules.get(dir).map(String::as_str)
    }

    /// Iterates `(dir, source)` pairs in directory order.
    pub fn modules(&self) -> impl Iterator<Item = (&str, &str)> {
        self.modules.iter().map(|(d, s)| (d.as_str(), s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Resolves a local module `source` (`"./name"`) relative to the directory
/// of the calling module.
///
/// Only plain relative paths are supported; `..` segments and registry
/// sources yield `None`.
pub fn resolve_source(parent_dir: &str, source: &str) -> Option<String> {
    let rest = source.strip_prefix("./")?;
    if rest.is_empty() || rest.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return None;
    }

    if parent_dir.is_empty() {
        Some(rest.to_string())
    } else {
        Some(format!("{}/{}", parent_dir, rest))
    }
}
