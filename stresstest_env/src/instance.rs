//! Module instance keys and absolute object addresses.

use crate::value::PathStep;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminates one repetition-generated copy of a module call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InstanceKey {
    /// Single-instance call (no `for_each`, no `count`)
    NoKey,
    /// `for_each` map key
    Str(String),
    /// `count` index
    Int(usize),
}

impl InstanceKey {
    /// Returns the traversal step selecting this instance from the module
    /// call's value, or `None` for a single-instance call.
    pub fn path_step(&self) -> Option<PathStep> {
        match self {
            InstanceKey::NoKey => None,
            InstanceKey::Str(key) => Some(PathStep::Key(key.clone())),
            InstanceKey::Int(idx) => Some(PathStep::Index(*idx)),
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKey::NoKey => Ok(()),
            InstanceKey::Str(key) => write!(f, "[{:?}]", key),
            InstanceKey::Int(idx) => write!(f, "[{}]", idx),
        }
    }
}

/// One `module.name[key]` hop in a module instance path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleInstanceStep {
    pub call: String,
    pub key: InstanceKey,
}

/// Path from the root module to one module instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleInstancePath(Vec<ModuleInstanceStep>);

impl ModuleInstancePath {
    /// The root module instance.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns the path of an instance of `call` inside this one.
    pub fn child(&self, call: impl Into<String>, key: InstanceKey) -> Self {
        let mut steps = self.0.clone();
        steps.push(ModuleInstanceStep {
            call: call.into(),
            key,
        });
        Self(steps)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn steps(&self) -> &[ModuleInstanceStep] {
        &self.0
    }

    /// Splits off the last hop, returning the calling instance and the
    /// call that leads here. `None` for the root.
    pub fn split_last(&self) -> Option<(Self, &ModuleInstanceStep)> {
        let (last, rest) = self.0.split_last()?;
        Some((Self(rest.to_vec()), last))
    }

    /// Returns the module call names, dropping instance keys.
    pub fn call_path(&self) -> Vec<String> {
        self.0.iter().map(|s| s.call.clone()).collect()
    }
}

impl fmt::Display for ModuleInstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "module.{}{}", step.call, step.key)?;
        }
        Ok(())
    }
}

/// Absolute address of one output value in one module instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AbsOutputAddr {
    pub module: ModuleInstancePath,
    pub name: String,
}

impl AbsOutputAddr {
    pub fn new(module: ModuleInstancePath, name: impl Into<String>) -> Self {
        Self {
            module,
            name: name.into(),
        }
    }

    /// Address of an output in the root module.
    pub fn root(name: impl Into<String>) -> Self {
        Self::new(ModuleInstancePath::root(), name)
    }
}

impl fmt::Display for AbsOutputAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_root() {
            write!(f, "output.{}", self.name)
        } else {
            write!(f, "{}.output.{}", self.module, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_instance_path_display() {
        let path = ModuleInstancePath::root()
            .child("a", InstanceKey::Str("k".to_string()))
            .child("b", InstanceKey::Int(0))
            .child("c", InstanceKey::NoKey);

        assert_eq!(path.to_string(), "module.a[\"k\"].module.b[0].module.c");
        assert_eq!(path.call_path(), vec!["a", "b", "c"]);

        let (parent, last) = path.split_last().unwrap();
        assert_eq!(parent.to_string(), "module.a[\"k\"].module.b[0]");
        assert_eq!(last.call, "c");
        assert!(ModuleInstancePath::root().split_last().is_none());
    }

    #[test]
    fn test_output_addr_display() {
        assert_eq!(AbsOutputAddr::root("x").to_string(), "output.x");

        let nested = AbsOutputAddr::new(
            ModuleInstancePath::root().child("m", InstanceKey::Int(2)),
            "y",
        );
        assert_eq!(nested.to_string(), "module.m[2].output.y");
    }

    #[test]
    fn test_instance_key_path_step() {
        assert_eq!(InstanceKey::NoKey.path_step(), None);
        assert_eq!(
            InstanceKey::Str("k".into()).path_step(),
            Some(PathStep::Key("k".into()))
        );
        assert_eq!(InstanceKey::Int(4).path_step(), Some(PathStep::Index(4)));
    }
}
