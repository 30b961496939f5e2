//! Expected-value registry for one generated step.

use crate::expr::Referenceable;
use std::collections::BTreeMap;
use stresstest_env::{Path, PathError, Value};
use thiserror::Error;

/// Errors from resolving a reference against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{target} in module {module:?} has no registered value")]
    NotRegistered {
        module: Vec<String>,
        target: Referenceable,
    },

    #[error("path {path} does not apply to {target}: {source}")]
    BadPath {
        target: Referenceable,
        path: Path,
        #[source]
        source: PathError,
    },
}

/// Maps each addressable object to the value it must hold.
///
/// Keys are `(module call path, object)`. Every instance of a module call
/// shares the same expected values, because argument expressions never
/// depend on the instance key; instance expansion happens in the oracle.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    values: BTreeMap<(Vec<String>, Referenceable), Value>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the expected value of `target` in module `module`.
    ///
    /// Registering the same object twice replaces the earlier value.
    pub fn register(&mut self, module: &[String], target: Referenceable, value: Value) {
        self.values.insert((module.to_vec(), target), value);
    }

    /// Returns the registered value of `target` projected through `path`.
    pub fn try_ref_value(
        &self,
        module: &[String],
        target: &Referenceable,
        path: &Path,
    ) -> Result<Value, RegistryError> {
        let value = self
            .values
            .get(&(module.to_vec(), target.clone()))
            .ok_or_else(|| RegistryError::NotRegistered {
                module: module.to_vec(),
                target: target.clone(),
            })?;

        path.apply(value).map_err(|source| RegistryError::BadPath {
            target: target.clone(),
            path: path.clone(),
            source,
        })
    }

    /// Like [`Registry::try_ref_value`], but treats failure as a generator bug.
    ///
    /// # Panics
    ///
    /// Panics if the target was never registered or the path doesn't fit
    /// the registered value's shape.
    pub fn ref_value(&self, module: &[String], target: &Referenceable, path: &Path) -> Value {
        self.try_ref_value(module, target, path)
            .unwrap_or_else(|err| panic!("generated an invalid reference: {}", err))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
